//! Interactive unlock session
//!
//! A front end walks a [`Session`] through
//! `Idle -> OptionsChosen -> Ready -> Processing -> Idle`. Each state only
//! accepts the inputs that make sense at that point, so a caller cannot
//! start processing before it has a target, or change the target mid-run.

use std::path::PathBuf;
use thiserror::Error;

/// What the session operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    SingleFile,
    Directory,
}

/// A complete, ready-to-run request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockRequest {
    pub mode: Mode,
    pub target: PathBuf,
    /// `None` unlocks every sheet
    pub range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    OptionsChosen {
        mode: Mode,
        target: Option<PathBuf>,
        range: Option<String>,
    },
    Ready(UnlockRequest),
    Processing(UnlockRequest),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Choose whether to unlock one file or a whole directory first.")]
    NoModeChosen,
    #[error("Complete the fields: a file path is required.")]
    MissingFile,
    #[error("Select a directory.")]
    MissingDirectory,
    #[error("That input is not accepted while the session is {0}.")]
    NotAccepted(&'static str),
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn choose_mode(&mut self, mode: Mode) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle => {
                self.state = SessionState::OptionsChosen {
                    mode,
                    target: None,
                    range: None,
                };
                Ok(())
            }
            _ => Err(self.not_accepted()),
        }
    }

    pub fn set_target(&mut self, path: impl Into<PathBuf>) -> Result<(), SessionError> {
        let path = path.into();
        if let SessionState::OptionsChosen { target, .. } = &mut self.state {
            *target = Some(path).filter(|p| !p.as_os_str().is_empty());
            return Ok(());
        }
        Err(self.input_rejected())
    }

    /// An empty expression clears the range
    pub fn set_range(&mut self, expr: impl Into<String>) -> Result<(), SessionError> {
        let expr = expr.into();
        if let SessionState::OptionsChosen { range, .. } = &mut self.state {
            *range = Some(expr).filter(|e| !e.is_empty());
            return Ok(());
        }
        Err(self.input_rejected())
    }

    /// Check the collected inputs and move to `Ready`
    pub fn confirm(&mut self) -> Result<UnlockRequest, SessionError> {
        let request = match &self.state {
            SessionState::OptionsChosen {
                mode,
                target,
                range,
            } => {
                let Some(target) = target.clone() else {
                    return Err(match mode {
                        Mode::SingleFile => SessionError::MissingFile,
                        Mode::Directory => SessionError::MissingDirectory,
                    });
                };
                UnlockRequest {
                    mode: *mode,
                    target,
                    range: range.clone(),
                }
            }
            SessionState::Idle => return Err(SessionError::NoModeChosen),
            _ => return Err(self.not_accepted()),
        };
        self.state = SessionState::Ready(request.clone());
        Ok(request)
    }

    /// Move from `Ready` to `Processing`, handing out the request to run
    pub fn start(&mut self) -> Result<UnlockRequest, SessionError> {
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Ready(request) => {
                self.state = SessionState::Processing(request.clone());
                Ok(request)
            }
            other => {
                self.state = other;
                Err(self.not_accepted())
            }
        }
    }

    /// Processing finished (whatever the outcome); back to `Idle`
    pub fn finish(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Processing(_) => {
                self.state = SessionState::Idle;
                Ok(())
            }
            _ => Err(self.not_accepted()),
        }
    }

    /// Drop all inputs. Not allowed while processing.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Processing(_) => Err(self.not_accepted()),
            _ => {
                self.state = SessionState::Idle;
                Ok(())
            }
        }
    }

    fn input_rejected(&self) -> SessionError {
        match self.state {
            SessionState::Idle => SessionError::NoModeChosen,
            _ => self.not_accepted(),
        }
    }

    fn not_accepted(&self) -> SessionError {
        SessionError::NotAccepted(match self.state {
            SessionState::Idle => "idle",
            SessionState::OptionsChosen { .. } => "collecting options",
            SessionState::Ready(_) => "ready",
            SessionState::Processing(_) => "processing",
        })
    }
}
