//! Per-run diagnostics sink
//!
//! Each document run owns one [`RunLog`]. Components receive it by `&mut`
//! and record what they did; every entry is also forwarded to the `log`
//! facade so a host application sees it through its own subscriber.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::pipeline::Stage;

/// Severity of a diagnostic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl DiagnosticLevel {
    fn as_log_level(self) -> log::Level {
        match self {
            DiagnosticLevel::Debug => log::Level::Debug,
            DiagnosticLevel::Info => log::Level::Info,
            DiagnosticLevel::Warn => log::Level::Warn,
            DiagnosticLevel::Error => log::Level::Error,
        }
    }
}

/// A single recorded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.stage, self.message)
    }
}

#[derive(Debug)]
pub struct RunLog {
    document: PathBuf,
    stage: Stage,
    entries: Vec<Diagnostic>,
}

impl RunLog {
    pub fn new(document: &Path) -> Self {
        Self {
            document: document.to_path_buf(),
            stage: Stage::Idle,
            entries: Vec::new(),
        }
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to `stage`; later entries are tagged with it
    pub fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.debug(format!("entering {:?}", stage));
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.record(DiagnosticLevel::Debug, message.into());
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.record(DiagnosticLevel::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.record(DiagnosticLevel::Warn, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.record(DiagnosticLevel::Error, message.into());
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }

    fn record(&mut self, level: DiagnosticLevel, message: String) {
        log::log!(
            target: "sheetunlock",
            level.as_log_level(),
            "{}: {}",
            self.document.display(),
            message
        );
        self.entries.push(Diagnostic {
            level,
            stage: self.stage,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_tagged_with_current_stage() {
        let mut log = RunLog::new(Path::new("book.xlsx"));
        log.info("checking range");
        log.enter(Stage::Patching);
        log.warn("sheet part skipped");

        let entries = log.entries();
        assert_eq!(entries[0].stage, Stage::Idle);
        assert_eq!(entries[0].level, DiagnosticLevel::Info);
        let last = entries.last().unwrap();
        assert_eq!(last.stage, Stage::Patching);
        assert_eq!(last.level, DiagnosticLevel::Warn);
        assert_eq!(last.to_string(), "[Patching] sheet part skipped");
    }

    #[test]
    fn test_runs_do_not_share_entries() {
        let mut first = RunLog::new(Path::new("a.xlsx"));
        let second = RunLog::new(Path::new("b.xlsx"));
        first.error("boom");
        assert_eq!(first.entries().len(), 1);
        assert!(second.entries().is_empty());
    }
}
