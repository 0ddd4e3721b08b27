//! Error types for the unlock pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, UnlockError>;

/// Everything that can abort the processing of one document
#[derive(Debug, Error)]
pub enum UnlockError {
    #[error("The file {} does not exist.", .0.display())]
    MissingFile(PathBuf),

    #[error("Invalid sheet range '{expr}': {reason}")]
    MalformedRange { expr: String, reason: String },

    #[error(
        "Sheet {requested} exceeds the number of sheets in the document (document has {sheet_count})."
    )]
    OutOfBoundsRange { requested: u32, sheet_count: usize },

    #[error(
        "The document {} looks partially processed by a previous run. Remove {} before trying again.",
        .document.display(),
        .stray.display()
    )]
    AlreadyProcessed { document: PathBuf, stray: PathBuf },

    #[error("Sheet {0} was not found under xl/worksheets")]
    SheetNotFound(u32),

    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not read {} as a spreadsheet: {reason}", .path.display())]
    Workbook { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Category of an [`UnlockError`], detached from its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingFile,
    MalformedRange,
    OutOfBoundsRange,
    AlreadyProcessed,
    SheetNotFound,
    IoFailure,
    Workbook,
    Config,
}

impl UnlockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UnlockError::MissingFile(_) => ErrorKind::MissingFile,
            UnlockError::MalformedRange { .. } => ErrorKind::MalformedRange,
            UnlockError::OutOfBoundsRange { .. } => ErrorKind::OutOfBoundsRange,
            UnlockError::AlreadyProcessed { .. } => ErrorKind::AlreadyProcessed,
            UnlockError::SheetNotFound(_) => ErrorKind::SheetNotFound,
            UnlockError::Io { .. } => ErrorKind::IoFailure,
            UnlockError::Workbook { .. } => ErrorKind::Workbook,
            UnlockError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        UnlockError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn archive(action: &'static str, path: &Path, err: zip::result::ZipError) -> Self {
        let source = match err {
            zip::result::ZipError::Io(source) => source,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        };
        Self::io(action, path, source)
    }

    pub(crate) fn malformed(expr: &str, reason: impl Into<String>) -> Self {
        UnlockError::MalformedRange {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_processed_message_names_stray_file() {
        let err = UnlockError::AlreadyProcessed {
            document: PathBuf::from("/data/book.xlsx"),
            stray: PathBuf::from("/data/book.zip"),
        };
        let message = err.to_string();
        assert!(message.contains("/data/book.xlsx"));
        assert!(message.contains("Remove /data/book.zip"));
        assert_eq!(err.kind(), ErrorKind::AlreadyProcessed);
    }

    #[test]
    fn test_io_kind() {
        let err = UnlockError::io(
            "copy",
            Path::new("a.xlsx"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(err.to_string().starts_with("Failed to copy a.xlsx"));
    }
}
