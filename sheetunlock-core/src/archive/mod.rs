//! Archive extension swap, extraction and repacking

pub mod extract;
pub mod repack;

use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::RunLog;
use crate::error::{Result, UnlockError};

pub use extract::{WORKSHEETS_DIR, extract};
pub use repack::repack;

/// Result of [`change_extension`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed(PathBuf),
    /// A file already sits at the target path; nothing was renamed
    AlreadyExists(PathBuf),
}

/// Rename `path` so it carries `new_ext` (without the dot).
///
/// Fails closed: an existing file at the target is never overwritten.
pub fn change_extension(path: &Path, new_ext: &str, log: &mut RunLog) -> Result<RenameOutcome> {
    let target = path.with_extension(new_ext);
    log.info(format!(
        "changing extension of {} to .{}",
        path.display(),
        new_ext
    ));

    if target.exists() {
        log.warn(format!("{} already exists", target.display()));
        return Ok(RenameOutcome::AlreadyExists(target));
    }

    fs::rename(path, &target).map_err(|e| UnlockError::io("rename", path, e))?;
    Ok(RenameOutcome::Renamed(target))
}

/// Directory a document is unpacked into: its path without the extension
pub fn working_directory_for(archive_path: &Path) -> PathBuf {
    archive_path.with_extension("")
}
