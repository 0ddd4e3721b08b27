//! Put the rebuilt document in place and clean up

use std::fs;
use std::path::Path;

use crate::diagnostics::RunLog;
use crate::error::{Result, UnlockError};

/// Copy `rebuilt` over `original`, then delete `working_dir` whatever the
/// outcome of the copy. When the copy succeeded `source_archive` (the
/// renamed input) is removed as well, leaving `original` as the only
/// artifact of the run.
pub fn finalize(
    rebuilt: &Path,
    original: &Path,
    working_dir: &Path,
    source_archive: &Path,
    log: &mut RunLog,
) -> Result<()> {
    log.info(format!(
        "copying {} to {}",
        rebuilt.display(),
        original.display()
    ));
    let copied =
        fs::copy(rebuilt, original).map_err(|e| UnlockError::io("copy", rebuilt, e));

    if let Err(e) = fs::remove_dir_all(working_dir) {
        log.warn(format!(
            "could not remove working directory {}: {}",
            working_dir.display(),
            e
        ));
    } else {
        log.debug(format!("removed {}", working_dir.display()));
    }

    copied?;

    if source_archive.exists() {
        fs::remove_file(source_archive)
            .map_err(|e| UnlockError::io("remove", source_archive, e))?;
        log.debug(format!("removed {}", source_archive.display()));
    }

    Ok(())
}
