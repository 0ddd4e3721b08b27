//! Spreadsheet metadata lookups

use calamine::{Reader, Sheets, open_workbook_auto};
use std::path::Path;

use crate::error::{Result, UnlockError};

/// Reports how many sheets a document holds
pub trait SheetCounter {
    fn sheet_count(&self, path: &Path) -> Result<usize>;
}

/// [`SheetCounter`] backed by calamine
#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineSheetCounter;

impl SheetCounter for CalamineSheetCounter {
    fn sheet_count(&self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Err(UnlockError::MissingFile(path.to_path_buf()));
        }

        let workbook: Sheets<_> =
            open_workbook_auto(path).map_err(|e| UnlockError::Workbook {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let count = workbook.sheet_names().len();
        log::debug!("{} has {} sheets", path.display(), count);
        Ok(count)
    }
}

impl<F> SheetCounter for F
where
    F: Fn(&Path) -> Result<usize>,
{
    fn sheet_count(&self, path: &Path) -> Result<usize> {
        self(path)
    }
}
