//! Removal of the protection flag from worksheet parts

pub mod part;
pub mod workbook;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::WORKSHEETS_DIR;
use crate::config::{PartMapping, PatchMode};
use crate::diagnostics::RunLog;
use crate::error::{Result, UnlockError};
use crate::range::SheetIndexSet;

pub use part::SheetPart;
pub use workbook::WorkbookParts;

/// Flips the protection flag of the requested sheets inside a working directory
#[derive(Debug, Clone, Copy, Default)]
pub struct SheetPatcher {
    pub mode: PatchMode,
    pub mapping: PartMapping,
}

impl SheetPatcher {
    pub fn new(mode: PatchMode, mapping: PartMapping) -> Self {
        Self { mode, mapping }
    }

    /// Patch every sheet in `indices`, in ascending order.
    ///
    /// Stops at the first index without a part; parts already written stay
    /// modified.
    pub fn patch(
        &self,
        working_dir: &Path,
        indices: &SheetIndexSet,
        log: &mut RunLog,
    ) -> Result<Vec<u32>> {
        let locator = self.locator(working_dir, log)?;
        let mut patched = Vec::with_capacity(indices.len());

        for index in indices.iter() {
            let Some(path) = locator.part(index, log) else {
                log.error(format!("sheet {} not found in {}", index, WORKSHEETS_DIR));
                return Err(UnlockError::SheetNotFound(index));
            };

            let mut part = SheetPart::load(&path)?;
            let flipped = part.unprotect(self.mode)?;
            part.save()?;
            log.info(format!(
                "sheet {} ({}): {} protection flag(s) cleared",
                index,
                path.display(),
                flipped
            ));
            patched.push(index);
        }

        Ok(patched)
    }

    fn locator(&self, working_dir: &Path, log: &mut RunLog) -> Result<PartLocator> {
        match self.mapping {
            PartMapping::FileName => Ok(PartLocator::FileName(parts_by_file_name(
                &working_dir.join(WORKSHEETS_DIR),
                log,
            )?)),
            PartMapping::WorkbookOrder => {
                Ok(PartLocator::Workbook(WorkbookParts::load(working_dir)?))
            }
        }
    }
}

/// Sheet index -> part path, according to the configured mapping
enum PartLocator {
    FileName(BTreeMap<u32, PathBuf>),
    Workbook(WorkbookParts),
}

impl PartLocator {
    fn part(&self, index: u32, log: &mut RunLog) -> Option<PathBuf> {
        match self {
            PartLocator::FileName(parts) => parts.get(&index).cloned(),
            PartLocator::Workbook(parts) => parts.part(index, log),
        }
    }
}

/// Scan `dir` for `*.xml` parts whose name carries a numeric `sheet<N>` suffix
pub fn parts_by_file_name(dir: &Path, log: &mut RunLog) -> Result<BTreeMap<u32, PathBuf>> {
    let mut parts = BTreeMap::new();
    let entries = fs::read_dir(dir).map_err(|e| UnlockError::io("list", dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| UnlockError::io("list", dir, e))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !name.ends_with(".xml") {
            continue;
        }
        match sheet_number(name) {
            Some(n) => {
                parts.insert(n, entry.path());
            }
            None => log.debug(format!("ignoring {} (no numeric sheet suffix)", name)),
        }
    }

    Ok(parts)
}

/// Number between `sheet` and `.xml` in a part file name
pub fn sheet_number(file_name: &str) -> Option<u32> {
    let (_, rest) = file_name.split_once("sheet")?;
    let digits = rest.strip_suffix(".xml")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
