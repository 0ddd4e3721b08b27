//! Per-document processing: validate, extract, patch, repack, finalize

use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::archive::{self, RenameOutcome};
use crate::config::UnlockConfig;
use crate::diagnostics::{Diagnostic, RunLog};
use crate::error::{ErrorKind, Result, UnlockError};
use crate::finalize::finalize;
use crate::patch::SheetPatcher;
use crate::range::{self, SheetIndexSet};
use crate::reader::SheetCounter;

/// Where a document run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Idle,
    Validating,
    Extracting,
    Patching,
    Repacking,
    Finalizing,
    Done,
    Failed,
}

/// Outcome of one document run.
///
/// `sheets` is empty exactly when the run failed.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub path: PathBuf,
    pub sheets: Vec<u32>,
    pub message: String,
    /// Stage that was running when the failure happened
    pub failed_at: Option<Stage>,
    pub error: Option<ErrorKind>,
    pub diagnostics: Vec<Diagnostic>,
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        self.failed_at.is_none()
    }

    fn failure(log: RunLog, stage: Stage, err: &UnlockError) -> Self {
        Self {
            path: log.document().to_path_buf(),
            sheets: Vec::new(),
            message: err.to_string(),
            failed_at: Some(stage),
            error: Some(err.kind()),
            diagnostics: log.into_entries(),
        }
    }
}

/// Results of processing several documents one after another
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub results: Vec<OperationResult>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(OperationResult::is_success)
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn summary(&self) -> String {
        if self.results.is_empty() {
            "No documents were found to unlock.".to_string()
        } else if self.all_succeeded() {
            format!(
                "All {} document(s) have been unlocked successfully.",
                self.results.len()
            )
        } else {
            format!(
                "Not all documents were unlocked: {} succeeded, {} failed.",
                self.succeeded(),
                self.failed()
            )
        }
    }
}

/// Runs the unlock pipeline for one document at a time
pub struct Pipeline<'a> {
    config: &'a UnlockConfig,
    counter: &'a dyn SheetCounter,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a UnlockConfig, counter: &'a dyn SheetCounter) -> Self {
        Self { config, counter }
    }

    /// Unlock the sheets named by `range` (all sheets when `None` or empty)
    pub fn run(&self, path: &Path, range: Option<&str>) -> OperationResult {
        let mut log = RunLog::new(path);
        match self.execute(path, range, &mut log) {
            Ok(sheets) => {
                log.enter(Stage::Done);
                let message = format!(
                    "The file {} has been unlocked (sheets {}).",
                    path.display(),
                    sheets
                );
                log.info(message.clone());
                OperationResult {
                    path: path.to_path_buf(),
                    sheets: sheets.into_vec(),
                    message,
                    failed_at: None,
                    error: None,
                    diagnostics: log.into_entries(),
                }
            }
            Err(err) => {
                let stage = log.stage();
                log.error(err.to_string());
                log.enter(Stage::Failed);
                OperationResult::failure(log, stage, &err)
            }
        }
    }

    /// Validate only; report the sheets a run would unlock
    pub fn plan(&self, path: &Path, range: Option<&str>) -> OperationResult {
        let mut log = RunLog::new(path);
        match self.validate(path, range, &mut log) {
            Ok(sheets) => OperationResult {
                path: path.to_path_buf(),
                message: format!(
                    "The file {} would be unlocked (sheets {}).",
                    path.display(),
                    sheets
                ),
                sheets: sheets.into_vec(),
                failed_at: None,
                error: None,
                diagnostics: log.into_entries(),
            },
            Err(err) => {
                let stage = log.stage();
                log.error(err.to_string());
                OperationResult::failure(log, stage, &err)
            }
        }
    }

    /// Process `paths` in order; a failure never stops the batch
    pub fn run_batch<P: AsRef<Path>>(&self, paths: &[P], range: Option<&str>) -> BatchReport {
        let results = paths
            .iter()
            .map(|path| self.run(path.as_ref(), range))
            .collect();
        BatchReport { results }
    }

    pub fn plan_batch<P: AsRef<Path>>(&self, paths: &[P], range: Option<&str>) -> BatchReport {
        let results = paths
            .iter()
            .map(|path| self.plan(path.as_ref(), range))
            .collect();
        BatchReport { results }
    }

    fn execute(&self, path: &Path, range: Option<&str>, log: &mut RunLog) -> Result<SheetIndexSet> {
        let sheets = self.validate(path, range, log)?;
        let document_ext = document_extension(path)?;

        log.enter(Stage::Extracting);
        let renamed = archive::change_extension(path, &self.config.archive_extension, log)?;
        let source_archive = match renamed {
            RenameOutcome::Renamed(p) => p,
            RenameOutcome::AlreadyExists(stray) => {
                return Err(UnlockError::AlreadyProcessed {
                    document: path.to_path_buf(),
                    stray,
                });
            }
        };
        let working_dir = archive::extract(&source_archive, log)?;

        log.enter(Stage::Patching);
        let patcher = SheetPatcher::new(self.config.patch_mode, self.config.part_mapping);
        patcher.patch(&working_dir, &sheets, log)?;

        log.enter(Stage::Repacking);
        let packed = archive::repack(&working_dir, &source_archive, log)?;
        let rebuilt = match archive::change_extension(&packed, &document_ext, log)? {
            RenameOutcome::Renamed(p) => p,
            RenameOutcome::AlreadyExists(stray) => {
                return Err(UnlockError::AlreadyProcessed {
                    document: path.to_path_buf(),
                    stray,
                });
            }
        };

        log.enter(Stage::Finalizing);
        finalize(&rebuilt, path, &working_dir, &source_archive, log)?;

        Ok(sheets)
    }

    /// Checks that touch nothing on disk
    fn validate(
        &self,
        path: &Path,
        range: Option<&str>,
        log: &mut RunLog,
    ) -> Result<SheetIndexSet> {
        log.enter(Stage::Validating);

        let document_ext = document_extension(path)?;
        if document_ext.eq_ignore_ascii_case(&self.config.archive_extension) {
            return Err(UnlockError::Workbook {
                path: path.to_path_buf(),
                reason: format!(
                    "the document already carries the .{} extension used while processing",
                    self.config.archive_extension
                ),
            });
        }

        // An interrupted run leaves the renamed archive behind, possibly
        // without the document itself
        let stray = path.with_extension(&self.config.archive_extension);
        if stray.exists() {
            return Err(UnlockError::AlreadyProcessed {
                document: path.to_path_buf(),
                stray,
            });
        }
        // The working directory is created fresh and deleted afterwards
        let working_dir = archive::working_directory_for(path);
        if working_dir.exists() {
            return Err(UnlockError::AlreadyProcessed {
                document: path.to_path_buf(),
                stray: working_dir,
            });
        }
        if !path.is_file() {
            return Err(UnlockError::MissingFile(path.to_path_buf()));
        }

        let sheet_count = self.counter.sheet_count(path)?;
        log.info(format!("document has {} sheet(s)", sheet_count));

        let sheets = match range.filter(|r| !r.is_empty()) {
            Some(expr) => check_range(expr, sheet_count)?,
            None => {
                if sheet_count == 0 {
                    return Err(UnlockError::Workbook {
                        path: path.to_path_buf(),
                        reason: "the workbook has no sheets".to_string(),
                    });
                }
                SheetIndexSet::all(sheet_count)
            }
        };
        log.info(format!("sheets to unlock: {}", sheets));
        Ok(sheets)
    }
}

/// Run every range check in order and parse the expression
pub fn check_range(expr: &str, sheet_count: usize) -> Result<SheetIndexSet> {
    if !range::validate_termination(expr) {
        return Err(UnlockError::malformed(
            expr,
            "a ',' or '-' was found at the end of the sheet range; remove it to continue",
        ));
    }
    if !range::validate_grammar(expr) {
        return Err(UnlockError::malformed(
            expr,
            "use sheet numbers without leading zeros separated by ',' with optional start-end spans, e.g. 1,3,5-8",
        ));
    }
    if !range::validate_format(expr) {
        return Err(UnlockError::malformed(
            expr,
            "a start-end span starts after it ends",
        ));
    }
    if !range::validate_bounds(expr, sheet_count)? {
        let requested = range::validate::max_index(expr)?.unwrap_or(0);
        return Err(UnlockError::OutOfBoundsRange {
            requested,
            sheet_count,
        });
    }
    range::parse(expr)
}

/// Documents below `dir` matching the configured extensions, sorted by path
pub fn collect_documents(dir: &Path, config: &UnlockConfig) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(UnlockError::MissingFile(dir.to_path_buf()));
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            UnlockError::io("walk", &path, std::io::Error::other(e))
        })?;
        if entry.file_type().is_file() && config.is_document(entry.path()) {
            documents.push(entry.into_path());
        }
    }
    log::debug!(
        "found {} document(s) under {}",
        documents.len(),
        dir.display()
    );
    Ok(documents)
}

fn document_extension(path: &Path) -> Result<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| UnlockError::Workbook {
            path: path.to_path_buf(),
            reason: "the document has no file extension".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range_order() {
        assert!(matches!(
            check_range("1,", 5),
            Err(UnlockError::MalformedRange { .. })
        ));
        assert!(matches!(
            check_range("01", 5),
            Err(UnlockError::MalformedRange { .. })
        ));
        assert!(matches!(
            check_range("4-2", 5),
            Err(UnlockError::MalformedRange { .. })
        ));
        assert!(matches!(
            check_range("1-10", 5),
            Err(UnlockError::OutOfBoundsRange {
                requested: 10,
                sheet_count: 5
            })
        ));
        assert_eq!(check_range("2,4", 5).unwrap().into_vec(), vec![2, 4]);
    }

    #[test]
    fn test_batch_summary() {
        let ok = OperationResult {
            path: PathBuf::from("a.xlsx"),
            sheets: vec![1],
            message: String::new(),
            failed_at: None,
            error: None,
            diagnostics: Vec::new(),
        };
        let failed = OperationResult {
            path: PathBuf::from("b.xlsx"),
            sheets: Vec::new(),
            message: String::new(),
            failed_at: Some(Stage::Validating),
            error: Some(ErrorKind::MissingFile),
            diagnostics: Vec::new(),
        };

        let report = BatchReport {
            results: vec![ok.clone()],
        };
        assert!(report.all_succeeded());
        assert!(report.summary().starts_with("All 1 document(s)"));

        let report = BatchReport {
            results: vec![ok, failed],
        };
        assert!(!report.all_succeeded());
        assert_eq!(report.failed(), 1);
        assert!(report.summary().starts_with("Not all documents"));

        assert!(BatchReport::default().summary().starts_with("No documents"));
    }

    #[test]
    fn test_collect_documents_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        for name in ["b.xlsx", "a.xlsx", "nested/c.xlsx", "notes.txt", "~$a.xlsx"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let found = collect_documents(dir.path(), &UnlockConfig::default()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["a.xlsx", "b.xlsx", "nested/c.xlsx"]);
    }
}
