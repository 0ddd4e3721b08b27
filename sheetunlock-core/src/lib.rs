//! sheetunlock-core: remove sheet protection flags from XLSX workbooks
//!
//! A document is renamed to its archive extension, unpacked next to itself,
//! the requested worksheet parts are patched, and the package is rebuilt and
//! copied back over the original path.

pub mod archive;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod finalize;
pub mod patch;
pub mod pipeline;
pub mod range;
pub mod reader;
pub mod session;

use std::path::Path;

pub use config::{PartMapping, PatchMode, UnlockConfig};
pub use diagnostics::{Diagnostic, DiagnosticLevel, RunLog};
pub use error::{ErrorKind, Result, UnlockError};
pub use pipeline::{BatchReport, OperationResult, Pipeline, Stage};
pub use range::SheetIndexSet;
pub use reader::{CalamineSheetCounter, SheetCounter};
pub use session::{Mode, Session, UnlockRequest};

/// Main unlock interface
pub struct Unlocker {
    config: UnlockConfig,
    counter: Box<dyn SheetCounter>,
}

impl Unlocker {
    /// Create an unlocker with default configuration
    pub fn new() -> Self {
        Self::with_config(UnlockConfig::default())
    }

    /// Create an unlocker with custom configuration
    pub fn with_config(config: UnlockConfig) -> Self {
        Self::with_counter(config, CalamineSheetCounter)
    }

    /// Use another source for sheet counts
    pub fn with_counter(config: UnlockConfig, counter: impl SheetCounter + 'static) -> Self {
        Self {
            config,
            counter: Box::new(counter),
        }
    }

    pub fn config(&self) -> &UnlockConfig {
        &self.config
    }

    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(&self.config, self.counter.as_ref())
    }

    /// Unlock the sheets of one document named by `range` (all when `None`)
    pub fn unlock_file<P: AsRef<Path>>(&self, path: P, range: Option<&str>) -> OperationResult {
        self.pipeline().run(path.as_ref(), range)
    }

    /// Unlock several documents one after another
    pub fn unlock_files<P: AsRef<Path>>(&self, paths: &[P], range: Option<&str>) -> BatchReport {
        self.pipeline().run_batch(paths, range)
    }

    /// Unlock every matching document below `dir`
    pub fn unlock_directory<P: AsRef<Path>>(
        &self,
        dir: P,
        range: Option<&str>,
    ) -> Result<BatchReport> {
        let documents = pipeline::collect_documents(dir.as_ref(), &self.config)?;
        Ok(self.unlock_files(&documents, range))
    }

    /// Validate a request without touching the document
    pub fn plan_file<P: AsRef<Path>>(&self, path: P, range: Option<&str>) -> OperationResult {
        self.pipeline().plan(path.as_ref(), range)
    }

    pub fn plan_files<P: AsRef<Path>>(&self, paths: &[P], range: Option<&str>) -> BatchReport {
        self.pipeline().plan_batch(paths, range)
    }

    pub fn plan_directory<P: AsRef<Path>>(
        &self,
        dir: P,
        range: Option<&str>,
    ) -> Result<BatchReport> {
        let documents = pipeline::collect_documents(dir.as_ref(), &self.config)?;
        Ok(self.plan_files(&documents, range))
    }
}

impl Default for Unlocker {
    fn default() -> Self {
        Self::new()
    }
}
