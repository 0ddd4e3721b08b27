//! Configuration for the unlock pipeline

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, UnlockError};

/// How the protection flag is removed from a sheet part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchMode {
    /// Replace every literal `sheet="1"` in the part
    #[default]
    Textual,
    /// Rewrite only the `sheet` attribute of `<sheetProtection>`
    Structural,
}

/// How a 1-based sheet index is mapped to its XML part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartMapping {
    /// `sheet<N>.xml` is sheet N
    #[default]
    FileName,
    /// The N-th `<sheet>` of `xl/workbook.xml`, resolved through its relationships
    WorkbookOrder,
}

/// Main unlock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockConfig {
    /// Extension the document carries while it is being processed
    pub archive_extension: String,
    /// Extensions picked up when walking a directory
    pub document_extensions: Vec<String>,
    pub patch_mode: PatchMode,
    pub part_mapping: PartMapping,
    /// Ignore office lock files (`~$name.xlsx`) during directory walks
    pub skip_lock_files: bool,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            archive_extension: "zip".to_string(),
            document_extensions: vec!["xlsx".to_string()],
            patch_mode: PatchMode::default(),
            part_mapping: PartMapping::default(),
            skip_lock_files: true,
        }
    }
}

impl UnlockConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| UnlockError::io("read config", path, e))?;
        let config: UnlockConfig = toml::from_str(&content)
            .map_err(|e| UnlockError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_extension("archive_extension", &self.archive_extension)?;

        if self.document_extensions.is_empty() {
            return Err(UnlockError::Config(
                "document_extensions must list at least one extension".to_string(),
            ));
        }
        for ext in &self.document_extensions {
            check_extension("document_extensions", ext)?;
            if ext.eq_ignore_ascii_case(&self.archive_extension) {
                return Err(UnlockError::Config(format!(
                    "archive_extension '{}' is also listed as a document extension",
                    self.archive_extension
                )));
            }
        }

        Ok(())
    }

    /// Whether a directory walk should pick up `path`
    pub fn is_document(&self, path: &Path) -> bool {
        if self.skip_lock_files
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("~$"))
        {
            return false;
        }

        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| {
                self.document_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

fn check_extension(key: &str, ext: &str) -> Result<()> {
    if ext.is_empty() || ext.contains('.') || ext.contains('/') || ext.contains('\\') {
        return Err(UnlockError::Config(format!(
            "{} entry '{}' must be a bare extension such as 'xlsx'",
            key, ext
        )));
    }
    Ok(())
}
