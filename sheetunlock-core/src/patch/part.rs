//! In-memory model of one worksheet XML part

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::config::PatchMode;
use crate::error::{Result, UnlockError};

const PROTECTED: &str = r#"sheet="1""#;
const UNPROTECTED: &str = r#"sheet="0""#;

/// A worksheet part loaded from the working directory
#[derive(Debug, Clone)]
pub struct SheetPart {
    path: PathBuf,
    content: String,
}

impl SheetPart {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| UnlockError::io("read", path, e))?;
        Ok(Self::from_xml(path, content))
    }

    pub fn from_xml(path: &Path, content: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            content: content.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn xml(&self) -> &str {
        &self.content
    }

    /// Whether `<sheetProtection>` is present with `sheet="1"`
    pub fn is_protected(&self) -> Result<bool> {
        let mut reader = Reader::from_str(&self.content);
        loop {
            match reader.read_event().map_err(|e| self.xml_error(e))? {
                Event::Start(e) | Event::Empty(e) if is_sheet_protection(&e) => {
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| self.xml_error(e))?;
                        if attr.key.as_ref() == b"sheet" {
                            return Ok(attr.value.as_ref() == b"1");
                        }
                    }
                    return Ok(false);
                }
                Event::Eof => return Ok(false),
                _ => {}
            }
        }
    }

    /// Clear the protection flag. Returns how many flags were flipped.
    pub fn unprotect(&mut self, mode: PatchMode) -> Result<usize> {
        let (content, flipped) = match mode {
            PatchMode::Textual => {
                let flipped = self.content.matches(PROTECTED).count();
                (self.content.replace(PROTECTED, UNPROTECTED), flipped)
            }
            PatchMode::Structural => self.rewrite_protection()?,
        };
        self.content = content;
        Ok(flipped)
    }

    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, &self.content)
            .map_err(|e| UnlockError::io("write", &self.path, e))
    }

    fn rewrite_protection(&self) -> Result<(String, usize)> {
        let mut reader = Reader::from_str(&self.content);
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        let mut flipped = 0;

        loop {
            let event = reader.read_event().map_err(|e| self.xml_error(e))?;
            let event = match event {
                Event::Start(e) if is_sheet_protection(&e) => {
                    let (elem, changed) = self.clear_sheet_attribute(&e)?;
                    flipped += changed;
                    Event::Start(elem)
                }
                Event::Empty(e) if is_sheet_protection(&e) => {
                    let (elem, changed) = self.clear_sheet_attribute(&e)?;
                    flipped += changed;
                    Event::Empty(elem)
                }
                Event::Eof => break,
                other => other,
            };
            writer.write_event(event).map_err(|e| {
                UnlockError::io("rewrite", &self.path, std::io::Error::other(e))
            })?;
        }

        let bytes = writer.into_inner().into_inner();
        let content = String::from_utf8(bytes).map_err(|e| {
            UnlockError::io(
                "rewrite",
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        Ok((content, flipped))
    }

    fn clear_sheet_attribute(&self, e: &BytesStart<'_>) -> Result<(BytesStart<'static>, usize)> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut elem = BytesStart::new(name);
        let mut changed = 0;

        for attr in e.attributes() {
            let attr = attr.map_err(|e| self.xml_error(e))?;
            if attr.key.as_ref() == b"sheet" && attr.value.as_ref() == b"1" {
                elem.push_attribute((b"sheet".as_ref(), b"0".as_ref()));
                changed += 1;
            } else {
                elem.push_attribute(attr);
            }
        }

        Ok((elem, changed))
    }

    fn xml_error(&self, err: impl std::error::Error + Send + Sync + 'static) -> UnlockError {
        UnlockError::io(
            "parse",
            &self.path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        )
    }
}

fn is_sheet_protection(e: &BytesStart<'_>) -> bool {
    e.local_name().as_ref() == b"sheetProtection"
}
