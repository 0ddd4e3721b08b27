//! Resolve sheet positions through `xl/workbook.xml` and its relationships

use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::RunLog;
use crate::error::{Result, UnlockError};

const WORKBOOK_XML: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";

/// Namespaces of the `r:id` attribute (transitional and strict OOXML)
const RELATIONSHIP_NAMESPACES: [&[u8]; 2] = [
    b"http://schemas.openxmlformats.org/officeDocument/2006/relationships",
    b"http://purl.oclc.org/ooxml/officeDocument/relationships",
];

/// Sheet tabs of an unpacked workbook and the relationship targets behind them
#[derive(Debug, Clone)]
pub struct WorkbookParts {
    root: PathBuf,
    /// Relationship id of each tab, in tab order
    rel_ids: Vec<Option<String>>,
    targets: HashMap<String, String>,
}

impl WorkbookParts {
    /// Read `xl/workbook.xml` and `xl/_rels/workbook.xml.rels` below `working_dir`
    pub fn load(working_dir: &Path) -> Result<Self> {
        let workbook_path = working_dir.join(WORKBOOK_XML);
        let workbook_xml = fs::read_to_string(&workbook_path)
            .map_err(|e| UnlockError::io("read", &workbook_path, e))?;
        let rels_path = working_dir.join(WORKBOOK_RELS);
        let rels_xml =
            fs::read_to_string(&rels_path).map_err(|e| UnlockError::io("read", &rels_path, e))?;

        Ok(Self {
            root: working_dir.to_path_buf(),
            rel_ids: parse_sheet_rel_ids(&workbook_xml, &workbook_path)?,
            targets: parse_relationship_targets(&rels_xml, &rels_path)?,
        })
    }

    /// Number of sheet tabs
    pub fn len(&self) -> usize {
        self.rel_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rel_ids.is_empty()
    }

    /// Part path of sheet `index` (1-based).
    ///
    /// `None` when the tab does not exist, has no relationship, or points
    /// outside `xl/`.
    pub fn part(&self, index: u32, log: &mut RunLog) -> Option<PathBuf> {
        let position = usize::try_from(index).ok()?.checked_sub(1)?;
        let Some(rid) = self.rel_ids.get(position)?.as_deref() else {
            log.warn(format!("sheet {} has no relationship id", index));
            return None;
        };
        let Some(target) = self.targets.get(rid) else {
            log.warn(format!("relationship '{}' of sheet {} is missing", rid, index));
            return None;
        };
        match resolve_target(target) {
            Some(part) => Some(self.root.join(part)),
            None => {
                log.warn(format!(
                    "relationship '{}' of sheet {} points outside xl/: {}",
                    rid, index, target
                ));
                None
            }
        }
    }
}

/// Relationship id of every `<sheet>` element, in document order
fn parse_sheet_rel_ids(workbook_xml: &str, path: &Path) -> Result<Vec<Option<String>>> {
    let mut reader = NsReader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut ids = Vec::new();

    loop {
        match reader.read_event().map_err(|e| xml_error(path, e))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let mut id = None;
                for attr in e.attributes().flatten() {
                    let (ns, local) = reader.resolve_attribute(attr.key);
                    let in_rel_ns = match ns {
                        ResolveResult::Bound(Namespace(uri)) => {
                            RELATIONSHIP_NAMESPACES.iter().any(|known| *known == uri)
                        }
                        _ => false,
                    };
                    if in_rel_ns && local.as_ref() == b"id" {
                        let value = attr.unescape_value().map_err(|e| xml_error(path, e))?;
                        id = Some(value.into_owned());
                    }
                }
                ids.push(id);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(ids)
}

/// Relationship `Id` -> `Target`
fn parse_relationship_targets(rels_xml: &str, path: &Path) -> Result<HashMap<String, String>> {
    let mut reader = NsReader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut targets = HashMap::new();

    loop {
        match reader.read_event().map_err(|e| xml_error(path, e))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = String::new();
                let mut target = String::new();
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => {
                            id = attr
                                .unescape_value()
                                .map_err(|e| xml_error(path, e))?
                                .into_owned();
                        }
                        b"Target" => {
                            target = attr
                                .unescape_value()
                                .map_err(|e| xml_error(path, e))?
                                .into_owned();
                        }
                        _ => {}
                    }
                }
                if !id.is_empty() {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(targets)
}

/// Package path of a relationship target.
///
/// Targets are relative to `xl/` unless they start with `/`. `.` and `..`
/// segments are folded; the result must stay below `xl/`.
fn resolve_target(target: &str) -> Option<String> {
    let (mut segments, rest) = match target.strip_prefix('/') {
        Some(absolute) => (Vec::new(), absolute),
        None => (vec!["xl"], target),
    };

    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s if s.contains(['\\', ':']) => return None,
            s => segments.push(s),
        }
    }

    if segments.len() < 2 || segments[0] != "xl" {
        return None;
    }
    Some(segments.join("/"))
}

fn xml_error(path: &Path, err: impl std::error::Error + Send + Sync + 'static) -> UnlockError {
    UnlockError::io(
        "parse",
        path,
        std::io::Error::new(std::io::ErrorKind::InvalidData, err),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    fn unpacked(sheets: &str, relationships: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("xl/_rels")).unwrap();
        fs::write(
            root.join(WORKBOOK_XML),
            format!(
                r#"<workbook xmlns:r="{}"><sheets>{}</sheets></workbook>"#,
                REL_NS, sheets
            ),
        )
        .unwrap();
        fs::write(
            root.join(WORKBOOK_RELS),
            format!("<Relationships>{}</Relationships>", relationships),
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_parts_follow_tab_order_not_file_names() {
        let dir = unpacked(
            r#"<sheet name="Summary" sheetId="3" r:id="rId3"/>
<sheet name="Data" sheetId="1" r:id="rId1"/>"#,
            r#"<Relationship Id="rId1" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId3" Target="/xl/worksheets/sheet3.xml"/>"#,
        );
        let root = dir.path();
        let mut log = RunLog::new(root);

        let parts = WorkbookParts::load(root).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts.part(1, &mut log),
            Some(root.join("xl/worksheets/sheet3.xml"))
        );
        assert_eq!(
            parts.part(2, &mut log),
            Some(root.join("xl/worksheets/sheet1.xml"))
        );
        assert_eq!(parts.part(0, &mut log), None);
        assert_eq!(parts.part(3, &mut log), None);
    }

    #[test]
    fn test_missing_relationship_only_affects_its_sheet() {
        let dir = unpacked(
            r#"<sheet name="A" r:id="rId7"/><sheet name="B" r:id="rId2"/>"#,
            r#"<Relationship Id="rId2" Target="worksheets/sheet2.xml"/>"#,
        );
        let root = dir.path();
        let mut log = RunLog::new(root);

        let parts = WorkbookParts::load(root).unwrap();
        assert_eq!(parts.part(1, &mut log), None);
        assert_eq!(
            parts.part(2, &mut log),
            Some(root.join("xl/worksheets/sheet2.xml"))
        );
    }

    #[test]
    fn test_relationship_id_matched_by_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("xl/_rels")).unwrap();
        fs::write(
            root.join(WORKBOOK_XML),
            format!(
                r#"<workbook xmlns:rel="{}"><sheets>
<sheet name="A" rel:id="rId1"/>
<sheet name="B" id="rId1"/>
</sheets></workbook>"#,
                REL_NS
            ),
        )
        .unwrap();
        fs::write(
            root.join(WORKBOOK_RELS),
            r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/></Relationships>"#,
        )
        .unwrap();
        let mut log = RunLog::new(root);

        let parts = WorkbookParts::load(root).unwrap();
        assert_eq!(
            parts.part(1, &mut log),
            Some(root.join("xl/worksheets/sheet1.xml"))
        );
        // Unqualified `id` is not a relationship reference
        assert_eq!(parts.part(2, &mut log), None);
    }

    #[test]
    fn test_targets_outside_xl_are_refused() {
        let dir = unpacked(
            r#"<sheet name="A" r:id="rId1"/>"#,
            r#"<Relationship Id="rId1" Target="../../../victim.xml"/>"#,
        );
        let mut log = RunLog::new(dir.path());

        let parts = WorkbookParts::load(dir.path()).unwrap();
        assert_eq!(parts.part(1, &mut log), None);
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("worksheets/sheet2.xml").as_deref(),
            Some("xl/worksheets/sheet2.xml")
        );
        assert_eq!(
            resolve_target("/xl/worksheets/sheet2.xml").as_deref(),
            Some("xl/worksheets/sheet2.xml")
        );
        assert_eq!(
            resolve_target("./worksheets/../worksheets/sheet2.xml").as_deref(),
            Some("xl/worksheets/sheet2.xml")
        );
        assert_eq!(resolve_target("../../../victim.xml"), None);
        assert_eq!(resolve_target("../docProps/core.xml"), None);
        assert_eq!(resolve_target("/etc/passwd"), None);
        assert_eq!(resolve_target("/../xl/sheet.xml"), None);
        assert_eq!(resolve_target(r"worksheets\..\..\x.xml"), None);
        assert_eq!(resolve_target(".."), None);
    }
}
