//! Unpack a document archive into its working directory

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use super::working_directory_for;
use crate::diagnostics::RunLog;
use crate::error::{Result, UnlockError};

/// Location of the worksheet parts inside an unpacked workbook
pub const WORKSHEETS_DIR: &str = "xl/worksheets";

/// Extract every entry of `archive_path` into a new sibling directory named
/// after the archive. Returns that directory.
///
/// An existing directory at that path is never reused.
pub fn extract(archive_path: &Path, log: &mut RunLog) -> Result<PathBuf> {
    let target = working_directory_for(archive_path);
    log.info(format!(
        "extracting {} into {}",
        archive_path.display(),
        target.display()
    ));

    let file =
        File::open(archive_path).map_err(|e| UnlockError::io("open", archive_path, e))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| UnlockError::archive("read archive", archive_path, e))?;

    fs::create_dir(&target).map_err(|e| UnlockError::io("create", &target, e))?;

    let mut written = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| UnlockError::archive("read entry of", archive_path, e))?;

        // Entries that would land outside the working directory are dropped
        let Some(relative) = entry.enclosed_name() else {
            log.warn(format!("skipping unsafe entry name '{}'", entry.name()));
            continue;
        };
        let out_path = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| UnlockError::io("create", &out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| UnlockError::io("create", parent, e))?;
        }
        let mut out =
            File::create(&out_path).map_err(|e| UnlockError::io("create", &out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| UnlockError::io("write", &out_path, e))?;
        written += 1;
    }

    log.debug(format!("extracted {} files", written));

    let worksheets = target.join(WORKSHEETS_DIR);
    if !worksheets.is_dir() {
        return Err(UnlockError::io(
            "locate worksheets in",
            &target,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is missing, not a spreadsheet package", WORKSHEETS_DIR),
            ),
        ));
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_mirrors_layout() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("book.zip");
        write_zip(
            &archive,
            &[
                ("[Content_Types].xml", "<Types/>"),
                ("xl/workbook.xml", "<workbook/>"),
                ("xl/worksheets/sheet1.xml", "<worksheet/>"),
            ],
        );
        let mut log = RunLog::new(&archive);

        let working = extract(&archive, &mut log).unwrap();
        assert_eq!(working, dir.path().join("book"));
        assert!(working.join("[Content_Types].xml").is_file());
        assert_eq!(
            fs::read_to_string(working.join("xl/worksheets/sheet1.xml")).unwrap(),
            "<worksheet/>"
        );
    }

    #[test]
    fn test_extract_requires_worksheets() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("notes.zip");
        write_zip(&archive, &[("readme.txt", "hello")]);
        let mut log = RunLog::new(&archive);

        let err = extract(&archive, &mut log).unwrap_err();
        assert!(matches!(err, UnlockError::Io { .. }));
    }

    #[test]
    fn test_extract_rejects_non_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"not a zip").unwrap();
        let mut log = RunLog::new(&archive);

        assert!(extract(&archive, &mut log).is_err());
    }

    #[test]
    fn test_extract_refuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("book.zip");
        write_zip(&archive, &[("xl/worksheets/sheet1.xml", "<worksheet/>")]);
        let existing = dir.path().join("book");
        fs::create_dir(&existing).unwrap();
        fs::write(existing.join("notes.txt"), "keep me").unwrap();
        let mut log = RunLog::new(&archive);

        let err = extract(&archive, &mut log).unwrap_err();
        assert!(matches!(err, UnlockError::Io { action: "create", .. }));
        assert!(!existing.join("xl").exists());
        assert_eq!(
            fs::read_to_string(existing.join("notes.txt")).unwrap(),
            "keep me"
        );
    }
}
