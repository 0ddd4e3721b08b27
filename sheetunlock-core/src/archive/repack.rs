//! Rebuild a document archive from its working directory

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::diagnostics::RunLog;
use crate::error::{Result, UnlockError};

/// Zip every file below `working_dir` into `working_dir/<archive base name>`.
///
/// Entry names are paths relative to `working_dir` with `/` separators. Any
/// file carrying the archive's own base name is left out.
pub fn repack(working_dir: &Path, original_archive: &Path, log: &mut RunLog) -> Result<PathBuf> {
    let base_name = original_archive.file_name().ok_or_else(|| {
        UnlockError::io(
            "name archive for",
            original_archive,
            io::Error::new(io::ErrorKind::InvalidInput, "archive path has no file name"),
        )
    })?;
    let archive_path = working_dir.join(base_name);
    log.info(format!(
        "repacking {} into {}",
        working_dir.display(),
        archive_path.display()
    ));

    let out =
        File::create(&archive_path).map_err(|e| UnlockError::io("create", &archive_path, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut count = 0usize;
    for entry in WalkDir::new(working_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(working_dir).to_path_buf();
            UnlockError::io("walk", &path, io::Error::other(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name() == base_name {
            continue;
        }

        let name = entry_name(working_dir, entry.path())?;
        zip.start_file(name.as_str(), options)
            .map_err(|e| UnlockError::archive("add entry to", &archive_path, e))?;
        let mut input = BufReader::new(
            File::open(entry.path()).map_err(|e| UnlockError::io("open", entry.path(), e))?,
        );
        io::copy(&mut input, &mut zip).map_err(|e| UnlockError::io("write", &archive_path, e))?;
        log.debug(format!("added {}", name));
        count += 1;
    }

    zip.finish()
        .map_err(|e| UnlockError::archive("finish", &archive_path, e))?;
    log.debug(format!("repacked {} files", count));
    Ok(archive_path)
}

fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        UnlockError::io(
            "relativize",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "outside working directory"),
        )
    })?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;

    #[test]
    fn test_repack_relative_names_and_self_exclusion() {
        let dir = tempfile::tempdir().unwrap();
        let working = dir.path().join("book");
        fs::create_dir_all(working.join("xl/worksheets")).unwrap();
        fs::write(working.join("[Content_Types].xml"), "<Types/>").unwrap();
        fs::write(working.join("xl/worksheets/sheet1.xml"), "<worksheet/>").unwrap();
        // A stray file sharing the archive's name must not be packed
        fs::write(working.join("xl/book.zip"), "stray").unwrap();

        let mut log = RunLog::new(&working);
        let archive_path = repack(&working, &dir.path().join("book.zip"), &mut log).unwrap();
        assert_eq!(archive_path, working.join("book.zip"));

        let mut zip = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        let mut names: Vec<_> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["[Content_Types].xml", "xl/worksheets/sheet1.xml"]
        );

        let mut content = String::new();
        zip.by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "<worksheet/>");
    }

    #[test]
    fn test_entry_name_uses_forward_slashes() {
        let root = Path::new("/tmp/work");
        let path = root.join("xl").join("worksheets").join("sheet2.xml");
        assert_eq!(entry_name(root, &path).unwrap(), "xl/worksheets/sheet2.xml");
    }
}
