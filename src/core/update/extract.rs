use std::path::Path;

use tracing::debug;

use crate::core::error::{io_at, LauncherError, LauncherResult};

/// Unpack `archive_path` into `dest`, keeping the archive's internal layout.
/// Returns the number of files written.
///
/// Entries that would escape `dest` fail the whole extraction.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> LauncherResult<usize> {
    let zip_file = std::fs::File::open(archive_path).map_err(io_at(archive_path))?;
    let mut archive = zip::ZipArchive::new(zip_file)?;

    std::fs::create_dir_all(dest).map_err(io_at(dest))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut zipped = archive.by_index(index)?;
        let rel_path = zipped.enclosed_name().ok_or_else(|| {
            LauncherError::Other(format!("Invalid zip entry path: {}", zipped.name()))
        })?;

        let out_path = dest.join(rel_path);
        if zipped.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(io_at(&out_path))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(io_at(parent))?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(io_at(&out_path))?;
        std::io::copy(&mut zipped, &mut out).map_err(io_at(&out_path))?;
        written += 1;
    }

    debug!("Extracted {} file(s) from {:?}", written, archive_path);
    Ok(written)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{Cursor, Write};

    /// Build an in-memory zip from `(name, contents)` pairs.
    pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            for (name, contents) in files {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::zip_bytes;
    use super::*;

    #[test]
    fn extracts_nested_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("core.zip");
        std::fs::write(
            &archive,
            zip_bytes(&[("tamods.dll", "dll"), ("!CONFIG/presets/a.lua", "lua")]),
        )
        .unwrap();

        let dest = tmp.path().join("core");
        assert_eq!(extract_archive(&archive, &dest).unwrap(), 2);
        assert_eq!(
            std::fs::read_to_string(dest.join("!CONFIG/presets/a.lua")).unwrap(),
            "lua"
        );
    }

    #[test]
    fn rejects_entries_outside_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("evil.zip");
        std::fs::write(&archive, zip_bytes(&[("../escape.txt", "x")])).unwrap();

        assert!(extract_archive(&archive, &tmp.path().join("out")).is_err());
        assert!(!tmp.path().join("escape.txt").exists());
    }

    #[test]
    fn corrupt_archive_is_a_zip_error() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("bad.zip");
        std::fs::write(&archive, b"not a zip").unwrap();

        assert!(matches!(
            extract_archive(&archive, &tmp.path().join("out")),
            Err(LauncherError::Zip(_))
        ));
    }
}
