//! Capability-based file helpers for database and CSV paths.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Open an existing UTF-8 path for reading.
pub(crate) fn open_for_read(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Open the directory containing `path` and return it with the file name.
fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, &str)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} does not name a file")))?;
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Whether `path` names an existing regular file.
///
/// # Errors
/// Returns the I/O error from inspecting `path`; a missing file or parent
/// directory surfaces as [`io::ErrorKind::NotFound`].
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.metadata(name).map(|meta| meta.is_file())
}

/// Create or truncate `path` for writing, creating missing parent directories.
pub(crate) fn create_for_write(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    ensure_parent_dir(path)?;
    let (dir, name) = open_dir_and_file(path)?;
    dir.create(name)
}

/// Create the parent directory of `path` when it is missing.
pub(crate) fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }
    let (base, relative) = base_dir_and_relative(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

// cap-std only resolves relative paths, so absolute parents are split at the
// root.
fn base_dir_and_relative(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let (base, relative) = if parent.is_absolute() {
        ("/", parent.strip_prefix("/").unwrap_or(parent))
    } else {
        (".", parent)
    };
    let dir = fs_utf8::Dir::open_ambient_dir(base, ambient_authority())?;
    Ok((dir, relative.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    #[rstest]
    fn creates_nested_parents_and_round_trips_bytes() {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        let target = root.join("exports/2024/summary.csv");

        let mut file = create_for_write(&target).expect("create file");
        file.write_all(b"site_id\n1\n").expect("write");
        drop(file);

        let mut contents = String::new();
        open_for_read(&target)
            .expect("open file")
            .read_to_string(&mut contents)
            .expect("read");
        assert_eq!(contents, "site_id\n1\n");
    }

    #[rstest]
    fn file_is_file_distinguishes_files_and_directories() {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        let upload = root.join("sites.csv");
        std::fs::write(&upload, "site_id\n").expect("write upload");

        assert!(file_is_file(&upload).expect("inspect file"));
        assert!(!file_is_file(&root).expect("inspect directory"));
        let err = file_is_file(&root.join("missing.csv")).expect_err("missing file");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[rstest]
    fn missing_file_reports_not_found() {
        let err = open_for_read(Utf8Path::new("does/not/exist.csv")).expect_err("must fail");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
