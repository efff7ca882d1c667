//! File operations for sync.
//!
//! - Atomic writes for the marker and settings files: temp file, fsync, rename
//! - Direct writes for item files, skipped when identical content is already
//!   at the target path
//! - Moving, copying and deleting all files of one item

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::model::ExtensionMap;
use crate::sync::hash::hash_bytes;
use crate::sync::scan::HashIndex;
use crate::sync::types::{SyncError, SyncResult};

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a hidden temporary file next to the target
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> SyncResult<()> {
    let file_name = path.file_name().map(OsString::from).unwrap_or_default();
    let mut temp_name = OsString::from(".");
    temp_name.push(&file_name);
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Write to temp file
    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content)?;
        writer.flush()?;
        // Sync to disk before rename
        writer.get_ref().sync_all()?;
    }

    // Atomic rename
    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Append an extension to a base path without touching existing dots.
#[must_use]
pub fn with_suffix(base: &Path, ext: &str) -> PathBuf {
    let mut path = base.as_os_str().to_os_string();
    path.push(ext);
    PathBuf::from(path)
}

/// Create the synchronization directory (and parents) if missing.
///
/// # Errors
///
/// Returns [`SyncError::CreateDir`] if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> SyncResult<()> {
    fs::create_dir_all(dir).map_err(|source| SyncError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write item bytes unless the same content already sits at `path`.
///
/// `index` is the hash index of the directory taken before the save batch; a
/// match for this exact path is consumed. Returns `true` if the file was
/// written.
///
/// # Errors
///
/// Returns [`SyncError::Write`] if the file cannot be written.
pub fn write_item_file(path: &Path, bytes: &[u8], index: &mut HashIndex) -> SyncResult<bool> {
    let hash = hash_bytes(bytes);
    if index.take(&hash, path) {
        return Ok(false);
    }

    let write = || -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(bytes)?;
        writer.flush()
    };
    write().map_err(|source| SyncError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(true)
}

/// Distinct, non-empty extensions recorded in an extension map.
fn recorded_extensions(extensions: &ExtensionMap) -> BTreeSet<&str> {
    extensions
        .values()
        .map(String::as_str)
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Delete the files of all recorded extensions. Missing files are ignored.
///
/// Returns the number of files deleted.
pub fn remove_format_files(base: &Path, extensions: &ExtensionMap) -> usize {
    let mut removed = 0;
    for ext in recorded_extensions(extensions) {
        let path = with_suffix(base, ext);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed item file");
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove item file"),
        }
    }
    removed
}

/// Move the files of all recorded extensions from one base path to another.
///
/// All targets are checked before anything is moved; an existing target
/// aborts the move with nothing changed. Missing sources are skipped.
///
/// # Errors
///
/// Returns [`SyncError::TargetExists`] or [`SyncError::Relocate`].
pub fn move_format_files(from: &Path, to: &Path, extensions: &ExtensionMap) -> SyncResult<usize> {
    relocate_format_files(from, to, extensions, |src, dst| fs::rename(src, dst))
}

/// Copy the files of all recorded extensions from one base path to another.
///
/// Same checks as [`move_format_files`].
///
/// # Errors
///
/// Returns [`SyncError::TargetExists`] or [`SyncError::Relocate`].
pub fn copy_format_files(from: &Path, to: &Path, extensions: &ExtensionMap) -> SyncResult<usize> {
    relocate_format_files(from, to, extensions, |src, dst| fs::copy(src, dst).map(|_| ()))
}

fn relocate_format_files(
    from: &Path,
    to: &Path,
    extensions: &ExtensionMap,
    relocate: impl Fn(&Path, &Path) -> std::io::Result<()>,
) -> SyncResult<usize> {
    let pairs: Vec<(PathBuf, PathBuf)> = recorded_extensions(extensions)
        .into_iter()
        .map(|ext| (with_suffix(from, ext), with_suffix(to, ext)))
        .filter(|(src, _)| src.exists())
        .collect();

    if let Some((_, dst)) = pairs.iter().find(|(_, dst)| dst.exists()) {
        return Err(SyncError::TargetExists { path: dst.clone() });
    }

    for (src, dst) in &pairs {
        relocate(src, dst).map_err(|source| SyncError::Relocate {
            from: src.clone(),
            to: dst.clone(),
            source,
        })?;
        debug!(from = %src.display(), to = %dst.display(), "Relocated item file");
    }

    Ok(pairs.len())
}

/// Get the size of a file in bytes.
///
/// Returns 0 if the file doesn't exist.
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::scan::list_directory;
    use tempfile::TempDir;

    fn map(entries: &[(&str, &str)]) -> ExtensionMap {
        entries
            .iter()
            .map(|(f, e)| ((*f).to_string(), (*e).to_string()))
            .collect()
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("tab.dat");

        atomic_write(&path, b"line 1\nline 2\n").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"line 1\nline 2\n");
        assert!(!temp_dir.path().join("nested").join(".tab.dat.tmp").exists());
    }

    #[test]
    fn test_with_suffix_keeps_dots() {
        let base = Path::new("/tmp/report.v2");
        assert_eq!(with_suffix(base, ".txt"), PathBuf::from("/tmp/report.v2.txt"));
    }

    #[test]
    fn test_write_item_file_skips_identical_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, b"same").unwrap();

        let mut index = list_directory(temp_dir.path()).unwrap();
        assert!(!write_item_file(&path, b"same", &mut index).unwrap());

        // The match was consumed; a second write goes to disk.
        assert!(write_item_file(&path, b"same", &mut index).unwrap());
    }

    #[test]
    fn test_write_item_file_same_hash_other_path_writes() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"same").unwrap();
        let other = temp_dir.path().join("b.txt");

        let mut index = list_directory(temp_dir.path()).unwrap();
        assert!(write_item_file(&other, b"same", &mut index).unwrap());
        assert_eq!(fs::read(&other).unwrap(), b"same");
    }

    #[test]
    fn test_write_item_file_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("a.txt");
        let mut index = HashIndex::default();

        let result = write_item_file(&path, b"x", &mut index);
        assert!(matches!(result, Err(SyncError::Write { .. })));
    }

    #[test]
    fn test_move_format_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("note_note.txt"), b"n").unwrap();
        fs::write(dir.join("note.png"), b"p").unwrap();

        let moved = move_format_files(
            &dir.join("note"),
            &dir.join("note2"),
            &map(&[("a", "_note.txt"), ("b", ".png"), ("", "")]),
        )
        .unwrap();

        assert_eq!(moved, 2);
        assert!(dir.join("note2_note.txt").exists());
        assert!(dir.join("note2.png").exists());
        assert!(!dir.join("note_note.txt").exists());
    }

    #[test]
    fn test_move_refuses_existing_target() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a.txt"), b"a").unwrap();
        fs::write(dir.join("a.png"), b"a").unwrap();
        fs::write(dir.join("b.png"), b"b").unwrap();

        let result = move_format_files(
            &dir.join("a"),
            &dir.join("b"),
            &map(&[("t", ".txt"), ("p", ".png")]),
        );

        assert!(matches!(result, Err(SyncError::TargetExists { .. })));
        // Nothing moved
        assert!(dir.join("a.txt").exists());
        assert!(!dir.join("b.txt").exists());
    }

    #[test]
    fn test_copy_format_files() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join("a.txt"), b"a").unwrap();

        let copied =
            copy_format_files(&src.join("a"), &dst.join("a"), &map(&[("t", ".txt")])).unwrap();

        assert_eq!(copied, 1);
        assert!(src.join("a.txt").exists());
        assert_eq!(fs::read(dst.join("a.txt")).unwrap(), b"a");
    }

    #[test]
    fn test_remove_format_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a.txt"), b"a").unwrap();

        let removed = remove_format_files(&dir.join("a"), &map(&[("t", ".txt"), ("p", ".png")]));

        assert_eq!(removed, 1);
        assert!(!dir.join("a.txt").exists());
    }

    #[test]
    fn test_file_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a");
        assert_eq!(file_size(&path), 0);
        fs::write(&path, b"1234").unwrap();
        assert_eq!(file_size(&path), 4);
    }
}
