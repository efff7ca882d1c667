//! Directory scanning.
//!
//! Turns the contents of a synchronized directory into logical items (file
//! groups sharing a base name) and into a content-hash index used to skip
//! rewriting files that already hold the right bytes.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, trace};

use crate::sync::format::FormatResolver;
use crate::sync::hash::hash_file;
use crate::sync::types::{FileGroup, SyncError, SyncResult};

/// Content hash → paths of files with that content.
///
/// Files over the hash size limit are indexed under the empty hash, which no
/// item content ever produces.
#[derive(Debug, Default, Clone)]
pub struct HashIndex {
    by_hash: HashMap<String, Vec<PathBuf>>,
}

impl HashIndex {
    /// Record a file under its hash.
    pub fn insert(&mut self, hash: String, path: PathBuf) {
        self.by_hash.entry(hash).or_default().push(path);
    }

    /// Paths recorded for a hash.
    #[must_use]
    pub fn paths(&self, hash: &str) -> &[PathBuf] {
        self.by_hash.get(hash).map_or(&[], Vec::as_slice)
    }

    /// Remove `path` from the entry for `hash`, returning whether it was there.
    pub fn take(&mut self, hash: &str, path: &Path) -> bool {
        let Some(paths) = self.by_hash.get_mut(hash) else {
            return false;
        };
        let Some(pos) = paths.iter().position(|p| p == path) else {
            return false;
        };
        paths.swap_remove(pos);
        if paths.is_empty() {
            self.by_hash.remove(hash);
        }
        true
    }

    /// Number of indexed files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_hash.values().map(Vec::len).sum()
    }

    /// Returns true if no file is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_none_or(|name| name.starts_with('.'))
}

fn is_readable(path: &Path) -> bool {
    File::open(path).is_ok()
}

/// Regular, visible, readable and writable files of a directory with their
/// modification times.
fn eligible_files(dir: &Path) -> SyncResult<Vec<(PathBuf, SystemTime)>> {
    let entries = fs::read_dir(dir).map_err(|source| SyncError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| SyncError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }

        // Follows symlinks, like the directory listing a user sees.
        let Ok(metadata) = fs::metadata(&path) else {
            continue;
        };
        if !metadata.is_file() || metadata.permissions().readonly() || !is_readable(&path) {
            trace!(path = %path.display(), "Skipping ineligible file");
            continue;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((path, modified));
    }

    Ok(files)
}

/// Eligible files of a directory, least recently modified first.
///
/// # Errors
///
/// Returns [`SyncError::ReadDir`] if the directory cannot be listed.
pub fn item_files(dir: &Path) -> SyncResult<Vec<PathBuf>> {
    let mut files = eligible_files(dir)?;
    files.sort_by(|(a_path, a_time), (b_path, b_time)| {
        a_time.cmp(b_time).then_with(|| a_path.cmp(b_path))
    });
    Ok(files.into_iter().map(|(path, _)| path).collect())
}

/// Eligible files of a directory in reverse name order.
///
/// # Errors
///
/// Returns [`SyncError::ReadDir`] if the directory cannot be listed.
pub fn item_files_by_name(dir: &Path) -> SyncResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = eligible_files(dir)?.into_iter().map(|(path, _)| path).collect();
    files.sort_by(|a, b| b.cmp(a));
    Ok(files)
}

/// Hash every eligible file of a directory.
///
/// Files that disappear or fail to read while hashing are left out.
///
/// # Errors
///
/// Returns [`SyncError::ReadDir`] if the directory cannot be listed.
pub fn list_directory(dir: &Path) -> SyncResult<HashIndex> {
    let mut index = HashIndex::default();
    for (path, _) in eligible_files(dir)? {
        match hash_file(&path) {
            Ok(hash) => index.insert(hash, path),
            Err(e) => debug!(path = %path.display(), error = %e, "Failed to hash file"),
        }
    }
    Ok(index)
}

/// Group files into logical items.
///
/// Hidden and unreadable files and files no format resolves are skipped. The
/// base name is the file name minus the resolved extension; groups keep the
/// order in which their first file appears.
#[must_use]
pub fn list_logical_items(paths: &[PathBuf], resolver: &FormatResolver) -> Vec<FileGroup> {
    let mut groups: Vec<FileGroup> = Vec::new();
    let mut by_base_name: HashMap<String, usize> = HashMap::new();

    for path in paths {
        if is_hidden(path) || !is_readable(path) {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(ext) = resolver.by_extension(file_name) else {
            continue;
        };

        let base_name = &file_name[..file_name.len() - ext.extension.len()];
        if base_name.is_empty() {
            continue;
        }

        let i = *by_base_name.entry(base_name.to_string()).or_insert_with(|| {
            groups.push(FileGroup {
                base_name: base_name.to_string(),
                exts: Vec::new(),
            });
            groups.len() - 1
        });
        if !groups[i].exts.contains(&ext) {
            groups[i].exts.push(ext);
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FORMAT_NOTES, FORMAT_TEXT};
    use crate::sync::format::{FileFormat, NO_IMPORT_FORMAT};
    use crate::sync::hash::{HASH_SIZE_LIMIT, hash_bytes};
    use crate::sync::types::Ext;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_list_logical_items_groups_by_base_name() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let paths = vec![
            touch(dir, "note_note.txt", b"n"),
            touch(dir, "photo.png", b"p"),
            touch(dir, "note.txt", b"t"),
        ];

        let groups = list_logical_items(&paths, &FormatResolver::default());

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].base_name, "note");
        assert_eq!(
            groups[0].exts,
            vec![Ext::new("_note.txt", FORMAT_NOTES), Ext::new(".txt", FORMAT_TEXT)]
        );
        assert_eq!(groups[1].base_name, "photo");
        assert_eq!(groups[1].exts, vec![Ext::new(".png", "image/png")]);
    }

    #[test]
    fn test_list_logical_items_skips_hidden_unknown_and_missing() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let paths = vec![
            touch(dir, ".hidden.txt", b"h"),
            touch(dir, "archive.zip", b"z"),
            dir.join("gone.txt"),
            touch(dir, "kept.txt", b"k"),
        ];

        let groups = list_logical_items(&paths, &FormatResolver::default());

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].base_name, "kept");
    }

    #[test]
    fn test_list_logical_items_user_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let resolver = FormatResolver::new(vec![
            FileFormat::new([".md"], "text/markdown"),
            FileFormat::new([".txt"], NO_IMPORT_FORMAT),
        ]);
        let paths = vec![touch(dir, "readme.md", b"# hi"), touch(dir, "skip.txt", b"s")];

        let groups = list_logical_items(&paths, &resolver);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].base_name, "readme");
        assert_eq!(groups[0].exts, vec![Ext::new(".md", "text/markdown")]);
    }

    #[test]
    fn test_list_logical_items_deduplicates_paths() {
        let temp_dir = TempDir::new().unwrap();
        let path = touch(temp_dir.path(), "a.txt", b"a");

        let groups = list_logical_items(&[path.clone(), path], &FormatResolver::default());

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].exts.len(), 1);
    }

    #[test]
    fn test_list_directory_indexes_by_hash() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let a = touch(dir, "a.txt", b"same");
        let b = touch(dir, "b.txt", b"same");
        touch(dir, ".hidden", b"same");

        let index = list_directory(dir).unwrap();

        let mut paths = index.paths(&hash_bytes(b"same")).to_vec();
        paths.sort();
        assert_eq!(paths, vec![a, b]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_list_directory_oversize_file_has_empty_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("big.png");
        File::create(&path).unwrap().set_len(HASH_SIZE_LIMIT + 1).unwrap();

        let index = list_directory(temp_dir.path()).unwrap();

        assert_eq!(index.paths(""), &[path]);
    }

    #[test]
    fn test_list_directory_missing_dir() {
        let result = list_directory(Path::new("/nonexistent/itemsync/dir"));
        assert!(matches!(result, Err(SyncError::ReadDir { .. })));
    }

    #[test]
    fn test_item_files_by_name_reversed() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let a = touch(dir, "a.txt", b"a");
        let b = touch(dir, "b.txt", b"b");

        assert_eq!(item_files_by_name(dir).unwrap(), vec![b, a]);
    }

    #[test]
    fn test_hash_index_take() {
        let mut index = HashIndex::default();
        index.insert("h".into(), PathBuf::from("/a"));

        assert!(!index.take("h", Path::new("/b")));
        assert!(index.take("h", Path::new("/a")));
        assert!(!index.take("h", Path::new("/a")));
        assert!(index.is_empty());
    }
}
