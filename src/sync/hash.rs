//! Content hashing for sync operations.
//!
//! Hashes identify file content for dedup and for the derived-format markers
//! stored on items. Collision resistance is not a security requirement here.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::sync::types::SyncResult;

/// Files larger than this are not hashed (10 MiB).
pub const HASH_SIZE_LIMIT: u64 = 10 << 20;

/// Compute a SHA256 hash of raw bytes, as lowercase hex.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Compute the hash of a file's content.
///
/// Returns an empty string for files over [`HASH_SIZE_LIMIT`] without reading
/// them. Such files never match anything in the dedup index.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> SyncResult<String> {
    let file = File::open(path)?;
    if file.metadata()?.len() > HASH_SIZE_LIMIT {
        return Ok(String::new());
    }

    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check if content has changed against a stored hash.
///
/// Returns `true` if:
/// - There is no stored hash
/// - The current hash differs from the stored hash
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_hash_bytes_deterministic() {
        let hash1 = hash_bytes(b"hello");
        let hash2 = hash_bytes(b"hello");

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA256 produces 64 hex chars
        assert_ne!(hash1, hash_bytes(b"hello!"));
    }

    #[test]
    fn test_hash_file_matches_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, b"some content").unwrap();

        assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"some content"));
    }

    #[test]
    fn test_hash_file_over_limit_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("big.bin");
        let file = File::create(&path).unwrap();
        file.set_len(HASH_SIZE_LIMIT + 1).unwrap();

        assert_eq!(hash_file(&path).unwrap(), "");
    }

    #[test]
    fn test_hash_file_at_limit_is_hashed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("edge.bin");
        let file = File::create(&path).unwrap();
        file.set_len(HASH_SIZE_LIMIT).unwrap();

        assert_eq!(hash_file(&path).unwrap().len(), 64);
    }

    #[test]
    fn test_hash_file_missing() {
        assert!(hash_file(Path::new("/nonexistent/file.txt")).is_err());
    }

    #[test]
    fn test_has_changed_no_stored_hash() {
        assert!(has_changed("abc123", None));
    }

    #[test]
    fn test_has_changed_different_hash() {
        assert!(has_changed("abc123", Some("xyz789")));
    }

    #[test]
    fn test_has_changed_same_hash() {
        assert!(!has_changed("abc123", Some("abc123")));
    }
}
