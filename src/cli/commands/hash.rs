//! Hash command implementation.

use crate::error::Result;
use crate::sync::{HASH_SIZE_LIMIT, file_size, hash_file};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct HashOutput<'a> {
    path: &'a Path,
    hash: &'a str,
    size: u64,
}

/// Print the content hash used to detect unchanged files.
///
/// Files over the size limit have no hash and never match.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn execute(path: &Path, json: bool) -> Result<()> {
    let hash = hash_file(path)?;
    let size = file_size(path);

    if json {
        let output = HashOutput {
            path,
            hash: &hash,
            size,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if hash.is_empty() {
        println!(
            "{}  (not hashed: {size} bytes exceeds {HASH_SIZE_LIMIT})",
            path.display()
        );
    } else {
        println!("{hash}  {}", path.display());
    }
    Ok(())
}
