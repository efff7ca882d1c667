//! Auxiliary blob file.
//!
//! Formats with no dedicated extension are bundled into one `<base>_copyq.dat`
//! file per item so they survive a round trip through the directory. Content
//! is stored base64-encoded so binary formats stay compact.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::sync::types::SyncResult;

/// Current blob layout version.
pub const BLOB_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct Blob {
    version: u32,
    formats: BTreeMap<String, String>,
}

/// Serialize formats into blob bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_formats(formats: &BTreeMap<String, Vec<u8>>) -> SyncResult<Vec<u8>> {
    let blob = Blob {
        version: BLOB_VERSION,
        formats: formats
            .iter()
            .map(|(format, bytes)| (format.clone(), STANDARD.encode(bytes)))
            .collect(),
    };
    Ok(serde_json::to_vec(&blob)?)
}

/// Parse blob bytes.
///
/// Returns `None` for anything that is not a blob of the current version; the
/// file is then treated like any other content-less file.
#[must_use]
pub fn decode_formats(bytes: &[u8]) -> Option<BTreeMap<String, Vec<u8>>> {
    let blob: Blob = serde_json::from_slice(bytes).ok()?;
    if blob.version != BLOB_VERSION {
        return None;
    }
    blob.formats
        .into_iter()
        .map(|(format, data)| STANDARD.decode(data).ok().map(|bytes| (format, bytes)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_keeps_binary_formats() {
        let mut formats = BTreeMap::new();
        formats.insert("application/x-custom".to_string(), vec![0, 159, 146, 150]);
        formats.insert("application/json".to_string(), b"{}".to_vec());

        let bytes = encode_formats(&formats).unwrap();

        assert_eq!(decode_formats(&bytes), Some(formats));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode_formats(b"not a blob"), None);
        assert_eq!(decode_formats(br#"{"version":99,"formats":{}}"#), None);
        assert_eq!(
            decode_formats(br#"{"version":2,"formats":{"a/b":"%%%"}}"#),
            None
        );
    }

    #[test]
    fn test_blob_stays_compact() {
        let mut formats = BTreeMap::new();
        formats.insert("application/x-custom".to_string(), vec![0xff; 3000]);

        let bytes = encode_formats(&formats).unwrap();

        assert!(bytes.len() < 4100);
        assert_eq!(decode_formats(&bytes), Some(formats));
    }
}
