//! Per-tab marker file.
//!
//! A synchronized tab stores this marker instead of its items. It records
//! which files the tab consisted of when it was last saved, so the next load
//! rebuilds the rows in the same order before picking up new files.
//!
//! # File Format
//!
//! ```text
//! itemsync_tab
//! {"version":1,"saved_files":["/path/a.txt", ...],"saved_at":"2026-01-20T10:00:00Z"}
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::ItemList;
use crate::sync::file::{atomic_write, with_suffix};
use crate::sync::types::SyncResult;

/// First line of every marker file.
pub const MARKER_HEADER: &str = "itemsync_tab";

/// Current marker version.
pub const MARKER_VERSION: u32 = 1;

/// Contents of a tab marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabMarker {
    pub version: u32,
    /// Item files in reverse row order.
    #[serde(default)]
    pub saved_files: Vec<PathBuf>,
    /// RFC 3339 timestamp of the save.
    #[serde(default)]
    pub saved_at: String,
}

impl TabMarker {
    #[must_use]
    pub fn new(saved_files: Vec<PathBuf>) -> Self {
        Self {
            version: MARKER_VERSION,
            saved_files,
            saved_at: Utc::now().to_rfc3339(),
        }
    }

    /// Marker for the rows of `model` saved under `dir`.
    ///
    /// Files are listed in reverse row order so that loading them, which
    /// inserts every new row at the top, restores the original order. Rows
    /// without a base name and empty extensions are skipped.
    #[must_use]
    pub fn from_rows(dir: &Path, model: &impl ItemList) -> Self {
        let mut saved_files = Vec::new();
        for row in 0..model.row_count() {
            let Some(item) = model.item(row).filter(|item| !item.base_name().is_empty()) else {
                continue;
            };
            let base = dir.join(item.base_name());
            saved_files.extend(
                item.extensions
                    .values()
                    .filter(|ext| !ext.is_empty())
                    .map(|ext| with_suffix(&base, ext)),
            );
        }
        saved_files.reverse();
        Self::new(saved_files)
    }

    /// Serialize as header line plus JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> SyncResult<Vec<u8>> {
        let mut bytes = format!("{MARKER_HEADER}\n").into_bytes();
        serde_json::to_writer(&mut bytes, self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parse marker bytes; `None` on header or version mismatch.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let body = strip_header(bytes)?;
        let marker: Self = serde_json::from_slice(body).ok()?;
        (marker.version == MARKER_VERSION).then_some(marker)
    }

    /// Read a marker file; missing or foreign files yield `None`.
    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let bytes = fs::read(path).ok()?;
        let marker = Self::from_bytes(&bytes);
        if marker.is_none() {
            debug!(path = %path.display(), "Ignoring file without a valid tab marker");
        }
        marker
    }

    /// Write the marker atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn store(&self, path: &Path) -> SyncResult<()> {
        atomic_write(path, &self.to_bytes()?)
    }

    /// Whether a file starts with the marker header, regardless of version.
    #[must_use]
    pub fn has_header(path: &Path) -> bool {
        fs::read(path).is_ok_and(|bytes| strip_header(&bytes).is_some())
    }

    /// Directory the tab was last saved to: parent of the first saved file.
    #[must_use]
    pub fn saved_dir(&self) -> Option<&Path> {
        self.saved_files.first().and_then(|file| file.parent())
    }
}

fn strip_header(bytes: &[u8]) -> Option<&[u8]> {
    bytes
        .strip_prefix(MARKER_HEADER.as_bytes())
        .and_then(|rest| rest.strip_prefix(b"\n"))
}
