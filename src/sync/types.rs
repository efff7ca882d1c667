//! Sync types shared by the scanner, the engine and the loader.

use std::path::PathBuf;

use serde::Serialize;

/// A file extension paired with the content format it stores.
///
/// An empty format marks files that are recognized but not loaded as content
/// (the auxiliary blob, or user extensions mapped to no format).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ext {
    /// Suffix including the leading separator (e.g. `.png`, `_note.txt`).
    pub extension: String,
    /// Content format stored in files with this suffix.
    pub format: String,
}

impl Ext {
    #[must_use]
    pub fn new(extension: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            format: format.into(),
        }
    }
}

/// Files on disk sharing one base name, i.e. one logical item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileGroup {
    /// File stem shared by all files in the group.
    pub base_name: String,
    /// One entry per file, in directory listing order.
    pub exts: Vec<Ext>,
}

/// Lifecycle of a tab watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    /// Building rows from the initial directory scan.
    Initializing,
    /// Idle, reacting to model and filesystem events.
    Active,
    /// Re-deriving rows from the directory.
    Reconciling,
    /// Subscriptions released; no further events are handled.
    Closed,
}

/// Statistics for one save batch.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SaveStats {
    /// Files written.
    pub written: usize,
    /// Files already on disk with identical content.
    pub unchanged: usize,
    /// Rows that got a new base name.
    pub renamed: usize,
    /// Files moved or copied during renames.
    pub relocated: usize,
    /// Files deleted because their format disappeared from the item.
    pub removed: usize,
}

impl SaveStats {
    /// Returns true if the batch touched nothing on disk.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.written == 0 && self.relocated == 0 && self.removed == 0
    }

    /// Add the counts of another batch.
    pub fn merge(&mut self, other: &Self) {
        self.written += other.written;
        self.unchanged += other.unchanged;
        self.renamed += other.renamed;
        self.relocated += other.relocated;
        self.removed += other.removed;
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Rows refreshed from their files.
    pub kept: usize,
    /// Rows whose files disappeared.
    pub removed: usize,
    /// Rows created from new file groups.
    pub created: usize,
}

impl ReconcileReport {
    /// Returns true if no row was added or removed.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.removed == 0 && self.created == 0
    }
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem notification backend error.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// The synchronization directory could not be created.
    #[error("Failed to create synchronization directory \"{}\": {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The synchronization directory could not be listed.
    #[error("Failed to read synchronization directory \"{}\": {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An item file could not be written.
    #[error("Failed to write \"{}\": {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An item file could not be moved or copied to its new name.
    #[error("Failed to move \"{}\" to \"{}\": {source}", from.display(), to.display())]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Refused to move or copy onto an existing file.
    #[error("Target file already exists: {}", path.display())]
    TargetExists { path: PathBuf },

    /// No unique base name could be allocated.
    #[error("Failed to find a unique item name in \"{}\"", dir.display())]
    NameExhausted { dir: PathBuf },

    /// The watcher is not in a consistent state.
    #[error("Failed to synchronize tab \"{tab}\" with directory \"{}\"", path.display())]
    NotSynchronized { tab: String, path: PathBuf },

    /// The watcher was closed.
    #[error("Watcher for \"{}\" is closed", path.display())]
    Closed { path: PathBuf },
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_stats() {
        let mut stats = SaveStats::default();
        assert!(stats.is_empty());

        stats.unchanged = 3;
        assert!(stats.is_empty());

        stats.written = 1;
        assert!(!stats.is_empty());

        let mut total = SaveStats::default();
        total.merge(&stats);
        total.merge(&stats);
        assert_eq!(total.written, 2);
        assert_eq!(total.unchanged, 6);
    }

    #[test]
    fn test_reconcile_report() {
        let report = ReconcileReport {
            kept: 4,
            removed: 0,
            created: 0,
        };
        assert!(report.is_unchanged());
    }

    #[test]
    fn test_error_names_directory() {
        let err = SyncError::NameExhausted {
            dir: PathBuf::from("/tmp/tab"),
        };
        assert!(err.to_string().contains("/tmp/tab"));
    }
}
