//! Directory synchronization.
//!
//! This module mirrors item lists to plain directories and back:
//!
//! - **Save**: every item becomes a group of files sharing a base name, one
//!   file per content format (`note.txt`, `note.html`, ...). Formats without
//!   a known extension go into one `<name>_copyq.dat` blob.
//! - **Load**: files are grouped by base name and each group becomes an item.
//! - **Watch**: directory changes are debounced and reconciled into the list;
//!   list changes are saved back.
//! - **Tabs**: a [`SyncLoader`] ties watchers to named tabs and persists a
//!   small [`TabMarker`] in place of the items.
//!
//! # Architecture
//!
//! The engine never owns items. It drives an [`ItemList`](crate::model::ItemList)
//! owned by the host, consumes its change events and detaches from them
//! around its own writes. Filesystem notifications arrive through a channel
//! and are handled on the thread that owns the loader.
//!
//! # Example
//!
//! ```ignore
//! use itemsync::config::SyncSettings;
//! use itemsync::model::MemoryList;
//! use itemsync::sync::SyncLoader;
//!
//! let mut settings = SyncSettings::default();
//! settings.set_tab("notes", "/home/me/notes");
//!
//! let mut loader = SyncLoader::new(settings);
//! let mut model = MemoryList::default();
//! let marker = loader.create_tab("notes", &mut model)?;
//! ```

mod blob;
mod events;
mod file;
mod format;
mod hash;
mod loader;
mod marker;
mod naming;
mod scan;
mod types;
mod watcher;

// Re-export main types and functions
pub use blob::{BLOB_VERSION, decode_formats, encode_formats};
pub use events::{
    DEBOUNCE_INTERVAL, Debounce, NotifyWatch, NullWatch, PathWatch, SyncEvent, run_event_loop,
};
pub use file::{atomic_write, ensure_dir, file_size, with_suffix};
pub use format::{
    AUX_SUFFIX, FileFormat, FormatResolver, IconHint, NO_IMPORT_FORMAT, builtin_formats,
    icon_for_file_name, icon_for_format,
};
pub use hash::{HASH_SIZE_LIMIT, hash_bytes, hash_file};
pub use loader::SyncLoader;
pub use marker::{MARKER_HEADER, MARKER_VERSION, TabMarker};
pub use naming::{DEFAULT_BASE_NAME, make_unique, sanitize_base_name};
pub use scan::{item_files, item_files_by_name, list_logical_items};
pub use types::{
    Ext, FileGroup, ReconcileReport, SaveStats, SyncError, SyncResult, WatcherState,
};
pub use watcher::TabWatcher;
