//! Data models for itemsync.
//!
//! This module contains the item-side domain:
//! - [`Item`] - one clipboard item (content formats plus sync bookkeeping)
//! - [`ItemList`] - the row-based list model contract the engine drives
//! - [`MemoryList`] - in-memory list model used by the CLI and tests

pub mod item;
pub mod list;

pub use item::{
    ExtensionMap, FORMAT_HTML, FORMAT_NOTES, FORMAT_TEXT, FORMAT_URI_LIST, Item, ItemSummary,
};
pub use list::{DEFAULT_MAX_ITEMS, ItemList, MemoryList, ModelEvent, RowId};
