//! Clipboard item model.
//!
//! An item is a set of content formats (MIME-like tag → bytes) plus the
//! bookkeeping the sync engine keeps next to it: the base name of its file
//! group on disk and which extension stores which format.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

/// Plain text.
pub const FORMAT_TEXT: &str = "text/plain";
/// Newline-separated list of URLs.
pub const FORMAT_URI_LIST: &str = "text/uri-list";
/// HTML fragment.
pub const FORMAT_HTML: &str = "text/html";
/// Free-form notes attached to an item.
pub const FORMAT_NOTES: &str = "application/x-itemsync-notes";

/// Format → file extension, as recorded for an item.
///
/// The empty format key is reserved for bookkeeping: an empty extension marks
/// files the engine keeps but does not load, `AUX_SUFFIX` marks the blob file
/// holding formats without a dedicated extension.
pub type ExtensionMap = BTreeMap<String, String>;

/// A clipboard item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    /// File stem shared by all files of this item (unique per directory).
    pub base_name: Option<String>,

    /// Which extension stores which format.
    pub extensions: ExtensionMap,

    /// Directory of the tab this item was copied from.
    ///
    /// Set when the item is pasted from another synchronized tab; the next
    /// save copies the files over instead of treating the item as new.
    pub sync_path: Option<PathBuf>,

    /// Derived formats whose value is only a hash of already-known bytes.
    ///
    /// A format listed here is not written to disk as long as its current
    /// bytes still hash to the stored value.
    pub no_save: BTreeMap<String, String>,

    /// Content formats.
    pub formats: BTreeMap<String, Vec<u8>>,
}

impl Item {
    /// Create an item holding a single format.
    #[must_use]
    pub fn with_format(format: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let mut item = Self::default();
        item.formats.insert(format.into(), bytes.into());
        item
    }

    /// Create an item holding plain text.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self::with_format(FORMAT_TEXT, text.as_bytes())
    }

    /// Builder-style base name setter.
    #[must_use]
    pub fn named(mut self, base_name: impl Into<String>) -> Self {
        self.base_name = Some(base_name.into());
        self
    }

    /// Base name or an empty string.
    #[must_use]
    pub fn base_name(&self) -> &str {
        self.base_name.as_deref().unwrap_or_default()
    }

    /// Whether the item is backed by files in a synchronized directory.
    #[must_use]
    pub fn has_files(&self) -> bool {
        self.base_name.is_some()
    }

    /// Whether the item carries any content at all.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.formats.is_empty()
    }

    /// Drop all sync bookkeeping, keeping only the content.
    pub fn strip_sync_data(&mut self) {
        self.base_name = None;
        self.extensions.clear();
        self.sync_path = None;
        self.no_save.clear();
    }

    /// Plain text content, if any and valid UTF-8.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        self.formats
            .get(FORMAT_TEXT)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

/// Serializable summary of an item (content sizes instead of bytes).
#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
    pub base_name: Option<String>,
    pub extensions: ExtensionMap,
    pub formats: BTreeMap<String, usize>,
}

impl From<&Item> for ItemSummary {
    fn from(item: &Item) -> Self {
        Self {
            base_name: item.base_name.clone(),
            extensions: item.extensions.clone(),
            formats: item
                .formats
                .iter()
                .map(|(format, bytes)| (format.clone(), bytes.len()))
                .collect(),
        }
    }
}
