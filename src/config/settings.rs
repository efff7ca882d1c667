//! Synchronization settings.
//!
//! Which tabs are mirrored to which directory, plus the user's extension
//! table. Stored as one JSON document:
//!
//! ```json
//! {
//!   "header": "itemsync_settings",
//!   "version": 1,
//!   "sync_tabs": { "notes": "/home/me/notes" },
//!   "format_settings": [
//!     { "extensions": [".md"], "item_format": "text/markdown", "icon": "" }
//!   ]
//! }
//! ```
//!
//! A missing file, a foreign header or another version all load as empty
//! settings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::sync::{FileFormat, FormatResolver, atomic_write};

/// Value of the `header` field.
pub const SETTINGS_HEADER: &str = "itemsync_settings";

/// Current settings version.
pub const SETTINGS_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    header: String,
    version: u32,
    /// Tab name → synchronization directory.
    #[serde(default)]
    pub sync_tabs: BTreeMap<String, PathBuf>,
    /// User extension table, in lookup order.
    #[serde(default)]
    pub format_settings: Vec<FileFormat>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            header: SETTINGS_HEADER.to_string(),
            version: SETTINGS_VERSION,
            sync_tabs: BTreeMap::new(),
            format_settings: Vec::new(),
        }
    }
}

impl SyncSettings {
    /// Load settings, falling back to defaults.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Self::default();
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(settings) if settings.header == SETTINGS_HEADER && settings.version == SETTINGS_VERSION => {
                settings
            }
            Ok(settings) => {
                debug!(
                    path = %path.display(),
                    header = %settings.header,
                    version = settings.version,
                    "Ignoring settings with unknown header or version"
                );
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse settings");
                Self::default()
            }
        }
    }

    /// Write settings atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_vec_pretty(self)?;
        content.push(b'\n');
        atomic_write(path, &content)?;
        Ok(())
    }

    /// Directory a tab is synchronized with, if any.
    #[must_use]
    pub fn tab_path(&self, tab: &str) -> Option<&Path> {
        self.sync_tabs
            .get(tab)
            .map(PathBuf::as_path)
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// Synchronize a tab with a directory. Returns the previous directory.
    pub fn set_tab(&mut self, tab: impl Into<String>, path: impl Into<PathBuf>) -> Option<PathBuf> {
        self.sync_tabs.insert(tab.into(), path.into())
    }

    /// Stop synchronizing a tab. Returns the directory it was synchronized with.
    pub fn unset_tab(&mut self, tab: &str) -> Option<PathBuf> {
        self.sync_tabs.remove(tab)
    }

    /// Add a user format, replacing entries that claim any of its extensions.
    pub fn add_format(&mut self, format: FileFormat) {
        let format = format.normalized();
        for existing in &mut self.format_settings {
            existing
                .extensions
                .retain(|ext| !format.extensions.contains(&normalize_extension(ext)));
        }
        self.format_settings.retain(|f| !f.extensions.is_empty());
        self.format_settings.push(format);
    }

    /// Remove an extension from the user table. Returns true if it was there.
    pub fn remove_format(&mut self, extension: &str) -> bool {
        let extension = normalize_extension(extension);
        let mut removed = false;
        for format in &mut self.format_settings {
            let count = format.extensions.len();
            format
                .extensions
                .retain(|ext| normalize_extension(ext) != extension);
            removed |= format.extensions.len() != count;
        }
        self.format_settings.retain(|f| !f.extensions.is_empty());
        removed
    }

    /// Resolver for the current user table.
    #[must_use]
    pub fn resolver(&self) -> FormatResolver {
        FormatResolver::new(self.format_settings.clone())
    }
}

fn normalize_extension(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let settings = SyncSettings::load(Path::new("/nonexistent/settings.json"));
        assert_eq!(settings, SyncSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        let mut settings = SyncSettings::default();
        settings.set_tab("notes", "/home/me/notes");
        settings.add_format(FileFormat::new(["md"], "text/markdown"));
        settings.save(&path).unwrap();

        let loaded = SyncSettings::load(&path);
        assert_eq!(loaded, settings);
        assert_eq!(loaded.tab_path("notes"), Some(Path::new("/home/me/notes")));
        assert_eq!(loaded.format_settings[0].extensions, vec![".md"]);
    }

    #[test]
    fn test_version_mismatch_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"header":"itemsync_settings","version":7,"sync_tabs":{"a":"/a"}}"#,
        )
        .unwrap();

        assert!(SyncSettings::load(&path).sync_tabs.is_empty());
    }

    #[test]
    fn test_foreign_header_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(&path, r#"{"header":"other","version":1,"sync_tabs":{"a":"/a"}}"#).unwrap();

        assert!(SyncSettings::load(&path).sync_tabs.is_empty());
    }

    #[test]
    fn test_empty_tab_path_is_not_synchronized() {
        let mut settings = SyncSettings::default();
        settings.set_tab("scratch", "");
        assert_eq!(settings.tab_path("scratch"), None);
        assert!(settings.sync_tabs.contains_key("scratch"));
    }

    #[test]
    fn test_add_format_takes_over_extension() {
        let mut settings = SyncSettings::default();
        settings.add_format(FileFormat::new([".md", ".markdown"], "text/markdown"));
        settings.add_format(FileFormat::new(["md"], "text/x-md"));

        assert_eq!(settings.format_settings.len(), 2);
        assert_eq!(settings.format_settings[0].extensions, vec![".markdown"]);
        assert_eq!(settings.format_settings[1].item_format, "text/x-md");
    }

    #[test]
    fn test_remove_format() {
        let mut settings = SyncSettings::default();
        settings.add_format(FileFormat::new([".md"], "text/markdown"));

        assert!(settings.remove_format("md"));
        assert!(settings.format_settings.is_empty());
        assert!(!settings.remove_format(".md"));
    }
}
