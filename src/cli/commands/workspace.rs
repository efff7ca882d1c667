//! Shared state of commands that operate on synchronized tabs.
//!
//! Every command starts from the same place: resolve the configuration
//! directory, load the settings, and load the tabs it touches through one
//! [`SyncLoader`]. A tab is loaded from its marker when there is one, and
//! built from a directory scan otherwise. After a command changed a tab, the
//! marker is written back.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{SyncSettings, resolve_config_dir, settings_path, tab_marker_path};
use crate::error::{Error, Result};
use crate::model::MemoryList;
use crate::sync::{SyncError, SyncEvent, SyncLoader, TabMarker, TabWatcher};

/// Configuration directory plus the loader shared by a command.
pub struct Workspace {
    config_dir: PathBuf,
    loader: SyncLoader,
    max_items: usize,
}

impl Workspace {
    /// Open the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no configuration directory can be
    /// determined.
    pub fn open(config_dir: Option<&Path>, max_items: usize, interval: Duration) -> Result<Self> {
        let config_dir = resolve_config_dir(config_dir).ok_or_else(|| {
            Error::Config("Could not determine the configuration directory".to_string())
        })?;
        let settings = SyncSettings::load(&settings_path(&config_dir));
        debug!(config_dir = %config_dir.display(), tabs = settings.sync_tabs.len(), "Loaded settings");

        Ok(Self {
            config_dir,
            loader: SyncLoader::new(settings).with_interval(interval),
            max_items,
        })
    }

    /// Forward filesystem notifications of tabs loaded from now on into `tx`.
    #[must_use]
    pub fn with_notifications(self, tx: Sender<SyncEvent>) -> Self {
        Self {
            loader: self.loader.with_notifications(tx),
            ..self
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        self.loader.settings()
    }

    #[must_use]
    pub fn loader(&self) -> &SyncLoader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut SyncLoader {
        &mut self.loader
    }

    /// Change the settings, save them and hand them to the loader.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be written.
    pub fn update_settings<T>(&mut self, change: impl FnOnce(&mut SyncSettings) -> T) -> Result<T> {
        let mut settings = self.loader.settings().clone();
        let result = change(&mut settings);
        settings.save(&settings_path(&self.config_dir))?;

        for tab in self.loader.apply_settings(settings) {
            debug!(tab = %tab, "Tab needs a refresh");
        }
        Ok(result)
    }

    /// Directory a tab is synchronized with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TabNotConfigured`] if the tab is not synchronized.
    pub fn tab_dir(&self, tab: &str) -> Result<PathBuf> {
        self.loader
            .tab_path(tab)
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::TabNotConfigured {
                tab: tab.to_string(),
            })
    }

    /// Path of a tab's marker file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank tab name.
    pub fn marker_path(&self, tab: &str) -> Result<PathBuf> {
        tab_marker_path(&self.config_dir, tab)
            .ok_or_else(|| Error::InvalidArgument(format!("Invalid tab name: {tab:?}")))
    }

    /// Delete a tab's marker so the next load starts from a fresh scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker exists but cannot be deleted.
    pub fn forget_tab(&self, tab: &str) -> Result<()> {
        let path = self.marker_path(tab)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(tab, path = %path.display(), "Removed tab marker");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load a synchronized tab into a fresh list.
    ///
    /// # Errors
    ///
    /// Returns an error if the tab is not synchronized or its directory
    /// cannot be brought in sync.
    pub fn load_tab(&mut self, tab: &str) -> Result<MemoryList> {
        let dir = self.tab_dir(tab)?;
        let marker_path = self.marker_path(tab)?;
        let mut model = MemoryList::new(self.max_items);

        if let Some(marker) = TabMarker::load(&marker_path) {
            self.loader.load_items(tab, &mut model, &marker)?;
        } else {
            if TabMarker::has_header(&marker_path) {
                warn!(tab, path = %marker_path.display(), "Unsupported tab marker version, rescanning directory");
            }
            self.loader.create_tab(tab, &mut model)?;
        }

        if !self.loader.watcher(tab).is_some_and(TabWatcher::is_valid) {
            return Err(SyncError::NotSynchronized {
                tab: tab.to_string(),
                path: dir,
            }
            .into());
        }
        Ok(model)
    }

    /// Write the marker of a loaded tab.
    ///
    /// # Errors
    ///
    /// Returns an error if the tab is out of sync or the marker cannot be
    /// written.
    pub fn store_tab(&self, tab: &str, model: &MemoryList) -> Result<()> {
        if let Some(marker) = self.loader.save_items(tab, model)? {
            marker.store(&self.marker_path(tab)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemList;
    use tempfile::TempDir;

    fn open(config_dir: &Path) -> Workspace {
        Workspace::open(Some(config_dir), 200, Duration::from_millis(10)).unwrap()
    }

    #[test]
    fn test_unconfigured_tab() {
        let temp_dir = TempDir::new().unwrap();
        let mut workspace = open(temp_dir.path());

        let err = workspace.load_tab("notes").unwrap_err();
        assert!(matches!(err, Error::TabNotConfigured { .. }));
    }

    #[test]
    fn test_load_and_store_tab() {
        let temp_dir = TempDir::new().unwrap();
        let config_dir = temp_dir.path().join("config");
        let sync_dir = temp_dir.path().join("notes");
        fs::create_dir(&sync_dir).unwrap();
        fs::write(sync_dir.join("a.txt"), b"a").unwrap();

        let mut workspace = open(&config_dir);
        workspace
            .update_settings(|settings| settings.set_tab("notes", &sync_dir))
            .unwrap();

        let model = workspace.load_tab("notes").unwrap();
        assert_eq!(model.row_count(), 1);
        workspace.store_tab("notes", &model).unwrap();

        let marker = TabMarker::load(&workspace.marker_path("notes").unwrap()).unwrap();
        assert_eq!(marker.saved_files, vec![sync_dir.join("a.txt")]);

        // A new workspace sees the saved settings.
        let mut reopened = open(&config_dir);
        assert_eq!(reopened.load_tab("notes").unwrap().row_count(), 1);

        reopened.forget_tab("notes").unwrap();
        assert!(!reopened.marker_path("notes").unwrap().exists());
    }
}
