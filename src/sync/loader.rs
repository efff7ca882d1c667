//! Tab-level synchronization.
//!
//! The [`SyncLoader`] owns one [`TabWatcher`] per synchronized tab and sits
//! between the host's tab lifecycle and the engine:
//!
//! - **Load**: a synchronized tab stores a [`TabMarker`] instead of its
//!   items; loading it starts a watcher that rebuilds the rows from disk.
//! - **Save**: produces the marker for the current rows.
//! - **Toggle**: a tab that gained or lost synchronization since its last
//!   save is converted in place.
//! - **Remove/copy**: deletes files of removed items and prepares items
//!   pasted into another tab.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::SyncSettings;
use crate::model::{FORMAT_TEXT, FORMAT_URI_LIST, Item, ItemList};
use crate::sync::events::{DEBOUNCE_INTERVAL, NotifyWatch, NullWatch, PathWatch, SyncEvent};
use crate::sync::file::{ensure_dir, remove_format_files, with_suffix};
use crate::sync::format::{FormatResolver, IconHint, icon_for_file_name, icon_for_format};
use crate::sync::hash::hash_bytes;
use crate::sync::marker::TabMarker;
use crate::sync::scan::{item_files, item_files_by_name, list_logical_items};
use crate::sync::types::{ReconcileReport, SaveStats, SyncError, SyncResult};
use crate::sync::watcher::TabWatcher;

/// Manages the watchers of all loaded tabs.
pub struct SyncLoader {
    settings: SyncSettings,
    resolver: Arc<FormatResolver>,
    watchers: HashMap<String, TabWatcher>,
    events: Option<Sender<SyncEvent>>,
    interval: Duration,
}

impl SyncLoader {
    /// Create a loader whose watchers receive no filesystem notifications.
    #[must_use]
    pub fn new(settings: SyncSettings) -> Self {
        let resolver = Arc::new(settings.resolver());
        Self {
            settings,
            resolver,
            watchers: HashMap::new(),
            events: None,
            interval: DEBOUNCE_INTERVAL,
        }
    }

    /// Forward filesystem notifications of new watchers into `tx`.
    #[must_use]
    pub fn with_notifications(mut self, tx: Sender<SyncEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Quiet period of new watchers.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    #[must_use]
    pub fn resolver(&self) -> &FormatResolver {
        &self.resolver
    }

    /// Whether a tab is configured for synchronization.
    #[must_use]
    pub fn should_sync_tab(&self, tab: &str) -> bool {
        self.settings.sync_tabs.contains_key(tab)
    }

    /// Directory a tab is synchronized with.
    #[must_use]
    pub fn tab_path(&self, tab: &str) -> Option<&Path> {
        self.settings.tab_path(tab)
    }

    /// Watcher of a loaded tab.
    #[must_use]
    pub fn watcher(&self, tab: &str) -> Option<&TabWatcher> {
        self.watchers.get(tab)
    }

    /// Load a tab from its marker.
    ///
    /// A synchronized tab is rebuilt from the saved files followed by any
    /// other files in its directory. A tab that is no longer synchronized
    /// keeps watching the directory it was saved to until it is unloaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, listed or
    /// watched.
    pub fn load_items(
        &mut self,
        tab: &str,
        model: &mut impl ItemList,
        marker: &TabMarker,
    ) -> SyncResult<()> {
        if self.should_sync_tab(tab) {
            return self.create_watcher_and_load_items(tab, model, &marker.saved_files);
        }

        if let Some(dir) = marker.saved_dir().map(Path::to_path_buf) {
            debug!(tab, dir = %dir.display(), "Tab no longer synchronized, watching saved directory");
            self.create_watcher(tab, &dir, &marker.saved_files, model)?;
        }
        Ok(())
    }

    /// Marker describing the tab's current rows.
    ///
    /// Returns `None` if the tab has no watcher; the host then saves the
    /// items itself.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSynchronized`] if the last pass of the watcher
    /// failed. The host should fall back to saving the items itself.
    pub fn save_items(&self, tab: &str, model: &impl ItemList) -> SyncResult<Option<TabMarker>> {
        let Some(watcher) = self.watchers.get(tab) else {
            return Ok(None);
        };

        if !watcher.is_valid() {
            error!(tab, path = %watcher.path().display(), "Failed to synchronize tab");
            return Err(SyncError::NotSynchronized {
                tab: tab.to_string(),
                path: watcher.path().to_path_buf(),
            });
        }

        Ok(Some(TabMarker::from_rows(watcher.path(), model)))
    }

    /// Start a new synchronized tab from the files already in its directory.
    ///
    /// Returns `None` if the tab is not configured for synchronization.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails (see [`Self::load_items`]).
    pub fn create_tab(
        &mut self,
        tab: &str,
        model: &mut impl ItemList,
    ) -> SyncResult<Option<TabMarker>> {
        if !self.should_sync_tab(tab) {
            return Ok(None);
        }

        let files = self
            .tab_path(tab)
            .map(|path| item_files_by_name(path).unwrap_or_default())
            .unwrap_or_default();
        let marker = TabMarker::new(files);
        self.load_items(tab, model, &marker)?;
        Ok(Some(marker))
    }

    /// Reconcile a tab loaded by the host with its synchronization setting.
    ///
    /// `tab_synced` tells whether the tab was saved as a marker. If the
    /// setting changed since, the model is marked dirty and converted: a
    /// newly synchronized tab gets a watcher, a tab that stopped being
    /// synchronized loses its watcher, its sync bookkeeping and every row
    /// without content.
    ///
    /// # Errors
    ///
    /// Returns an error if starting the watcher fails.
    pub fn items_loaded(
        &mut self,
        tab: &str,
        model: &mut impl ItemList,
        tab_synced: bool,
    ) -> SyncResult<()> {
        let sync_tab = self.should_sync_tab(tab);
        if sync_tab == tab_synced {
            return Ok(());
        }

        model.mark_dirty();

        if sync_tab {
            info!(tab, "Tab became synchronized");
            return self.create_watcher_and_load_items(tab, model, &[]);
        }

        info!(tab, "Tab is no longer synchronized");
        self.watchers.remove(tab);

        let mut row = 0;
        while row < model.row_count() {
            let Some(item) = model.item(row) else {
                break;
            };
            if item.has_content() {
                let mut item = item.clone();
                item.strip_sync_data();
                model.set_item(row, item);
                row += 1;
            } else {
                model.remove_rows(row, 1);
            }
        }
        Ok(())
    }

    /// Stop watching a tab. Returns true if it had a watcher.
    pub fn unload_tab(&mut self, tab: &str) -> bool {
        self.watchers.remove(tab).is_some()
    }

    /// Ask for confirmation before removing items that have files on disk.
    ///
    /// `confirm` is only called if at least one item has files; its answer
    /// decides.
    pub fn can_remove_items<'a>(
        items: impl IntoIterator<Item = &'a Item>,
        confirm: impl FnOnce() -> bool,
    ) -> bool {
        !items.into_iter().any(Item::has_files) || confirm()
    }

    /// Delete the files of items the user removed from a tab.
    ///
    /// Items whose base name is still used by a row of `model` (moved within
    /// the list) keep their files. Returns the number of files deleted.
    pub fn items_removed_by_user(
        &self,
        tab: &str,
        model: &impl ItemList,
        removed: &[Item],
    ) -> usize {
        let Some(dir) = self.tab_path(tab) else {
            return 0;
        };

        let mut deleted = 0;
        for item in removed {
            let base_name = item.base_name();
            if base_name.is_empty() || model.find_row(base_name).is_some() {
                continue;
            }

            let base = dir.join(base_name);
            if item.extensions.is_empty() {
                if fs::remove_file(&base).is_ok() {
                    deleted += 1;
                }
                continue;
            }

            deleted += remove_format_files(&base, &item.extensions);

            // Files kept without loading them (oversize, no format) are not
            // recorded by extension; find them on disk.
            if item.extensions.get("").is_some_and(String::is_empty) {
                deleted += self.remove_untracked_files(dir, base_name);
            }
        }

        debug!(tab, deleted, "Removed files of deleted items");
        deleted
    }

    fn remove_untracked_files(&self, dir: &Path, base_name: &str) -> usize {
        let files = item_files(dir).unwrap_or_default();
        let Some(group) = list_logical_items(&files, &self.resolver)
            .into_iter()
            .find(|group| group.base_name == base_name)
        else {
            return 0;
        };

        let base = dir.join(base_name);
        group
            .exts
            .iter()
            .map(|ext| with_suffix(&base, &ext.extension))
            .filter(|path| match fs::remove_file(path) {
                Ok(()) => true,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove item file");
                    false
                }
            })
            .count()
    }

    /// Prepare an item of `source_tab` for pasting elsewhere.
    ///
    /// The copy remembers the source directory so the target tab copies the
    /// files on its next save. Items without plain text or a URI list get
    /// both synthesized from their file paths; those formats are only
    /// written to disk if they are edited afterwards.
    #[must_use]
    pub fn copy_item(&self, source_tab: &str, item: &Item) -> Item {
        let mut copied = item.clone();
        let Some(dir) = self.tab_path(source_tab) else {
            return copied;
        };
        copied.sync_path = Some(dir.to_path_buf());

        let update_uri = !item.formats.contains_key(FORMAT_URI_LIST);
        let update_text = !item.formats.contains_key(FORMAT_TEXT);
        if !(update_uri || update_text) || !item.has_files() {
            return copied;
        }

        let base = dir.join(item.base_name());
        let paths: Vec<PathBuf> = item
            .extensions
            .values()
            .filter(|ext| !ext.is_empty())
            .map(|ext| with_suffix(&base, ext))
            .collect();
        if paths.is_empty() {
            return copied;
        }

        copied.no_save.clear();
        if update_uri {
            let uris: Vec<String> = paths.iter().map(|path| file_url(path)).collect();
            let data = uris.join("\n").into_bytes();
            copied.no_save.insert(FORMAT_URI_LIST.to_string(), hash_bytes(&data));
            copied.formats.insert(FORMAT_URI_LIST.to_string(), data);
        }
        if update_text {
            let lines: Vec<String> = paths
                .iter()
                .map(|path| escape_path_text(&path.to_string_lossy()))
                .collect();
            let data = lines.join("\n").into_bytes();
            copied.no_save.insert(FORMAT_TEXT.to_string(), hash_bytes(&data));
            copied.formats.insert(FORMAT_TEXT.to_string(), data);
        }

        copied
    }

    /// Replace the settings.
    ///
    /// Every watcher gets the new extension table. Watchers of tabs that are
    /// no longer synchronized, or now point to another directory, are
    /// dropped; the host reloads those tabs. Returns the tabs whose watcher
    /// kept its directory, which should be refreshed with [`Self::refresh`].
    pub fn apply_settings(&mut self, settings: SyncSettings) -> Vec<String> {
        self.resolver = Arc::new(settings.resolver());
        self.settings = settings;

        let stale: Vec<String> = self
            .watchers
            .iter()
            .filter(|(tab, watcher)| self.settings.tab_path(tab) != Some(watcher.path()))
            .map(|(tab, _)| tab.clone())
            .collect();
        for tab in &stale {
            info!(tab = %tab, "Synchronization directory changed, dropping watcher");
            self.watchers.remove(tab);
        }

        let mut refresh: Vec<String> = Vec::new();
        for (tab, watcher) in &mut self.watchers {
            watcher.set_resolver(Arc::clone(&self.resolver));
            refresh.push(tab.clone());
        }
        refresh.sort();
        refresh
    }

    /// Rescan a tab's directory now.
    ///
    /// # Errors
    ///
    /// Returns an error if the rescan fails.
    pub fn refresh(
        &mut self,
        tab: &str,
        model: &mut impl ItemList,
    ) -> SyncResult<Option<ReconcileReport>> {
        match self.watchers.get_mut(tab) {
            Some(watcher) => watcher.update_items(model).map(Some),
            None => Ok(None),
        }
    }

    /// Save rows the host changed since the last call.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn handle_model_events(
        &mut self,
        tab: &str,
        model: &mut impl ItemList,
    ) -> SyncResult<SaveStats> {
        match self.watchers.get_mut(tab) {
            Some(watcher) => watcher.handle_model_events(model),
            None => Ok(SaveStats::default()),
        }
    }

    /// Forward a change notification to a tab's watcher.
    pub fn on_path_changed(&mut self, tab: &str, path: &Path, now: Instant) {
        if let Some(watcher) = self.watchers.get_mut(tab) {
            watcher.on_path_changed(path, now);
        }
    }

    /// Run a tab's pending rescan if it is due.
    ///
    /// # Errors
    ///
    /// Returns an error if the rescan fails.
    pub fn poll(
        &mut self,
        tab: &str,
        model: &mut impl ItemList,
        now: Instant,
    ) -> SyncResult<Option<ReconcileReport>> {
        match self.watchers.get_mut(tab) {
            Some(watcher) => watcher.poll(model, now),
            None => Ok(None),
        }
    }

    /// When a tab's pending rescan is due.
    #[must_use]
    pub fn next_deadline(&self, tab: &str) -> Option<Instant> {
        self.watchers.get(tab).and_then(TabWatcher::next_deadline)
    }

    /// Icon for an item backed by files; `None` for items without files.
    ///
    /// The first format with a recognizable file extension or content type
    /// decides, then the base name itself, then a generic file icon.
    #[must_use]
    pub fn icon_for(&self, item: &Item) -> Option<IconHint> {
        let base_name = item.base_name.as_deref().filter(|name| !name.is_empty())?;

        let from_formats = item.formats.keys().find_map(|format| {
            match item.extensions.get(format) {
                Some(ext) => icon_for_file_name(&format!("{base_name}{ext}"), &self.resolver),
                None => icon_for_format(format),
            }
        });

        Some(
            from_formats
                .or_else(|| icon_for_file_name(base_name, &self.resolver))
                .unwrap_or(IconHint::File),
        )
    }

    fn create_watcher_and_load_items(
        &mut self,
        tab: &str,
        model: &mut impl ItemList,
        saved_files: &[PathBuf],
    ) -> SyncResult<()> {
        model.set_disabled(true);

        if let Some(path) = self.tab_path(tab).map(Path::to_path_buf) {
            ensure_dir(&path)?;

            let mut files = saved_files.to_vec();
            for file in item_files(&path)? {
                if !files.contains(&file) {
                    files.push(file);
                }
            }

            self.create_watcher(tab, &path, &files, model)?;
            if !self.watchers.get(tab).is_some_and(TabWatcher::is_valid) {
                warn!(tab, path = %path.display(), "Tab left disabled after failed synchronization");
                return Ok(());
            }
        }

        model.set_disabled(false);
        Ok(())
    }

    fn create_watcher(
        &mut self,
        tab: &str,
        path: &Path,
        files: &[PathBuf],
        model: &mut impl ItemList,
    ) -> SyncResult<()> {
        // Release the old subscriptions before the new watcher takes over.
        self.watchers.remove(tab);

        let source: Box<dyn PathWatch> = match &self.events {
            Some(tx) => Box::new(NotifyWatch::new(tab, tx.clone())?),
            None => Box::new(NullWatch),
        };
        let watcher = TabWatcher::new(
            path,
            files,
            model,
            Arc::clone(&self.resolver),
            source,
            self.interval,
        )?;
        self.watchers.insert(tab.to_string(), watcher);
        Ok(())
    }
}

/// `file://` URL of a path; each segment is percent-encoded on its own.
fn file_url(path: &Path) -> String {
    let encoded = path
        .to_string_lossy()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("file://{encoded}")
}

/// Path as one line of text: backslashes and control characters escaped.
fn escape_path_text(path: &str) -> String {
    let mut text = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '\\' => text.push_str("\\\\"),
            '\n' => text.push_str("\\n"),
            '\r' => text.push_str("\\r"),
            '\t' => text.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(text, "\\x{:02x}", u32::from(c));
            }
            c => text.push(c),
        }
    }
    text
}
