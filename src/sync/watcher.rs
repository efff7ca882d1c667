//! Per-tab synchronization engine.
//!
//! A [`TabWatcher`] keeps one item list and one directory in agreement:
//!
//! - **Model → disk**: inserted or changed rows are saved as one file per
//!   format under a unique base name; renames move the files along.
//! - **Disk → model**: after a change notification and a quiet period the
//!   directory is rescanned and rows are refreshed, removed or created.
//!
//! # Feedback
//!
//! The engine detaches from the list's change notifications around its own
//! writes, so rows it sets never come back as model events. File changes it
//! causes do come back as notifications; the rescan they trigger finds the
//! directory already in agreement and changes nothing.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::model::{ExtensionMap, Item, ItemList, ModelEvent, RowId};
use crate::sync::blob::{decode_formats, encode_formats};
use crate::sync::events::{Debounce, PathWatch};
use crate::sync::file::{
    copy_format_files, ensure_dir, move_format_files, remove_format_files, with_suffix,
    write_item_file,
};
use crate::sync::format::{AUX_SUFFIX, FormatResolver};
use crate::sync::hash::{HASH_SIZE_LIMIT, has_changed, hash_bytes};
use crate::sync::naming::make_unique;
use crate::sync::scan::{item_files, list_directory, list_logical_items};
use crate::sync::types::{
    FileGroup, ReconcileReport, SaveStats, SyncError, SyncResult, WatcherState,
};

/// Keeps one item list in sync with one directory.
pub struct TabWatcher {
    path: PathBuf,
    resolver: Arc<FormatResolver>,
    source: Box<dyn PathWatch>,
    watched: BTreeSet<PathBuf>,
    debounce: Debounce,
    valid: bool,
    state: WatcherState,
    /// Base name each row's files were last saved under.
    base_names: HashMap<RowId, String>,
}

impl TabWatcher {
    /// Create the directory if needed, build rows from `files` and save them.
    ///
    /// `files` is usually the previously saved file list followed by the
    /// current directory listing; rows are inserted at the top so the last
    /// group ends up first. No more than `model.max_items()` rows are
    /// created.
    ///
    /// A failed initial save is logged and leaves the watcher invalid.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or watched.
    pub fn new(
        path: impl Into<PathBuf>,
        files: &[PathBuf],
        model: &mut impl ItemList,
        resolver: Arc<FormatResolver>,
        source: Box<dyn PathWatch>,
        interval: Duration,
    ) -> SyncResult<Self> {
        let path = path.into();
        ensure_dir(&path)?;

        let mut watcher = Self {
            path,
            resolver,
            source,
            watched: BTreeSet::new(),
            debounce: Debounce::new(interval),
            valid: false,
            state: WatcherState::Initializing,
            base_names: HashMap::new(),
        };

        watcher.source.watch(&watcher.path)?;
        watcher.watched.insert(watcher.path.clone());

        model.set_notifications(false);
        let groups = list_logical_items(files, &watcher.resolver);
        let created = watcher.create_items_from_files(model, groups);

        let rows = model.row_count();
        if rows > 0 {
            if let Err(e) = watcher.save_items(model, 0, rows - 1) {
                warn!(path = %watcher.path.display(), error = %e, "Initial save failed");
            }
        } else {
            model.set_notifications(true);
            watcher.valid = true;
        }

        watcher.state = WatcherState::Active;
        info!(path = %watcher.path.display(), created, rows, "Watching directory");
        Ok(watcher)
    }

    /// Directory this watcher synchronizes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether saving through this watcher is safe.
    ///
    /// False while the engine is writing or reconciling and after a failed
    /// pass, until the next pass succeeds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Directory and files currently subscribed.
    #[must_use]
    pub fn watched_paths(&self) -> &BTreeSet<PathBuf> {
        &self.watched
    }

    /// When the pending rescan is due, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Use a new extension table from now on.
    pub fn set_resolver(&mut self, resolver: Arc<FormatResolver>) {
        self.resolver = resolver;
    }

    /// A watched path changed: (re)start the quiet period.
    pub fn on_path_changed(&mut self, path: &Path, now: Instant) {
        if self.state == WatcherState::Closed {
            return;
        }
        trace!(path = %path.display(), "Change notification");
        self.debounce.arm(now);
    }

    /// Rescan the directory if the quiet period is over.
    ///
    /// Pending model changes are saved first so new rows are not mistaken for
    /// rows whose files disappeared.
    ///
    /// # Errors
    ///
    /// Returns an error if saving or rescanning fails.
    pub fn poll(
        &mut self,
        model: &mut impl ItemList,
        now: Instant,
    ) -> SyncResult<Option<ReconcileReport>> {
        if self.state == WatcherState::Closed || !self.debounce.fire(now) {
            return Ok(None);
        }
        self.handle_model_events(model)?;
        self.update_items(model).map(Some)
    }

    /// Apply the change notifications queued by the list since the last call.
    ///
    /// # Errors
    ///
    /// Returns an error if saving changed rows fails.
    pub fn handle_model_events(&mut self, model: &mut impl ItemList) -> SyncResult<SaveStats> {
        let events = model.take_events();
        let mut stats = SaveStats::default();
        if self.state == WatcherState::Closed || events.is_empty() {
            return Ok(stats);
        }

        for event in &events {
            if let ModelEvent::RowsRemoved { ids, .. } = event {
                for id in ids {
                    self.base_names.remove(id);
                }
            }
        }

        for (first, last) in row_runs(&pending_rows(&events)) {
            stats.merge(&self.save_items(model, first, last)?);
        }
        Ok(stats)
    }

    /// Rebuild rows from the directory.
    ///
    /// Rows are matched to file groups by base name: matched rows are
    /// refreshed from their files, unmatched rows are removed and leftover
    /// groups become new rows at the top, up to the row cap.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ReadDir`] if the directory cannot be listed; the
    /// rows are left as they are and the watcher stays invalid.
    pub fn update_items(&mut self, model: &mut impl ItemList) -> SyncResult<ReconcileReport> {
        if self.state == WatcherState::Closed {
            return Err(SyncError::Closed {
                path: self.path.clone(),
            });
        }

        self.state = WatcherState::Reconciling;
        model.set_notifications(false);
        self.valid = false;
        model.set_disabled(true);

        let result = self.reconcile(model);

        model.set_disabled(false);
        model.set_notifications(true);
        self.state = WatcherState::Active;

        match result {
            Ok(report) => {
                self.valid = true;
                debug!(
                    path = %self.path.display(),
                    kept = report.kept,
                    removed = report.removed,
                    created = report.created,
                    "Items updated from directory"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to update items");
                Err(e)
            }
        }
    }

    /// Save rows `first..=last` to the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, a unique name
    /// cannot be found or a file cannot be written, moved or copied. The
    /// batch stops at the first error and the watcher stays invalid.
    pub fn save_items(
        &mut self,
        model: &mut impl ItemList,
        first: usize,
        last: usize,
    ) -> SyncResult<SaveStats> {
        if self.state == WatcherState::Closed {
            return Err(SyncError::Closed {
                path: self.path.clone(),
            });
        }

        model.set_notifications(false);
        self.valid = false;

        let rows = model.row_count();
        let result = if rows == 0 || first >= rows {
            Ok(SaveStats::default())
        } else {
            self.save_rows(model, first, last.min(rows - 1))
        };

        model.set_notifications(true);

        match result {
            Ok(stats) => {
                self.valid = true;
                if !stats.is_empty() {
                    debug!(
                        path = %self.path.display(),
                        first,
                        last,
                        written = stats.written,
                        renamed = stats.renamed,
                        removed = stats.removed,
                        "Saved items"
                    );
                }
                Ok(stats)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to save items");
                Err(e)
            }
        }
    }

    /// Release all subscriptions and stop the timer.
    pub fn close(&mut self) {
        if self.state == WatcherState::Closed {
            return;
        }
        for path in std::mem::take(&mut self.watched) {
            if let Err(e) = self.source.unwatch(&path) {
                trace!(path = %path.display(), error = %e, "Failed to unwatch");
            }
        }
        self.debounce.cancel();
        self.valid = false;
        self.state = WatcherState::Closed;
        debug!(path = %self.path.display(), "Watcher closed");
    }

    fn watch_path(&mut self, path: &Path) {
        if self.watched.contains(path) {
            return;
        }
        match self.source.watch(path) {
            Ok(()) => {
                self.watched.insert(path.to_path_buf());
            }
            Err(e) => debug!(path = %path.display(), error = %e, "Failed to watch file"),
        }
    }

    /// Insert rows for file groups at the top. Returns the number created.
    fn create_items_from_files(
        &mut self,
        model: &mut impl ItemList,
        groups: Vec<FileGroup>,
    ) -> usize {
        let max_items = model.max_items();
        let mut created = 0;

        for group in groups {
            if model.row_count() >= max_items {
                break;
            }

            let mut item = self.read_group(&group);
            if item.extensions.is_empty() {
                continue;
            }
            item.base_name = Some(group.base_name.clone());

            if !model.insert_item(0, item) {
                break;
            }
            if let Some(id) = model.row_id(0) {
                self.base_names.insert(id, group.base_name);
            }
            created += 1;
        }

        created
    }

    /// Load the formats of one file group and watch its files.
    fn read_group(&mut self, group: &FileGroup) -> Item {
        let base = self.path.join(&group.base_name);
        let mut item = Item::default();

        for ext in &group.exts {
            let file_path = with_suffix(&base, &ext.extension);
            let Ok(metadata) = fs::metadata(&file_path) else {
                continue;
            };
            let oversize = metadata.len() > HASH_SIZE_LIMIT;

            // The size cap is for hashing; the blob is always read.
            if ext.extension == AUX_SUFFIX {
                let Ok(bytes) = fs::read(&file_path) else {
                    continue;
                };
                if let Some(formats) = decode_formats(&bytes) {
                    for (format, bytes) in formats {
                        item.formats.entry(format).or_insert(bytes);
                    }
                    item.extensions.insert(String::new(), AUX_SUFFIX.to_string());
                } else {
                    item.extensions.entry(String::new()).or_default();
                }
            } else if oversize || ext.format.is_empty() {
                item.extensions.entry(String::new()).or_default();
            } else {
                let Ok(bytes) = fs::read(&file_path) else {
                    continue;
                };
                item.formats.insert(ext.format.clone(), bytes);
                item.extensions
                    .insert(ext.format.clone(), ext.extension.clone());
            }

            self.watch_path(&file_path);
        }

        item
    }

    fn reconcile(&mut self, model: &mut impl ItemList) -> SyncResult<ReconcileReport> {
        let files = item_files(&self.path)?;
        let mut groups = list_logical_items(&files, &self.resolver);
        let mut report = ReconcileReport::default();

        let mut row = 0;
        while row < model.row_count() {
            let base_name = model
                .item(row)
                .map(|item| item.base_name().to_string())
                .unwrap_or_default();

            let fresh = groups
                .iter()
                .position(|group| group.base_name == base_name)
                .map(|i| groups.remove(i))
                .map(|group| self.read_group(&group))
                .filter(|item| !item.extensions.is_empty());

            if let Some(mut item) = fresh {
                item.base_name = Some(base_name);
                if model.item(row) != Some(&item) {
                    model.set_item(row, item);
                }
                report.kept += 1;
                row += 1;
            } else {
                if let Some(id) = model.row_id(row) {
                    self.base_names.remove(&id);
                }
                model.remove_rows(row, 1);
                report.removed += 1;
            }
        }

        report.created = self.create_items_from_files(model, groups);

        for file in &files {
            self.watch_path(file);
        }

        Ok(report)
    }

    fn save_rows(
        &mut self,
        model: &mut impl ItemList,
        first: usize,
        last: usize,
    ) -> SyncResult<SaveStats> {
        // Before any rename, so a missing directory aborts with nothing moved.
        ensure_dir(&self.path)?;

        let mut stats = SaveStats::default();
        self.rename_to_unique(model, first, last, &mut stats)?;

        let mut index = list_directory(&self.path)?;

        for row in first..=last {
            let Some(mut item) = model.item(row).cloned() else {
                continue;
            };
            let base_name = item.base_name().to_string();
            let base = self.path.join(&base_name);
            let old_extensions = item.extensions.clone();
            let no_save = std::mem::take(&mut item.no_save);

            let mut extensions = ExtensionMap::new();
            let mut unknown = BTreeMap::new();
            let mut formats = BTreeMap::new();

            for (format, bytes) in std::mem::take(&mut item.formats) {
                if !has_changed(&hash_bytes(&bytes), no_save.get(&format).map(String::as_str)) {
                    continue;
                }

                match self.resolver.by_format(&format, &old_extensions) {
                    Some(ext) => {
                        if write_item_file(&with_suffix(&base, &ext), &bytes, &mut index)? {
                            stats.written += 1;
                        } else {
                            stats.unchanged += 1;
                        }
                        extensions.insert(format.clone(), ext);
                    }
                    None => {
                        unknown.insert(format.clone(), bytes.clone());
                    }
                }
                formats.insert(format, bytes);
            }

            if extensions.is_empty() {
                extensions.insert(String::new(), String::new());
            }

            if !unknown.is_empty() {
                extensions.insert(String::new(), AUX_SUFFIX.to_string());
                let blob = encode_formats(&unknown)?;
                if write_item_file(&with_suffix(&base, AUX_SUFFIX), &blob, &mut index)? {
                    stats.written += 1;
                } else {
                    stats.unchanged += 1;
                }
            }

            if !no_save.is_empty() || extensions != old_extensions {
                let in_use: HashSet<&String> = extensions.values().collect();
                let dropped: ExtensionMap = old_extensions
                    .iter()
                    .filter(|(format, ext)| !extensions.contains_key(*format) && !in_use.contains(ext))
                    .map(|(format, ext)| (format.clone(), ext.clone()))
                    .collect();
                stats.removed += remove_format_files(&base, &dropped);

                item.extensions = extensions;
                item.formats = formats;
                model.set_item(row, item);

                if let Some(id) = model.row_id(row) {
                    self.base_names.insert(id, base_name);
                }
            }
        }

        Ok(stats)
    }

    /// Give rows `first..=last` base names unique across the list, moving or
    /// copying their files to the new names.
    fn rename_to_unique(
        &mut self,
        model: &mut impl ItemList,
        first: usize,
        last: usize,
        stats: &mut SaveStats,
    ) -> SyncResult<()> {
        let mut used: HashSet<String> = (0..model.row_count())
            .filter(|row| !(first..=last).contains(row))
            .filter_map(|row| model.item(row))
            .map(|item| item.base_name().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        for row in first..=last {
            let Some(item) = model.item(row) else {
                continue;
            };
            let old_name = item.base_name().to_string();
            let base_name = make_unique(&old_name, &mut used, &self.resolver).ok_or_else(|| {
                SyncError::NameExhausted {
                    dir: self.path.clone(),
                }
            })?;

            let row_id = model.row_id(row);
            let previous = row_id
                .and_then(|id| self.base_names.get(&id))
                .filter(|previous| **previous != base_name)
                .cloned();
            let renamed = base_name != old_name;
            if !renamed && previous.is_none() && item.sync_path.is_none() {
                continue;
            }

            let mut item = item.clone();
            let new_base = self.path.join(&base_name);

            if let Some(source_dir) = item.sync_path.take() {
                // Pasted from a tab directory: copy, the source keeps its files.
                if renamed || source_dir != self.path {
                    let from = source_dir.join(&old_name);
                    stats.relocated += copy_format_files(&from, &new_base, &item.extensions)?;
                }
            } else if let Some(previous) = &previous {
                let from = self.path.join(previous);
                stats.relocated += move_format_files(&from, &new_base, &item.extensions)?;
                debug!(from = %previous, to = %base_name, "Moved item files");
            }

            if renamed || previous.is_some() {
                stats.renamed += 1;
            }
            if let Some(id) = row_id {
                self.base_names.insert(id, base_name.clone());
            }

            item.base_name = Some(base_name);
            model.set_item(row, item);
        }

        Ok(())
    }
}

impl Drop for TabWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

/// Rows touched by a batch of model events, in terms of the final row order.
fn pending_rows(events: &[ModelEvent]) -> BTreeSet<usize> {
    let mut rows = BTreeSet::new();

    for event in events {
        match *event {
            ModelEvent::RowsInserted { first, last } => {
                let count = last + 1 - first;
                rows = rows
                    .into_iter()
                    .map(|row| if row >= first { row + count } else { row })
                    .collect();
                rows.extend(first..=last);
            }
            ModelEvent::RowsRemoved { first, last, .. } => {
                let count = last + 1 - first;
                rows = rows
                    .into_iter()
                    .filter(|row| !(first..=last).contains(row))
                    .map(|row| if row > last { row - count } else { row })
                    .collect();
            }
            ModelEvent::DataChanged { first, last } => rows.extend(first..=last),
        }
    }

    rows
}

/// Split sorted rows into inclusive runs of consecutive rows.
fn row_runs(rows: &BTreeSet<usize>) -> Vec<(usize, usize)> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for &row in rows {
        match runs.last_mut() {
            Some((_, last)) if *last + 1 == row => *last = row,
            _ => runs.push((row, row)),
        }
    }
    runs
}
