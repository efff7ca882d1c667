//! Filesystem notifications and the sync event loop.
//!
//! The `notify` backend runs on its own thread and only forwards changed
//! paths into an `mpsc` channel. Everything else happens on the thread that
//! owns the loader: events are handled one at a time and the debounce
//! deadline bounds how long the loop blocks, so a reconciliation never runs
//! concurrently with a save.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::model::ItemList;
use crate::sync::loader::SyncLoader;
use crate::sync::types::{ReconcileReport, SyncResult};

/// Quiet period after the last change before the directory is rescanned.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(2000);

/// Event consumed by [`run_event_loop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A watched directory or file changed.
    PathChanged { tab: String, path: PathBuf },
    /// Rescan a tab right away.
    Refresh { tab: String },
    /// Stop the loop.
    Shutdown,
}

/// Source of filesystem change notifications.
///
/// Implementations report changes out of band (e.g. through a channel); the
/// watcher only subscribes and unsubscribes paths.
pub trait PathWatch {
    /// Subscribe to changes of a directory or file.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the path.
    fn watch(&mut self, path: &Path) -> SyncResult<()>;

    /// Drop the subscription for a path.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to release the path.
    fn unwatch(&mut self, path: &Path) -> SyncResult<()>;
}

/// Notification source that never reports anything.
///
/// Used for one-shot operations where the directory is only scanned once.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWatch;

impl PathWatch for NullWatch {
    fn watch(&mut self, _path: &Path) -> SyncResult<()> {
        Ok(())
    }

    fn unwatch(&mut self, _path: &Path) -> SyncResult<()> {
        Ok(())
    }
}

/// Notification source backed by the platform's recommended `notify` watcher.
pub struct NotifyWatch {
    watcher: RecommendedWatcher,
}

impl NotifyWatch {
    /// Create a watcher forwarding changes of `tab` into `tx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be initialized.
    pub fn new(tab: impl Into<String>, tx: Sender<SyncEvent>) -> SyncResult<Self> {
        let tab = tab.into();
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    // Reading files during a rescan must not trigger another one.
                    if matches!(event.kind, EventKind::Access(_)) {
                        return;
                    }
                    for path in event.paths {
                        let _ = tx.send(SyncEvent::PathChanged {
                            tab: tab.clone(),
                            path,
                        });
                    }
                }
                Err(e) => warn!(tab = %tab, error = %e, "File watcher error"),
            }
        })?;
        Ok(Self { watcher })
    }
}

impl PathWatch for NotifyWatch {
    fn watch(&mut self, path: &Path) -> SyncResult<()> {
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> SyncResult<()> {
        self.watcher.unwatch(path)?;
        Ok(())
    }
}

/// One-shot timer restarted by every change.
#[derive(Debug, Clone)]
pub struct Debounce {
    interval: Duration,
    deadline: Option<Instant>,
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(DEBOUNCE_INTERVAL)
    }
}

impl Debounce {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Start or restart the timer.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    /// Stop the timer without firing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true once per elapsed deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Drive one synchronized tab until [`SyncEvent::Shutdown`] arrives or every
/// sender is gone.
///
/// `on_pass` is called after each reconciliation. Failed passes and failed
/// save batches are logged; the watcher stays invalid until a later pass
/// succeeds.
pub fn run_event_loop<M, F>(
    loader: &mut SyncLoader,
    tab: &str,
    model: &mut M,
    rx: &Receiver<SyncEvent>,
    mut on_pass: F,
) where
    M: ItemList,
    F: FnMut(&ReconcileReport, &M),
{
    info!(tab, "Event loop started");

    loop {
        let event = match loader.next_deadline(tab) {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match event {
            Ok(SyncEvent::PathChanged { tab: changed, path }) if changed == tab => {
                loader.on_path_changed(tab, &path, Instant::now());
            }
            Ok(SyncEvent::Refresh { tab: changed }) if changed == tab => {
                match loader.refresh(tab, model) {
                    Ok(Some(report)) => on_pass(&report, model),
                    Ok(None) => {}
                    Err(e) => warn!(tab, error = %e, "Refresh failed"),
                }
            }
            Ok(SyncEvent::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(other) => debug!(tab, event = ?other, "Ignoring event for another tab"),
            Err(RecvTimeoutError::Timeout) => {}
        }

        match loader.poll(tab, model, Instant::now()) {
            Ok(Some(report)) => on_pass(&report, model),
            Ok(None) => {}
            Err(e) => warn!(tab, error = %e, "Failed to update items from directory"),
        }

        if let Err(e) = loader.handle_model_events(tab, model) {
            warn!(tab, error = %e, "Failed to save changed items");
        }
    }

    info!(tab, "Event loop stopped");
}
