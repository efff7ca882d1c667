//! Configuration management.
//!
//! This module resolves where itemsync keeps its own state and loads the
//! synchronization settings.
//!
//! # Layout
//!
//! ```text
//! <config dir>/
//!   settings.json        tab → directory map and user extension table
//!   tabs/<tab>.dat       per-tab marker written when a synchronized tab is saved
//! ```
//!
//! The synchronized directories themselves live wherever the user points
//! each tab.

mod settings;

pub use settings::{SETTINGS_HEADER, SETTINGS_VERSION, SyncSettings};

use std::path::{Path, PathBuf};

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "ITEMSYNC_CONFIG_DIR";

/// Platform configuration directory for itemsync.
///
/// `~/.config/itemsync` on Linux, the Application Support folder on macOS.
#[must_use]
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.config_dir().join("itemsync"))
}

/// Resolve the configuration directory.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `ITEMSYNC_CONFIG_DIR` environment variable
/// 3. Platform configuration directory
#[must_use]
pub fn resolve_config_dir(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Some(PathBuf::from(dir));
        }
    }

    global_config_dir()
}

/// Path of the settings file.
#[must_use]
pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join("settings.json")
}

/// Path of a tab's marker file, or `None` for a blank tab name.
#[must_use]
pub fn tab_marker_path(config_dir: &Path, tab: &str) -> Option<PathBuf> {
    let key = sanitize_key(tab)?;
    Some(config_dir.join("tabs").join(format!("{key}.dat")))
}

/// Sanitize a tab name for use as a filename.
fn sanitize_key(key: &str) -> Option<String> {
    let sanitized: String = key
        .trim()
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_whitespace() {
                '_'
            } else {
                c
            }
        })
        .take(100)
        .collect();

    if sanitized.is_empty() || sanitized.starts_with('.') {
        sanitized
            .strip_prefix('.')
            .filter(|rest| !rest.is_empty())
            .map(|rest| format!("_{rest}"))
    } else {
        Some(sanitized)
    }
}
