//! Watch command implementation.
//!
//! Loads one tab with filesystem notifications attached and keeps the
//! directory and the tab marker in sync until the process is interrupted.

use crate::cli::commands::workspace::Workspace;
use crate::error::Result;
use crate::model::{ItemList, MemoryList};
use crate::sync::{ReconcileReport, TabMarker, run_event_loop};
use colored::Colorize;
use std::sync::mpsc;
use tracing::warn;

/// Watch a tab.
///
/// # Errors
///
/// Returns an error if the tab cannot be loaded or its marker cannot be
/// written.
pub fn execute(tab: &str, workspace: Workspace, json: bool) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut workspace = workspace.with_notifications(tx);

    let dir = workspace.tab_dir(tab)?;
    let marker_path = workspace.marker_path(tab)?;
    let mut model = workspace.load_tab(tab)?;
    workspace.store_tab(tab, &model)?;

    if json {
        let output = serde_json::json!({
            "event": "started",
            "tab": tab,
            "path": dir.display().to_string(),
            "items": model.row_count(),
        });
        println!("{output}");
    } else {
        println!(
            "Watching {} in {} ({} items). Press Ctrl-C to stop.",
            tab.bold(),
            dir.display(),
            model.row_count()
        );
    }

    let on_pass = |report: &ReconcileReport, model: &MemoryList| {
        if let Err(e) = TabMarker::from_rows(&dir, model).store(&marker_path) {
            warn!(tab, error = %e, "Failed to store tab marker");
        }
        if report.is_unchanged() {
            return;
        }

        if json {
            let output = serde_json::json!({
                "event": "updated",
                "tab": tab,
                "report": report,
                "items": model.row_count(),
            });
            println!("{output}");
        } else {
            println!(
                "{} {} added, {} removed ({} items)",
                "↻".cyan(),
                report.created,
                report.removed,
                model.row_count()
            );
        }
    };

    run_event_loop(workspace.loader_mut(), tab, &mut model, &rx, on_pass);
    workspace.store_tab(tab, &model)
}
