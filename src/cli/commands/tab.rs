//! Tab command implementations (which tab syncs to which directory).

use crate::cli::TabCommands;
use crate::cli::commands::workspace::Workspace;
use crate::error::{Error, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Output for tab set/unset.
#[derive(Serialize)]
struct TabChangeOutput<'a> {
    tab: &'a str,
    path: Option<&'a Path>,
    previous: Option<&'a Path>,
}

#[derive(Serialize)]
struct TabListItem<'a> {
    tab: &'a str,
    path: &'a Path,
    exists: bool,
}

/// Execute tab commands.
pub fn execute(command: &TabCommands, workspace: &mut Workspace, json: bool) -> Result<()> {
    match command {
        TabCommands::Set { tab, path } => set(tab, path, workspace, json),
        TabCommands::Unset { tab } => unset(tab, workspace, json),
        TabCommands::List => list(workspace, json),
    }
}

fn set(tab: &str, path: &Path, workspace: &mut Workspace, json: bool) -> Result<()> {
    if tab.trim().is_empty() {
        return Err(Error::InvalidArgument("Tab name must not be empty".to_string()));
    }
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("Directory must not be empty".to_string()));
    }

    let path = std::path::absolute(path)?;
    let previous = workspace.update_settings(|settings| settings.set_tab(tab, path.clone()))?;

    // Files saved for another directory would resurrect old rows.
    if previous.as_ref() != Some(&path) {
        workspace.forget_tab(tab)?;
    }

    if json {
        let output = TabChangeOutput {
            tab,
            path: Some(&path),
            previous: previous.as_deref(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "{} Tab {} synchronized with {}",
            "✓".green(),
            tab.bold(),
            path.display()
        );
    }
    Ok(())
}

fn unset(tab: &str, workspace: &mut Workspace, json: bool) -> Result<()> {
    let previous: Option<PathBuf> = workspace.update_settings(|settings| settings.unset_tab(tab))?;
    let Some(previous) = previous else {
        return Err(Error::TabNotConfigured {
            tab: tab.to_string(),
        });
    };
    workspace.forget_tab(tab)?;

    if json {
        let output = TabChangeOutput {
            tab,
            path: None,
            previous: Some(&previous),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "{} Tab {} no longer synchronized (files kept in {})",
            "✓".green(),
            tab.bold(),
            previous.display()
        );
    }
    Ok(())
}

fn list(workspace: &Workspace, json: bool) -> Result<()> {
    let tabs: Vec<TabListItem> = workspace
        .settings()
        .sync_tabs
        .iter()
        .map(|(tab, path)| TabListItem {
            tab,
            path,
            exists: path.is_dir(),
        })
        .collect();

    if json {
        let output = serde_json::json!({
            "tabs": tabs,
            "count": tabs.len(),
        });
        println!("{output}");
        return Ok(());
    }

    if tabs.is_empty() {
        println!("No synchronized tabs.");
        return Ok(());
    }

    println!("{}", "Synchronized tabs".cyan().bold());
    for tab in &tabs {
        let missing = if tab.exists { "" } else { " (missing)" };
        println!(
            "  {}  {}{}",
            tab.tab.bold(),
            tab.path.display(),
            missing.yellow()
        );
    }
    Ok(())
}
