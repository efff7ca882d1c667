//! Item command implementations (list, add, rename, remove, copy).
//!
//! Each command loads the tabs it needs, edits the rows the way a user
//! would, lets the loader save the changes and writes the tab marker back.

use crate::cli::AddArgs;
use crate::cli::commands::workspace::Workspace;
use crate::error::{Error, Result};
use crate::model::{ExtensionMap, Item, ItemList, ItemSummary, MemoryList};
use crate::sync::{IconHint, SaveStats, SyncLoader};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};

#[derive(Serialize)]
struct ItemListEntry {
    #[serde(flatten)]
    summary: ItemSummary,
    icon: Option<IconHint>,
}

/// Output for commands that change one item.
#[derive(Serialize)]
struct ItemChangeOutput<'a> {
    tab: &'a str,
    name: &'a str,
    stats: &'a SaveStats,
}

/// List the items of a tab.
///
/// # Errors
///
/// Returns an error if the tab cannot be loaded.
pub fn list(tab: &str, workspace: &mut Workspace, json: bool) -> Result<()> {
    let model = workspace.load_tab(tab)?;
    workspace.store_tab(tab, &model)?;

    let loader = workspace.loader();
    let items: Vec<ItemListEntry> = model
        .items()
        .map(|item| ItemListEntry {
            summary: ItemSummary::from(item),
            icon: loader.icon_for(item),
        })
        .collect();

    if json {
        let output = serde_json::json!({
            "tab": tab,
            "items": items,
            "count": items.len(),
        });
        println!("{output}");
        return Ok(());
    }

    if items.is_empty() {
        println!("No items in {tab}.");
        return Ok(());
    }

    println!("{} ({})", tab.cyan().bold(), items.len());
    for entry in &items {
        let name = entry.summary.base_name.as_deref().unwrap_or_default();
        let files = file_suffixes(&entry.summary.extensions);
        let size: usize = entry.summary.formats.values().sum();
        println!(
            "  {}  {}  {}",
            name.bold(),
            files.join(" ").dimmed(),
            format!("{size} bytes").dimmed()
        );
    }
    Ok(())
}

/// Add an item to a tab.
///
/// # Errors
///
/// Returns an error if the content cannot be read or the item cannot be
/// saved.
pub fn add(args: &AddArgs, workspace: &mut Workspace, json: bool) -> Result<()> {
    let mut item = match (&args.text, &args.file, &args.format) {
        (Some(text), _, _) => Item::text(text),
        (None, Some(file), Some(format)) => Item::with_format(format.as_str(), fs::read(file)?),
        _ => {
            return Err(Error::InvalidArgument(
                "Either --text or --file with --format is required".to_string(),
            ));
        }
    };
    if let Some(name) = &args.name {
        item = item.named(name.as_str());
    }

    let tab = args.tab.as_str();
    let mut model = workspace.load_tab(tab)?;
    model.insert_item(0, item);
    let stats = workspace.loader_mut().handle_model_events(tab, &mut model)?;
    workspace.store_tab(tab, &model)?;

    let name = model.item(0).map(Item::base_name).unwrap_or_default();
    print_change("Added", tab, name, &stats, json)
}

/// Rename an item; its files move along.
///
/// # Errors
///
/// Returns an error if the item does not exist or its files cannot be
/// moved.
pub fn rename(tab: &str, old: &str, new: &str, workspace: &mut Workspace, json: bool) -> Result<()> {
    if new.trim().is_empty() {
        return Err(Error::InvalidArgument("New name must not be empty".to_string()));
    }

    let mut model = workspace.load_tab(tab)?;
    let row = find_item(&model, tab, old)?;
    model.rename(row, new);
    let stats = workspace.loader_mut().handle_model_events(tab, &mut model)?;
    workspace.store_tab(tab, &model)?;

    let name = model.item(row).map(Item::base_name).unwrap_or_default();
    print_change("Renamed", tab, name, &stats, json)
}

/// Remove an item and delete its files.
///
/// # Errors
///
/// Returns an error if the item does not exist or removal was not confirmed.
pub fn remove(tab: &str, name: &str, yes: bool, workspace: &mut Workspace, json: bool) -> Result<()> {
    let mut model = workspace.load_tab(tab)?;
    let row = find_item(&model, tab, name)?;

    let confirmed = SyncLoader::can_remove_items(model.item(row), || {
        yes || (!json && confirm(&format!("Delete the files of {name}?")))
    });
    if !confirmed {
        return Err(Error::InvalidArgument(format!(
            "Removing {name} deletes its files; pass --yes to confirm"
        )));
    }

    let removed = model.remove_rows(row, 1);
    workspace.loader_mut().handle_model_events(tab, &mut model)?;
    let deleted = workspace.loader().items_removed_by_user(tab, &model, &removed);
    workspace.store_tab(tab, &model)?;

    if json {
        let output = serde_json::json!({
            "tab": tab,
            "removed": name,
            "files_deleted": deleted,
        });
        println!("{output}");
    } else {
        println!(
            "{} Removed {} from {} ({deleted} files deleted)",
            "✓".green(),
            name.bold(),
            tab
        );
    }
    Ok(())
}

/// Copy an item into another tab; its files are copied on save.
///
/// # Errors
///
/// Returns an error if either tab cannot be loaded, the item does not exist
/// or the files cannot be copied.
pub fn copy(from: &str, to: &str, name: &str, workspace: &mut Workspace, json: bool) -> Result<()> {
    if from == to {
        return Err(Error::InvalidArgument(
            "Source and target tab must differ".to_string(),
        ));
    }

    let source = workspace.load_tab(from)?;
    let mut target = workspace.load_tab(to)?;

    let row = find_item(&source, from, name)?;
    let copied = source
        .item(row)
        .map(|item| workspace.loader().copy_item(from, item))
        .ok_or_else(|| Error::ItemNotFound {
            tab: from.to_string(),
            name: name.to_string(),
        })?;

    target.insert_item(0, copied);
    let stats = workspace.loader_mut().handle_model_events(to, &mut target)?;
    workspace.store_tab(to, &target)?;

    let new_name = target.item(0).map(Item::base_name).unwrap_or_default();
    print_change("Copied", to, new_name, &stats, json)
}

fn find_item(model: &MemoryList, tab: &str, name: &str) -> Result<usize> {
    model.find_row(name).ok_or_else(|| Error::ItemNotFound {
        tab: tab.to_string(),
        name: name.to_string(),
    })
}

fn file_suffixes(extensions: &ExtensionMap) -> Vec<&str> {
    let mut suffixes: Vec<&str> = extensions
        .values()
        .map(String::as_str)
        .filter(|ext| !ext.is_empty())
        .collect();
    suffixes.sort_unstable();
    suffixes.dedup();
    suffixes
}

fn print_change(action: &str, tab: &str, name: &str, stats: &SaveStats, json: bool) -> Result<()> {
    if json {
        let output = ItemChangeOutput { tab, name, stats };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} {action} {} in {tab}", "✓".green(), name.bold());
    if !stats.is_empty() {
        println!(
            "  {}",
            format!(
                "{} written, {} moved, {} removed",
                stats.written, stats.relocated, stats.removed
            )
            .dimmed()
        );
    }
    Ok(())
}

/// Ask a yes/no question on the terminal. Anything but yes is no.
fn confirm(question: &str) -> bool {
    if !io::stdin().is_terminal() {
        return false;
    }

    eprint!("{question} [y/N] ");
    let _ = io::stderr().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
