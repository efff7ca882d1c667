//! Format command implementations (user extension table).

use crate::cli::FormatCommands;
use crate::cli::commands::workspace::Workspace;
use crate::error::{Error, Result};
use crate::sync::{Ext, FileFormat, builtin_formats};
use colored::Colorize;

/// Execute format commands.
pub fn execute(command: &FormatCommands, workspace: &mut Workspace, json: bool) -> Result<()> {
    match command {
        FormatCommands::Add {
            extensions,
            format,
            icon,
        } => add(extensions, format, icon, workspace, json),
        FormatCommands::Remove { extension } => remove(extension, workspace, json),
        FormatCommands::List { builtin } => list(*builtin, workspace, json),
    }
}

fn add(extensions: &str, format: &str, icon: &str, workspace: &mut Workspace, json: bool) -> Result<()> {
    let extensions = FileFormat::parse_extensions(extensions);
    if extensions.is_empty() {
        return Err(Error::InvalidArgument(
            "At least one extension is required".to_string(),
        ));
    }

    let mut entry = FileFormat::new(extensions, format).normalized();
    entry.icon = icon.to_string();
    workspace.update_settings(|settings| settings.add_format(entry.clone()))?;

    if json {
        println!("{}", serde_json::to_string(&entry)?);
    } else {
        println!(
            "{} {} → {}",
            "✓".green(),
            entry.extensions.join(", ").bold(),
            display_format(&entry.item_format)
        );
    }
    Ok(())
}

fn remove(extension: &str, workspace: &mut Workspace, json: bool) -> Result<()> {
    let removed = workspace.update_settings(|settings| settings.remove_format(extension))?;
    if !removed {
        return Err(Error::InvalidArgument(format!(
            "Extension is not in the user table: {extension}"
        )));
    }

    if json {
        let output = serde_json::json!({ "removed": extension });
        println!("{output}");
    } else {
        println!("{} Removed {}", "✓".green(), extension.bold());
    }
    Ok(())
}

fn list(builtin: bool, workspace: &Workspace, json: bool) -> Result<()> {
    let user = &workspace.settings().format_settings;
    let builtin: Vec<Ext> = if builtin {
        builtin_formats().collect()
    } else {
        Vec::new()
    };

    if json {
        let output = serde_json::json!({
            "user": user,
            "builtin": builtin,
        });
        println!("{output}");
        return Ok(());
    }

    if user.is_empty() {
        println!("No user extensions.");
    } else {
        println!("{}", "User extensions".cyan().bold());
        for format in user {
            let icon = if format.icon.is_empty() {
                String::new()
            } else {
                format!("  [{}]", format.icon)
            };
            println!(
                "  {} → {}{}",
                format.extensions.join(", ").bold(),
                display_format(&format.item_format),
                icon.dimmed()
            );
        }
    }

    if !builtin.is_empty() {
        println!();
        println!("{}", "Built-in extensions".cyan().bold());
        for ext in &builtin {
            println!("  {} → {}", ext.extension.bold(), display_format(&ext.format));
        }
    }
    Ok(())
}

fn display_format(format: &str) -> String {
    match format {
        "" => "(kept, not loaded)".dimmed().to_string(),
        crate::sync::NO_IMPORT_FORMAT => "(ignored)".dimmed().to_string(),
        other => other.to_string(),
    }
}
