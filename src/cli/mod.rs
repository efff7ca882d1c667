//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// itemsync - mirror clipboard item tabs to plain directories
#[derive(Parser, Debug)]
#[command(name = "itemsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration directory (default: platform config dir + itemsync)
    #[arg(long, global = true, env = "ITEMSYNC_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Maximum number of items created from files per tab
    #[arg(long, global = true, default_value_t = crate::model::DEFAULT_MAX_ITEMS)]
    pub max_items: usize,

    /// Quiet period before a changed directory is rescanned, in milliseconds
    #[arg(long, global = true, default_value_t = 2000)]
    pub interval_ms: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Configure which tabs are synchronized
    Tab {
        #[command(subcommand)]
        command: TabCommands,
    },

    /// Configure file extensions for item formats
    Format {
        #[command(subcommand)]
        command: FormatCommands,
    },

    /// List the items of a tab
    List {
        /// Tab name
        tab: String,
    },

    /// Add an item to a tab
    Add(AddArgs),

    /// Rename an item
    Rename {
        /// Tab name
        tab: String,

        /// Current base name
        old: String,

        /// New base name
        new: String,
    },

    /// Remove an item and its files
    Remove {
        /// Tab name
        tab: String,

        /// Base name of the item
        name: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Copy an item to another tab
    Copy {
        /// Source tab
        from: String,

        /// Target tab
        to: String,

        /// Base name of the item
        name: String,
    },

    /// Keep a tab in sync until interrupted
    Watch {
        /// Tab name
        tab: String,
    },

    /// Print the content hash of a file
    Hash {
        /// File to hash
        file: PathBuf,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Tab Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum TabCommands {
    /// Synchronize a tab with a directory
    Set {
        /// Tab name
        tab: String,

        /// Directory to synchronize with
        path: PathBuf,
    },

    /// Stop synchronizing a tab (files are kept)
    Unset {
        /// Tab name
        tab: String,
    },

    /// List synchronized tabs
    List,
}

// ============================================================================
// Format Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum FormatCommands {
    /// Map file extensions to an item format
    Add {
        /// Extensions, comma or space separated (e.g. ".md,.markdown")
        extensions: String,

        /// Item format, or "-" to ignore files with these extensions
        format: String,

        /// Icon name shown for such files
        #[arg(long, default_value = "")]
        icon: String,
    },

    /// Remove a user extension
    Remove {
        /// Extension to remove
        extension: String,
    },

    /// List extension mappings
    List {
        /// Include the built-in table
        #[arg(long)]
        builtin: bool,
    },
}

// ============================================================================
// Add Args
// ============================================================================

#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("content").required(true).args(["text", "file"]))]
pub struct AddArgs {
    /// Tab name
    pub tab: String,

    /// Plain text content
    #[arg(long)]
    pub text: Option<String>,

    /// Read content from a file
    #[arg(long, requires = "format")]
    pub file: Option<PathBuf>,

    /// Item format of the file content (e.g. image/png)
    #[arg(long)]
    pub format: Option<String>,

    /// Base name of the new item
    #[arg(long)]
    pub name: Option<String>,
}
