//! itemsync CLI entry point.

use clap::Parser;
use itemsync::cli::commands::{self, workspace::Workspace};
use itemsync::cli::{Cli, Commands};
use itemsync::error::Error;
use std::process::ExitCode;
use std::time::Duration;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    // Run the command and handle errors
    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,notify=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    match &cli.command {
        Commands::Version => return commands::version::execute(json),
        Commands::Completions { shell } => return commands::completions::execute(shell),
        Commands::Hash { file } => return commands::hash::execute(file, json),
        _ => {}
    }

    let mut workspace = Workspace::open(
        cli.config_dir.as_deref(),
        cli.max_items,
        Duration::from_millis(cli.interval_ms),
    )?;

    match &cli.command {
        // Configuration
        Commands::Tab { command } => commands::tab::execute(command, &mut workspace, json),
        Commands::Format { command } => commands::format::execute(command, &mut workspace, json),

        // Items
        Commands::List { tab } => commands::item::list(tab, &mut workspace, json),
        Commands::Add(args) => commands::item::add(args, &mut workspace, json),
        Commands::Rename { tab, old, new } => {
            commands::item::rename(tab, old, new, &mut workspace, json)
        }
        Commands::Remove { tab, name, yes } => {
            commands::item::remove(tab, name, *yes, &mut workspace, json)
        }
        Commands::Copy { from, to, name } => {
            commands::item::copy(from, to, name, &mut workspace, json)
        }

        // Watch until interrupted
        Commands::Watch { tab } => commands::watch::execute(tab, workspace, json),

        Commands::Version | Commands::Completions { .. } | Commands::Hash { .. } => Ok(()),
    }
}
