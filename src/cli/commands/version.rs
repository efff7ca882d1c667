//! Version command implementation.

use crate::config::SETTINGS_VERSION;
use crate::error::Result;
use crate::sync::{BLOB_VERSION, MARKER_VERSION};
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    /// On-disk format versions this build reads and writes.
    settings_version: u32,
    marker_version: u32,
    blob_version: u32,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        build: if cfg!(debug_assertions) { "dev" } else { "release" },
        settings_version: SETTINGS_VERSION,
        marker_version: MARKER_VERSION,
        blob_version: BLOB_VERSION,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("itemsync {} ({})", output.version, output.build);
    println!(
        "  settings v{}, tab marker v{}, aux blob v{}",
        output.settings_version, output.marker_version, output.blob_version
    );
    Ok(())
}
