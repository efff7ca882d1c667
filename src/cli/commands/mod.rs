//! Command implementations.

pub mod completions;
pub mod format;
pub mod hash;
pub mod item;
pub mod tab;
pub mod version;
pub mod watch;
pub mod workspace;
