//! itemsync - mirror clipboard item tabs to plain directories
//!
//! This crate provides the sync engine and the `itemsync` CLI.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Items and the row-based list contract the engine drives
//! - [`sync`] - Directory scanning, saving, watching and tab lifecycle
//! - [`config`] - Configuration directory and synchronization settings
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod sync;

pub use error::{Error, Result};
