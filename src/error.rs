//! Error types for the itemsync CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (3=not_found, 4=validation, 6=sync, etc.)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

use crate::sync::SyncError;

/// Result type alias for itemsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Not Found (exit 3)
    TabNotConfigured,
    ItemNotFound,

    // Validation (exit 4)
    InvalidArgument,

    // Sync (exit 6)
    SyncError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::TabNotConfigured => "TAB_NOT_CONFIGURED",
            Self::ItemNotFound => "ITEM_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::TabNotConfigured | Self::ItemNotFound => 3,
            Self::InvalidArgument => 4,
            Self::SyncError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying can succeed.
    ///
    /// True for bad input and for sync failures, which usually clear once
    /// the directory is writable again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidArgument | Self::SyncError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in itemsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Tab is not synchronized with a directory: {tab}")]
    TabNotConfigured { tab: String },

    #[error("Item not found in tab {tab}: {name}")]
    ItemNotFound { tab: String, name: String },

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::TabNotConfigured { .. } => ErrorCode::TabNotConfigured,
            Self::ItemNotFound { .. } => ErrorCode::ItemNotFound,
            Self::Sync(_) => ErrorCode::SyncError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::TabNotConfigured { tab } => Some(format!(
                "Synchronize it first: itemsync tab set {tab} <directory>"
            )),

            Self::ItemNotFound { tab, .. } => Some(format!(
                "Use `itemsync list {tab}` to see the items of this tab."
            )),

            Self::Sync(SyncError::TargetExists { path }) => Some(format!(
                "Move or delete {} and retry.",
                path.display()
            )),

            Self::Sync(SyncError::NameExhausted { dir }) => Some(format!(
                "Too many items share one name in {}. Rename some of them.",
                dir.display()
            )),

            Self::Sync(SyncError::CreateDir { path, .. } | SyncError::ReadDir { path, .. }) => {
                Some(format!("Check that {} is a writable directory.", path.display()))
            }

            Self::Config(_) => Some(format!(
                "Pass --config-dir or set {} to a writable directory.",
                crate::config::CONFIG_DIR_ENV
            )),

            Self::Sync(_) | Self::Io(_) | Self::Json(_) | Self::InvalidArgument(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes_by_category() {
        let err = Error::TabNotConfigured { tab: "notes".into() };
        assert_eq!(err.exit_code(), 3);

        let err = Error::Sync(SyncError::NameExhausted {
            dir: PathBuf::from("/tmp/notes"),
        });
        assert_eq!(err.exit_code(), 6);
        assert!(err.error_code().is_retryable());
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::TabNotConfigured { tab: "notes".into() };
        let json = err.to_structured_json();

        assert_eq!(json["error"]["code"], "TAB_NOT_CONFIGURED");
        assert_eq!(json["error"]["exit_code"], 3);
        assert!(json["error"]["hint"].as_str().unwrap().contains("tab set notes"));
    }

    #[test]
    fn test_structured_json_without_hint() {
        let err = Error::Other("boom".into());
        let json = err.to_structured_json();

        assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
        assert!(json["error"].get("hint").is_none());
    }
}
