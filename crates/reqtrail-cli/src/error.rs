//! Error types for the reqtrail CLI
//!
//! Messages are user-facing and say what to do next where there is a clear
//! next step.

use reqtrail_core::TrailError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Exit code used when the wrapped program cannot be started
pub const EXIT_SPAWN_FAILED: i32 = 127;

#[derive(Error, Debug)]
pub enum CliError {
    /// Audit store operation failed
    #[error("Audit database error: {0}")]
    Store(#[from] TrailError),

    /// No database at the resolved path
    #[error("No audit database at '{0}'. Run 'reqtrail init' first.")]
    NotInitialized(String),

    #[error("Audit entry {0} not found. Use 'reqtrail list' to see recent entries.")]
    EntryNotFound(i64),

    /// The program given to `exec` could not be started
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Pass --database or set REQTRAIL_DATABASE.")]
    Config(String),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Spawn { .. } => EXIT_SPAWN_FAILED,
            _ => 1,
        }
    }
}
