//! Error types for reqtrail

use thiserror::Error;

/// Result type alias for reqtrail operations
pub type Result<T> = std::result::Result<T, TrailError>;

/// Main error type for the audit core
#[derive(Error, Debug)]
pub enum TrailError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Entry not found: {0}")]
    EntryNotFound(i64),

    #[error("Entry has not been saved yet")]
    UnsavedEntry,

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Payload codec error: {0}")]
    Codec(String),

    #[error("Storage lock poisoned: {0}")]
    Lock(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TrailError {
    /// Create a codec error
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Create a lock error
    pub fn lock(msg: impl Into<String>) -> Self {
        Self::Lock(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True when the error means the referenced entry row does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound(_))
    }
}
