//! Error types for shelf-core

use thiserror::Error;

/// Result type alias using shelf-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the local record store and the coordinator.
///
/// Remote failures never appear here; see [`crate::remote::RemoteError`].
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error came from the local store itself rather than from
    /// caller input.
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Sqlite(_) | Self::Io(_))
    }
}
