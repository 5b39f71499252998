use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] shelf_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Record not found for id/prefix: {0}")]
    RecordNotFound(String),
    #[error("{0}")]
    AmbiguousRecordId(String),
    #[error("Invalid field assignment '{0}': expected KEY=VALUE")]
    InvalidFieldAssignment(String),
    #[error("Listing title cannot be empty")]
    EmptyTitle,
    #[error(
        "No remote store is configured. Set SHELF_REMOTE_URL or add remote_url to the shelf config file."
    )]
    RemoteNotConfigured,
}
