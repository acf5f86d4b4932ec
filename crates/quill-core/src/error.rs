//! Error types for quill-core

use thiserror::Error;

/// Result type alias using quill-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quill-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The durable store cannot be opened or queried
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Post or queue entry not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network or HTTP failure talking to the server
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}
