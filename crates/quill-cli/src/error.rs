use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] quill_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Post title cannot be empty")]
    EmptyTitle,
    #[error("Post not found in cache: {0}")]
    PostNotFound(i64),
    #[error("Operation not found or not failed: {0}")]
    OperationNotFound(i64),
    #[error("Nothing to change: no field flags were given")]
    NoChanges,
    #[error("The local store is unavailable; the change was not recorded")]
    StoreUnavailable,
    #[error("Interval must be at least one second")]
    InvalidInterval,
}
