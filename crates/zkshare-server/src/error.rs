//! Server error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur in the server runtime.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error (invalid bind address, inconsistent TTLs, etc.).
    ///
    /// Fatal; prevents startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (bind failure, accept failure, etc.).
    #[error("transport error: {0}")]
    Transport(String),

    /// Token store could not be opened or failed at startup.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
