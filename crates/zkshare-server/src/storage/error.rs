//! Storage error types.
//!
//! - `Serialization`: a stored record could not be encoded or decoded
//! - `Io`: the underlying database failed
//! - `Poisoned`: a thread panicked while holding the in-memory lock

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (file system, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// In-memory state lock was poisoned
    #[error("storage lock poisoned")]
    Poisoned,
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
