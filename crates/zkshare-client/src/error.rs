//! Client error types.

use thiserror::Error;
use zkshare_core::ShareError;

/// Errors from client-side operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Create or access flow failed.
    #[error(transparent)]
    Share(#[from] ShareError),

    /// A `.env` line could not be parsed.
    #[error("line {line}: {reason}")]
    DotEnv {
        /// 1-based line number
        line: usize,
        /// What is wrong with it
        reason: String,
    },

    /// Broker URL is unusable.
    #[error("invalid broker url: {0}")]
    InvalidBrokerUrl(String),

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
