//! Crypto error types.

use thiserror::Error;

/// Errors produced while opening an envelope.
///
/// There is deliberately a single variant: a wrong key (wrong PIN) and a
/// corrupted or tampered envelope must be indistinguishable to the caller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// The authentication tag did not verify under the supplied key.
    #[error("authentication failed")]
    AuthenticationFailed,
}
