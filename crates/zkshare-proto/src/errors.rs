//! Link decoding errors.

use thiserror::Error;

/// Reasons a link, identifier or envelope string failed to decode.
///
/// These describe the *shape* of the input only. They never depend on broker
/// state, so reporting them in detail leaks nothing about issued tokens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// A required query parameter is absent or empty.
    #[error("missing link parameter: {0}")]
    MissingParameter(&'static str),

    /// A query parameter appears more than once.
    #[error("duplicate link parameter: {0}")]
    DuplicateParameter(&'static str),

    /// A parameter value is not valid percent-encoding.
    #[error("invalid percent-encoding in link")]
    InvalidEncoding,

    /// An identifier is not 32 bytes of base64url.
    #[error("invalid identifier")]
    InvalidIdentifier,

    /// The envelope component could not be decoded.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(&'static str),
}
