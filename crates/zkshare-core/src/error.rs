//! Protocol error taxonomy.
//!
//! Errors a caller of [`crate::ShareLinkProtocol`] can observe:
//! - `MalformedLink`: the link does not decode (broker never contacted)
//! - `TokenNotFound`: unknown, expired or already consumed, never which one
//! - `AuthenticationFailure`: wrong PIN or corrupted envelope, never which one
//! - `Validation`: caller input rejected before anything irreversible happens
//! - `BrokerUnavailable` / `BrokerRejected`: the broker could not be asked, or
//!   refused the request
//!
//! `TokenNotFound` and `AuthenticationFailure` are terminal for a link: the
//! right guidance is "request a new link", never "retry".

use thiserror::Error;
use zkshare_crypto::CryptoError;
use zkshare_proto::LinkError;

/// Invalid caller input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// PIN is not exactly six ASCII digits.
    #[error("PIN must be exactly {expected} digits")]
    InvalidPin {
        /// Required number of digits
        expected: usize,
    },

    /// Secret exceeds the configured maximum.
    #[error("secret is {len} bytes, maximum is {max}")]
    SecretTooLong {
        /// Actual length in bytes
        len: usize,
        /// Configured maximum in bytes
        max: usize,
    },

    /// A zero time-to-live would expire the token at birth.
    #[error("time-to-live must be at least one second")]
    ZeroTtl,

    /// Decrypted secret is not UTF-8 where text was expected.
    #[error("secret is not valid UTF-8")]
    NotUtf8,
}

/// Errors from the create and access flows.
#[derive(Debug, Error)]
pub enum ShareError {
    /// Link is missing the lookup id or envelope, or they do not decode.
    #[error("malformed link: {0}")]
    MalformedLink(#[from] LinkError),

    /// Token is unknown, expired or already used.
    #[error("this link has expired or has already been used")]
    TokenNotFound,

    /// Envelope did not authenticate (wrong PIN or corrupted link).
    #[error("could not decrypt: wrong PIN or corrupted link")]
    AuthenticationFailure,

    /// Caller input rejected.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Broker unreachable or the outcome of the request is unknown.
    ///
    /// For a redemption this is indeterminate: treat the link as consumed and
    /// do not retry automatically.
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// Broker refused the request (e.g. rate limited, TTL out of range).
    #[error("broker rejected request: {0}")]
    BrokerRejected(String),
}

impl From<CryptoError> for ShareError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailed => Self::AuthenticationFailure,
        }
    }
}

impl ShareError {
    /// Whether the link can never succeed again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TokenNotFound | Self::AuthenticationFailure | Self::MalformedLink(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absence_message_does_not_distinguish_causes() {
        let message = ShareError::TokenNotFound.to_string();

        assert!(message.contains("expired or has already been used"));
        assert!(!message.contains("unknown"));
    }

    #[test]
    fn crypto_failure_maps_to_authentication_failure() {
        let err = ShareError::from(CryptoError::AuthenticationFailed);
        assert!(matches!(err, ShareError::AuthenticationFailure));
    }

    #[test]
    fn terminal_errors() {
        assert!(ShareError::TokenNotFound.is_terminal());
        assert!(ShareError::AuthenticationFailure.is_terminal());
        assert!(!ShareError::BrokerUnavailable("timeout".into()).is_terminal());
        assert!(!ShareError::Validation(ValidationError::ZeroTtl).is_terminal());
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError::SecretTooLong { len: 1001, max: 1000 };
        assert_eq!(err.to_string(), "secret is 1001 bytes, maximum is 1000");

        let err = ValidationError::InvalidPin { expected: 6 };
        assert_eq!(err.to_string(), "PIN must be exactly 6 digits");
    }
}
