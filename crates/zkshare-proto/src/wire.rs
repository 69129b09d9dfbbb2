//! JSON bodies of the broker request/response exchange.
//!
//! Field names follow the original HTTP API so existing clients keep working:
//! `POST /api/tokens` takes an [`IssueTokenRequest`], `POST /api/redeem` takes
//! a [`RedeemTokenRequest`].

use serde::{Deserialize, Serialize};

use crate::ids::{LookupId, SecretShare};

/// `IssueToken(ttl?)`.
///
/// `ttl_secs` takes precedence over `ttl_hours`; when both are absent the
/// broker applies its configured default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTokenRequest {
    /// Time-to-live in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_hours: Option<u32>,
    /// Time-to-live in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

/// Freshly issued token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTokenResponse {
    /// Public half, goes into the link
    pub lookup_id: LookupId,
    /// Custodied half, used for key derivation and then discarded
    pub secret_share: SecretShare,
    /// Expiry as Unix seconds
    pub expires_at: u64,
}

/// `RedeemToken(lookupId)`.
///
/// The id stays a plain string so that malformed ids reach the broker's
/// uniform not-found path instead of a distinct decoding error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemTokenRequest {
    /// Lookup id taken from the link
    pub lookup_id: String,
}

/// Successful redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemTokenResponse {
    /// The released secret share
    pub secret_share: SecretShare,
}

/// Error body for non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message. Never distinguishes why a token is absent.
    pub error: String,
    /// Optional retry-after duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorResponse {
    /// Error body without a retry hint.
    pub fn new(message: impl Into<String>) -> Self {
        Self { error: message.into(), retry_after: None }
    }
}
