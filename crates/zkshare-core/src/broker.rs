//! The protocol's view of the token broker.
//!
//! The broker may live in-process or behind a network boundary. Either way the
//! protocol only ever needs the two operations below; it never sees the
//! broker's store.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use zkshare_proto::{LookupId, SecretShare};

use crate::error::ShareError;

/// A token pair as handed to the creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Public half, embedded in the link
    pub lookup_id: LookupId,
    /// Custodied half, used once for key derivation
    pub secret_share: SecretShare,
    /// Expiry as Unix seconds
    pub expires_at_secs: u64,
}

/// `IssueToken` / `RedeemToken` over whatever transport reaches the broker.
///
/// # Invariants
///
/// - `redeem_token` succeeds at most once per issued lookup id, across all
///   callers
/// - Every absence cause (unknown, expired, consumed) maps to
///   [`ShareError::TokenNotFound`]
/// - When the outcome of `redeem_token` is unknown (transport failure after
///   sending), implementations return [`ShareError::BrokerUnavailable`]
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Create a token. `None` selects the broker's default TTL.
    async fn issue_token(&self, ttl: Option<Duration>) -> Result<IssuedToken, ShareError>;

    /// Consume a token, releasing its secret share.
    async fn redeem_token(&self, lookup_id: &LookupId) -> Result<SecretShare, ShareError>;
}

#[async_trait]
impl<T: BrokerClient + ?Sized> BrokerClient for Arc<T> {
    async fn issue_token(&self, ttl: Option<Duration>) -> Result<IssuedToken, ShareError> {
        (**self).issue_token(ttl).await
    }

    async fn redeem_token(&self, lookup_id: &LookupId) -> Result<SecretShare, ShareError> {
        (**self).redeem_token(lookup_id).await
    }
}
