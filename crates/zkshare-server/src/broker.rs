//! Token broker: issues token pairs and releases each secret share once.
//!
//! The broker is the only component that sees both halves of a token. It
//! never sees a PIN, an envelope or a secret.
//!
//! # Invariants
//!
//! - Both halves come from the environment's CSPRNG, [`ID_BYTES`] each
//! - A lookup id is never issued twice while its record (live or tombstoned)
//!   exists; collisions are re-rolled
//! - `consume` succeeds at most once per token, and never after expiry
//! - Unknown, consumed and expired tokens are indistinguishable to callers

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use zkshare_core::{BrokerClient, Environment, IssuedToken, ShareError};
use zkshare_proto::{ID_BYTES, LookupId, SecretShare};

use crate::storage::{LookupKey, ShareToken, StorageError, TokenStore};

/// Tracing target for redemption audit events.
pub const AUDIT_TARGET: &str = "zkshare::audit";

/// How many fresh lookup ids to try before giving up on a collision streak.
const MAX_ID_ATTEMPTS: usize = 8;

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// TTL applied when the caller does not ask for one
    pub default_ttl: Duration,
    /// Largest TTL a caller may ask for
    pub max_ttl: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(24 * 3600),
            max_ttl: Duration::from_secs(720 * 3600),
        }
    }
}

/// Errors from broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Token is unknown, consumed or expired.
    #[error("token not found")]
    NotFound,

    /// Requested TTL is zero or above the configured maximum.
    #[error("ttl must be between 1 and {max_secs} seconds, got {requested_secs}")]
    InvalidTtl {
        /// Requested TTL in whole seconds
        requested_secs: u64,
        /// Configured maximum in seconds
        max_secs: u64,
    },

    /// Every generated lookup id collided with an existing record.
    #[error("could not allocate a unique lookup id")]
    IdExhausted,

    /// Underlying store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<BrokerError> for ShareError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::NotFound => ShareError::TokenNotFound,
            BrokerError::InvalidTtl { .. } => ShareError::BrokerRejected(err.to_string()),
            BrokerError::IdExhausted | BrokerError::Storage(_) => {
                ShareError::BrokerUnavailable(err.to_string())
            },
        }
    }
}

/// Issues and redeems share tokens over a [`TokenStore`].
pub struct TokenBroker<E: Environment, S: TokenStore> {
    env: E,
    store: S,
    config: BrokerConfig,
}

impl<E: Environment, S: TokenStore> TokenBroker<E, S> {
    /// Create a broker over `store`.
    pub fn new(env: E, store: S, config: BrokerConfig) -> Self {
        Self { env, store, config }
    }

    /// Broker configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// The environment supplying time and randomness.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply the default and bounds to a requested TTL.
    pub fn resolve_ttl(&self, ttl: Option<Duration>) -> Result<Duration, BrokerError> {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let requested_secs = ttl.as_secs();
        let max_secs = self.config.max_ttl.as_secs();

        if requested_secs == 0 || requested_secs > max_secs {
            return Err(BrokerError::InvalidTtl { requested_secs, max_secs });
        }
        Ok(Duration::from_secs(requested_secs))
    }

    /// `CreateToken(ttl) -> (secretShare, lookupId)`.
    pub fn create_token(&self, ttl: Option<Duration>) -> Result<IssuedToken, BrokerError> {
        let ttl = self.resolve_ttl(ttl)?;
        let now = self.env.wall_clock_secs();
        let expires_at_secs = now.saturating_add(ttl.as_secs());

        let secret_share = SecretShare::from_bytes(&self.env.random_array::<ID_BYTES>());
        let token = ShareToken::live(secret_share.clone(), now, expires_at_secs);

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let lookup_id = LookupId::from_bytes(&self.env.random_array::<ID_BYTES>());
            let key = LookupKey::from_lookup_id(&lookup_id);

            if self.store.insert_new(&key, &token)? {
                tracing::debug!(lookup_key = %key, expires_at_secs, "issued token");
                return Ok(IssuedToken { lookup_id, secret_share, expires_at_secs });
            }

            tracing::warn!(attempt, "lookup id collision, re-rolling");
        }

        Err(BrokerError::IdExhausted)
    }

    /// `Consume(lookupId) -> secretShare | NotFound`.
    ///
    /// Every attempt is written to the [`AUDIT_TARGET`] log with the hashed
    /// key; the share and the raw id are never logged.
    pub fn consume(&self, lookup_id: &LookupId) -> Result<SecretShare, BrokerError> {
        let key = LookupKey::from_lookup_id(lookup_id);
        let now = self.env.wall_clock_secs();

        match self.store.consume(&key, now) {
            Ok(Some(share)) => {
                tracing::info!(target: AUDIT_TARGET, lookup_key = %key, outcome = "released", "redemption");
                Ok(share)
            },
            Ok(None) => {
                tracing::info!(target: AUDIT_TARGET, lookup_key = %key, outcome = "absent", "redemption");
                Err(BrokerError::NotFound)
            },
            Err(err) => {
                tracing::warn!(target: AUDIT_TARGET, lookup_key = %key, outcome = "error", error = %err, "redemption");
                Err(err.into())
            },
        }
    }

    /// Drop every expired record, live or tombstoned.
    pub fn sweep_expired(&self) -> Result<usize, BrokerError> {
        let removed = self.store.sweep_expired(self.env.wall_clock_secs())?;
        if removed > 0 {
            tracing::debug!(removed, "swept expired tokens");
        }
        Ok(removed)
    }

    /// Records currently held, tombstones included.
    pub fn record_count(&self) -> Result<usize, BrokerError> {
        Ok(self.store.token_count()?)
    }
}

#[async_trait]
impl<E: Environment, S: TokenStore> BrokerClient for TokenBroker<E, S> {
    async fn issue_token(&self, ttl: Option<Duration>) -> Result<IssuedToken, ShareError> {
        Ok(self.create_token(ttl)?)
    }

    async fn redeem_token(&self, lookup_id: &LookupId) -> Result<SecretShare, ShareError> {
        Ok(self.consume(lookup_id)?)
    }
}
