//! Token storage for the broker.
//!
//! Trait-based abstraction over the broker's only shared mutable state. The
//! trait is synchronous; every operation is a single critical section (a mutex
//! for [`MemoryStore`], a write transaction for [`RedbStore`]), which is what
//! makes `consume` exactly-once.
//!
//! Records are keyed by [`LookupKey`], the SHA-256 of the lookup id, never by
//! the id itself. A dump of the store therefore yields nothing redeemable.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStore;
pub use error::StorageError;
pub use memory::MemoryStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zkshare_proto::{LookupId, SecretShare};

pub use self::redb::RedbStore;

/// Storage key for a token: lowercase hex SHA-256 of the encoded lookup id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LookupKey(String);

impl LookupKey {
    /// Hash a lookup id into its storage key.
    pub fn from_lookup_id(lookup_id: &LookupId) -> Self {
        Self(hex::encode(Sha256::digest(lookup_id.as_str().as_bytes())))
    }

    /// Hex form, also used in audit logs.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LookupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a stored token.
///
/// ```text
/// Live ──consume──► Consumed ──expiry──► (swept)
///   └──────────────expiry───────────────► (swept)
/// ```
///
/// `Consumed` keeps the slot occupied until expiry so a lookup id can never be
/// re-issued while a link carrying it may still be presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenState {
    /// Redeemable; holds the share until it is released.
    Live {
        /// Share released by the single successful consume
        secret_share: SecretShare,
    },
    /// Share already released. Never redeemable again.
    Consumed,
}

/// A stored token record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareToken {
    /// Current lifecycle state
    pub state: TokenState,
    /// Unix timestamp (seconds) when the token was issued
    pub created_at_secs: u64,
    /// Unix timestamp (seconds) from which the token is absent
    pub expires_at_secs: u64,
}

impl ShareToken {
    /// A freshly issued, redeemable token.
    pub fn live(secret_share: SecretShare, created_at_secs: u64, expires_at_secs: u64) -> Self {
        Self { state: TokenState::Live { secret_share }, created_at_secs, expires_at_secs }
    }

    /// Whether the token is past its deadline at `now_secs`.
    pub fn is_expired(&self, now_secs: u64) -> bool {
        now_secs >= self.expires_at_secs
    }

    /// Take the share out, leaving a tombstone behind.
    ///
    /// Returns `None` when the token was already consumed or has expired. An
    /// expired token is never released, whatever its state.
    pub fn take_share(&mut self, now_secs: u64) -> Option<SecretShare> {
        if self.is_expired(now_secs) {
            return None;
        }
        match std::mem::replace(&mut self.state, TokenState::Consumed) {
            TokenState::Live { secret_share } => Some(secret_share),
            TokenState::Consumed => None,
        }
    }
}

/// Storage for share tokens.
///
/// Must be Clone (shared between the HTTP handlers and the sweeper), Send +
/// Sync, and synchronous. Clones access the same underlying records.
///
/// # Invariants
///
/// - `consume` is atomic: for one key, concurrent calls release the share at
///   most once in total
/// - No operation ever returns the share of a consumed or expired record
/// - `insert_new` never overwrites an existing record, live or tombstoned
pub trait TokenStore: Clone + Send + Sync + 'static {
    /// Insert a record if `key` is unused.
    ///
    /// Returns `false` (and stores nothing) if a record already exists under
    /// `key`, so the caller can re-roll the identifier.
    fn insert_new(&self, key: &LookupKey, token: &ShareToken) -> Result<bool, StorageError>;

    /// Atomically release the share of a live, unexpired record.
    ///
    /// On success the record becomes a tombstone in the same critical
    /// section. Returns `None` for unknown, consumed or expired records
    /// without saying which.
    fn consume(&self, key: &LookupKey, now_secs: u64)
    -> Result<Option<SecretShare>, StorageError>;

    /// Remove every record whose deadline has passed. Returns how many were
    /// removed.
    fn sweep_expired(&self, now_secs: u64) -> Result<usize, StorageError>;

    /// Number of records held, tombstones included.
    fn token_count(&self) -> Result<usize, StorageError>;
}
