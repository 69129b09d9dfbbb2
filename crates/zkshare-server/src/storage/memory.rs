#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use zkshare_proto::SecretShare;

use super::{LookupKey, ShareToken, StorageError, TokenStore};

/// In-memory token store for tests, simulation and single-process deployments
///
/// All records sit behind one `Arc<Mutex<_>>`, so every operation is a single
/// critical section and clones share state. A poisoned lock surfaces as
/// [`StorageError::Poisoned`] rather than a panic. Records do not survive a
/// restart; use [`super::RedbStore`] for that.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tokens: Arc<Mutex<HashMap<LookupKey, ShareToken>>>,
}

impl MemoryStore {
    /// Create a new empty `MemoryStore`
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the record under `key`, for inspecting state in tests.
    pub fn get(&self, key: &LookupKey) -> Result<Option<ShareToken>, StorageError> {
        let tokens = self.tokens.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(tokens.get(key).cloned())
    }
}

impl TokenStore for MemoryStore {
    fn insert_new(&self, key: &LookupKey, token: &ShareToken) -> Result<bool, StorageError> {
        let mut tokens = self.tokens.lock().map_err(|_| StorageError::Poisoned)?;

        if tokens.contains_key(key) {
            return Ok(false);
        }
        tokens.insert(key.clone(), token.clone());
        Ok(true)
    }

    fn consume(
        &self,
        key: &LookupKey,
        now_secs: u64,
    ) -> Result<Option<SecretShare>, StorageError> {
        let mut tokens = self.tokens.lock().map_err(|_| StorageError::Poisoned)?;

        Ok(tokens.get_mut(key).and_then(|token| token.take_share(now_secs)))
    }

    fn sweep_expired(&self, now_secs: u64) -> Result<usize, StorageError> {
        let mut tokens = self.tokens.lock().map_err(|_| StorageError::Poisoned)?;

        let before = tokens.len();
        tokens.retain(|_, token| !token.is_expired(now_secs));
        Ok(before - tokens.len())
    }

    fn token_count(&self) -> Result<usize, StorageError> {
        Ok(self.tokens.lock().map_err(|_| StorageError::Poisoned)?.len())
    }
}

#[cfg(test)]
mod tests {
    use zkshare_proto::{ID_BYTES, LookupId};

    use super::*;
    use crate::storage::TokenState;

    fn key(seed: u8) -> LookupKey {
        LookupKey::from_lookup_id(&LookupId::from_bytes(&[seed; ID_BYTES]))
    }

    fn token(expires_at_secs: u64) -> ShareToken {
        ShareToken::live(SecretShare::from_bytes(&[9; ID_BYTES]), 0, expires_at_secs)
    }

    #[test]
    fn insert_new_refuses_existing_key() {
        let store = MemoryStore::new();

        assert!(store.insert_new(&key(1), &token(100)).unwrap());
        assert!(!store.insert_new(&key(1), &token(200)).unwrap());
        assert_eq!(store.get(&key(1)).unwrap().unwrap().expires_at_secs, 100);
    }

    #[test]
    fn consume_flips_to_tombstone() {
        let store = MemoryStore::new();
        store.insert_new(&key(1), &token(100)).unwrap();

        assert!(store.consume(&key(1), 10).unwrap().is_some());
        assert_eq!(store.get(&key(1)).unwrap().unwrap().state, TokenState::Consumed);
        assert!(store.consume(&key(1), 10).unwrap().is_none());
    }

    #[test]
    fn tombstone_blocks_reinsert_until_swept() {
        let store = MemoryStore::new();
        store.insert_new(&key(1), &token(100)).unwrap();
        store.consume(&key(1), 10).unwrap();

        assert!(!store.insert_new(&key(1), &token(500)).unwrap());

        assert_eq!(store.sweep_expired(100).unwrap(), 1);
        assert_eq!(store.token_count().unwrap(), 0);
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryStore::new();
        let clone = store.clone();

        store.insert_new(&key(3), &token(100)).unwrap();
        assert!(clone.consume(&key(3), 0).unwrap().is_some());
        assert!(store.consume(&key(3), 0).unwrap().is_none());
    }
}
