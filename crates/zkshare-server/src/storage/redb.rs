//! Redb-backed durable token store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Every
//! mutating operation is exactly one write transaction; Redb serializes write
//! transactions, which is what makes `consume` atomic across threads.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use zeroize::Zeroize;
use zkshare_proto::SecretShare;

use super::{LookupKey, ShareToken, StorageError, TokenStore};

/// Table: tokens
/// Key: lowercase hex SHA-256 of the lookup id [64 chars]
/// Value: CBOR-encoded ShareToken
const TOKENS: TableDefinition<&str, &[u8]> = TableDefinition::new("tokens");

/// Durable token store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a Redb database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(TOKENS).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl TokenStore for RedbStore {
    fn insert_new(&self, key: &LookupKey, token: &ShareToken) -> Result<bool, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        {
            let mut table = txn.open_table(TOKENS).map_err(io)?;

            if table.get(key.as_str()).map_err(io)?.is_some() {
                drop(table);
                txn.abort().map_err(io)?;
                return Ok(false);
            }

            let mut bytes = encode_token(token)?;
            let inserted = table.insert(key.as_str(), bytes.as_slice()).map(|_| ()).map_err(io);
            bytes.zeroize();
            inserted?;
        }

        txn.commit().map_err(io)?;

        Ok(true)
    }

    fn consume(
        &self,
        key: &LookupKey,
        now_secs: u64,
    ) -> Result<Option<SecretShare>, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        let released = {
            let mut table = txn.open_table(TOKENS).map_err(io)?;

            let stored = match table.get(key.as_str()).map_err(io)? {
                Some(value) => Some(decode_token(value.value())?),
                None => None,
            };

            match stored {
                Some(mut token) => match token.take_share(now_secs) {
                    Some(share) => {
                        let bytes = encode_token(&token)?;
                        table.insert(key.as_str(), bytes.as_slice()).map_err(io)?;
                        Some(share)
                    },
                    None => None,
                },
                None => None,
            }
        };

        match released {
            Some(share) => {
                txn.commit().map_err(io)?;
                Ok(Some(share))
            },
            None => {
                txn.abort().map_err(io)?;
                Ok(None)
            },
        }
    }

    fn sweep_expired(&self, now_secs: u64) -> Result<usize, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        let removed = {
            let mut table = txn.open_table(TOKENS).map_err(io)?;

            let mut expired = Vec::new();
            for entry in table.iter().map_err(io)? {
                let (key, value) = entry.map_err(io)?;
                if decode_token(value.value())?.is_expired(now_secs) {
                    expired.push(key.value().to_string());
                }
            }

            for key in &expired {
                table.remove(key.as_str()).map_err(io)?;
            }

            expired.len()
        };

        txn.commit().map_err(io)?;

        Ok(removed)
    }

    fn token_count(&self) -> Result<usize, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(TOKENS).map_err(io)?;

        let len = table.len().map_err(io)?;
        Ok(len as usize)
    }
}

fn io(err: impl std::fmt::Display) -> StorageError {
    StorageError::Io(err.to_string())
}

fn encode_token(token: &ShareToken) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(token, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode_token(bytes: &[u8]) -> Result<ShareToken, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}
