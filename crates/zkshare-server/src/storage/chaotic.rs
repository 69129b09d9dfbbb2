//! Fault-injecting store wrapper for chaos tests.
//!
//! Failures come in two flavours. A failure *before* the inner call leaves the
//! store untouched. A failure *after* the inner call models a lost reply: the
//! operation took effect but the caller sees an error. The latter is the
//! indeterminate redemption the protocol must treat as consumed.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use zkshare_proto::SecretShare;

use super::{LookupKey, ShareToken, StorageError, TokenStore};

/// Store wrapper that randomly fails operations
///
/// Deterministic for a given seed. Clones share the RNG and counters.
#[derive(Clone)]
pub struct ChaoticStore<S: TokenStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<SplitMix64>>,
    injected: Arc<Mutex<usize>>,
}

/// Where an injected fault lands relative to the inner call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    None,
    Before,
    After,
}

struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in [0.0, 1.0)
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

impl<S: TokenStore> ChaoticStore<S> {
    /// Wrap `inner`, failing each operation with probability `failure_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    #[allow(clippy::panic)]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(SplitMix64 { state: seed })),
            injected: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of faults injected so far.
    pub fn injected_faults(&self) -> usize {
        self.injected.lock().map_or(0, |count| *count)
    }

    fn roll(&self) -> Result<Fault, StorageError> {
        let mut rng = self.rng.lock().map_err(|_| StorageError::Poisoned)?;
        if rng.next_f64() >= self.failure_rate {
            return Ok(Fault::None);
        }
        let fault = if rng.next_u64() & 1 == 0 { Fault::Before } else { Fault::After };
        drop(rng);

        *self.injected.lock().map_err(|_| StorageError::Poisoned)? += 1;
        Ok(fault)
    }

    fn run<T>(
        &self,
        op: &str,
        call: impl FnOnce(&S) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        match self.roll()? {
            Fault::None => call(&self.inner),
            Fault::Before => Err(StorageError::Io(format!("injected fault before {op}"))),
            Fault::After => {
                call(&self.inner)?;
                Err(StorageError::Io(format!("injected fault after {op}")))
            },
        }
    }
}

impl<S: TokenStore> TokenStore for ChaoticStore<S> {
    fn insert_new(&self, key: &LookupKey, token: &ShareToken) -> Result<bool, StorageError> {
        self.run("insert_new", |inner| inner.insert_new(key, token))
    }

    fn consume(
        &self,
        key: &LookupKey,
        now_secs: u64,
    ) -> Result<Option<SecretShare>, StorageError> {
        self.run("consume", |inner| inner.consume(key, now_secs))
    }

    fn sweep_expired(&self, now_secs: u64) -> Result<usize, StorageError> {
        self.run("sweep_expired", |inner| inner.sweep_expired(now_secs))
    }

    fn token_count(&self) -> Result<usize, StorageError> {
        self.inner.token_count()
    }
}
