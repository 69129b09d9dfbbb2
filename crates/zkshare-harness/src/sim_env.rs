//! Virtual-time environment with a seeded RNG.
//!
//! Time only moves when a test calls [`SimEnv::advance`]. Sleepers (the
//! expiry sweeper) wake once the virtual clock reaches their deadline, so a
//! test controls exactly when expiry and sweeping happen.

#![allow(clippy::disallowed_types, reason = "Clock and RNG are never held across await")]

use std::{
    ops::Sub,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tokio::sync::Notify;
use zkshare_core::Environment;

/// Wall-clock origin of every simulation (2024-01-01T00:00:00Z).
pub const SIM_EPOCH_SECS: u64 = 1_704_067_200;

/// Instant on the virtual clock, measured from simulation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

struct Inner {
    elapsed: Mutex<Duration>,
    rng: Mutex<ChaCha20Rng>,
    ticked: Notify,
}

impl Inner {
    fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Deterministic [`Environment`] for tests.
///
/// Clones share the same clock and RNG. Two environments built from the same
/// seed produce the same identifiers, shares and nonces.
#[derive(Clone)]
pub struct SimEnv {
    inner: Arc<Inner>,
}

impl SimEnv {
    /// Environment seeded with `0`.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment with a specific RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                elapsed: Mutex::new(Duration::ZERO),
                rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
                ticked: Notify::new(),
            }),
        }
    }

    /// Move the virtual clock forward and wake sleepers whose deadline passed.
    pub fn advance(&self, by: Duration) {
        {
            let mut elapsed = self.inner.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
            *elapsed = elapsed.saturating_add(by);
        }
        self.inner.ticked.notify_waiters();
    }

    /// Virtual time since the simulation started.
    pub fn elapsed(&self) -> Duration {
        self.inner.elapsed()
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("elapsed", &self.elapsed()).finish_non_exhaustive()
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.inner.elapsed())
    }

    fn wall_clock_secs(&self) -> u64 {
        SIM_EPOCH_SECS + self.inner.elapsed().as_secs()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        let inner = Arc::clone(&self.inner);
        let deadline = inner.elapsed().saturating_add(duration);
        async move {
            loop {
                // Registered before the check so an advance in between is not missed.
                let ticked = inner.ticked.notified();
                if inner.elapsed() >= deadline {
                    return;
                }
                ticked.await;
            }
        }
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.inner.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
