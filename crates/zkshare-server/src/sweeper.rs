//! Background expiry sweep.
//!
//! Expired tokens are already unredeemable the moment their deadline passes;
//! the sweep only reclaims their storage (and stale rate limit windows).

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use zkshare_core::Environment;

use crate::{broker::TokenBroker, rate_limit::RateLimiter, storage::TokenStore};

/// Run one sweep pass. Returns the number of token records removed.
pub fn sweep_once<E: Environment, S: TokenStore>(
    broker: &TokenBroker<E, S>,
    limiter: &RateLimiter,
) -> usize {
    let started = broker.env().now();
    let now = broker.env().wall_clock_secs();
    let pruned = limiter.prune(now);
    if pruned > 0 {
        tracing::trace!(pruned, "pruned rate limit windows");
    }

    let removed = match broker.sweep_expired() {
        Ok(removed) => removed,
        Err(err) => {
            tracing::warn!(error = %err, "expiry sweep failed, retrying next interval");
            0
        },
    };

    let took = broker.env().now() - started;
    tracing::debug!(removed, ?took, "expiry sweep finished");
    removed
}

/// Spawn a task that sweeps every `interval` until aborted.
pub fn spawn_sweeper<E: Environment, S: TokenStore>(
    broker: Arc<TokenBroker<E, S>>,
    limiter: Arc<RateLimiter>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            broker.env().sleep(interval).await;

            let sweep_broker = Arc::clone(&broker);
            let sweep_limiter = Arc::clone(&limiter);
            let swept =
                tokio::task::spawn_blocking(move || sweep_once(&sweep_broker, &sweep_limiter))
                    .await;

            if let Err(err) = swept {
                tracing::error!(error = %err, "expiry sweep task panicked");
            }
        }
    })
}
