//! Per-client fixed-window rate limiting.
//!
//! Each client IP gets `max_requests` per window. The window starts with the
//! client's first request and resets once it has fully elapsed. Time is passed
//! in by the caller so that tests can drive it from a virtual clock.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Mutex, PoisonError},
    time::Duration,
};

/// Rate limit configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per client per window. Zero disables limiting.
    pub max_requests: u32,
    /// Window length. Anything under one second disables limiting.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_requests: 10, window: Duration::from_secs(3600) }
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request may proceed.
    Allowed {
        /// Requests left in the current window
        remaining: u32,
    },
    /// Request must be refused.
    Limited {
        /// Seconds until the window resets
        retry_after_secs: u64,
    },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at_secs: u64,
    count: u32,
}

/// Fixed-window counter keyed by client IP.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    /// Create a limiter with no recorded clients.
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, windows: Mutex::new(HashMap::new()) }
    }

    /// Limiter configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Whether every request is allowed without being counted.
    pub fn is_disabled(&self) -> bool {
        self.config.max_requests == 0 || self.config.window.as_secs() == 0
    }

    /// Count a request from `client` at `now_secs`.
    pub fn check(&self, client: IpAddr, now_secs: u64) -> RateDecision {
        if self.is_disabled() {
            return RateDecision::Allowed { remaining: u32::MAX };
        }
        let max = self.config.max_requests;
        let window_secs = self.config.window.as_secs();

        // A window is updated in place, so a poisoned lock is still consistent.
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window =
            windows.entry(client).or_insert(Window { started_at_secs: now_secs, count: 0 });

        if now_secs >= window.started_at_secs.saturating_add(window_secs) {
            *window = Window { started_at_secs: now_secs, count: 0 };
        }

        if window.count >= max {
            let resets_at = window.started_at_secs.saturating_add(window_secs);
            return RateDecision::Limited { retry_after_secs: resets_at.saturating_sub(now_secs) };
        }

        window.count += 1;
        RateDecision::Allowed { remaining: max - window.count }
    }

    /// Forget clients whose window has elapsed. Returns how many were dropped.
    pub fn prune(&self, now_secs: u64) -> usize {
        let window_secs = self.config.window.as_secs();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        let before = windows.len();
        windows.retain(|_, w| now_secs < w.started_at_secs.saturating_add(window_secs));
        before - windows.len()
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
