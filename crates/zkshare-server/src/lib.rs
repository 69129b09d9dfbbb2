//! zkshare token broker server.
//!
//! Issues token pairs and releases each secret share exactly once, over HTTP.
//! The broker never sees PINs, envelopes or secrets; those stay with the
//! clients (see [`zkshare_core::ShareLinkProtocol`]).
//!
//! # Architecture
//!
//! [`TokenBroker`] holds the token lifecycle logic over a synchronous
//! [`TokenStore`]. [`http::router`] exposes it through axum, [`sweeper`]
//! reclaims expired records, and [`Server`] wires everything to a TCP
//! listener.
//!
//! # Components
//!
//! - [`TokenBroker`]: `CreateToken` / `Consume` / sweep
//! - [`MemoryStore`] / [`RedbStore`]: token storage
//! - [`RateLimiter`]: per-client fixed-window limits
//! - [`Server`]: production runtime

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broker;
mod error;
pub mod http;
pub mod rate_limit;
pub mod storage;
pub mod sweeper;

use std::{future::Future, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

pub use broker::{AUDIT_TARGET, BrokerConfig, BrokerError, TokenBroker};
pub use error::ServerError;
pub use http::HttpConfig;
pub use rate_limit::{RateDecision, RateLimitConfig, RateLimiter};
pub use storage::{ChaoticStore, LookupKey, MemoryStore, RedbStore, StorageError, TokenStore};
use tokio::net::TcpListener;
use zkshare_core::{Environment, SystemEnv};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:3001")
    pub bind_address: String,
    /// Redb database path. `None` keeps tokens in memory only.
    pub db_path: Option<PathBuf>,
    /// Token TTL defaults and bounds
    pub broker: BrokerConfig,
    /// Per-client request limits
    pub rate_limit: RateLimitConfig,
    /// Body limit, timeout, client IP resolution
    pub http: HttpConfig,
    /// How often expired tokens are reclaimed
    pub sweep_interval: Duration,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            db_path: None,
            broker: BrokerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            http: HttpConfig::default(),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl ServerRuntimeConfig {
    /// Reject configurations the broker cannot honour.
    pub fn validate(&self) -> Result<(), ServerError> {
        let default_secs = self.broker.default_ttl.as_secs();
        let max_secs = self.broker.max_ttl.as_secs();

        if default_secs == 0 || default_secs > max_secs {
            return Err(ServerError::Config(format!(
                "default ttl ({default_secs}s) must be between 1s and the max ttl ({max_secs}s)"
            )));
        }
        if self.sweep_interval.is_zero() {
            return Err(ServerError::Config("sweep interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Production zkshare broker server.
///
/// Wraps a [`TokenBroker`] with the HTTP router, the expiry sweeper and a
/// bound TCP listener.
pub struct Server<E: Environment, S: TokenStore> {
    broker: Arc<TokenBroker<E, S>>,
    limiter: Arc<RateLimiter>,
    listener: TcpListener,
    http: HttpConfig,
    sweep_interval: Duration,
}

impl<S: TokenStore> Server<SystemEnv, S> {
    /// Create and bind a new server over `store` with the system environment.
    pub async fn bind(config: ServerRuntimeConfig, store: S) -> Result<Self, ServerError> {
        Self::bind_with_env(config, SystemEnv::new(), store).await
    }
}

impl<E: Environment, S: TokenStore> Server<E, S> {
    /// Create and bind a new server with an explicit environment.
    pub async fn bind_with_env(
        config: ServerRuntimeConfig,
        env: E,
        store: S,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
            ServerError::Transport(format!("failed to bind {}: {e}", config.bind_address))
        })?;

        Ok(Self {
            broker: Arc::new(TokenBroker::new(env, store, config.broker)),
            limiter: Arc::new(RateLimiter::new(config.rate_limit)),
            listener,
            http: config.http,
            sweep_interval: config.sweep_interval,
        })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// The broker served by this server.
    pub fn broker(&self) -> &Arc<TokenBroker<E, S>> {
        &self.broker
    }

    /// Run the server until Ctrl-C.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Run the server until `shutdown` resolves, then drain in-flight
    /// requests.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.local_addr()?);

        let sweeper = sweeper::spawn_sweeper(
            Arc::clone(&self.broker),
            Arc::clone(&self.limiter),
            self.sweep_interval,
        );

        let app = http::router(self.broker, self.limiter, &self.http);
        let served = axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        sweeper.abort();
        tracing::info!("Server stopped");

        served.map_err(|e| ServerError::Transport(e.to_string()))
    }
}
