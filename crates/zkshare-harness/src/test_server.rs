//! In-process broker server on a loopback port.
//!
//! `TestServer` runs the real [`zkshare_server::Server`] (router, rate
//! limiter, sweeper) over a [`SimEnv`], so HTTP tests exercise the
//! production stack while the test owns the clock.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{sync::oneshot, task::JoinHandle};
use zkshare_server::{
    MemoryStore, RateLimitConfig, Server, ServerError, ServerRuntimeConfig, TokenBroker,
    TokenStore,
};

use crate::SimEnv;

/// A running broker server. Shuts down when dropped.
pub struct TestServer<S: TokenStore = MemoryStore> {
    addr: SocketAddr,
    env: SimEnv,
    broker: Arc<TokenBroker<SimEnv, S>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
}

impl TestServer<MemoryStore> {
    /// In-memory server with rate limiting disabled.
    pub async fn start(env: SimEnv) -> Result<Self, ServerError> {
        let config = ServerRuntimeConfig {
            rate_limit: RateLimitConfig { max_requests: 0, ..RateLimitConfig::default() },
            ..Self::loopback_config()
        };
        Self::start_with(config, env, MemoryStore::new()).await
    }
}

impl<S: TokenStore> TestServer<S> {
    /// Default runtime configuration bound to an ephemeral loopback port.
    pub fn loopback_config() -> ServerRuntimeConfig {
        ServerRuntimeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            sweep_interval: Duration::from_secs(60),
            ..ServerRuntimeConfig::default()
        }
    }

    /// Start a server with explicit configuration and store.
    ///
    /// `config.bind_address` should be a loopback address with port `0`.
    pub async fn start_with(
        config: ServerRuntimeConfig,
        env: SimEnv,
        store: S,
    ) -> Result<Self, ServerError> {
        let server = Server::bind_with_env(config, env.clone(), store).await?;
        let addr = server.local_addr()?;
        let broker = Arc::clone(server.broker());

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async move {
            let _ = signal.await;
        }));

        tracing::debug!(%addr, "test server started");
        Ok(Self { addr, env, broker, shutdown: Some(shutdown), task: Some(task) })
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The simulation environment driving the server.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// The broker behind the HTTP routes.
    pub fn broker(&self) -> &Arc<TokenBroker<SimEnv, S>> {
        &self.broker
    }

    /// Stop accepting requests and wait for the server to drain.
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.take() {
            Some(task) => task.await.map_err(|e| ServerError::Transport(e.to_string()))?,
            None => Ok(()),
        }
    }
}

impl<S: TokenStore> Drop for TestServer<S> {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
