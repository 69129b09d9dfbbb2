//! In-process world: broker and protocol wired directly, no network.

use std::{sync::Arc, time::Duration};

use zkshare_core::{CreatedLink, ProtocolConfig, ShareError, ShareLinkProtocol};
use zkshare_server::{BrokerConfig, MemoryStore, TokenBroker, TokenStore};

use crate::SimEnv;

/// Protocol talking to an in-process broker.
pub type SimProtocol<S> = ShareLinkProtocol<Arc<TokenBroker<SimEnv, S>>, SimEnv>;

/// A broker, a protocol endpoint and the clock they share.
///
/// Every party in the world sees the same virtual time, so expiry can be
/// driven with [`SimWorld::advance`].
pub struct SimWorld<S: TokenStore = MemoryStore> {
    env: SimEnv,
    broker: Arc<TokenBroker<SimEnv, S>>,
    protocol: SimProtocol<S>,
}

impl SimWorld<MemoryStore> {
    /// World over an in-memory store with default broker limits.
    pub fn new(seed: u64) -> Self {
        Self::with_store(SimEnv::with_seed(seed), MemoryStore::new(), BrokerConfig::default())
    }
}

impl<S: TokenStore> SimWorld<S> {
    /// World over an explicit store and broker configuration.
    pub fn with_store(env: SimEnv, store: S, config: BrokerConfig) -> Self {
        let broker = Arc::new(TokenBroker::new(env.clone(), store, config));
        let protocol =
            ShareLinkProtocol::new(Arc::clone(&broker), env.clone(), ProtocolConfig::default());
        Self { env, broker, protocol }
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// The broker.
    pub fn broker(&self) -> &Arc<TokenBroker<SimEnv, S>> {
        &self.broker
    }

    /// The protocol endpoint used by both sender and recipient.
    pub fn protocol(&self) -> &SimProtocol<S> {
        &self.protocol
    }

    /// Move virtual time forward.
    pub fn advance(&self, by: Duration) {
        self.env.advance(by);
    }

    /// Sender side: create a link for a UTF-8 secret.
    pub async fn share(
        &self,
        secret: &str,
        pin: &str,
        ttl: Option<Duration>,
    ) -> Result<CreatedLink, ShareError> {
        self.protocol.create(secret.as_bytes(), pin, ttl).await
    }

    /// Recipient side: open a link as text.
    pub async fn open(&self, link: &str, pin: &str) -> Result<String, ShareError> {
        self.protocol.access_text(link, pin).await.map(|secret| secret.as_str().to_owned())
    }
}
