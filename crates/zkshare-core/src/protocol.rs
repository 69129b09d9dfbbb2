//! Create and Access flows.
//!
//! ```text
//! Create(secret, pin, ttl)              Access(link, pin)
//!   IssueToken(ttl) ──► (share, id)       parse link ──► (id, envelope)
//!   derive(share, pin) ──► key            RedeemToken(id) ──► share   [irreversible]
//!   seal(secret, key) ──► envelope        derive(share, pin) ──► key
//!   link(id, envelope)                    open(envelope, key) ──► secret
//! ```
//!
//! Redemption happens before the PIN's correctness can be known, so a wrong
//! PIN still spends the link. Only the PIN's *format* is checked up front.

use std::time::Duration;

use zeroize::Zeroizing;
use zkshare_crypto::{derive_key, open, seal};
use zkshare_proto::ShareLink;

use crate::{
    broker::BrokerClient,
    env::Environment,
    error::{ShareError, ValidationError},
    validation::{DEFAULT_MAX_SECRET_LEN, Pin, check_secret_len},
};

/// Limits applied by the protocol before contacting the broker.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Maximum secret size in bytes
    pub max_secret_len: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self { max_secret_len: DEFAULT_MAX_SECRET_LEN }
    }
}

/// Result of a successful `Create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedLink {
    /// The link to hand to the recipient
    pub link: ShareLink,
    /// Expiry as Unix seconds
    pub expires_at_secs: u64,
}

/// Orchestrates key derivation, envelope encryption and the broker.
///
/// Holds no per-link state; any number of creates and accesses may run
/// concurrently against one instance.
pub struct ShareLinkProtocol<B, E> {
    broker: B,
    env: E,
    config: ProtocolConfig,
}

impl<B: BrokerClient, E: Environment> ShareLinkProtocol<B, E> {
    /// Create a protocol instance over `broker`.
    pub fn new(broker: B, env: E, config: ProtocolConfig) -> Self {
        Self { broker, env, config }
    }

    /// The broker this instance talks to.
    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Protocol limits.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// `Create(secret, pin, ttl) -> link`.
    ///
    /// Input is validated before a token is issued, so rejected input never
    /// leaves an orphan token behind.
    pub async fn create(
        &self,
        secret: &[u8],
        pin: &str,
        ttl: Option<Duration>,
    ) -> Result<CreatedLink, ShareError> {
        let pin = Pin::parse(pin)?;
        check_secret_len(secret, self.config.max_secret_len)?;
        if ttl.is_some_and(|ttl| ttl.as_secs() == 0) {
            return Err(ValidationError::ZeroTtl.into());
        }

        let issued = self.broker.issue_token(ttl).await?;

        let key = derive_key(issued.secret_share.as_bytes(), pin.as_bytes());
        let envelope = seal(secret, &key, self.env.random_array());

        tracing::debug!(
            expires_at = issued.expires_at_secs,
            plaintext_len = envelope.plaintext_len(),
            "sealed share link"
        );

        Ok(CreatedLink {
            link: ShareLink::new(issued.lookup_id, envelope),
            expires_at_secs: issued.expires_at_secs,
        })
    }

    /// `Access(link, pin) -> secret`.
    ///
    /// A malformed link is rejected without contacting the broker.
    pub async fn access(&self, link: &str, pin: &str) -> Result<Zeroizing<Vec<u8>>, ShareError> {
        let link = ShareLink::parse(link)?;
        self.access_link(&link, pin).await
    }

    /// `Access` for an already parsed link.
    pub async fn access_link(
        &self,
        link: &ShareLink,
        pin: &str,
    ) -> Result<Zeroizing<Vec<u8>>, ShareError> {
        let pin = Pin::parse(pin)?;

        // Spends the single use regardless of what follows.
        let share = self.broker.redeem_token(&link.lookup_id).await?;

        let key = derive_key(share.as_bytes(), pin.as_bytes());
        let plaintext = open(&link.envelope, &key).inspect_err(|_| {
            tracing::debug!("share link did not authenticate");
        })?;

        Ok(Zeroizing::new(plaintext))
    }

    /// `Access` for secrets that are expected to be text.
    pub async fn access_text(&self, link: &str, pin: &str) -> Result<Zeroizing<String>, ShareError> {
        let mut bytes = self.access(link, pin).await?;
        let text = String::from_utf8(std::mem::take(&mut *bytes))
            .map_err(|_| ShareError::Validation(ValidationError::NotUtf8))?;
        Ok(Zeroizing::new(text))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_types, reason = "Test broker state")]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;
    use zkshare_proto::{LookupId, SecretShare};

    use super::*;
    use crate::{broker::IssuedToken, system_env::SystemEnv};

    /// Minimal exactly-once broker for exercising the flows.
    #[derive(Default)]
    struct FakeBroker {
        tokens: Mutex<HashMap<LookupId, SecretShare>>,
        issued: AtomicUsize,
        redeemed: AtomicUsize,
    }

    #[async_trait]
    impl BrokerClient for FakeBroker {
        async fn issue_token(&self, _ttl: Option<Duration>) -> Result<IssuedToken, ShareError> {
            let env = SystemEnv::new();
            let lookup_id = LookupId::from_bytes(&env.random_array());
            let secret_share = SecretShare::from_bytes(&env.random_array());

            self.issued.fetch_add(1, Ordering::SeqCst);
            self.tokens.lock().unwrap().insert(lookup_id.clone(), secret_share.clone());

            Ok(IssuedToken { lookup_id, secret_share, expires_at_secs: u64::MAX })
        }

        async fn redeem_token(&self, lookup_id: &LookupId) -> Result<SecretShare, ShareError> {
            self.redeemed.fetch_add(1, Ordering::SeqCst);
            self.tokens.lock().unwrap().remove(lookup_id).ok_or(ShareError::TokenNotFound)
        }
    }

    fn protocol() -> ShareLinkProtocol<FakeBroker, SystemEnv> {
        ShareLinkProtocol::new(FakeBroker::default(), SystemEnv::new(), ProtocolConfig::default())
    }

    #[tokio::test]
    async fn create_then_access_returns_secret() {
        let protocol = protocol();

        let created = protocol.create(b"hunter2", "123456", None).await.unwrap();
        let secret = protocol.access(&created.link.query(), "123456").await.unwrap();

        assert_eq!(&*secret, b"hunter2");
    }

    #[tokio::test]
    async fn second_access_is_not_found() {
        let protocol = protocol();
        let link = protocol.create(b"hunter2", "123456", None).await.unwrap().link.query();

        protocol.access(&link, "123456").await.unwrap();
        let second = protocol.access(&link, "123456").await;

        assert!(matches!(second, Err(ShareError::TokenNotFound)));
    }

    #[tokio::test]
    async fn wrong_pin_fails_and_burns_link() {
        let protocol = protocol();
        let link = protocol.create(b"x", "111111", None).await.unwrap().link.query();

        let wrong = protocol.access(&link, "000000").await;
        assert!(matches!(wrong, Err(ShareError::AuthenticationFailure)));

        let right = protocol.access(&link, "111111").await;
        assert!(matches!(right, Err(ShareError::TokenNotFound)));
    }

    #[tokio::test]
    async fn malformed_link_never_reaches_broker() {
        let protocol = protocol();

        let result = protocol.access("https://x.test/access?token=abc", "123456").await;

        assert!(matches!(result, Err(ShareError::MalformedLink(_))));
        assert_eq!(protocol.broker().redeemed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_pin_does_not_spend_link() {
        let protocol = protocol();
        let link = protocol.create(b"s", "123456", None).await.unwrap().link.query();

        let result = protocol.access(&link, "12345").await;
        assert!(matches!(result, Err(ShareError::Validation(ValidationError::InvalidPin { .. }))));
        assert_eq!(protocol.broker().redeemed.load(Ordering::SeqCst), 0);

        assert_eq!(&*protocol.access(&link, "123456").await.unwrap(), b"s");
    }

    #[tokio::test]
    async fn invalid_create_input_issues_no_token() {
        let protocol = protocol();
        let too_long = vec![b'a'; DEFAULT_MAX_SECRET_LEN + 1];

        assert!(protocol.create(b"s", "abcdef", None).await.is_err());
        assert!(protocol.create(&too_long, "123456", None).await.is_err());
        assert!(matches!(
            protocol.create(b"s", "123456", Some(Duration::from_millis(500))).await,
            Err(ShareError::Validation(ValidationError::ZeroTtl))
        ));

        assert_eq!(protocol.broker().issued.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn boundary_secrets_roundtrip() {
        let protocol = protocol();
        let max = vec![0x7Fu8; DEFAULT_MAX_SECRET_LEN];

        for secret in [Vec::new(), max] {
            let link = protocol.create(&secret, "424242", None).await.unwrap().link;
            let opened = protocol.access_link(&link, "424242").await.unwrap();
            assert_eq!(*opened, secret);
        }
    }

    #[tokio::test]
    async fn link_never_contains_pin_or_share() {
        let protocol = protocol();
        let created = protocol.create(b"secret", "987654", None).await.unwrap();
        let url = created.link.to_url("https://share.example");

        assert!(!url.contains("987654"));
        let shares = protocol.broker().tokens.lock().unwrap();
        let share = shares.get(&created.link.lookup_id).unwrap();
        assert!(!url.contains(share.as_str()));
    }

    #[tokio::test]
    async fn access_text_rejects_binary_secret() {
        let protocol = protocol();
        let link = protocol.create(&[0xFF, 0xFE], "123456", None).await.unwrap().link.query();

        let result = protocol.access_text(&link, "123456").await;
        assert!(matches!(result, Err(ShareError::Validation(ValidationError::NotUtf8))));
    }
}
