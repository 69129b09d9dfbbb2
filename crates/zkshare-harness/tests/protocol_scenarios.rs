//! End-to-end share link scenarios over an in-process broker.
//!
//! Sender and recipient share one [`SimWorld`], so expiry is driven by
//! advancing virtual time rather than sleeping.

use std::{sync::Arc, time::Duration};

use zkshare_core::{ShareError, ValidationError};
use zkshare_harness::SimWorld;

const ORIGIN: &str = "https://share.example";
const HOUR: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn shared_password_opens_exactly_once() {
    let world = SimWorld::new(1);

    let created = world.share("hunter2", "123456", Some(HOUR)).await.unwrap();
    let link = created.link.to_url(ORIGIN);

    assert_eq!(world.open(&link, "123456").await.unwrap(), "hunter2");
    assert!(matches!(world.open(&link, "123456").await, Err(ShareError::TokenNotFound)));
}

#[tokio::test]
async fn wrong_pin_burns_the_link() {
    let world = SimWorld::new(2);
    let link = world.share("hunter2", "123456", None).await.unwrap().link.to_url(ORIGIN);

    assert!(matches!(world.open(&link, "654321").await, Err(ShareError::AuthenticationFailure)));
    assert!(matches!(world.open(&link, "123456").await, Err(ShareError::TokenNotFound)));
}

#[tokio::test]
async fn link_expires_at_deadline() {
    let world = SimWorld::new(3);
    let early = world.share("early", "111111", Some(HOUR)).await.unwrap();
    let late = world.share("late", "222222", Some(HOUR)).await.unwrap();

    world.advance(HOUR - Duration::from_secs(1));
    assert_eq!(world.open(&early.link.to_url(ORIGIN), "111111").await.unwrap(), "early");

    world.advance(Duration::from_secs(1));
    let result = world.open(&late.link.to_url(ORIGIN), "222222").await;
    assert!(matches!(result, Err(ShareError::TokenNotFound)));
}

#[tokio::test]
async fn expires_at_reflects_requested_ttl() {
    let world = SimWorld::new(4);
    let before = zkshare_core::Environment::wall_clock_secs(world.env());

    let created = world.share("x", "123456", Some(2 * HOUR)).await.unwrap();

    assert_eq!(created.expires_at_secs, before + 7200);
}

#[tokio::test]
async fn ttl_above_broker_maximum_is_rejected() {
    let world = SimWorld::new(5);

    let result = world.share("x", "123456", Some(HOUR * 10_000)).await;

    assert!(matches!(result, Err(ShareError::BrokerRejected(_))));
    assert_eq!(world.broker().record_count().unwrap(), 0);
}

#[tokio::test]
async fn rejected_input_issues_no_token() {
    let world = SimWorld::new(6);

    let too_long = "a".repeat(1001);
    assert!(matches!(
        world.share(&too_long, "123456", None).await,
        Err(ShareError::Validation(ValidationError::SecretTooLong { .. }))
    ));
    assert!(matches!(
        world.share("x", "12345", None).await,
        Err(ShareError::Validation(ValidationError::InvalidPin { .. }))
    ));
    assert!(matches!(
        world.share("x", "123456", Some(Duration::ZERO)).await,
        Err(ShareError::Validation(ValidationError::ZeroTtl))
    ));

    assert_eq!(world.broker().record_count().unwrap(), 0);
}

#[tokio::test]
async fn tampered_envelope_fails_authentication() {
    let world = SimWorld::new(7);
    let created = world.share("hunter2", "123456", None).await.unwrap();

    let mut link = created.link.clone();
    link.envelope.ciphertext[0] ^= 0x01;

    let result = world.protocol().access_link(&link, "123456").await;
    assert!(matches!(result, Err(ShareError::AuthenticationFailure)));
}

#[tokio::test]
async fn consumed_records_are_swept_after_expiry() {
    let world = SimWorld::new(8);
    let link = world.share("hunter2", "123456", Some(HOUR)).await.unwrap().link.to_url(ORIGIN);
    world.open(&link, "123456").await.unwrap();

    // The consumed record stays as a tombstone until its deadline.
    assert_eq!(world.broker().sweep_expired().unwrap(), 0);
    assert_eq!(world.broker().record_count().unwrap(), 1);

    world.advance(HOUR);
    assert_eq!(world.broker().sweep_expired().unwrap(), 1);
    assert_eq!(world.broker().record_count().unwrap(), 0);
}

#[tokio::test]
async fn same_seed_produces_same_link() {
    let a = SimWorld::new(42).share("hunter2", "123456", None).await.unwrap();
    let b = SimWorld::new(42).share("hunter2", "123456", None).await.unwrap();
    let c = SimWorld::new(43).share("hunter2", "123456", None).await.unwrap();

    assert_eq!(a.link.query(), b.link.query());
    assert_ne!(a.link.query(), c.link.query());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_access_releases_once() {
    const RECIPIENTS: usize = 16;

    let world = Arc::new(SimWorld::new(9));
    let link = world.share("hunter2", "123456", None).await.unwrap().link.to_url(ORIGIN);

    let mut handles = Vec::with_capacity(RECIPIENTS);
    for _ in 0..RECIPIENTS {
        let world = Arc::clone(&world);
        let link = link.clone();
        handles.push(tokio::spawn(async move { world.open(&link, "123456").await }));
    }

    let mut opened = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(secret) => {
                assert_eq!(secret, "hunter2");
                opened += 1;
            },
            Err(err) => assert!(matches!(err, ShareError::TokenNotFound), "{err}"),
        }
    }
    assert_eq!(opened, 1);
}
