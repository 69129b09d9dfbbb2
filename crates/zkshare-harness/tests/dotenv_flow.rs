//! Sealing and opening `.env` files end to end.

use zkshare_client::{ClientError, ShareError, open_env, seal_env};
use zkshare_harness::{SimEnv, SimWorld, TestServer};

const PLAIN: &str = "\
# database
DB_PASSWORD=hunter2

API_KEY=sk-live-123=abc
";

#[tokio::test]
async fn sealed_file_opens_to_original_values() {
    let world = SimWorld::new(1);

    let sealed = seal_env(world.protocol(), PLAIN, "123456", None).await.unwrap();
    assert_eq!(sealed.sealed, 2);
    assert!(sealed.failures.is_empty());
    assert!(sealed.text.starts_with("# database\nDB_PASSWORD_ENC=token="));
    assert!(sealed.text.contains("\n\nAPI_KEY_ENC=token="));
    assert!(!sealed.text.contains("hunter2"));

    let opened = open_env(world.protocol(), &sealed.text, "123456").await.unwrap();
    assert!(opened.failures.is_empty());
    assert_eq!(
        opened.to_env_text().as_str(),
        "API_KEY=sk-live-123=abc\nDB_PASSWORD=hunter2\n"
    );
}

#[tokio::test]
async fn sealed_file_opens_once() {
    let world = SimWorld::new(2);
    let sealed = seal_env(world.protocol(), PLAIN, "123456", None).await.unwrap();
    open_env(world.protocol(), &sealed.text, "123456").await.unwrap();

    let again = open_env(world.protocol(), &sealed.text, "123456").await.unwrap();

    assert!(again.values.is_empty());
    assert_eq!(again.failures.len(), 2);
    assert!(again.failures.iter().all(|(_, err)| matches!(err, ShareError::TokenNotFound)));
}

#[tokio::test]
async fn oversized_value_is_reported_and_others_sealed() {
    let world = SimWorld::new(3);
    let input = format!("SMALL=ok\nBIG={}\n", "x".repeat(1001));

    let sealed = seal_env(world.protocol(), &input, "123456", None).await.unwrap();

    assert_eq!(sealed.sealed, 1);
    assert_eq!(sealed.failures.len(), 1);
    assert_eq!(sealed.failures[0].0, "BIG");
    assert!(sealed.text.contains("# ERROR sealing BIG\n"));
    assert_eq!(world.broker().record_count().unwrap(), 1);
}

#[tokio::test]
async fn malformed_key_aborts_before_issuing() {
    let world = SimWorld::new(4);

    let result = seal_env(world.protocol(), "GOOD=1\nBAD KEY=2\n", "123456", None).await;

    assert!(matches!(result, Err(ClientError::DotEnv { line: 2, .. })));
    assert_eq!(world.broker().record_count().unwrap(), 0);
}

#[tokio::test]
async fn malformed_pin_aborts_before_issuing() {
    let world = SimWorld::new(8);

    let result = seal_env(world.protocol(), PLAIN, "12ab56", None).await;

    assert!(matches!(result, Err(ClientError::Share(ShareError::Validation(_)))));
    assert_eq!(world.broker().record_count().unwrap(), 0);
}

#[tokio::test]
async fn malformed_key_aborts_open_before_redeeming() {
    let world = SimWorld::new(7);
    let sealed = seal_env(world.protocol(), "A=1\nB=2\n", "123456", None).await.unwrap();
    let corrupted = format!("{}BAD KEY=oops\n", sealed.text);

    let result = open_env(world.protocol(), &corrupted, "123456").await;
    assert!(matches!(result, Err(ClientError::DotEnv { line: 3, .. })));

    let opened = open_env(world.protocol(), &sealed.text, "123456").await.unwrap();
    assert!(opened.failures.is_empty());
    assert_eq!(opened.to_env_text().as_str(), "A=1\nB=2\n");
}

#[tokio::test]
async fn one_bad_variable_does_not_block_the_rest() {
    let world = SimWorld::new(5);
    let sealed = seal_env(world.protocol(), "A=1\nB=2\n", "123456", None).await.unwrap();

    // Spend B before the recipient gets to it.
    let b_link = sealed.text.lines().find_map(|line| line.strip_prefix("B_ENC=")).unwrap();
    world.open(b_link, "123456").await.unwrap();

    let opened = open_env(world.protocol(), &sealed.text, "123456").await.unwrap();
    assert_eq!(opened.values["A"].as_str(), "1");
    assert_eq!(opened.failures.len(), 1);
    assert_eq!(opened.failures[0].0, "B");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn env_round_trip_over_http() {
    let server = TestServer::start(SimEnv::with_seed(6)).await.unwrap();
    let broker = zkshare_client::HttpBroker::new(&server.url()).unwrap();
    let protocol = zkshare_client::ShareLinkProtocol::new(
        broker,
        server.env().clone(),
        zkshare_client::ProtocolConfig::default(),
    );

    let sealed = seal_env(&protocol, PLAIN, "123456", None).await.unwrap();
    let opened = open_env(&protocol, &sealed.text, "123456").await.unwrap();

    assert_eq!(opened.values["DB_PASSWORD"].as_str(), "hunter2");
    assert_eq!(server.broker().record_count().unwrap(), 2);
}
