//! Fuzz target for TokenBroker under storage failures and time travel
//!
//! # Strategy
//!
//! - Variable failure rates (0% to 90%) via ChaoticStore
//! - Interleaved issue, redeem, clock advance and sweep operations
//!
//! # Invariants
//!
//! - Broker NEVER panics on storage errors
//! - A share is released at most once
//! - A released share is the one issued with its lookup id
//! - Nothing is released at or after its deadline

#![no_main]

use std::{collections::HashMap, time::Duration};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zkshare_core::Environment;
use zkshare_harness::SimEnv;
use zkshare_proto::{LookupId, SecretShare};
use zkshare_server::{BrokerConfig, ChaoticStore, MemoryStore, TokenBroker};

#[derive(Debug, Arbitrary)]
struct ChaosScenario {
    seed: u64,
    /// Failure rate 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    operations: Vec<Operation>,
}

#[derive(Debug, Arbitrary)]
enum Operation {
    Issue { ttl_secs: u16 },
    Redeem { index: u8 },
    Advance { secs: u16 },
    Sweep,
}

struct Issued {
    lookup_id: LookupId,
    share: SecretShare,
    expires_at_secs: u64,
    released: bool,
}

fuzz_target!(|scenario: ChaosScenario| {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 10) / 10.0;
    let env = SimEnv::with_seed(scenario.seed);
    let store = ChaoticStore::with_seed(MemoryStore::new(), failure_rate, scenario.seed);
    let broker = TokenBroker::new(env.clone(), store, BrokerConfig::default());

    let mut issued: Vec<Issued> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for op in scenario.operations {
        match op {
            Operation::Issue { ttl_secs } => {
                let ttl = Duration::from_secs(u64::from(ttl_secs).max(1));
                if let Ok(token) = broker.create_token(Some(ttl)) {
                    assert!(!by_id.contains_key(token.lookup_id.as_str()), "lookup id reused");
                    by_id.insert(token.lookup_id.as_str().to_owned(), issued.len());
                    issued.push(Issued {
                        lookup_id: token.lookup_id,
                        share: token.secret_share,
                        expires_at_secs: token.expires_at_secs,
                        released: false,
                    });
                }
            },
            Operation::Redeem { index } => {
                if issued.is_empty() {
                    continue;
                }
                let entry = &mut issued[usize::from(index) % issued.len()];
                if let Ok(share) = broker.consume(&entry.lookup_id) {
                    assert!(!entry.released, "share released twice");
                    assert_eq!(share, entry.share);
                    assert!(env.wall_clock_secs() < entry.expires_at_secs, "released after expiry");
                    entry.released = true;
                }
            },
            Operation::Advance { secs } => env.advance(Duration::from_secs(u64::from(secs))),
            Operation::Sweep => {
                let _ = broker.sweep_expired();
            },
        }
    }
});
