//! Fuzz target for ShareLink::parse
//!
//! Links arrive from chat messages, emails and `.env` files, so parsing sees
//! arbitrary text.
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - A parsed link re-renders to a query that parses to the same link

#![no_main]

use libfuzzer_sys::fuzz_target;
use zkshare_proto::ShareLink;

fuzz_target!(|input: &str| {
    let Ok(link) = ShareLink::parse(input) else {
        return;
    };

    let reparsed = ShareLink::parse(&link.query()).expect("rendered link must parse");
    assert_eq!(reparsed, link);
});
