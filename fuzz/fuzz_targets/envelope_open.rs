//! Fuzz target for envelope decoding and decryption
//!
//! # Strategy
//!
//! - Arbitrary `data` parameter text through the envelope codec
//! - Arbitrary share and PIN bytes through key derivation
//!
//! # Invariants
//!
//! - Decoding and opening NEVER panic
//! - An envelope sealed under one key never opens under a different one

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zkshare_crypto::{derive_key, open, seal};
use zkshare_proto::decode_envelope;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    encoded: &'a str,
    share: &'a [u8],
    pin: &'a [u8],
    other_pin: &'a [u8],
    plaintext: &'a [u8],
    nonce: [u8; 12],
}

fuzz_target!(|input: Input<'_>| {
    let key = derive_key(input.share, input.pin);

    if let Ok(envelope) = decode_envelope(input.encoded) {
        let _ = open(&envelope, &key);
    }

    let sealed = seal(input.plaintext, &key, input.nonce);
    assert_eq!(open(&sealed, &key).expect("own key must open"), input.plaintext);

    if input.other_pin != input.pin {
        let other = derive_key(input.share, input.other_pin);
        assert!(open(&sealed, &other).is_err());
    }
});
