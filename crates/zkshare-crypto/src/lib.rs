//! zkshare Cryptographic Primitives
//!
//! Cryptographic building blocks for one-time share links. Pure functions with
//! deterministic outputs. Callers provide random bytes (the envelope nonce) so
//! that every operation here is reproducible in tests.
//!
//! # Key Lifecycle
//!
//! The broker hands out a random secret share. Creator and recipient each
//! combine that share with the PIN they were told out-of-band and derive the
//! same AEAD key without ever talking to each other.
//!
//! ```text
//! secret share ‖ PIN
//!        │
//!        ▼
//! HKDF-SHA256 (salt = KDF_SALT, info = KDF_INFO) → DerivedKey
//!        │
//!        ▼
//! AES-256-GCM (random 96-bit nonce) → EncryptedEnvelope
//! ```
//!
//! Derived keys live only in memory and are zeroized on drop.
//!
//! # Security
//!
//! Oracle resistance:
//! - A wrong PIN and a tampered envelope both surface as
//!   [`CryptoError::AuthenticationFailed`], with no further detail
//! - No plaintext bytes are returned before the tag is verified
//!
//! Interoperability:
//! - [`KDF_SALT`] and [`KDF_INFO`] are versioned protocol constants. Changing
//!   either one breaks every link issued under the old values.
//!
//! Known limitation:
//! - A 6-digit PIN carries about 20 bits of entropy. Anyone holding both the
//!   released secret share and the envelope can brute-force it offline. The
//!   protocol relies on single-use redemption and out-of-band PIN delivery
//!   instead of rate-limited PIN checks.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
mod error;
pub mod kdf;

pub use envelope::{EncryptedEnvelope, NONCE_SIZE, TAG_SIZE, open, seal};
pub use error::CryptoError;
pub use kdf::{DerivedKey, KDF_INFO, KDF_SALT, KEY_SIZE, derive_key};
