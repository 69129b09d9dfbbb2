//! zkshare protocol types.
//!
//! Everything two zkshare implementations must agree on byte-for-byte:
//!
//! - [`LookupId`] / [`SecretShare`]: the two halves issued by the broker
//! - [`encode_envelope`] / [`decode_envelope`]: the text form of an
//!   [`EncryptedEnvelope`](zkshare_crypto::EncryptedEnvelope)
//! - [`ShareLink`]: the URL parameter set handed to the recipient
//! - [`wire`]: JSON bodies of the `IssueToken` / `RedeemToken` exchange
//!
//! # Link format
//!
//! ```text
//! https://share.example/access?token=<lookup id>&data=<nonce>.<ciphertext>
//! ```
//!
//! All three components are base64url without padding, so the `.` delimiter
//! never occurs inside them. The PIN is never part of a link.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod errors;
mod ids;
mod link;
pub mod wire;

pub use codec::{ENVELOPE_DELIMITER, decode_envelope, encode_envelope};
pub use errors::LinkError;
pub use ids::{ENCODED_ID_LEN, ID_BYTES, LookupId, SecretShare};
pub use link::{ENVELOPE_PARAM, LINK_PATH, LOOKUP_PARAM, ShareLink};
