//! Broker-issued identifiers.

use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    codec::{B64_DECODE, B64_ENCODE},
    errors::LinkError,
};

/// Random bytes behind every identifier (256 bits).
pub const ID_BYTES: usize = 32;

/// Length of an identifier in unpadded base64url.
pub const ENCODED_ID_LEN: usize = 43;

/// Decode and canonicalize an encoded identifier.
fn canonical_id(encoded: &str) -> Result<String, LinkError> {
    let mut bytes = B64_DECODE.decode(encoded).map_err(|_| LinkError::InvalidIdentifier)?;
    if bytes.len() != ID_BYTES {
        bytes.zeroize();
        return Err(LinkError::InvalidIdentifier);
    }
    let canonical = B64_ENCODE.encode(&bytes);
    bytes.zeroize();
    Ok(canonical)
}

/// The public, addressable half of a share token.
///
/// Embedded in the link. Possession of it lets anyone attempt the single
/// redemption, which is why it carries the same entropy as the secret half.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct LookupId(String);

impl LookupId {
    /// Encode freshly generated random bytes.
    pub fn from_bytes(bytes: &[u8; ID_BYTES]) -> Self {
        Self(B64_ENCODE.encode(bytes))
    }

    /// Parse an encoded identifier.
    ///
    /// Accepts padded or unpadded base64url and stores the canonical unpadded
    /// form.
    pub fn parse(encoded: &str) -> Result<Self, LinkError> {
        canonical_id(encoded).map(Self)
    }

    /// Canonical encoded form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LookupId {
    type Error = LinkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl Serialize for LookupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl fmt::Display for LookupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for LookupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LookupId").field(&self.0).finish()
    }
}

/// The custodied half of a share token.
///
/// Released by the broker exactly once and used as HKDF input keying
/// material. Redacted from `Debug` and wiped on drop.
#[derive(Clone, PartialEq, Eq, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(try_from = "String")]
pub struct SecretShare(String);

impl SecretShare {
    /// Encode freshly generated random bytes.
    pub fn from_bytes(bytes: &[u8; ID_BYTES]) -> Self {
        Self(B64_ENCODE.encode(bytes))
    }

    /// Parse an encoded share.
    pub fn parse(encoded: &str) -> Result<Self, LinkError> {
        canonical_id(encoded).map(Self)
    }

    /// Canonical encoded form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical encoded form as bytes, the key derivation input.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for SecretShare {
    type Error = LinkError;

    fn try_from(mut value: String) -> Result<Self, Self::Error> {
        let parsed = Self::parse(&value);
        value.zeroize();
        parsed
    }
}

impl Serialize for SecretShare {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl fmt::Debug for SecretShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretShare(..)")
    }
}
