//! Key derivation for share links using HKDF

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// HKDF salt shared by every zkshare implementation.
pub const KDF_SALT: &[u8] = b"zkshare-pin-salt";

/// HKDF info string. The suffix is the protocol version.
pub const KDF_INFO: &[u8] = b"zkshare-link-v1";

/// Size of a derived key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Symmetric key derived from a secret share and a PIN.
///
/// Never serialized and never logged. The bytes are wiped when the key is
/// dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Derive the envelope key from a secret share and a PIN.
///
/// The input keying material is `secret_share ‖ pin`. The secret share has a
/// fixed encoded length, so the concatenation is unambiguous.
///
/// # Security
///
/// - Deterministic: creator and recipient compute the same key independently
/// - Cost does not depend on whether the PIN is the right one; correctness is
///   only observable through [`crate::open`]
///
/// # Panics
///
/// Never in practice: HKDF-SHA256 accepts any output length up to 8160 bytes.
#[allow(clippy::expect_used)]
pub fn derive_key(secret_share: &[u8], pin: &[u8]) -> DerivedKey {
    let mut ikm = Zeroizing::new(Vec::with_capacity(secret_share.len() + pin.len()));
    ikm.extend_from_slice(secret_share);
    ikm.extend_from_slice(pin);

    let hkdf = Hkdf::<Sha256>::new(Some(KDF_SALT), &ikm);

    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(KDF_INFO, &mut okm)
        .expect("invariant: 32 bytes is a valid HKDF-SHA256 output length");

    let key = DerivedKey(okm);
    okm.zeroize();
    key
}
