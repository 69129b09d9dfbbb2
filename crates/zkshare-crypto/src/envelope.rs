//! Envelope encryption using AES-256-GCM
//!
//! All functions are pure - the nonce must be provided by the caller. This
//! keeps the crate free of an RNG and makes every test reproducible.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};

use crate::{error::CryptoError, kdf::DerivedKey};

/// AES-GCM nonce size (12 bytes / 96 bits)
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// A sealed secret: nonce plus ciphertext with the tag appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// The 12-byte nonce used for this encryption
    pub nonce: [u8; NONCE_SIZE],
    /// The ciphertext including the 16-byte GCM tag
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_SIZE)
    }
}

/// Encrypt `plaintext` under `key`.
///
/// # Security
///
/// - Caller MUST provide a fresh random nonce for every call; a `(nonce, key)`
///   pair is never reused
/// - Authenticated encryption prevents tampering
///
/// # Panics
///
/// Panics if `plaintext` exceeds the AES-GCM limit of 64 GiB. Callers bound
/// secrets far below that.
#[allow(clippy::expect_used)]
pub fn seal(plaintext: &[u8], key: &DerivedKey, nonce: [u8; NONCE_SIZE]) -> EncryptedEnvelope {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .expect("invariant: AES-256-GCM encryption cannot fail for inputs below 64 GiB");

    EncryptedEnvelope { nonce, ciphertext }
}

/// Decrypt an envelope, verifying the tag first.
///
/// # Errors
///
/// - `AuthenticationFailed`: wrong key, tampered nonce/ciphertext/tag, or a
///   ciphertext too short to hold a tag. The causes are not distinguished.
pub fn open(envelope: &EncryptedEnvelope, key: &DerivedKey) -> Result<Vec<u8>, CryptoError> {
    if envelope.ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)
}
