//! Text encoding of encrypted envelopes.
//!
//! `base64url(nonce) "." base64url(ciphertext)`, unpadded. Decoding tolerates
//! padding so links that passed through a padding encoder still open.

use base64::{
    Engine,
    alphabet::URL_SAFE,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use zkshare_crypto::{EncryptedEnvelope, NONCE_SIZE, TAG_SIZE};

use crate::errors::LinkError;

/// Separator between the nonce and ciphertext encodings.
///
/// Not part of the base64url alphabet.
pub const ENVELOPE_DELIMITER: char = '.';

pub(crate) const B64_ENCODE: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_encode_padding(false),
);

pub(crate) const B64_DECODE: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode an envelope as `nonce.ciphertext`.
pub fn encode_envelope(envelope: &EncryptedEnvelope) -> String {
    let mut out = B64_ENCODE.encode(envelope.nonce);
    out.push(ENVELOPE_DELIMITER);
    B64_ENCODE.encode_string(&envelope.ciphertext, &mut out);
    out
}

/// Decode the `nonce.ciphertext` form.
///
/// Rejects a missing delimiter, a nonce that is not exactly 12 bytes, and a
/// ciphertext too short to carry the authentication tag.
pub fn decode_envelope(encoded: &str) -> Result<EncryptedEnvelope, LinkError> {
    let (nonce_b64, ciphertext_b64) = encoded
        .split_once(ENVELOPE_DELIMITER)
        .ok_or(LinkError::InvalidEnvelope("missing delimiter"))?;

    if nonce_b64.is_empty() || ciphertext_b64.is_empty() {
        return Err(LinkError::InvalidEnvelope("empty component"));
    }

    let nonce_bytes =
        B64_DECODE.decode(nonce_b64).map_err(|_| LinkError::InvalidEnvelope("nonce encoding"))?;
    let nonce: [u8; NONCE_SIZE] = nonce_bytes
        .as_slice()
        .try_into()
        .map_err(|_| LinkError::InvalidEnvelope("nonce length"))?;

    let ciphertext = B64_DECODE
        .decode(ciphertext_b64)
        .map_err(|_| LinkError::InvalidEnvelope("ciphertext encoding"))?;
    if ciphertext.len() < TAG_SIZE {
        return Err(LinkError::InvalidEnvelope("ciphertext truncated"));
    }

    Ok(EncryptedEnvelope { nonce, ciphertext })
}
