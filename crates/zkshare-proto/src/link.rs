//! Share link codec.
//!
//! A link is a URL whose query carries the lookup id (`token`) and the encoded
//! envelope (`data`). Parsing accepts either a full URL or just the query
//! string, and ignores any fragment and unrelated parameters.

use std::{fmt, str::FromStr};

use zkshare_crypto::EncryptedEnvelope;

use crate::{
    codec::{decode_envelope, encode_envelope},
    errors::LinkError,
    ids::LookupId,
};

/// Path under the web origin that renders the access page.
pub const LINK_PATH: &str = "/access";

/// Query parameter holding the lookup id.
pub const LOOKUP_PARAM: &str = "token";

/// Query parameter holding the encoded envelope.
pub const ENVELOPE_PARAM: &str = "data";

/// The portable artifact handed to the recipient.
///
/// Carries no PIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    /// Broker address of the secret share
    pub lookup_id: LookupId,
    /// Sealed secret
    pub envelope: EncryptedEnvelope,
}

impl ShareLink {
    /// Combine a lookup id with a sealed envelope.
    pub fn new(lookup_id: LookupId, envelope: EncryptedEnvelope) -> Self {
        Self { lookup_id, envelope }
    }

    /// Query string form: `token=<id>&data=<nonce>.<ciphertext>`.
    pub fn query(&self) -> String {
        format!(
            "{LOOKUP_PARAM}={}&{ENVELOPE_PARAM}={}",
            self.lookup_id,
            encode_envelope(&self.envelope)
        )
    }

    /// Full URL under `base_url`, e.g. `https://share.example/access?...`.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}{LINK_PATH}?{}", base_url.trim_end_matches('/'), self.query())
    }

    /// Parse a full URL or a bare query string.
    ///
    /// # Errors
    ///
    /// Any [`LinkError`]; the broker is never consulted.
    pub fn parse(input: &str) -> Result<Self, LinkError> {
        let input = input.trim();
        let without_fragment = input.split_once('#').map_or(input, |(head, _)| head);
        let query = without_fragment.split_once('?').map_or(without_fragment, |(_, q)| q);

        let mut lookup = None;
        let mut envelope = None;

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let slot = match name {
                LOOKUP_PARAM => (&mut lookup, LOOKUP_PARAM),
                ENVELOPE_PARAM => (&mut envelope, ENVELOPE_PARAM),
                _ => continue,
            };

            if slot.0.is_some() {
                return Err(LinkError::DuplicateParameter(slot.1));
            }
            let decoded = urlencoding::decode(value).map_err(|_| LinkError::InvalidEncoding)?;
            *slot.0 = Some(decoded.into_owned());
        }

        let lookup = lookup
            .filter(|v| !v.is_empty())
            .ok_or(LinkError::MissingParameter(LOOKUP_PARAM))?;
        let envelope = envelope
            .filter(|v| !v.is_empty())
            .ok_or(LinkError::MissingParameter(ENVELOPE_PARAM))?;

        Ok(Self { lookup_id: LookupId::parse(&lookup)?, envelope: decode_envelope(&envelope)? })
    }
}

impl FromStr for ShareLink {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query())
    }
}
