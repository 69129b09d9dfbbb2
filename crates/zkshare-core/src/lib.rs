//! zkshare Core
//!
//! The one-time share link protocol: the Create and Access flows, independent
//! of how the token broker is reached.
//!
//! # Architecture
//!
//! [`ShareLinkProtocol`] orchestrates three pieces:
//!
//! - [`BrokerClient`]: issues and redeems tokens. In-process (the server's
//!   `TokenBroker`) or over HTTP (the client's `HttpBroker`)
//! - [`zkshare_crypto`]: key derivation and envelope encryption
//! - [`zkshare_proto`]: identifiers and the link format
//!
//! Time and randomness come from an [`Environment`], so the same logic runs in
//! production ([`SystemEnv`]) and under a seeded simulation.
//!
//! # Guarantees
//!
//! - The PIN and the secret share never appear in a link
//! - A link yields its secret at most once, across all concurrent accessors
//! - Only the holder of both the link and the PIN can recover the secret
//! - A wrong PIN still consumes the link

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broker;
pub mod env;
pub mod error;
mod protocol;
mod system_env;
pub mod validation;

pub use broker::{BrokerClient, IssuedToken};
pub use env::Environment;
pub use error::{ShareError, ValidationError};
pub use protocol::{CreatedLink, ProtocolConfig, ShareLinkProtocol};
pub use system_env::SystemEnv;
pub use validation::{DEFAULT_MAX_SECRET_LEN, PIN_LEN, Pin};
