//! Client
//!
//! Client-side pieces of zkshare: everything that runs where the secret and
//! the PIN live.
//!
//! # Components
//!
//! - [`dotenv`]: seal and open whole `.env` files, one token per variable
//! - [`ClientError`]: errors from client operations
//!
//! # Transport (optional)
//!
//! With the `http` feature enabled (the default), this crate also provides:
//! - [`http_broker::HttpBroker`]: a [`zkshare_core::BrokerClient`] over the
//!   broker's HTTP API
//! - the `zkshare` command line tool

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dotenv;
mod error;

#[cfg(feature = "http")]
pub mod http_broker;

pub use dotenv::{OpenedEnv, SealedEnv, open_env, seal_env};
pub use error::ClientError;
#[cfg(feature = "http")]
pub use http_broker::HttpBroker;
pub use zkshare_core::{
    BrokerClient, CreatedLink, Environment, ProtocolConfig, ShareError, ShareLinkProtocol,
    SystemEnv,
};
