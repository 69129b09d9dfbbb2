//! Deterministic test harness for zkshare.
//!
//! Virtual time and seeded randomness for the broker and the share link
//! protocol, plus an in-process HTTP server for end-to-end tests.
//!
//! # Components
//!
//! - [`SimEnv`]: [`zkshare_core::Environment`] with a manually advanced clock
//!   and a ChaCha20 RNG
//! - [`SimWorld`]: broker and protocol wired together without a network
//! - [`TestServer`]: the production server on a loopback port, driven by a
//!   [`SimEnv`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_env;
pub mod test_server;
pub mod world;

pub use sim_env::{SIM_EPOCH_SECS, SimEnv, SimInstant};
pub use test_server::TestServer;
pub use world::{SimProtocol, SimWorld};
