//! Connection lifecycle management.
//!
//! # Architecture
//!
//! - [`Bot`]: owns the single transport session, drives the reconnect state machine and gates
//!   outbound sends
//! - heartbeat scheduler and connection monitor: background tasks that only run while the
//!   session is open
//! - [`Config`]: timings and the reconnect policy
//!
//! The manager never talks to the HTTP layer directly. Pairing codes go out through the
//! [`crate::pairing::PairingCodePublisher`] it was constructed with, and credentials through the
//! injected [`crate::credentials::CredentialStore`].

pub mod config;
mod keepalive;
pub mod lifecycle;
pub mod state;

pub use config::{Backoff, Config, ReconnectConfig};
pub use keepalive::MIN_TICK_PERIOD;
pub use lifecycle::Bot;
pub use state::{ConnectionState, Status};
