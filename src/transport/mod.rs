//! Contract of the external protocol client.
//!
//! The transport owns everything protocol-related (session negotiation, encryption, framing).
//! The lifecycle manager only sees:
//!
//! - [`Transport::connect`], which hands back a live [`Session`] and the [`TransportEvent`]
//!   stream for it
//! - [`Session`] operations: `send`, `probe`, `ping`, `is_ready`, `close`
//!
//! Raw callback registration never leaves this boundary; every callback the underlying client
//! fires is turned into a [`TransportEvent`] and consumed by the lifecycle manager alone.

pub mod event;
pub mod traits;

pub use event::{CloseReason, TransportEvent};
pub use traits::{Connection, Session, Transport};
