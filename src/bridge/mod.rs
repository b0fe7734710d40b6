#![expect(
    clippy::module_name_repetitions,
    reason = "Re-exported names intentionally match their modules for API clarity"
)]

//! WebSocket adapter to an out-of-process protocol sidecar.
//!
//! **Feature flag:** `bridge` (required to use this module)
//!
//! The sidecar hosts the actual protocol client and forwards its callbacks as JSON frames. This
//! module turns those frames into [`crate::transport::TransportEvent`]s and exposes the
//! sidecar's request/response operations as a [`crate::transport::Session`].
//!
//! # Example
//!
//! ```rust, no_run
//! use std::sync::Arc;
//!
//! use relay_bot::bridge::{BridgeConfig, BridgeTransport};
//! use relay_bot::transport::Transport;
//!
//! # async fn run() -> relay_bot::Result<()> {
//! let transport = BridgeTransport::new("ws://127.0.0.1:8085", BridgeConfig::default())?;
//! let connection = transport.connect(None).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod types;

pub use connection::{BridgeConfig, BridgeSession, BridgeTransport};
pub use error::BridgeError;
