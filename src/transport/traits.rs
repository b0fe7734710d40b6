use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::event::TransportEvent;
use crate::Result;
use crate::types::{CredentialBlob, Identity};

/// Factory for transport sessions.
///
/// Implementations must return quickly: `connect` only has to instantiate the session and start
/// negotiation. The outcome arrives later on [`Connection::events`] as
/// [`TransportEvent::Open`] or [`TransportEvent::Closed`]. The lifecycle manager gives up on a
/// `connect` call, or on a negotiation that goes silent, after `Config::connect_timeout`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, credentials: Option<CredentialBlob>) -> Result<Connection>;
}

/// One live protocol session.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Deliver a text message.
    async fn send(&self, to: &Identity, text: &str) -> Result<()>;

    /// Ask the network whether `identity` has an account.
    async fn probe(&self, identity: &Identity) -> Result<bool>;

    /// Lightweight liveness ping.
    async fn ping(&self) -> Result<()>;

    /// Whether the underlying socket still reports ready.
    fn is_ready(&self) -> bool;

    /// Best-effort shutdown of the session and its socket.
    async fn close(&self);
}

/// A freshly created session and the event stream bound to it.
pub struct Connection {
    pub session: Arc<dyn Session>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Connection {
    #[must_use]
    pub fn new(
        session: Arc<dyn Session>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { session, events }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("ready", &self.session.is_ready())
            .finish_non_exhaustive()
    }
}
