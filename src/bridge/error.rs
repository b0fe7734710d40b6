#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

/// Sidecar bridge error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum BridgeError {
    /// Error connecting to or communicating with the sidecar
    Connection(tokio_tungstenite::tungstenite::Error),
    /// Error parsing a sidecar frame
    MessageParse(serde_json::Error),
    /// The socket to the sidecar is closed
    ConnectionClosed,
    /// The sidecar did not complete the handshake or answer a request in time
    Timeout,
    /// The sidecar answered a request with an error
    Rejected(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "bridge connection error: {e}"),
            Self::MessageParse(e) => write!(f, "failed to parse bridge frame: {e}"),
            Self::ConnectionClosed => write!(f, "bridge connection closed"),
            Self::Timeout => write!(f, "bridge did not answer in time"),
            Self::Rejected(reason) => write!(f, "bridge rejected request: {reason}"),
        }
    }
}

impl StdError for BridgeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::MessageParse(e) => Some(e),
            _ => None,
        }
    }
}

// Integration with main Error type
impl From<BridgeError> for crate::error::Error {
    fn from(e: BridgeError) -> Self {
        crate::error::Error::with_source(crate::error::Kind::Transport, e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for crate::error::Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        crate::error::Error::with_source(
            crate::error::Kind::Transport,
            BridgeError::Connection(e),
        )
    }
}
