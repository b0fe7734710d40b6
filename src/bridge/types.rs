//! Frames exchanged with the sidecar. Every frame is a JSON object tagged by `type`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transport::{CloseReason, TransportEvent};
use crate::types::CredentialBlob;

/// HTTP-style status the protocol uses to signal revoked credentials.
pub const LOGGED_OUT_STATUS: u16 = 401;

/// Frames sent to the sidecar.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame on every socket; carries the stored credentials, base64-encoded
    Hello { credentials: Option<String> },
    Send { id: Uuid, to: String, text: String },
    Probe { id: Uuid, to: String },
    Ping { id: Uuid },
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionUpdate {
    Connecting,
    Open,
    Close,
}

/// Frames received from the sidecar.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Connection {
        state: ConnectionUpdate,
        #[serde(default)]
        reason: Option<CloseReason>,
        #[serde(default)]
        status_code: Option<u16>,
        #[serde(default)]
        message: Option<String>,
    },
    Qr {
        code: String,
    },
    Creds {
        data: String,
    },
    Result {
        id: Uuid,
        ok: bool,
        #[serde(default)]
        exists: Option<bool>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Answer to a [`ClientFrame`] request.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub ok: bool,
    pub exists: Option<bool>,
    pub error: Option<String>,
}

/// An explicit reason wins; otherwise a logged-out status code maps to
/// [`CloseReason::LoggedOut`] and any other code to [`CloseReason::Transient`].
#[must_use]
pub fn close_reason(reason: Option<CloseReason>, status_code: Option<u16>) -> CloseReason {
    match (reason, status_code) {
        (Some(reason), _) => reason,
        (None, Some(LOGGED_OUT_STATUS)) => CloseReason::LoggedOut,
        (None, Some(_)) => CloseReason::Transient,
        (None, None) => CloseReason::Unknown,
    }
}

impl ServerFrame {
    /// Converts a lifecycle frame into the event it stands for. `Result` frames and undecodable
    /// credentials yield `None`.
    #[must_use]
    pub fn into_event(self) -> Option<TransportEvent> {
        match self {
            Self::Connection {
                state: ConnectionUpdate::Connecting,
                ..
            } => Some(TransportEvent::Connecting),
            Self::Connection {
                state: ConnectionUpdate::Open,
                ..
            } => Some(TransportEvent::Open),
            Self::Connection {
                state: ConnectionUpdate::Close,
                reason,
                status_code,
                message,
            } => Some(TransportEvent::Closed {
                reason: close_reason(reason, status_code),
                message,
            }),
            Self::Qr { code } => Some(TransportEvent::PairingCode(code)),
            Self::Creds { data } => match CredentialBlob::from_base64(&data) {
                Ok(blob) => Some(TransportEvent::CredentialsChanged(blob)),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring undecodable credentials frame");
                    None
                }
            },
            Self::Result { .. } => None,
        }
    }
}
