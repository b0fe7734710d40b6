use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::types::CredentialBlob;

/// Why a session closed.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The credentials were revoked; only a fresh pairing can recover.
    LoggedOut,
    /// Network or server hiccup; reconnecting with the same credentials is expected to work.
    Transient,
    /// The transport did not say.
    Unknown,
}

impl CloseReason {
    /// Whether reconnecting with the current credentials makes sense.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        !matches!(self, Self::LoggedOut)
    }
}

/// Everything the transport reports about a session, in the order it happened.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection negotiation started
    Connecting,
    /// A new pairing code is available for the operator to scan
    PairingCode(String),
    /// The session is fully established
    Open,
    /// The session is gone
    Closed {
        reason: CloseReason,
        message: Option<String>,
    },
    /// The transport rotated the session credentials; they must be persisted
    CredentialsChanged(CredentialBlob),
}

impl TransportEvent {
    #[must_use]
    pub fn closed(reason: CloseReason) -> Self {
        Self::Closed {
            reason,
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_logged_out_is_terminal() {
        assert!(!CloseReason::LoggedOut.is_retryable());
        assert!(CloseReason::Transient.is_retryable());
        assert!(CloseReason::Unknown.is_retryable());
    }

    #[test]
    fn close_reason_display_is_snake_case() {
        assert_eq!(CloseReason::LoggedOut.to_string(), "logged_out");
    }
}
