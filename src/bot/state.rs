use serde::Serialize;
use strum_macros::Display;

use crate::transport::CloseReason;

/// Connection state tracking.
///
/// `Idle → Connecting → Open → Closing → Closed`, with `Closed` re-entering `Connecting` on
/// every reconnect.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Nothing started yet
    Idle,
    /// A session exists and is negotiating
    Connecting,
    /// The session is established; sends are accepted
    Open,
    /// The live session is being torn down on purpose
    Closing,
    /// The last session is gone
    Closed {
        reason: CloseReason,
        retryable: bool,
    },
}

impl ConnectionState {
    #[must_use]
    pub const fn closed(reason: CloseReason) -> Self {
        Self::Closed {
            reason,
            retryable: reason.is_retryable(),
        }
    }

    /// Check if the connection is currently open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether a session is live or being negotiated; `start` is a no-op in these states.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Connecting | Self::Open | Self::Closing)
    }
}

/// Point-in-time view of the lifecycle manager.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    #[serde(flatten)]
    pub state: ConnectionState,
    /// Consecutive reconnect attempts since the last successful open
    pub reconnect_attempts: u32,
    /// A connection attempt is being negotiated right now
    pub connecting: bool,
    /// The attempt budget is exhausted and the manager is waiting out the cooldown
    pub cooling_down: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn closed_state_should_serialize_reason() {
        let state = ConnectionState::closed(CloseReason::LoggedOut);

        assert_eq!(
            serde_json::to_value(state).unwrap(),
            json!({ "state": "closed", "reason": "logged_out", "retryable": false })
        );
    }

    #[test]
    fn status_should_flatten_state() {
        let status = Status {
            state: ConnectionState::Open,
            reconnect_attempts: 0,
            connecting: false,
            cooling_down: false,
        };

        assert_eq!(
            serde_json::to_value(status).unwrap(),
            json!({
                "state": "open",
                "reconnect_attempts": 0,
                "connecting": false,
                "cooling_down": false
            })
        );
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(
            ConnectionState::closed(CloseReason::Transient).to_string(),
            "closed"
        );
    }
}
