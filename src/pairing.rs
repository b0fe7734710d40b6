//! Holds the most recent pairing code for the HTTP layer to hand out.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

/// A published pairing code and the moment it was published.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingCode {
    pub code: String,
    pub updated_at: DateTime<Utc>,
}

/// Single-slot holder for the current pairing code. No history is kept.
#[derive(Debug, Default)]
pub struct PairingCodePublisher {
    current: RwLock<Option<PairingCode>>,
}

impl PairingCodePublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever code was held before.
    pub fn publish<S: Into<String>>(&self, code: S) {
        let code = PairingCode {
            code: code.into(),
            updated_at: Utc::now(),
        };
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(code);
    }

    pub fn clear(&self) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[must_use]
    pub fn current(&self) -> Option<PairingCode> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_should_overwrite_previous_code() {
        let publisher = PairingCodePublisher::new();

        publisher.publish("first");
        let first = publisher.current().unwrap();
        publisher.publish("second");
        let second = publisher.current().unwrap();

        assert_eq!(second.code, "second");
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn clear_should_leave_nothing() {
        let publisher = PairingCodePublisher::new();
        publisher.publish("ABC123");

        publisher.clear();

        assert!(publisher.current().is_none());
    }
}
