use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use crate::bot::ConnectionState;
use crate::transport::CloseReason;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Caller supplied input that cannot be acted upon
    Validation,
    /// A send was attempted while the session was not open
    NotConnected,
    /// The transport reports that the recipient has no account
    UnknownRecipient,
    /// Error raised by the transport session or its socket
    Transport,
    /// Credential store read/write/delete failure
    Persistence,
    /// Internal error from dependencies
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }

    #[must_use]
    pub fn not_connected(state: ConnectionState) -> Self {
        NotConnected { state }.into()
    }

    pub fn unknown_recipient<S: Into<String>>(identity: S) -> Self {
        UnknownRecipient {
            identity: identity.into(),
        }
        .into()
    }

    pub fn transport<S: Into<String>>(message: S) -> Self {
        Error::with_source(
            Kind::Transport,
            TransportFailure {
                message: message.into(),
            },
        )
    }

    /// Describe why a session closed: [`LoggedOut`] for revoked credentials,
    /// [`TransportClosed`] otherwise.
    #[must_use]
    pub fn closed(reason: CloseReason) -> Self {
        if reason.is_retryable() {
            TransportClosed { reason }.into()
        } else {
            LoggedOut.into()
        }
    }

    pub fn persistence<S: StdError + Send + Sync + 'static>(
        operation: &'static str,
        source: S,
    ) -> Self {
        PersistenceFailure {
            operation,
            source: Box::new(source),
        }
        .into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

/// Returned by sends issued while the lifecycle manager is not in the open state.
#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct NotConnected {
    pub state: ConnectionState,
}

impl fmt::Display for NotConnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client is not connected (state: {})", self.state)
    }
}

impl StdError for NotConnected {}

#[non_exhaustive]
#[derive(Debug)]
pub struct UnknownRecipient {
    pub identity: String,
}

impl fmt::Display for UnknownRecipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recipient {} has no account", self.identity)
    }
}

impl StdError for UnknownRecipient {}

#[non_exhaustive]
#[derive(Debug)]
pub struct TransportFailure {
    pub message: String,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport failure: {}", self.message)
    }
}

impl StdError for TransportFailure {}

/// The live session closed for a reason other than a logout.
///
/// Reported by the lifecycle manager when it handles the closure. Callers see it wrapped in a
/// [`Kind::Transport`] error at most.
#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct TransportClosed {
    pub reason: CloseReason,
}

impl fmt::Display for TransportClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport closed: {}", self.reason)
    }
}

impl StdError for TransportClosed {}

/// The transport invalidated the stored credentials; a fresh pairing is required.
#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct LoggedOut;

impl fmt::Display for LoggedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session logged out, credentials must be re-paired")
    }
}

impl StdError for LoggedOut {}

#[non_exhaustive]
#[derive(Debug)]
pub struct PersistenceFailure {
    pub operation: &'static str,
    pub source: Box<dyn StdError + Send + Sync + 'static>,
}

impl fmt::Display for PersistenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unable to {} credentials: {}",
            self.operation, self.source
        )
    }
}

impl StdError for PersistenceFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<NotConnected> for Error {
    fn from(err: NotConnected) -> Self {
        Error::with_source(Kind::NotConnected, err)
    }
}

impl From<UnknownRecipient> for Error {
    fn from(err: UnknownRecipient) -> Self {
        Error::with_source(Kind::UnknownRecipient, err)
    }
}

impl From<TransportClosed> for Error {
    fn from(err: TransportClosed) -> Self {
        Error::with_source(Kind::Transport, err)
    }
}

impl From<LoggedOut> for Error {
    fn from(err: LoggedOut) -> Self {
        Error::with_source(Kind::Transport, err)
    }
}

impl From<PersistenceFailure> for Error {
    fn from(err: PersistenceFailure) -> Self {
        Error::with_source(Kind::Persistence, err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, e)
    }
}

#[cfg(feature = "server")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}
