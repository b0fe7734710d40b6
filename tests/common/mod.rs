#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]
#![allow(
    unused,
    reason = "Each test binary only uses part of the shared helpers"
)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relay_bot::Result;
use relay_bot::bot::{Backoff, Bot, Config, ReconnectConfig};
use relay_bot::credentials::MemoryCredentialStore;
use relay_bot::error::Error;
use relay_bot::pairing::PairingCodePublisher;
use relay_bot::transport::{CloseReason, Connection, Session, Transport, TransportEvent};
use relay_bot::types::{CredentialBlob, Identity};
use tokio::sync::mpsc;

pub const RECIPIENT: &str = "5551234567";
pub const RECIPIENT_ID: &str = "5551234567@s.whatsapp.net";

/// Scripted session: records what the bot asks of it and lets the test flip its readiness.
#[derive(Debug)]
pub struct MockSession {
    ready: AtomicBool,
    closed: AtomicBool,
    known_recipients: AtomicBool,
    fail_sends: AtomicBool,
    pings: AtomicUsize,
    sent: Mutex<Vec<(String, String)>>,
    probed: Mutex<Vec<String>>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self {
            ready: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            known_recipients: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
            pings: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            probed: Mutex::new(Vec::new()),
        }
    }
}

impl MockSession {
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_known_recipients(&self, known: bool) {
        self.known_recipients.store(known, Ordering::SeqCst);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Session for MockSession {
    async fn send(&self, to: &Identity, text: &str) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::transport("send rejected by mock"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.as_str().to_owned(), text.to_owned()));
        Ok(())
    }

    async fn probe(&self, identity: &Identity) -> Result<bool> {
        self.probed.lock().unwrap().push(identity.as_str().to_owned());
        Ok(self.known_recipients.load(Ordering::SeqCst))
    }

    async fn ping(&self) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst) && !self.is_closed()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// One session handed out by [`MockTransport`], plus the sending half of its event stream.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session: Arc<MockSession>,
    pub credentials: Option<CredentialBlob>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl SessionHandle {
    pub fn emit(&self, event: TransportEvent) {
        // the receiver is gone once the bot stopped listening to this session
        _ = self.events.send(event);
    }

    pub fn open(&self) {
        self.emit(TransportEvent::Open);
    }

    pub fn close(&self, reason: CloseReason) {
        self.emit(TransportEvent::closed(reason));
    }

    pub fn pairing_code(&self, code: &str) {
        self.emit(TransportEvent::PairingCode(code.to_owned()));
    }
}

/// Transport that records every `connect` and hands out [`MockSession`]s.
#[derive(Debug, Default)]
pub struct MockTransport {
    sessions: Mutex<Vec<SessionHandle>>,
    connect_failures: AtomicBool,
    connect_hangs: AtomicBool,
    attempts: AtomicUsize,
}

impl MockTransport {
    /// Make every subsequent `connect` fail before a session exists.
    pub fn set_connect_failures(&self, fail: bool) {
        self.connect_failures.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `connect` wait forever.
    pub fn set_connect_hangs(&self, hang: bool) {
        self.connect_hangs.store(hang, Ordering::SeqCst);
    }

    /// Number of `connect` calls, failed ones included.
    pub fn connects(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<SessionHandle> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn latest(&self) -> SessionHandle {
        self.sessions.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, credentials: Option<CredentialBlob>) -> Result<Connection> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.connect_failures.load(Ordering::SeqCst) {
            return Err(Error::transport("connection refused by mock"));
        }
        if self.connect_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Arc::new(MockSession::default());
        self.sessions.lock().unwrap().push(SessionHandle {
            session: Arc::clone(&session),
            credentials,
            events: events_tx,
        });

        Ok(Connection::new(session, events_rx))
    }
}

/// Bot wired to mocks, with handles on every collaborator.
pub struct Harness {
    pub bot: Bot,
    pub transport: Arc<MockTransport>,
    pub store: Arc<MemoryCredentialStore>,
    pub pairing: Arc<PairingCodePublisher>,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        Self::with_credentials(config, None)
    }

    pub fn with_credentials(config: Config, credentials: Option<CredentialBlob>) -> Self {
        let transport = Arc::new(MockTransport::default());
        let store = Arc::new(MemoryCredentialStore::new(credentials));
        let pairing = Arc::new(PairingCodePublisher::new());

        let bot = Bot::new(
            config,
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&store) as _,
            Arc::clone(&pairing),
        );

        Self {
            bot,
            transport,
            store,
            pairing,
        }
    }

    /// Start the bot and bring its first session to `Open`.
    pub async fn open(&self) -> SessionHandle {
        self.bot.start().await;
        let handle = self.transport.latest();
        handle.open();
        settle().await;
        assert!(self.bot.state().is_open());
        handle
    }
}

/// Short reconnect timings so paused-clock tests stay readable.
pub fn fast_config(max_attempts: u32) -> Config {
    Config::builder()
        .reconnect(
            ReconnectConfig::builder()
                .max_attempts(max_attempts)
                .backoff(Backoff::Fixed(Duration::from_secs(1)))
                .cooldown(Duration::from_secs(30))
                .logout_delay(Duration::from_secs(2))
                .build(),
        )
        .build()
}

/// Let every spawned task run until it blocks. With a paused clock this advances time by 1ms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
