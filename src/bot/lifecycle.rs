use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use backoff::backoff::Backoff as BackoffPolicy;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::Config;
use super::keepalive::KeepAlive;
use super::state::{ConnectionState, Status};
use crate::Result;
use crate::credentials::CredentialStore;
use crate::error::Error;
use crate::pairing::{PairingCode, PairingCodePublisher};
use crate::transport::{CloseReason, Connection, Session, Transport, TransportEvent};
use crate::types::{CredentialBlob, Identity};

/// Owns the single long-lived transport session and keeps it alive.
///
/// The manager:
/// - creates sessions and consumes their [`TransportEvent`] stream
/// - starts the heartbeat and connection monitor while a session is open
/// - reconnects after transient closures (fixed delay, bounded attempts, then a cooldown)
/// - erases credentials and re-pairs after a logout
/// - gates outbound sends on the session being open
///
/// All transitions happen under one lock, so HTTP handlers and the event path never observe or
/// produce a half-applied transition. At most one session is live at a time: every new session
/// gets a fresh generation number, and anything tagged with an older generation (events, timers,
/// in-flight connects) is dropped on arrival.
///
/// [`Bot`] is cheap to clone; all clones drive the same session.
///
/// # Example
///
/// ```ignore
/// let bot = Bot::new(Config::default(), transport, store, pairing);
/// bot.start().await;
///
/// bot.send_message("5551234567", "hello").await?;
/// ```
#[derive(Clone)]
pub struct Bot {
    inner: Arc<Inner>,
}

pub(super) struct Inner {
    config: Config,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    pairing: Arc<PairingCodePublisher>,
    shared: Mutex<Shared>,
    /// Serializes credential store writes against erasures
    persist: AsyncMutex<()>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
}

struct Shared {
    state: ConnectionState,
    attempts: u32,
    cooling_down: bool,
    generation: u64,
    session: Option<Arc<dyn Session>>,
    keepalive: Option<KeepAlive>,
    /// Pending reconnect timer, if any
    retry: Option<CancellationToken>,
    backoff: Box<dyn BackoffPolicy + Send>,
}

enum Recovery {
    Repair,
    Retry { attempt: u32, delay: Duration },
    Cooldown(Duration),
}

impl Bot {
    /// Create an idle manager. Nothing connects until [`Bot::start`] is called.
    #[must_use]
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        pairing: Arc<PairingCodePublisher>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let backoff = config.reconnect.backoff.policy();

        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                credentials,
                pairing,
                shared: Mutex::new(Shared {
                    state: ConnectionState::Idle,
                    attempts: 0,
                    cooling_down: false,
                    generation: 0,
                    session: None,
                    keepalive: None,
                    retry: None,
                    backoff,
                }),
                persist: AsyncMutex::new(()),
                state_tx,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Start a connection attempt.
    ///
    /// Idempotent: while a session is negotiating or open, this only logs and returns.
    pub async fn start(&self) {
        self.inner.start().await;
    }

    /// Send a text message to `identity`.
    ///
    /// Fails with [`crate::error::Kind::NotConnected`] unless the session is open, and with
    /// [`crate::error::Kind::UnknownRecipient`] when probing reports no such account. Failures
    /// are never retried or queued.
    pub async fn send_message(&self, identity: &str, text: &str) -> Result<()> {
        self.inner.send_message(identity, text).await
    }

    /// Erase credentials, drop the current session and start over with a new pairing.
    pub async fn reset_session(&self) {
        self.inner.reset_session().await;
    }

    /// Pure read of the current state. Never waits on connection work.
    #[must_use]
    pub fn get_status(&self) -> Status {
        self.inner.status()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// The most recent pairing code, if one is waiting to be scanned.
    #[must_use]
    pub fn pairing_code(&self) -> Option<PairingCode> {
        self.inner.pairing.current()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Cancel every timer and close the live session. The manager stays idle afterwards.
    pub async fn shutdown(&self) {
        self.inner.shutdown().await;
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("status", &self.get_status())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, shared: &mut Shared, state: ConnectionState) {
        shared.state = state;
        self.state_tx.send_replace(state);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn is_negotiating(&self, generation: u64) -> bool {
        let shared = self.lock();
        shared.generation == generation && matches!(shared.state, ConnectionState::Connecting)
    }

    fn status(&self) -> Status {
        let shared = self.lock();
        Status {
            state: shared.state,
            reconnect_attempts: shared.attempts,
            connecting: matches!(shared.state, ConnectionState::Connecting),
            cooling_down: shared.cooling_down,
        }
    }

    async fn start(self: &Arc<Self>) {
        let generation = {
            let mut shared = self.lock();
            if self.shutdown.is_cancelled() {
                debug!("Shutting down, not starting a new session");
                return;
            }
            if shared.state.is_in_flight() {
                info!(state = %shared.state, "Connection attempt already in flight");
                return;
            }

            if let Some(retry) = shared.retry.take() {
                retry.cancel();
            }
            shared.generation += 1;
            self.set_state(&mut shared, ConnectionState::Connecting);
            shared.generation
        };

        info!(generation, "Connecting...");

        let credentials = match self.credentials.load().await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(error = %e, "Unable to load credentials, pairing from scratch");
                None
            }
        };

        let connect = timeout(self.config.connect_timeout, self.transport.connect(credentials));
        match connect.await {
            Ok(Ok(connection)) => self.attach(generation, connection).await,
            Ok(Err(e)) => {
                error!(error = %e, "Unable to start transport session");
                self.on_closed(generation, CloseReason::Transient, Some(e.to_string()))
                    .await;
            }
            Err(_) => {
                error!(
                    timeout = ?self.config.connect_timeout,
                    "Transport session did not start in time"
                );
                self.on_closed(
                    generation,
                    CloseReason::Transient,
                    Some("transport connect timed out".to_owned()),
                )
                .await;
            }
        }
    }

    async fn attach(self: &Arc<Self>, generation: u64, connection: Connection) {
        let Connection { session, events } = connection;

        let accepted = {
            let mut shared = self.lock();
            let accepted = shared.generation == generation
                && matches!(shared.state, ConnectionState::Connecting);
            if accepted {
                shared.session = Some(Arc::clone(&session));
            }
            accepted
        };

        if !accepted {
            debug!(generation, "Connection attempt was superseded, closing its session");
            session.close().await;
            return;
        }

        let pump = tokio::spawn(Arc::clone(self).pump(generation, events));

        // A panicking handler must not leave the manager stuck in Connecting/Open.
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = pump.await
                && e.is_panic()
            {
                error!(generation, "Event handler panicked, falling back to reconnect");
                this.on_closed(generation, CloseReason::Unknown, Some(e.to_string()))
                    .await;
            }
        });
    }

    async fn pump(
        self: Arc<Self>,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        loop {
            let next = if self.is_negotiating(generation) {
                match timeout(self.config.connect_timeout, events.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            generation,
                            timeout = ?self.config.connect_timeout,
                            "Negotiation stalled, treating it as a transient closure"
                        );
                        self.on_closed(
                            generation,
                            CloseReason::Transient,
                            Some("negotiation timed out".to_owned()),
                        )
                        .await;
                        return;
                    }
                }
            } else {
                events.recv().await
            };
            let Some(event) = next else {
                break;
            };

            if !self.is_current(generation) {
                debug!(generation, ?event, "Ignoring event from superseded session");
                return;
            }

            match event {
                TransportEvent::Connecting => debug!(generation, "Transport negotiating"),
                TransportEvent::PairingCode(code) => self.on_pairing_code(code),
                TransportEvent::Open => self.on_open(generation),
                TransportEvent::CredentialsChanged(blob) => {
                    self.persist_credentials(generation, &blob).await;
                }
                TransportEvent::Closed { reason, message } => {
                    self.on_closed(generation, reason, message).await;
                    return;
                }
            }
        }

        // The transport dropped its end without ever reporting a closure.
        self.on_closed(
            generation,
            CloseReason::Unknown,
            Some("event stream ended".to_owned()),
        )
        .await;
    }

    fn on_pairing_code(&self, code: String) {
        let state = self.lock().state;
        if matches!(state, ConnectionState::Connecting) {
            info!("Pairing code generated, scan it to connect");
            self.pairing.publish(code);
        } else {
            debug!(%state, "Ignoring pairing code outside of Connecting");
        }
    }

    fn on_open(self: &Arc<Self>, generation: u64) {
        let mut guard = self.lock();
        let shared = &mut *guard;
        if shared.generation != generation {
            return;
        }

        shared.attempts = 0;
        shared.cooling_down = false;
        shared.backoff.reset();
        self.set_state(shared, ConnectionState::Open);
        self.pairing.clear();

        if let Some(previous) = shared.keepalive.take() {
            previous.stop();
        }
        if let Some(session) = shared.session.as_ref() {
            shared.keepalive = Some(KeepAlive::spawn(
                Arc::downgrade(self),
                session,
                generation,
                self.config.heartbeat_interval,
                self.config.monitor_interval,
            ));
        }

        info!(generation, "Connected successfully");
    }

    async fn on_closed(
        self: &Arc<Self>,
        generation: u64,
        reason: CloseReason,
        message: Option<String>,
    ) {
        let (session, recovery) = {
            let mut shared = self.lock();
            if shared.generation != generation
                || !matches!(
                    shared.state,
                    ConnectionState::Connecting | ConnectionState::Open
                )
            {
                return;
            }

            if let Some(keepalive) = shared.keepalive.take() {
                keepalive.stop();
            }
            let session = shared.session.take();
            self.set_state(&mut shared, ConnectionState::closed(reason));

            let reconnect = &self.config.reconnect;
            let recovery = if !reason.is_retryable() {
                shared.attempts = 0;
                shared.cooling_down = false;
                Recovery::Repair
            } else if shared.attempts < reconnect.max_attempts {
                shared.attempts += 1;
                let delay = shared
                    .backoff
                    .next_backoff()
                    .unwrap_or_else(|| reconnect.backoff.fallback());
                Recovery::Retry {
                    attempt: shared.attempts,
                    delay,
                }
            } else {
                shared.cooling_down = true;
                Recovery::Cooldown(reconnect.cooldown)
            };

            (session, recovery)
        };

        warn!(
            generation,
            error = %Error::closed(reason),
            message = message.as_deref().unwrap_or("unknown error"),
            "Connection closed"
        );

        if let Some(session) = session {
            session.close().await;
        }

        match recovery {
            Recovery::Repair => {
                info!("Session logged out, erasing credentials");
                // must complete before the next start is scheduled
                self.erase_credentials().await;
                self.schedule_start(self.config.reconnect.logout_delay, false);
            }
            Recovery::Retry { attempt, delay } => {
                info!(
                    attempt,
                    max_attempts = self.config.reconnect.max_attempts,
                    ?delay,
                    "Retrying connection"
                );
                self.schedule_start(delay, false);
            }
            Recovery::Cooldown(cooldown) => {
                warn!(
                    ?cooldown,
                    "Maximum reconnect attempts reached, cooling down before retrying"
                );
                self.schedule_start(cooldown, true);
            }
        }
    }

    /// Start again once `delay` has elapsed, unless superseded or shut down first.
    fn schedule_start(self: &Arc<Self>, delay: Duration, after_cooldown: bool) {
        let token = self.shutdown.child_token();
        {
            let mut shared = self.lock();
            if let Some(previous) = shared.retry.replace(token.clone()) {
                previous.cancel();
            }
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    debug!("Scheduled reconnect cancelled");
                }
                () = tokio::time::sleep(delay) => {
                    if after_cooldown {
                        let mut shared = this.lock();
                        shared.attempts = 0;
                        shared.cooling_down = false;
                        shared.backoff.reset();
                    }
                    this.start().await;
                }
            }
        });
    }

    /// Called by the connection monitor when the open session's socket stopped reporting ready.
    pub(super) async fn recover_stale(self: &Arc<Self>, generation: u64) {
        let session = {
            let mut shared = self.lock();
            if shared.generation != generation || !shared.state.is_open() {
                return;
            }

            if let Some(keepalive) = shared.keepalive.take() {
                keepalive.stop();
            }
            // Late events from the dead session must not touch the next one.
            shared.generation += 1;
            self.set_state(&mut shared, ConnectionState::closed(CloseReason::Transient));
            shared.session.take()
        };

        if let Some(session) = session {
            session.close().await;
        }

        self.start().await;
    }

    async fn persist_credentials(&self, generation: u64, blob: &CredentialBlob) {
        let _guard = self.persist.lock().await;
        if !self.is_current(generation) {
            debug!(generation, "Dropping credentials from superseded session");
            return;
        }

        debug!("Saving credentials...");
        if let Err(e) = self.credentials.save(blob).await {
            warn!(error = %e, "Unable to persist credentials, re-pairing may be needed after restart");
        }
    }

    async fn erase_credentials(&self) {
        let _guard = self.persist.lock().await;
        if let Err(e) = self.credentials.erase().await {
            warn!(error = %e, "Unable to erase credentials");
        }
    }

    async fn send_message(&self, identity: &str, text: &str) -> Result<()> {
        let session = {
            let shared = self.lock();
            match shared.session.as_ref() {
                Some(session) if shared.state.is_open() && session.is_ready() => {
                    Arc::clone(session)
                }
                _ => return Err(Error::not_connected(shared.state)),
            }
        };

        let identity = Identity::normalize(identity, &self.config.address_domain)?;

        if self.config.probe_recipients && !session.probe(&identity).await? {
            return Err(Error::unknown_recipient(identity.as_str()));
        }

        session.send(&identity, text).await?;
        info!(to = %identity, "Message sent");

        Ok(())
    }

    async fn reset_session(self: &Arc<Self>) {
        let (generation, session) = {
            let mut shared = self.lock();
            if self.shutdown.is_cancelled() {
                debug!("Shutting down, not resetting the session");
                return;
            }
            shared.generation += 1;
            if let Some(keepalive) = shared.keepalive.take() {
                keepalive.stop();
            }
            if let Some(retry) = shared.retry.take() {
                retry.cancel();
            }
            shared.attempts = 0;
            shared.cooling_down = false;
            shared.backoff.reset();
            self.set_state(&mut shared, ConnectionState::Closing);
            (shared.generation, shared.session.take())
        };

        info!("Resetting session, a new pairing code will be generated");
        self.pairing.clear();
        self.erase_credentials().await;

        if let Some(session) = session {
            session.close().await;
        }

        {
            let mut shared = self.lock();
            if shared.generation != generation {
                // another reset or a shutdown got here first
                return;
            }
            self.set_state(&mut shared, ConnectionState::closed(CloseReason::Transient));
        }

        self.start().await;
    }

    async fn shutdown(&self) {
        self.shutdown.cancel();

        let session = {
            let mut shared = self.lock();
            shared.generation += 1;
            if let Some(keepalive) = shared.keepalive.take() {
                keepalive.stop();
            }
            if let Some(retry) = shared.retry.take() {
                retry.cancel();
            }
            self.set_state(&mut shared, ConnectionState::Closing);
            shared.session.take()
        };

        info!("Closing client...");
        if let Some(session) = session {
            session.close().await;
        }

        let mut shared = self.lock();
        self.set_state(&mut shared, ConnectionState::Idle);
    }
}
