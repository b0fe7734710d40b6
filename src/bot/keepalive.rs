//! Background tasks that run only while a session is open.
//!
//! - Heartbeat: pings the session on a fixed period. Failures are advisory and only logged.
//! - Monitor: checks on a longer period that the socket still reports ready, and hands a dead
//!   session back to the lifecycle manager for recovery. The transport does not always report
//!   a silent socket death on its own.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::lifecycle::Inner;
use crate::transport::Session;

/// Shortest period a background ticker runs at. `tokio::time::interval` rejects zero.
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(100);

/// Heartbeat and monitor tasks bound to one session generation.
///
/// Both tasks are cancelled as soon as this value is stopped or dropped.
#[derive(Debug)]
pub(super) struct KeepAlive {
    token: CancellationToken,
    heartbeat: JoinHandle<()>,
    monitor: JoinHandle<()>,
}

impl KeepAlive {
    pub(super) fn spawn(
        inner: Weak<Inner>,
        session: &Arc<dyn Session>,
        generation: u64,
        heartbeat_interval: Duration,
        monitor_interval: Duration,
    ) -> Self {
        let token = CancellationToken::new();

        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::clone(session),
            heartbeat_interval,
            token.clone(),
        ));
        let monitor = tokio::spawn(monitor_loop(
            inner,
            Arc::clone(session),
            generation,
            monitor_interval,
            token.clone(),
        ));

        Self {
            token,
            heartbeat,
            monitor,
        }
    }

    /// Cancel both tasks. Takes effect before this returns: no further tick will act on the
    /// session.
    pub(super) fn stop(self) {
        drop(self);
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.token.cancel();
        self.heartbeat.abort();
        self.monitor.abort();
    }
}

async fn heartbeat_loop(session: Arc<dyn Session>, period: Duration, token: CancellationToken) {
    let mut ticker = time::interval(period.max(MIN_TICK_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            () = token.cancelled() => {
                debug!("Heartbeat cancellation requested, terminating...");
                break;
            }
            _ = ticker.tick() => {
                if !session.is_ready() {
                    warn!("Socket not ready for keep-alive");
                    continue;
                }

                match session.ping().await {
                    Ok(()) => debug!("Keep-alive sent"),
                    Err(e) => warn!(error = %e, "Unable to send keep-alive"),
                }
            }
        }
    }
}

async fn monitor_loop(
    inner: Weak<Inner>,
    session: Arc<dyn Session>,
    generation: u64,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = time::interval(period.max(MIN_TICK_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                if session.is_ready() {
                    continue;
                }

                let Some(inner) = inner.upgrade() else {
                    break;
                };

                warn!(generation, "Connection loss detected, reconnecting");
                // Recovery stops this task's token, so it runs on its own task.
                tokio::spawn(async move { inner.recover_stale(generation).await });
                break;
            }
        }
    }
}
