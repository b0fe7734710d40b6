//! Periodic GET against the server's own public `/health`.
//!
//! Some hosting platforms suspend instances that receive no external traffic. Pinging the public
//! URL from inside the process counts as traffic and keeps the bot session alive.

use std::time::Duration;

use reqwest::Client as ReqwestClient;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::Result;
use crate::bot::MIN_TICK_PERIOD;

/// Build the health URL for `public_url`, keeping any path prefix it carries.
pub fn health_url(public_url: &Url) -> Result<Url> {
    let mut base = public_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("health")?)
}

/// Ping `target` every `period` until `token` is cancelled. The first ping goes out one period
/// after spawning. Periods shorter than [`MIN_TICK_PERIOD`] are raised to it.
#[must_use]
pub fn spawn(
    client: ReqwestClient,
    target: Url,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = period.max(MIN_TICK_PERIOD);
        info!(%target, ?period, "Self-ping enabled");

        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    debug!("Self-ping cancellation requested, terminating...");
                    break;
                }
                _ = ticker.tick() => ping(&client, &target).await,
            }
        }
    })
}

async fn ping(client: &ReqwestClient, target: &Url) {
    match client.get(target.clone()).send().await {
        Ok(response) if response.status().is_success() => debug!("Self-ping ok"),
        Ok(response) => warn!(status = %response.status(), "Self-ping returned an error status"),
        Err(e) => warn!(error = %e, "Self-ping failed"),
    }
}
