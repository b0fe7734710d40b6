use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::{Backoff as BackoffPolicy, Constant};
use bon::Builder;

const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(25);
const DEFAULT_MONITOR_INTERVAL_DURATION: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT_DURATION: Duration = Duration::from_secs(60);
const DEFAULT_MAX_ATTEMPTS: u32 = 100;
const DEFAULT_RECONNECT_DELAY_DURATION: Duration = Duration::from_secs(3);
const DEFAULT_COOLDOWN_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_LOGOUT_DELAY_DURATION: Duration = Duration::from_secs(2);
const DEFAULT_ADDRESS_DOMAIN: &str = "s.whatsapp.net";

/// Configuration for the lifecycle manager.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// How often a liveness ping is sent over an open session. Raised to
    /// [`super::MIN_TICK_PERIOD`] if shorter.
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL_DURATION)]
    pub heartbeat_interval: Duration,
    /// How often the connection monitor checks that the socket still reports ready. Raised to
    /// [`super::MIN_TICK_PERIOD`] if shorter.
    #[builder(default = DEFAULT_MONITOR_INTERVAL_DURATION)]
    pub monitor_interval: Duration,
    /// Longest a session may stay in `Connecting` without any transport event before it is
    /// treated as a transient closure. Every event restarts the deadline.
    #[builder(default = DEFAULT_CONNECT_TIMEOUT_DURATION)]
    pub connect_timeout: Duration,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
    /// Whether recipients are looked up with `probe` before each send
    #[builder(default = true)]
    pub probe_recipients: bool,
    /// Domain appended to bare phone numbers when addressing a recipient
    #[builder(into, default = DEFAULT_ADDRESS_DOMAIN.to_owned())]
    pub address_domain: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration for automatic reconnection behavior.
///
/// Attempts are never abandoned: once `max_attempts` consecutive transient closures have been
/// retried, the manager waits `cooldown`, resets the counter and starts over.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ReconnectConfig {
    /// Consecutive reconnect attempts allowed before entering cooldown
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
    /// Delay between consecutive attempts
    #[builder(default)]
    pub backoff: Backoff,
    /// Pause after `max_attempts` is exhausted
    #[builder(default = DEFAULT_COOLDOWN_DURATION)]
    pub cooldown: Duration,
    /// Pause between erasing logged-out credentials and starting a fresh pairing
    #[builder(default = DEFAULT_LOGOUT_DELAY_DURATION)]
    pub logout_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Delay policy between reconnect attempts.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same delay before every attempt (default).
    Fixed(Duration),
    /// Randomized exponential growth, for many sessions sharing the same servers.
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed(DEFAULT_RECONNECT_DELAY_DURATION)
    }
}

impl Backoff {
    /// Instantiate the stateful delay generator for this policy.
    #[must_use]
    pub(crate) fn policy(&self) -> Box<dyn BackoffPolicy + Send> {
        match *self {
            Self::Fixed(delay) => Box::new(Constant::new(delay)),
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => Box::new(
                ExponentialBackoffBuilder::default()
                    .with_initial_interval(initial)
                    .with_max_interval(max)
                    .with_multiplier(multiplier)
                    .with_max_elapsed_time(None) // We handle max attempts separately
                    .build(),
            ),
        }
    }

    /// Upper bound used when the generator has nothing to say.
    #[must_use]
    pub(crate) const fn fallback(&self) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { max, .. } => max,
        }
    }
}
