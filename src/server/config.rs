//! Process configuration, read from the command line and the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use secrecy::{ExposeSecret as _, SecretString};
use url::Url;

/// Number of leading token characters that may appear in logs.
const TOKEN_LOG_PREFIX_LEN: usize = 8;

/// HTTP control surface and connection keeper for a messaging bot.
#[derive(Parser, Debug, Clone)]
#[command(name = "relay-bot")]
#[command(about = "HTTP control surface for a messaging bot session")]
pub struct Args {
    /// Bearer token every request except `/health` must present
    #[arg(long, env = "AUTH_TOKEN", default_value = "TU_TOKEN_SEGURO", hide_env_values = true)]
    pub auth_token: SecretString,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Externally reachable base URL. When set, the server pings its own `/health` so hosting
    /// platforms that idle unused instances keep it awake.
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<Url>,

    /// Seconds between self-pings
    #[arg(
        long,
        env = "SELF_PING_INTERVAL_SECS",
        default_value = "600",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub self_ping_interval_secs: u64,

    /// WebSocket endpoint of the protocol sidecar
    #[arg(long, env = "BRIDGE_URL", default_value = "ws://127.0.0.1:8085")]
    pub bridge_url: String,

    /// Directory holding persisted session credentials
    #[arg(long, env = "AUTH_DIR", default_value = "auth_info")]
    pub auth_dir: PathBuf,

    /// Bot identity; credentials are stored per identity
    #[arg(long, env = "BOT_ID", default_value = "default")]
    pub bot_id: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    #[must_use]
    pub fn self_ping_interval(&self) -> Duration {
        Duration::from_secs(self.self_ping_interval_secs)
    }

    /// The first characters of the auth token, safe to print at startup.
    #[must_use]
    pub fn token_hint(&self) -> String {
        token_hint(&self.auth_token)
    }
}

pub(crate) fn token_hint(token: &SecretString) -> String {
    let prefix: String = token
        .expose_secret()
        .chars()
        .take(TOKEN_LOG_PREFIX_LEN)
        .collect();
    format!("{prefix}...")
}
