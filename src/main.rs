use std::sync::Arc;

use clap::Parser as _;
use relay_bot::bot::{Bot, Config};
use relay_bot::bridge::{BridgeConfig, BridgeTransport};
use relay_bot::credentials::FileCredentialStore;
use relay_bot::pairing::PairingCodePublisher;
use relay_bot::server::{self, AppState, Args, self_ping};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[tokio::main]
async fn main() -> relay_bot::Result<()> {
    _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("relay_bot={level},tower_http={level}", level = args.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(listen = %args.listen_addr(), "Starting relay-bot");
    info!(token = %args.token_hint(), "Using authorization token");
    info!(bridge = %args.bridge_url, auth_dir = %args.auth_dir.display(), bot_id = %args.bot_id);

    let transport = BridgeTransport::new(&args.bridge_url, BridgeConfig::default())?;
    let store = FileCredentialStore::new(&args.auth_dir, &args.bot_id);
    let pairing = Arc::new(PairingCodePublisher::new());

    let bot = Bot::new(
        Config::default(),
        Arc::new(transport),
        Arc::new(store),
        pairing,
    );

    let starter = bot.clone();
    tokio::spawn(async move { starter.start().await });

    let background = CancellationToken::new();
    if let Some(public_url) = &args.public_url {
        let target = self_ping::health_url(public_url)?;
        _ = self_ping::spawn(
            reqwest::Client::new(),
            target,
            args.self_ping_interval(),
            background.child_token(),
        );
    }

    let state = Arc::new(AppState::new(bot.clone(), args.auth_token.clone()));
    let served = server::serve(args.listen_addr(), server::router(state)).await;

    background.cancel();
    bot.shutdown().await;

    served
}
