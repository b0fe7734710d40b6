//! HTTP control surface for the bot.
//!
//! Every route except `GET /health` requires `Authorization: Bearer <token>`.
//!
//! | Route                  | Effect                                        |
//! |------------------------|-----------------------------------------------|
//! | `POST /enviar-mensaje` | [`Bot::send_message`]                         |
//! | `GET /qr`              | Current pairing code, if any                  |
//! | `POST /nuevo-qr`       | [`Bot::reset_session`], in the background     |
//! | `GET /estado`          | [`Bot::get_status`]                           |
//! | `GET /health`          | Liveness and uptime, unauthenticated          |

pub mod config;
mod auth;
mod routes;
pub mod self_ping;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::Args;
pub use routes::SendMessageRequest;

use crate::Result;
use crate::bot::Bot;

/// Shared state handed to every handler.
#[derive(Debug)]
pub struct AppState {
    bot: Bot,
    token: SecretString,
    started: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(bot: Bot, token: SecretString) -> Self {
        Self {
            bot,
            token,
            started: Instant::now(),
        }
    }
}

/// Build the router with authentication and request tracing applied.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/enviar-mensaje", post(routes::send_message))
        .route("/qr", get(routes::pairing_code))
        .route("/nuevo-qr", post(routes::new_pairing_code))
        .route("/estado", get(routes::status))
        .route(auth::PUBLIC_PATH, get(routes::health))
        .fallback(routes::not_found)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_token,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `addr` until SIGINT or SIGTERM arrives, then drain in-flight requests.
///
/// Stopping the bot is left to the caller once this returns.
pub async fn serve(addr: SocketAddr, router: Router) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server closed");
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Unable to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down..."),
        () = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
