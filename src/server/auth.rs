use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use secrecy::ExposeSecret as _;
use serde_json::json;
use tracing::debug;

use super::AppState;

/// Path reachable without a token so uptime probes never need credentials.
pub(super) const PUBLIC_PATH: &str = "/health";

#[derive(Debug)]
pub(super) enum AuthError {
    /// Missing header, wrong scheme or wrong token. All look the same to the caller.
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "No autorizado" })),
            )
                .into_response(),
        }
    }
}

/// Rejects every request whose `Authorization` header is not `Bearer <token>`, except
/// [`PUBLIC_PATH`].
pub(super) async fn require_token(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if req.uri().path() == PUBLIC_PATH {
        return Ok(next.run(req).await);
    }

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == state.token.expose_secret() => Ok(next.run(req).await),
        _ => {
            debug!(path = %req.uri().path(), "Rejected unauthenticated request");
            Err(AuthError::Forbidden)
        }
    }
}
