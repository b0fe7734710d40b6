use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::AppState;
use crate::bot::Status;
use crate::error::{Error, Kind, Validation};
use crate::types::{MIN_PHONE_DIGITS, phone_digits};

const MISSING_FIELDS: &str = "Faltan datos requeridos (numero y mensaje)";
const INVALID_NUMBER: &str = "Número de teléfono inválido";
const EMPTY_MESSAGE: &str = "El mensaje no puede estar vacío";
const NOT_CONNECTED: &str = "WhatsApp no está conectado. Intente nuevamente en unos momentos.";
const SEND_FAILED: &str = "Error interno al enviar mensaje";

/// Body of `POST /enviar-mensaje`.
///
/// Fields are loosely typed: `numero` may arrive as a JSON number or a formatted string.
#[derive(Debug, Default, Deserialize)]
pub struct SendMessageRequest {
    pub numero: Option<Value>,
    pub mensaje: Option<Value>,
}

/// A request that passed validation: digits-only phone number and trimmed text.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct Outbound {
    pub number: String,
    pub text: String,
}

impl SendMessageRequest {
    pub(super) fn validate(self) -> crate::Result<Outbound> {
        let number = match self.numero {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(Error::validation(MISSING_FIELDS)),
        };
        let text = match self.mensaje {
            Some(Value::String(s)) if !s.is_empty() => s,
            None | Some(Value::Null | Value::String(_)) => {
                return Err(Error::validation(MISSING_FIELDS));
            }
            Some(_) => return Err(Error::validation(EMPTY_MESSAGE)),
        };

        let number = phone_digits(&number);
        if number.len() < MIN_PHONE_DIGITS {
            return Err(Error::validation(INVALID_NUMBER));
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::validation(EMPTY_MESSAGE));
        }

        Ok(Outbound {
            number,
            text: text.to_owned(),
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SendMessageResponse {
    success: bool,
    message: &'static str,
    timestamp: DateTime<Utc>,
}

/// Failure of a caller-facing operation, rendered as `{success:false, error, timestamp}`.
#[derive(Debug)]
pub(super) struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self.0.kind() {
            Kind::Validation => {
                let reason = self
                    .0
                    .downcast_ref::<Validation>()
                    .map_or_else(|| INVALID_NUMBER.to_owned(), |v| v.reason.clone());
                (StatusCode::BAD_REQUEST, reason)
            }
            Kind::UnknownRecipient => (StatusCode::BAD_REQUEST, INVALID_NUMBER.to_owned()),
            Kind::NotConnected => (StatusCode::SERVICE_UNAVAILABLE, NOT_CONNECTED.to_owned()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, SEND_FAILED.to_owned()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!(error = %self.0, "Error sending message");
        } else {
            warn!(error = %self.0, "Message rejected");
        }

        (
            status,
            Json(json!({
                "success": false,
                "error": message,
                "timestamp": Utc::now(),
            })),
        )
            .into_response()
    }
}

/// POST /enviar-mensaje
pub(super) async fn send_message(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    // An unreadable body is treated like one with no fields.
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let outbound = request.validate()?;

    info!(to = %outbound.number, "Sending message");
    state
        .bot
        .send_message(&outbound.number, &outbound.text)
        .await?;

    Ok(Json(SendMessageResponse {
        success: true,
        message: "Mensaje enviado correctamente",
        timestamp: Utc::now(),
    }))
}

/// GET /qr
pub(super) async fn pairing_code(State(state): State<Arc<AppState>>) -> Json<Value> {
    let body = match state.bot.pairing_code() {
        Some(pairing) => json!({
            "success": true,
            "qr": pairing.code,
            "message": "Escanea este QR con WhatsApp",
            "timestamp": pairing.updated_at,
        }),
        None => json!({
            "success": false,
            "message": "No hay QR disponible. WhatsApp puede estar ya conectado o en proceso de conexión.",
            "timestamp": Utc::now(),
        }),
    };

    Json(body)
}

/// POST /nuevo-qr
///
/// Responds right away; the reset and the new pairing run in the background.
pub(super) async fn new_pairing_code(State(state): State<Arc<AppState>>) -> Json<Value> {
    let bot = state.bot.clone();
    tokio::spawn(async move { bot.reset_session().await });

    Json(json!({
        "success": true,
        "message": "Sesión limpiada. Reiniciando conexión para generar nuevo QR...",
        "timestamp": Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct StatusResponse {
    success: bool,
    estado: &'static str,
    status: Status,
    timestamp: DateTime<Utc>,
}

/// GET /estado
pub(super) async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        estado: "Servicio activo",
        status: state.bot.get_status(),
        timestamp: Utc::now(),
    })
}

/// GET /health
pub(super) async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "uptime": state.started.elapsed().as_secs_f64(),
    }))
}

pub(super) async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Endpoint no encontrado" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(numero: Value, mensaje: Value) -> SendMessageRequest {
        SendMessageRequest {
            numero: Some(numero),
            mensaje: Some(mensaje),
        }
    }

    fn reason(err: &Error) -> &str {
        &err.downcast_ref::<Validation>().unwrap().reason
    }

    #[test]
    fn validate_should_strip_number_and_trim_message() {
        let outbound = request(json!("+52 (555) 123-4567"), json!("  hola  "))
            .validate()
            .unwrap();

        assert_eq!(
            outbound,
            Outbound {
                number: "525551234567".to_owned(),
                text: "hola".to_owned(),
            }
        );
    }

    #[test]
    fn validate_should_accept_numeric_number() {
        let outbound = request(json!(5_551_234_567_u64), json!("hola"))
            .validate()
            .unwrap();

        assert_eq!(outbound.number, "5551234567");
    }

    #[test]
    fn validate_should_reject_missing_fields() {
        let err = SendMessageRequest {
            numero: Some(json!("5551234567")),
            mensaje: None,
        }
        .validate()
        .unwrap_err();

        assert_eq!(err.kind(), Kind::Validation);
        assert_eq!(reason(&err), MISSING_FIELDS);

        let err = SendMessageRequest::default().validate().unwrap_err();
        assert_eq!(reason(&err), MISSING_FIELDS);
    }

    #[test]
    fn validate_should_reject_short_number() {
        let err = request(json!("555-1234"), json!("hola"))
            .validate()
            .unwrap_err();

        assert_eq!(reason(&err), INVALID_NUMBER);
    }

    #[test]
    fn validate_should_reject_blank_message() {
        let err = request(json!("5551234567"), json!("   "))
            .validate()
            .unwrap_err();

        assert_eq!(reason(&err), EMPTY_MESSAGE);

        let err = request(json!("5551234567"), json!(42)).validate().unwrap_err();
        assert_eq!(reason(&err), EMPTY_MESSAGE);
    }

    #[test]
    fn api_error_should_map_kinds_to_status() {
        let cases = [
            (Error::validation(INVALID_NUMBER), StatusCode::BAD_REQUEST),
            (
                Error::unknown_recipient("5551234567@s.whatsapp.net"),
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::not_connected(crate::bot::ConnectionState::Connecting),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                Error::transport("socket reset"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            let (status, _) = ApiError::from(error).status_and_message();
            assert_eq!(status, expected);
        }
    }
}
