use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the SDK's public API.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("configuration error: {0}")]
    Config(String),

    /// The gateway answered with a non-2xx status. Body is passed through untouched.
    #[error("gateway returned {status}: {body}")]
    Gateway { status: u16, body: String },

    /// The gateway answered 2xx but its envelope carried a non-200 `code`.
    #[error("gateway api error (code {code}): {message}")]
    Api { code: i64, message: String },

    #[error("an approval waiter is already registered for '{0}'")]
    DuplicateRegistration(String),

    #[error("invalid intercept pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GuardError {
    /// True when the gateway rejected the call with an HTTP status (as opposed to
    /// a transport or decoding failure).
    pub fn status(&self) -> Option<u16> {
        match self {
            GuardError::Gateway { status, .. } => Some(*status),
            GuardError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T, E = GuardError> = std::result::Result<T, E>;

/// Rejections produced by the inbound webhook endpoint.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid json")]
    InvalidJson,

    #[error("missing approval id")]
    MissingApprovalId,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            WebhookError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "Invalid signature".to_string())
            }
            WebhookError::InvalidJson => (StatusCode::BAD_REQUEST, "Invalid JSON".to_string()),
            WebhookError::MissingApprovalId => {
                (StatusCode::BAD_REQUEST, "Missing approval ID".to_string())
            }
            WebhookError::InvalidPayload(reason) => {
                (StatusCode::BAD_REQUEST, format!("Invalid payload: {}", reason))
            }
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}
