use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Relay-specific errors
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream returned {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Upstream returned an empty message")]
    EmptyResponse,

    #[error("Upstream exhausted after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<RelayError>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RelayError {
    /// Terminal errors are surfaced immediately; everything else is retried
    /// until attempts run out.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RelayError::Config(_) | RelayError::InvalidRequest(_) | RelayError::EmptyResponse
        )
    }

    /// True when the underlying failure was a timeout-triggered abort.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RelayError::Http(err) if err.is_timeout())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            RelayError::Config(msg) => (StatusCode::BAD_REQUEST, msg),
            RelayError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            RelayError::UpstreamHttp { status, body } => (
                StatusCode::BAD_GATEWAY,
                format!("Upstream returned {}: {}", status, body),
            ),
            RelayError::MalformedResponse(msg) => (StatusCode::BAD_GATEWAY, msg),
            err @ RelayError::EmptyResponse => (StatusCode::BAD_GATEWAY, err.to_string()),
            err @ RelayError::Exhausted { .. } => (StatusCode::BAD_GATEWAY, err.to_string()),
            RelayError::Http(err) => (StatusCode::BAD_GATEWAY, format!("HTTP error: {}", err)),
            RelayError::Serialization(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("JSON error: {}", err),
            ),
        };

        let body = Json(json!({
            "error": {
                "type": "relay_error",
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;
