use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for payhook
#[derive(Debug, thiserror::Error)]
pub enum PayhookError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(String),
}

/// Error body returned to webhook senders and API clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_id: Option<String>,
}

impl PayhookError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) | Self::Config(_) | Self::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            #[cfg(feature = "database")]
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
        }
    }

    /// Message that is safe to hand back to the caller.
    ///
    /// Client errors carry their message; server errors are reduced to a
    /// generic line so upstream details (store URLs, SMTP replies) never leak.
    /// The full error is still logged with the response's `error_id`.
    fn safe_message(&self) -> String {
        match self {
            Self::BadRequest(msg) => msg.clone(),
            Self::RequestTimeout => "Request timeout".to_string(),
            Self::Internal(_) | Self::Config(_) | Self::Anyhow(_) => {
                "Internal server error".to_string()
            }
            Self::ServiceUnavailable(_) => "Service unavailable".to_string(),
            #[cfg(feature = "database")]
            Self::Database(_) => "Database error".to_string(),
        }
    }

    /// Convert to a JSON response, exposing server-side details only in dev mode
    pub fn into_response_with_mode(self, dev_mode: bool) -> Response {
        let status = self.status_code();
        let message = if dev_mode {
            self.to_string()
        } else {
            self.safe_message()
        };
        let error_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request failed"
            );
        } else {
            tracing::warn!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: message,
            error_id: Some(error_id),
        };

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for PayhookError {
    fn into_response(self) -> Response {
        self.into_response_with_mode(false)
    }
}

/// Result type alias for payhook
pub type Result<T> = std::result::Result<T, PayhookError>;

impl From<serde_json::Error> for PayhookError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            PayhookError::BadRequest(format!("JSON error: {}", err))
        } else {
            PayhookError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<reqwest::Error> for PayhookError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PayhookError::RequestTimeout
        } else if err.is_connect() {
            PayhookError::ServiceUnavailable(format!("Connection error: {}", err))
        } else if err.is_status() {
            match err.status().map(|s| s.as_u16()) {
                Some(503) => {
                    PayhookError::ServiceUnavailable("Upstream service unavailable".to_string())
                }
                Some(status) => PayhookError::Internal(format!("Upstream returned HTTP {}", status)),
                None => PayhookError::Internal(format!("HTTP error: {}", err)),
            }
        } else {
            PayhookError::Internal(format!("Request error: {}", err))
        }
    }
}
