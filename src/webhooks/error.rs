//! Webhook-specific error types.
//!
//! Verification and decoding errors are surfaced to the sender as HTTP 400.
//! Persistence and notification errors never reach the HTTP layer: they are
//! recorded in the reconciliation outcome and logged.

use std::fmt;

use axum::http::StatusCode;

use crate::error::PayhookError;

/// Errors raised while ingesting a webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    // Verification
    /// A signing secret is configured but the request carried no signature header.
    MissingSignature,
    /// The signature header was unparsable or did not match the payload.
    InvalidSignature,
    /// The signed timestamp is outside the accepted tolerance window.
    TimestampOutsideTolerance { age_seconds: i64 },

    // Decoding
    /// The payload could not be decoded into an event.
    MalformedPayload { message: String },

    // Reconciliation (non-fatal)
    /// Recording the payment failed.
    PersistenceFailure { session_id: String, message: String },
    /// Sending the confirmation failed.
    NotificationFailure { session_id: String, message: String },

    /// Anything unexpected before dispatch began.
    InternalFault { message: String },
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSignature => write!(f, "No signature"),
            Self::InvalidSignature => write!(f, "Invalid webhook signature"),
            Self::TimestampOutsideTolerance { age_seconds } => {
                write!(f, "Webhook timestamp outside tolerance ({} seconds)", age_seconds)
            }
            Self::MalformedPayload { message } => {
                write!(f, "Malformed webhook payload: {}", message)
            }
            Self::PersistenceFailure { session_id, message } => {
                write!(f, "Failed to record payment '{}': {}", session_id, message)
            }
            Self::NotificationFailure { session_id, message } => {
                write!(f, "Failed to send confirmation for '{}': {}", session_id, message)
            }
            Self::InternalFault { message } => write!(f, "Internal webhook fault: {}", message),
        }
    }
}

impl std::error::Error for WebhookError {}

impl WebhookError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Errors the sender caused; redelivering the same payload will not help.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingSignature
                | Self::InvalidSignature
                | Self::TimestampOutsideTolerance { .. }
                | Self::MalformedPayload { .. }
        )
    }

    /// Downstream failures that are logged but never fail the webhook response.
    #[must_use]
    pub fn is_partial_failure(&self) -> bool {
        matches!(
            self,
            Self::PersistenceFailure { .. } | Self::NotificationFailure { .. }
        )
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<WebhookError> for PayhookError {
    fn from(err: WebhookError) -> Self {
        if err.is_client_error() {
            PayhookError::BadRequest(err.to_string())
        } else {
            PayhookError::Internal(err.to_string())
        }
    }
}
