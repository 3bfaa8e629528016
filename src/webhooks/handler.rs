//! HTTP endpoint receiving processor webhooks.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::dispatcher::DispatchResult;
use super::error::WebhookError;
use crate::app::AppContext;
use crate::error::PayhookError;
use crate::http::RouteModule;

/// Acknowledgement body: `{"received": true}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Verify, dispatch and acknowledge one webhook delivery.
///
/// The body is taken as raw bytes so the signature is checked over exactly
/// what was sent. Verification and decoding failures answer 400 with nothing
/// written; once dispatched, the answer is 200 even if recording or notifying
/// failed, so the processor does not redeliver for a problem on our side that
/// a retry would not fix.
pub async fn receive_webhook(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match process(&ctx, &headers, &body).await {
        Ok(result) => {
            if let Some(outcome) = result.reconcile_outcome() {
                for failure in outcome.failures() {
                    tracing::warn!(
                        target: "payhook::webhooks::handler",
                        kind = result.kind(),
                        error = %failure,
                        "webhook acknowledged with partial failure"
                    );
                }
            }
            Json(WebhookAck { received: true }).into_response()
        }
        Err(e) => PayhookError::from(e).into_response_with_mode(ctx.dev_mode),
    }
}

async fn process(
    ctx: &AppContext,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<DispatchResult, WebhookError> {
    let signature = match headers.get(&ctx.signature_header) {
        Some(value) => Some(value.to_str().map_err(|_| WebhookError::InvalidSignature)?),
        None => None,
    };

    let payload = ctx.verifier.verify(body, signature)?;
    ctx.dispatcher.dispatch(&payload).await
}

/// Route module mounting [`receive_webhook`] at a configurable path.
#[derive(Debug, Clone)]
pub struct WebhookModule {
    path: String,
}

impl WebhookModule {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for WebhookModule {
    fn default() -> Self {
        Self::new("/webhooks/stripe")
    }
}

impl RouteModule for WebhookModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new().route(&self.path, post(receive_webhook))
    }
}
