//! Test doubles and payload builders for the webhook flow.
//!
//! ```rust,ignore
//! use payhook::testing::fixtures::{checkout_completed_payload, sign_payload};
//!
//! let body = checkout_completed_payload("sess_abc", 1999, "usd", Some("buyer@example.com"));
//! let header = sign_payload("whsec_test", &body, chrono::Utc::now().timestamp());
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::email::{Email, Mailer, PaymentConfirmation, PaymentNotifier};
use crate::error::{PayhookError, Result};
use crate::reconcile::{NewPaymentRecord, PaymentRecord, PaymentStore, UpsertOutcome};
use crate::webhooks::{CHECKOUT_SESSION_COMPLETED, StripeSignatureVerifier};

/// Notifier that records every confirmation instead of sending it
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<PaymentConfirmation>>>,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before recording, to exercise step timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<PaymentConfirmation> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentNotifier for RecordingNotifier {
    async fn send_payment_confirmation(&self, confirmation: &PaymentConfirmation) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent
            .lock()
            .map_err(|_| PayhookError::internal("recording notifier lock poisoned"))?
            .push(confirmation.clone());
        Ok(())
    }
}

/// Notifier whose relay is always down
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingNotifier;

#[async_trait]
impl PaymentNotifier for FailingNotifier {
    async fn send_payment_confirmation(&self, _confirmation: &PaymentConfirmation) -> Result<()> {
        Err(PayhookError::service_unavailable("mail relay unreachable"))
    }

    fn is_healthy(&self) -> bool {
        false
    }
}

/// Store whose backend is always down
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingPaymentStore;

#[async_trait]
impl PaymentStore for FailingPaymentStore {
    async fn upsert_payment_by_external_id(
        &self,
        _record: &NewPaymentRecord,
    ) -> Result<UpsertOutcome> {
        Err(PayhookError::service_unavailable("store unreachable"))
    }

    async fn get_payment_by_external_id(&self, _external_id: &str) -> Result<Option<PaymentRecord>> {
        Err(PayhookError::service_unavailable("store unreachable"))
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }

    fn is_healthy(&self) -> bool {
        false
    }
}

/// Mailer that keeps every message it is asked to send
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;
        self.sent
            .lock()
            .map_err(|_| PayhookError::internal("recording mailer lock poisoned"))?
            .push(email.clone());
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Event envelope around an arbitrary data object
pub fn event_payload(kind: &str, object: serde_json::Value) -> String {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "object": "event",
        "type": kind,
        "created": chrono::Utc::now().timestamp(),
        "livemode": false,
        "data": { "object": object },
    })
    .to_string()
}

/// A `checkout.session.completed` event
pub fn checkout_completed_payload(
    session_id: &str,
    amount_total: i64,
    currency: &str,
    customer_email: Option<&str>,
) -> String {
    event_payload(
        CHECKOUT_SESSION_COMPLETED,
        json!({
            "id": session_id,
            "object": "checkout.session",
            "customer": "cus_test",
            "customer_email": customer_email,
            "amount_total": amount_total,
            "currency": currency,
            "payment_status": "paid",
            "metadata": {},
        }),
    )
}

/// Signature header value for `payload`, as the processor would send it
pub fn sign_payload(secret: &str, payload: &str, timestamp: i64) -> String {
    StripeSignatureVerifier::new(secret).sign(payload.as_bytes(), timestamp)
}
