//! Typed webhook events.
//!
//! The processor's payload is loosely typed JSON. It is decoded in two stages:
//! first into a [`VerifiedPayload`] (envelope fields only, produced after the
//! signature check), then, for the kinds this service acts on, into a
//! [`StripeEvent`] variant. Every optional field is treated as optional.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::WebhookError;

/// Event kind emitted when a Checkout session finishes successfully.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Parsed, trusted webhook envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedPayload {
    /// Event ID (`evt_...`).
    #[serde(default)]
    pub id: String,
    /// Event kind, e.g. `checkout.session.completed`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Event data.
    #[serde(default)]
    pub data: EventData,
    /// Unix timestamp when the processor created the event.
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub livemode: bool,
}

/// Webhook event data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// The object that triggered the event.
    #[serde(default)]
    pub object: serde_json::Value,
}

/// Decode raw bytes into an envelope without any authenticity check.
///
/// Callers must only reach this after the signature has been verified, or in
/// unverified mode.
pub fn decode_payload(payload: &[u8]) -> Result<VerifiedPayload, WebhookError> {
    serde_json::from_slice(payload).map_err(|e| {
        tracing::warn!(
            target: "payhook::webhooks::event",
            error = %e,
            "Failed to parse webhook payload"
        );
        WebhookError::malformed("payload is not a valid event")
    })
}

/// A completed payment, extracted from a `checkout.session.completed` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    /// Checkout session ID (`cs_...`), unique per checkout attempt.
    pub session_id: String,
    /// Processor customer ID, when the session created or reused one.
    pub customer_id: Option<String>,
    /// Customer email, when the processor collected one.
    pub customer_email: Option<String>,
    /// Total in minor currency units.
    pub amount: i64,
    /// Lower-case ISO 4217 code.
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: Option<String>,
    customer: Option<serde_json::Value>,
    customer_email: Option<String>,
    customer_details: Option<CustomerDetails>,
    amount_total: Option<i64>,
    currency: Option<String>,
    metadata: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    email: Option<String>,
}

impl PaymentEvent {
    /// Extract a payment from a checkout session object.
    ///
    /// A missing `amount_total` is read as zero and a missing `currency` as
    /// `default_currency`. The session ID is the only required field.
    pub fn from_checkout_session(
        object: &serde_json::Value,
        default_currency: &str,
    ) -> Result<Self, WebhookError> {
        if !object.is_object() {
            return Err(WebhookError::malformed("checkout session is not an object"));
        }

        let session: CheckoutSessionObject = serde_json::from_value(object.clone())
            .map_err(|e| WebhookError::malformed(format!("checkout session: {}", e)))?;

        let session_id = session
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| WebhookError::malformed("checkout session has no id"))?;

        let amount = session.amount_total.unwrap_or(0);
        if amount < 0 {
            return Err(WebhookError::malformed(format!(
                "negative amount_total {}",
                amount
            )));
        }

        let currency = normalize_currency(session.currency.as_deref().unwrap_or(default_currency))?;

        let customer_id = match session.customer {
            Some(serde_json::Value::String(id)) => Some(id),
            // Expanded customer object
            Some(serde_json::Value::Object(obj)) => obj
                .get("id")
                .and_then(|v| v.as_str())
                .map(String::from),
            _ => None,
        };

        let customer_email = non_blank(session.customer_email)
            .or_else(|| non_blank(session.customer_details.and_then(|d| d.email)));

        let metadata = session
            .metadata
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();

        Ok(Self {
            session_id,
            customer_id,
            customer_email,
            amount,
            currency,
            metadata,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_currency(code: &str) -> Result<String, WebhookError> {
    let code = code.trim().to_ascii_lowercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_lowercase()) {
        Ok(code)
    } else {
        Err(WebhookError::malformed(format!("invalid currency code '{}'", code)))
    }
}

/// Events this service understands, plus a catch-all.
#[derive(Debug, Clone, PartialEq)]
pub enum StripeEvent {
    CheckoutSessionCompleted(PaymentEvent),
    /// Any kind without a typed variant. Carries the raw object so custom
    /// handlers can still inspect it.
    Ignored {
        kind: String,
        object: serde_json::Value,
    },
}

impl StripeEvent {
    pub fn decode(payload: &VerifiedPayload, default_currency: &str) -> Result<Self, WebhookError> {
        match payload.kind.as_str() {
            CHECKOUT_SESSION_COMPLETED => Ok(Self::CheckoutSessionCompleted(
                PaymentEvent::from_checkout_session(&payload.data.object, default_currency)?,
            )),
            other => Ok(Self::Ignored {
                kind: other.to_string(),
                object: payload.data.object.clone(),
            }),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted(_) => CHECKOUT_SESSION_COMPLETED,
            Self::Ignored { kind, .. } => kind,
        }
    }
}
