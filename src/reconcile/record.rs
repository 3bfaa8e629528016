//! Durable payment records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::webhooks::PaymentEvent;

/// Lifecycle status of a stored payment.
///
/// Only `Completed` is written by the webhook flow; the others are reserved so
/// rows written by other tooling still decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Completed,
    Pending,
    Failed,
    Refunded,
}

impl PaymentStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    /// Parse a stored status string. Unknown values fall back to `Pending`.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "refunded" => Self::Refunded,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment row to insert. The store assigns `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPaymentRecord {
    /// Checkout session ID; the deduplication key.
    pub external_id: String,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    /// Amount in minor currency units.
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub metadata: BTreeMap<String, String>,
}

impl NewPaymentRecord {
    /// Materialize the stored row with the store-assigned timestamp.
    #[must_use]
    pub fn into_record(self, created_at: DateTime<Utc>) -> PaymentRecord {
        PaymentRecord {
            external_id: self.external_id,
            customer_id: self.customer_id,
            customer_email: self.customer_email,
            amount: self.amount,
            currency: self.currency,
            status: self.status,
            metadata: self.metadata,
            created_at,
        }
    }
}

impl From<&PaymentEvent> for NewPaymentRecord {
    fn from(event: &PaymentEvent) -> Self {
        Self {
            external_id: event.session_id.clone(),
            customer_id: event.customer_id.clone(),
            customer_email: event.customer_email.clone(),
            amount: event.amount,
            currency: event.currency.clone(),
            status: PaymentStatus::Completed,
            metadata: event.metadata.clone(),
        }
    }
}

/// A stored payment. One per external session ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub external_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}
