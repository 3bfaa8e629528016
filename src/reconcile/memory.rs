//! In-memory payment store for development and tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::record::{NewPaymentRecord, PaymentRecord};
use super::store::{PaymentStore, UpsertOutcome};
use crate::error::{PayhookError, Result};

/// In-memory payment store.
///
/// Check-and-insert happens under one write lock, so concurrent deliveries of
/// the same session produce exactly one row. Contents are lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryPaymentStore {
    inner: Arc<InMemoryPaymentStoreInner>,
}

#[derive(Default)]
struct InMemoryPaymentStoreInner {
    payments: RwLock<HashMap<String, PaymentRecord>>,
}

impl InMemoryPaymentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payments (for testing).
    pub fn len(&self) -> usize {
        self.inner.payments.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored payments (for testing).
    pub fn all_payments(&self) -> Vec<PaymentRecord> {
        self.inner
            .payments
            .read()
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default()
    }
}

fn poisoned() -> PayhookError {
    PayhookError::internal("payment store lock poisoned")
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn upsert_payment_by_external_id(
        &self,
        record: &NewPaymentRecord,
    ) -> Result<UpsertOutcome> {
        let mut payments = self.inner.payments.write().map_err(|_| poisoned())?;

        if payments.contains_key(&record.external_id) {
            tracing::debug!(
                target: "payhook::reconcile::memory",
                external_id = %record.external_id,
                "payment already stored"
            );
            return Ok(UpsertOutcome::DuplicateNoop);
        }

        let stored = record.clone().into_record(Utc::now());
        payments.insert(stored.external_id.clone(), stored.clone());
        Ok(UpsertOutcome::Inserted(stored))
    }

    async fn get_payment_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentRecord>> {
        let payments = self.inner.payments.read().map_err(|_| poisoned())?;
        Ok(payments.get(external_id).cloned())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
