//! Payment persistence seam.

use async_trait::async_trait;

use super::record::{NewPaymentRecord, PaymentRecord};
use crate::error::Result;

/// Result of an idempotent insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was written.
    Inserted(PaymentRecord),
    /// A row with the same external ID already existed; nothing was written.
    DuplicateNoop,
}

impl UpsertOutcome {
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateNoop)
    }
}

/// Storage for payment records.
///
/// Implementations own the uniqueness constraint on `external_id`: concurrent
/// inserts for the same ID must yield exactly one `Inserted`, every other call
/// gets `DuplicateNoop`. Errors are reserved for genuine failures
/// (connectivity, unrelated constraints).
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert the record unless one with the same external ID exists.
    async fn upsert_payment_by_external_id(
        &self,
        record: &NewPaymentRecord,
    ) -> Result<UpsertOutcome>;

    async fn get_payment_by_external_id(&self, external_id: &str)
    -> Result<Option<PaymentRecord>>;

    /// Short name used in logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Check if the store is reachable.
    fn is_healthy(&self) -> bool {
        true
    }
}
