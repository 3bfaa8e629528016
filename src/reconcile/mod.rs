//! Payment reconciliation: durable records and confirmation notices.
//!
//! [`ReconciliationSink`] is the entry point. It writes a [`PaymentRecord`]
//! through a [`PaymentStore`] and then asks a
//! [`PaymentNotifier`](crate::email::PaymentNotifier) to confirm the payment.
//!
//! Store backends:
//! - [`InMemoryPaymentStore`]: development and tests
//! - [`RestPaymentStore`]: PostgREST-style hosted databases
//! - [`SeaOrmPaymentStore`]: direct SQL via SeaORM (feature `database`)

mod memory;
mod record;
mod rest_store;
#[cfg(feature = "database")]
mod sea_orm_store;
mod sink;
mod store;

pub use memory::InMemoryPaymentStore;
pub use record::{NewPaymentRecord, PaymentRecord, PaymentStatus};
pub use rest_store::{DEFAULT_PAYMENTS_TABLE, RestPaymentStore};
#[cfg(feature = "database")]
pub use sea_orm_store::SeaOrmPaymentStore;
pub use sink::{
    DEFAULT_STEP_TIMEOUT, NotifyOutcome, PersistOutcome, RecipientPolicy, ReconcileOutcome,
    ReconciliationSink,
};
pub use store::{PaymentStore, UpsertOutcome};
