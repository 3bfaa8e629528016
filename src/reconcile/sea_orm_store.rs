//! SeaORM-backed payment storage.
//!
//! ```rust,ignore
//! use payhook::reconcile::SeaOrmPaymentStore;
//!
//! let store = SeaOrmPaymentStore::connect(&database_url).await?;
//! store.create_table().await?;
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, Set, TryInsertResult,
    sea_query::OnConflict,
};

use super::record::{NewPaymentRecord, PaymentRecord, PaymentStatus};
use super::store::{PaymentStore, UpsertOutcome};
use crate::error::{PayhookError, Result};

mod entity {
    pub mod payment {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "payments")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub external_id: String,
            pub customer_id: Option<String>,
            pub customer_email: Option<String>,
            pub amount: i64,
            pub currency: String,
            pub status: String,
            #[sea_orm(column_type = "Json")]
            pub metadata: Json,
            pub created_at: DateTimeWithTimeZone,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }
}

use entity::payment;

fn db_error(e: sea_orm::DbErr) -> PayhookError {
    PayhookError::Database(e.to_string())
}

fn model_to_record(model: payment::Model) -> Result<PaymentRecord> {
    let metadata = serde_json::from_value(model.metadata).map_err(|e| {
        tracing::warn!(
            target: "payhook::reconcile::sea_orm",
            external_id = %model.external_id,
            error = %e,
            "stored payment metadata is not a string map"
        );
        PayhookError::Database(format!(
            "invalid metadata for payment {}: {}",
            model.external_id, e
        ))
    })?;

    Ok(PaymentRecord {
        external_id: model.external_id,
        customer_id: model.customer_id,
        customer_email: model.customer_email,
        amount: model.amount,
        currency: model.currency,
        status: PaymentStatus::from_str_lossy(&model.status),
        metadata,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

/// Payment store on any SeaORM backend (Postgres in production, SQLite in tests).
///
/// Deduplication relies on the primary key on `external_id`:
/// `INSERT ... ON CONFLICT (external_id) DO NOTHING`, with a conflicted insert
/// reported as [`UpsertOutcome::DuplicateNoop`].
#[derive(Clone, Debug)]
pub struct SeaOrmPaymentStore {
    db: DatabaseConnection,
}

impl SeaOrmPaymentStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connect to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = Database::connect(database_url).await.map_err(db_error)?;
        Ok(Self::new(db))
    }

    /// Create the `payments` table if it does not exist.
    pub async fn create_table(&self) -> Result<()> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);
        let mut statement = schema.create_table_from_entity(payment::Entity);
        statement.if_not_exists();

        self.db
            .execute(backend.build(&statement))
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for SeaOrmPaymentStore {
    async fn upsert_payment_by_external_id(
        &self,
        record: &NewPaymentRecord,
    ) -> Result<UpsertOutcome> {
        tracing::debug!(
            target: "payhook::reconcile::sea_orm",
            external_id = %record.external_id,
            "inserting payment"
        );

        let now = Utc::now();
        let metadata = serde_json::to_value(&record.metadata)?;

        let model = payment::ActiveModel {
            external_id: Set(record.external_id.clone()),
            customer_id: Set(record.customer_id.clone()),
            customer_email: Set(record.customer_email.clone()),
            amount: Set(record.amount),
            currency: Set(record.currency.clone()),
            status: Set(record.status.as_str().to_string()),
            metadata: Set(metadata),
            created_at: Set(now.fixed_offset()),
        };

        let result = payment::Entity::insert(model)
            .on_conflict(
                OnConflict::column(payment::Column::ExternalId)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(&self.db)
            .await
            .map_err(db_error)?;

        match result {
            TryInsertResult::Inserted(_) => {
                Ok(UpsertOutcome::Inserted(record.clone().into_record(now)))
            }
            TryInsertResult::Conflicted | TryInsertResult::Empty => {
                Ok(UpsertOutcome::DuplicateNoop)
            }
        }
    }

    async fn get_payment_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentRecord>> {
        let model = payment::Entity::find_by_id(external_id.to_string())
            .one(&self.db)
            .await
            .map_err(db_error)?;

        model.map(model_to_record).transpose()
    }

    fn backend_name(&self) -> &'static str {
        "database"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn new_record(id: &str) -> NewPaymentRecord {
        NewPaymentRecord {
            external_id: id.to_string(),
            customer_id: Some("cus_1".to_string()),
            customer_email: Some("buyer@example.com".to_string()),
            amount: 1999,
            currency: "usd".to_string(),
            status: PaymentStatus::Completed,
            metadata: BTreeMap::from([("order".to_string(), "42".to_string())]),
        }
    }

    async fn sqlite_store() -> SeaOrmPaymentStore {
        let store = SeaOrmPaymentStore::connect("sqlite::memory:").await.unwrap();
        store.create_table().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_then_duplicate() {
        let store = sqlite_store().await;

        let first = store
            .upsert_payment_by_external_id(&new_record("sess_abc"))
            .await
            .unwrap();
        assert!(matches!(first, UpsertOutcome::Inserted(_)));

        let second = store
            .upsert_payment_by_external_id(&new_record("sess_abc"))
            .await
            .unwrap();
        assert_eq!(second, UpsertOutcome::DuplicateNoop);

        let stored = store
            .get_payment_by_external_id("sess_abc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.amount, 1999);
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.metadata.get("order").map(String::as_str), Some("42"));
    }

    #[tokio::test]
    async fn test_undecodable_metadata_is_an_error() {
        let store = sqlite_store().await;

        let row = payment::ActiveModel {
            external_id: Set("sess_bad_meta".to_string()),
            customer_id: Set(None),
            customer_email: Set(None),
            amount: Set(500),
            currency: Set("usd".to_string()),
            status: Set(PaymentStatus::Completed.as_str().to_string()),
            metadata: Set(serde_json::json!(["not", "a", "map"])),
            created_at: Set(Utc::now().fixed_offset()),
        };
        payment::Entity::insert(row).exec(&store.db).await.unwrap();

        let err = store
            .get_payment_by_external_id("sess_bad_meta")
            .await
            .unwrap_err();
        assert!(matches!(err, PayhookError::Database(ref msg) if msg.contains("sess_bad_meta")));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = sqlite_store().await;
        assert!(store.get_payment_by_external_id("nope").await.unwrap().is_none());
    }
}
