//! Payment store backed by a PostgREST-style HTTP interface.
//!
//! Hosted Postgres providers expose tables over REST. An insert with
//! `on_conflict=external_id` and `Prefer: resolution=ignore-duplicates` becomes
//! `INSERT ... ON CONFLICT (external_id) DO NOTHING`; with
//! `return=representation` the response lists the rows actually written, so an
//! empty array means the payment was already stored.
//!
//! # Example
//!
//! ```rust,ignore
//! use payhook::reconcile::RestPaymentStore;
//!
//! let store = RestPaymentStore::new("https://project.supabase.co", service_key)
//!     .with_table("payments")
//!     .with_timeout(Duration::from_secs(5));
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};

use super::record::{NewPaymentRecord, PaymentRecord};
use super::store::{PaymentStore, UpsertOutcome};
use crate::error::{PayhookError, Result};

/// Default table name.
pub const DEFAULT_PAYMENTS_TABLE: &str = "payments";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY: usize = 256;

/// PostgREST payment store.
#[derive(Clone)]
pub struct RestPaymentStore {
    base_url: String,
    table: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl RestPaymentStore {
    /// Create a store for the project at `base_url`, authenticated with `api_key`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<SecretString>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            table: DEFAULT_PAYMENTS_TABLE.to_string(),
            api_key: api_key.into(),
            client: Self::build_client(DEFAULT_TIMEOUT),
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the per-request client timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Self::build_client(timeout);
        self
    }

    fn build_client(timeout: Duration) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("payhook/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default()
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.api_key.expose_secret();
        request.header("apikey", key).bearer_auth(key)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }

        let message = format!("payment store returned HTTP {}: {}", status.as_u16(), body);
        if status == StatusCode::SERVICE_UNAVAILABLE {
            Err(PayhookError::service_unavailable(message))
        } else {
            Err(PayhookError::internal(message))
        }
    }
}

impl std::fmt::Debug for RestPaymentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestPaymentStore")
            .field("base_url", &self.base_url)
            .field("table", &self.table)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl PaymentStore for RestPaymentStore {
    async fn upsert_payment_by_external_id(
        &self,
        record: &NewPaymentRecord,
    ) -> Result<UpsertOutcome> {
        tracing::debug!(
            target: "payhook::reconcile::rest",
            external_id = %record.external_id,
            table = %self.table,
            "inserting payment"
        );

        let request = self
            .client
            .post(self.endpoint())
            .query(&[("on_conflict", "external_id")])
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(record);

        let response = self.authorized(request).send().await?;
        let response = Self::check_status(response).await?;
        let mut rows: Vec<PaymentRecord> = response.json().await.map_err(|e| {
            PayhookError::internal(format!("payment store returned an unexpected body: {}", e))
        })?;

        match rows.pop() {
            Some(row) => Ok(UpsertOutcome::Inserted(row)),
            None => Ok(UpsertOutcome::DuplicateNoop),
        }
    }

    async fn get_payment_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentRecord>> {
        let filter = format!("eq.{}", external_id);
        let request = self
            .client
            .get(self.endpoint())
            .query(&[("external_id", filter.as_str()), ("select", "*"), ("limit", "1")]);

        let response = self.authorized(request).send().await?;
        let response = Self::check_status(response).await?;
        let mut rows: Vec<PaymentRecord> = response.json().await.map_err(|e| {
            PayhookError::internal(format!("payment store returned an unexpected body: {}", e))
        })?;

        Ok(rows.pop())
    }

    fn backend_name(&self) -> &'static str {
        "rest"
    }
}
