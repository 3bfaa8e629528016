//! Persist-then-notify sequencing for completed payments.
//!
//! The two steps are fault-isolated: a persistence failure is logged and the
//! notification is still attempted, and a notification failure never undoes
//! the stored row. Neither step's failure reaches the webhook response.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::record::{NewPaymentRecord, PaymentRecord};
use super::store::{PaymentStore, UpsertOutcome};
use crate::email::{PaymentConfirmation, PaymentNotifier};
use crate::webhooks::{PaymentEvent, WebhookError};

/// Default limit for each external call.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Who receives a payment confirmation.
///
/// Resolution order: the override recipient (sandbox mode, every notice goes
/// there), then the customer's email, then the fallback recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientPolicy {
    override_recipient: Option<String>,
    fallback_recipient: Option<String>,
}

impl RecipientPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send every confirmation to `address`, ignoring the customer's email.
    pub fn with_override(mut self, address: impl Into<String>) -> Self {
        self.override_recipient = non_blank(address.into());
        self
    }

    /// Address used when the event carries no customer email.
    pub fn with_fallback(mut self, address: impl Into<String>) -> Self {
        self.fallback_recipient = non_blank(address.into());
        self
    }

    pub fn resolve(&self, customer_email: Option<&str>) -> Option<String> {
        self.override_recipient
            .clone()
            .or_else(|| customer_email.and_then(|e| non_blank(e.to_string())))
            .or_else(|| self.fallback_recipient.clone())
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Result of the persistence step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Inserted(PaymentRecord),
    /// The payment was already stored by an earlier delivery.
    DuplicateNoop,
    Failed(WebhookError),
}

/// Result of the notification step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent { recipient: String },
    Failed(WebhookError),
}

/// Composite outcome of [`ReconciliationSink::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub persist: PersistOutcome,
    pub notify: NotifyOutcome,
}

impl ReconcileOutcome {
    /// The payment is stored, either by this call or an earlier one.
    pub fn persisted(&self) -> bool {
        !matches!(self.persist, PersistOutcome::Failed(_))
    }

    pub fn notified(&self) -> bool {
        matches!(self.notify, NotifyOutcome::Sent { .. })
    }

    /// Step failures, in execution order.
    pub fn failures(&self) -> Vec<&WebhookError> {
        let mut failures = Vec::new();
        if let PersistOutcome::Failed(e) = &self.persist {
            failures.push(e);
        }
        if let NotifyOutcome::Failed(e) = &self.notify {
            failures.push(e);
        }
        failures
    }
}

/// Records completed payments and sends confirmations.
///
/// ```rust,ignore
/// let sink = ReconciliationSink::new(store, notifier)
///     .with_recipients(RecipientPolicy::new().with_fallback("ops@example.com"))
///     .with_step_timeout(Duration::from_secs(5));
///
/// let outcome = sink.reconcile(&event).await;
/// ```
#[derive(Clone)]
pub struct ReconciliationSink {
    store: Arc<dyn PaymentStore>,
    notifier: Arc<dyn PaymentNotifier>,
    recipients: RecipientPolicy,
    step_timeout: Duration,
}

impl ReconciliationSink {
    pub fn new(store: Arc<dyn PaymentStore>, notifier: Arc<dyn PaymentNotifier>) -> Self {
        Self {
            store,
            notifier,
            recipients: RecipientPolicy::default(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    pub fn with_recipients(mut self, recipients: RecipientPolicy) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn PaymentStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<dyn PaymentNotifier> {
        &self.notifier
    }

    /// Persist the payment, then notify. Always runs both steps.
    pub async fn reconcile(&self, event: &PaymentEvent) -> ReconcileOutcome {
        let persist = self.persist(event).await;

        let occurred_at = match &persist {
            PersistOutcome::Inserted(record) => record.created_at,
            _ => Utc::now(),
        };
        let notify = self.notify(event, occurred_at).await;

        ReconcileOutcome { persist, notify }
    }

    async fn persist(&self, event: &PaymentEvent) -> PersistOutcome {
        let record = NewPaymentRecord::from(event);
        let result =
            tokio::time::timeout(self.step_timeout, self.store.upsert_payment_by_external_id(&record))
                .await;

        match result {
            Ok(Ok(UpsertOutcome::Inserted(stored))) => {
                tracing::info!(
                    target: "payhook::webhooks::sink",
                    session_id = %event.session_id,
                    amount = event.amount,
                    currency = %event.currency,
                    backend = self.store.backend_name(),
                    "payment recorded"
                );
                PersistOutcome::Inserted(stored)
            }
            Ok(Ok(UpsertOutcome::DuplicateNoop)) => {
                tracing::info!(
                    target: "payhook::webhooks::sink",
                    session_id = %event.session_id,
                    "payment already recorded; skipping insert"
                );
                PersistOutcome::DuplicateNoop
            }
            Ok(Err(e)) => self.persist_failed(event, e.to_string()),
            Err(_) => self.persist_failed(
                event,
                format!("timed out after {}s", self.step_timeout.as_secs_f32()),
            ),
        }
    }

    fn persist_failed(&self, event: &PaymentEvent, message: String) -> PersistOutcome {
        tracing::error!(
            target: "payhook::webhooks::sink",
            session_id = %event.session_id,
            backend = self.store.backend_name(),
            error = %message,
            "failed to record payment"
        );
        PersistOutcome::Failed(WebhookError::PersistenceFailure {
            session_id: event.session_id.clone(),
            message,
        })
    }

    async fn notify(
        &self,
        event: &PaymentEvent,
        occurred_at: chrono::DateTime<Utc>,
    ) -> NotifyOutcome {
        let Some(recipient) = self.recipients.resolve(event.customer_email.as_deref()) else {
            return self.notify_failed(
                event,
                "no recipient: customer email missing and no fallback configured".to_string(),
            );
        };

        let confirmation = PaymentConfirmation {
            recipient: recipient.clone(),
            amount_minor: event.amount,
            currency: event.currency.clone(),
            reference_id: event.session_id.clone(),
            occurred_at,
        };

        let result = tokio::time::timeout(
            self.step_timeout,
            self.notifier.send_payment_confirmation(&confirmation),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                tracing::info!(
                    target: "payhook::webhooks::sink",
                    session_id = %event.session_id,
                    "payment confirmation sent"
                );
                NotifyOutcome::Sent { recipient }
            }
            Ok(Err(e)) => self.notify_failed(event, e.to_string()),
            Err(_) => self.notify_failed(
                event,
                format!("timed out after {}s", self.step_timeout.as_secs_f32()),
            ),
        }
    }

    fn notify_failed(&self, event: &PaymentEvent, message: String) -> NotifyOutcome {
        tracing::error!(
            target: "payhook::webhooks::sink",
            session_id = %event.session_id,
            error = %message,
            "failed to send payment confirmation"
        );
        NotifyOutcome::Failed(WebhookError::NotificationFailure {
            session_id: event.session_id.clone(),
            message,
        })
    }
}

impl std::fmt::Debug for ReconciliationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationSink")
            .field("store", &self.store.backend_name())
            .field("recipients", &self.recipients)
            .field("step_timeout", &self.step_timeout)
            .finish()
    }
}
