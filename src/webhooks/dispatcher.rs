//! Routes verified events to handlers by kind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::WebhookError;
use super::event::{CHECKOUT_SESSION_COMPLETED, StripeEvent, VerifiedPayload};
use crate::reconcile::{ReconcileOutcome, ReconciliationSink};

/// Default currency when a checkout session omits one.
pub const DEFAULT_CURRENCY: &str = "usd";

/// What a handler did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// A payment went through the reconciliation sink.
    Reconciled(ReconcileOutcome),
    /// Handled by application code with nothing further to report.
    Processed,
}

/// Handles one kind of event.
///
/// Handlers must tolerate the same event arriving more than once; the
/// processor redelivers anything it did not see acknowledged.
///
/// ```rust,ignore
/// struct RefundLogger;
///
/// #[async_trait]
/// impl EventHandler for RefundLogger {
///     async fn handle(&self, event: &StripeEvent) -> Result<HandlerOutcome, WebhookError> {
///         tracing::info!(kind = event.kind(), "refund received");
///         Ok(HandlerOutcome::Processed)
///     }
/// }
///
/// let dispatcher = EventDispatcher::new().on("charge.refunded", Arc::new(RefundLogger));
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &StripeEvent) -> Result<HandlerOutcome, WebhookError>;
}

/// Built-in handler for `checkout.session.completed`.
#[derive(Debug, Clone)]
pub struct CheckoutCompletedHandler {
    sink: ReconciliationSink,
}

impl CheckoutCompletedHandler {
    pub fn new(sink: ReconciliationSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl EventHandler for CheckoutCompletedHandler {
    async fn handle(&self, event: &StripeEvent) -> Result<HandlerOutcome, WebhookError> {
        match event {
            StripeEvent::CheckoutSessionCompleted(payment) => {
                Ok(HandlerOutcome::Reconciled(self.sink.reconcile(payment).await))
            }
            other => Err(WebhookError::InternalFault {
                message: format!("checkout handler received '{}'", other.kind()),
            }),
        }
    }
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    Handled {
        kind: String,
        outcome: HandlerOutcome,
    },
    /// No handler is registered for this kind. Not an error.
    Ignored { kind: String },
}

impl DispatchResult {
    pub fn kind(&self) -> &str {
        match self {
            Self::Handled { kind, .. } | Self::Ignored { kind } => kind,
        }
    }

    /// The reconciliation outcome, when the event was a payment.
    pub fn reconcile_outcome(&self) -> Option<&ReconcileOutcome> {
        match self {
            Self::Handled {
                outcome: HandlerOutcome::Reconciled(outcome),
                ..
            } => Some(outcome),
            _ => None,
        }
    }
}

/// Kind-to-handler table.
///
/// Routing looks only at the declared kind. Unknown kinds are acknowledged and
/// dropped. There are no retries here; the processor's redelivery is the retry
/// mechanism.
#[derive(Clone)]
pub struct EventDispatcher {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
    default_currency: String,
}

impl EventDispatcher {
    /// An empty dispatcher that ignores every event.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            default_currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Dispatcher with the payment handler wired to `sink`.
    pub fn for_sink(sink: ReconciliationSink) -> Self {
        Self::new().on(
            CHECKOUT_SESSION_COMPLETED,
            Arc::new(CheckoutCompletedHandler::new(sink)),
        )
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn on(mut self, kind: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.insert(kind.into(), handler);
        self
    }

    /// Currency assumed when a checkout session carries none.
    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into().to_ascii_lowercase();
        self
    }

    pub fn handles(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Route `payload` to its handler.
    ///
    /// Errors only when the event cannot be decoded for its handler or the
    /// handler itself fails. Partial failures inside the sink are reported in
    /// the outcome, not as errors.
    pub async fn dispatch(&self, payload: &VerifiedPayload) -> Result<DispatchResult, WebhookError> {
        let Some(handler) = self.handlers.get(&payload.kind) else {
            tracing::info!(
                target: "payhook::webhooks::dispatcher",
                event_id = %payload.id,
                kind = %payload.kind,
                "ignoring unhandled event kind"
            );
            return Ok(DispatchResult::Ignored {
                kind: payload.kind.clone(),
            });
        };

        let event = StripeEvent::decode(payload, &self.default_currency).inspect_err(|e| {
            tracing::warn!(
                target: "payhook::webhooks::dispatcher",
                event_id = %payload.id,
                kind = %payload.kind,
                error = %e,
                "event could not be decoded"
            );
        })?;

        let outcome = handler.handle(&event).await?;

        tracing::debug!(
            target: "payhook::webhooks::dispatcher",
            event_id = %payload.id,
            kind = %payload.kind,
            "event dispatched"
        );

        Ok(DispatchResult::Handled {
            kind: payload.kind.clone(),
            outcome,
        })
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("kinds", &self.kinds())
            .field("default_currency", &self.default_currency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::InMemoryPaymentStore;
    use crate::testing::fixtures::RecordingNotifier;
    use crate::webhooks::event::EventData;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn payload(kind: &str, object: serde_json::Value) -> VerifiedPayload {
        VerifiedPayload {
            id: "evt_1".to_string(),
            kind: kind.to_string(),
            data: EventData { object },
            created: None,
            livemode: false,
        }
    }

    struct CountingHandler(AtomicUsize);

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: &StripeEvent) -> Result<HandlerOutcome, WebhookError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerOutcome::Processed)
        }
    }

    fn sink(store: &InMemoryPaymentStore, notifier: &RecordingNotifier) -> ReconciliationSink {
        ReconciliationSink::new(Arc::new(store.clone()), Arc::new(notifier.clone()))
    }

    #[tokio::test]
    async fn test_unknown_kind_is_ignored() {
        let dispatcher = EventDispatcher::new();
        let result = dispatcher
            .dispatch(&payload("charge.refunded", json!({"id": "ch_1"})))
            .await
            .unwrap();

        assert_eq!(
            result,
            DispatchResult::Ignored {
                kind: "charge.refunded".to_string()
            }
        );
        assert!(result.reconcile_outcome().is_none());
    }

    #[tokio::test]
    async fn test_checkout_reaches_sink() {
        let store = InMemoryPaymentStore::new();
        let notifier = RecordingNotifier::new();
        let dispatcher = EventDispatcher::for_sink(sink(&store, &notifier));

        let result = dispatcher
            .dispatch(&payload(
                CHECKOUT_SESSION_COMPLETED,
                json!({
                    "id": "sess_abc",
                    "amount_total": 1999,
                    "customer_email": "buyer@example.com"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(result.kind(), CHECKOUT_SESSION_COMPLETED);
        let outcome = result.reconcile_outcome().unwrap();
        assert!(outcome.persisted() && outcome.notified());
        assert_eq!(store.len(), 1);
        assert_eq!(notifier.sent()[0].currency, "usd");
    }

    #[tokio::test]
    async fn test_default_currency_applies() {
        let store = InMemoryPaymentStore::new();
        let notifier = RecordingNotifier::new();
        let dispatcher =
            EventDispatcher::for_sink(sink(&store, &notifier)).with_default_currency("EUR");

        dispatcher
            .dispatch(&payload(
                CHECKOUT_SESSION_COMPLETED,
                json!({"id": "sess_eur", "customer_email": "buyer@example.com"}),
            ))
            .await
            .unwrap();

        let stored = store.all_payments();
        assert_eq!(stored[0].currency, "eur");
        assert_eq!(stored[0].amount, 0);
    }

    #[tokio::test]
    async fn test_undecodable_checkout_is_malformed() {
        let store = InMemoryPaymentStore::new();
        let notifier = RecordingNotifier::new();
        let dispatcher = EventDispatcher::for_sink(sink(&store, &notifier));

        let err = dispatcher
            .dispatch(&payload(CHECKOUT_SESSION_COMPLETED, json!({"amount_total": 5})))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::MalformedPayload { .. }));
        assert!(store.is_empty());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_custom_handler_registration() {
        let counter = Arc::new(CountingHandler(AtomicUsize::new(0)));
        let dispatcher = EventDispatcher::new().on("charge.refunded", counter.clone());

        assert!(dispatcher.handles("charge.refunded"));
        assert_eq!(dispatcher.kinds(), vec!["charge.refunded"]);

        let result = dispatcher
            .dispatch(&payload("charge.refunded", json!({"id": "ch_1"})))
            .await
            .unwrap();
        assert!(matches!(
            result,
            DispatchResult::Handled {
                outcome: HandlerOutcome::Processed,
                ..
            }
        ));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_checkout_handler_rejects_other_events() {
        let store = InMemoryPaymentStore::new();
        let notifier = RecordingNotifier::new();
        let handler = CheckoutCompletedHandler::new(sink(&store, &notifier));

        let err = handler
            .handle(&StripeEvent::Ignored {
                kind: "ping".to_string(),
                object: json!(null),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::InternalFault { .. }));
    }
}
