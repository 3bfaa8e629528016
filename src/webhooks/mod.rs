//! Payment processor webhooks.
//!
//! A delivery flows through three stages:
//!
//! 1. [`WebhookVerifier`] authenticates the raw body against the signature
//!    header and parses the envelope ([`VerifiedPayload`]).
//! 2. [`EventDispatcher`] routes the envelope by kind; unknown kinds are
//!    acknowledged and dropped.
//! 3. For `checkout.session.completed`, [`CheckoutCompletedHandler`] hands a
//!    [`PaymentEvent`] to the
//!    [`ReconciliationSink`](crate::reconcile::ReconciliationSink).
//!
//! [`receive_webhook`] wires the stages to an axum route.

mod dispatcher;
mod error;
mod event;
mod handler;
mod verification;

pub use dispatcher::{
    CheckoutCompletedHandler, DEFAULT_CURRENCY, DispatchResult, EventDispatcher, EventHandler,
    HandlerOutcome,
};
pub use error::WebhookError;
pub use event::{
    CHECKOUT_SESSION_COMPLETED, EventData, PaymentEvent, StripeEvent, VerifiedPayload,
    decode_payload,
};
pub use handler::{WebhookAck, WebhookModule, receive_webhook};
pub use verification::{
    DEFAULT_TOLERANCE_SECONDS, StripeSignatureVerifier, UnverifiedMode, VerificationMode,
    WebhookVerifier, verifier_for_secret,
};
