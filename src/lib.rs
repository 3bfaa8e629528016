//! Payhook - payment webhook ingestion and reconciliation
//!
//! Payhook receives payment-processor webhooks over HTTP, authenticates them
//! against a shared signing secret, and turns completed checkouts into a
//! stored payment record plus a confirmation email. Built on Axum and Tokio.
//!
//! # Features
//!
//! - **Verification**: Stripe `t=...,v1=...` HMAC-SHA256 signatures with a
//!   replay tolerance window, or an explicit unverified development mode
//! - **Dispatch**: typed events routed to handlers by kind; unknown kinds are
//!   acknowledged and ignored
//! - **Reconciliation**: idempotent insert keyed on the checkout session ID,
//!   then a confirmation to the customer or a fallback address
//! - **Stores**: in-memory, PostgREST-compatible REST, or SeaORM (`database`)
//! - **Email**: SMTP via lettre (`email`) or console logging
//! - **Testing**: Alba-style HTTP scenarios and signed payload fixtures
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use payhook::{App, ConfigBuilder};
//!
//! #[tokio::main]
//! async fn main() -> payhook::Result<()> {
//!     payhook::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env()?.build()?;
//!     App::from_config(config).await?.serve().await
//! }
//! ```

mod app;
mod config;
mod core;
pub mod email;
mod error;
pub mod health;
mod http;
mod middleware;
pub mod reconcile;
pub mod testing;
pub mod timeout;
mod utils;
pub mod webhooks;

// Re-exports for public API
pub use app::{AppContext, AppContextBuilder};
pub use config::{
    Config, ConfigBuilder, Environment, LoggingConfig, MailerKind, NotificationConfig,
    ServerConfig, StoreBackend, StoreConfig, WebhookConfig,
};
pub use core::{App, AppBuilder};
pub use error::{ErrorResponse, PayhookError, Result};
pub use health::{ComponentHealth, HealthCheck, HealthChecker, HealthResponse, HealthStatus};
pub use http::RouteModule;
pub use reconcile::{
    InMemoryPaymentStore, PaymentRecord, PaymentStatus, PaymentStore, ReconciliationSink,
    RestPaymentStore,
};
pub use timeout::{TimeoutConfig, TimeoutConfigBuilder};
pub use webhooks::{
    EventDispatcher, StripeEvent, StripeSignatureVerifier, VerifiedPayload, WebhookError,
    WebhookVerifier,
};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// Call early in `main()`, before building the App.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "payhook=debug")
/// - `PAYHOOK_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_flag("LOG_JSON").unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from loaded configuration
///
/// `RUST_LOG` still wins over `config.logging.level` when set.
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
