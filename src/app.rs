use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderName;

use crate::config::{Config, MailerKind, StoreBackend};
use crate::email::{ConsoleMailer, MailPaymentNotifier, Mailer, PaymentNotifier};
use crate::error::{PayhookError, Result};
use crate::reconcile::{
    DEFAULT_STEP_TIMEOUT, InMemoryPaymentStore, PaymentStore, RecipientPolicy, ReconciliationSink,
    RestPaymentStore,
};
use crate::webhooks::{
    DEFAULT_CURRENCY, EventDispatcher, EventHandler, UnverifiedMode, WebhookVerifier,
    verifier_for_secret,
};

/// Shared state handed to every request
///
/// All collaborators are built once at startup and injected here; handlers
/// reach them through `State<AppContext>`.
#[derive(Clone)]
pub struct AppContext {
    pub verifier: Arc<dyn WebhookVerifier>,
    pub dispatcher: Arc<EventDispatcher>,
    pub store: Arc<dyn PaymentStore>,
    pub notifier: Arc<dyn PaymentNotifier>,
    /// Header carrying the webhook signature
    pub signature_header: HeaderName,
    /// Expose server-side error details in responses
    pub dev_mode: bool,
}

impl AppContext {
    /// Builder pattern for constructing AppContext
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::new()
    }

    /// Construct every collaborator the configuration asks for
    ///
    /// # Errors
    ///
    /// Fails if the store or mailer cannot be created, e.g. the database is
    /// unreachable or the SMTP relay settings are invalid.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = build_store(config).await?;
        let mailer = build_mailer(config)?;

        let mut recipients = RecipientPolicy::new();
        if let Some(address) = &config.notification.fallback_recipient {
            recipients = recipients.with_fallback(address);
        }
        if let Some(address) = &config.notification.override_recipient {
            tracing::warn!(
                recipient = %address,
                "Override recipient set; all payment confirmations go to this address"
            );
            recipients = recipients.with_override(address);
        }

        AppContextBuilder::new()
            .with_verifier(verifier_for_secret(
                config.webhook.signing_secret.clone(),
                config.webhook.tolerance(),
            ))
            .with_store(store)
            .with_notifier(Arc::new(MailPaymentNotifier::new(
                mailer,
                config.notification.from.clone(),
            )))
            .with_recipients(recipients)
            .with_step_timeout(config.timeout.step_duration())
            .with_default_currency(config.webhook.default_currency.clone())
            .with_signature_header(config.webhook.signature_header.clone())
            .with_dev_mode(!config.environment.is_production())
            .build()
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn PaymentStore>> {
    let store = &config.store;
    match store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory payment store; records are lost on restart");
            Ok(Arc::new(InMemoryPaymentStore::new()))
        }
        StoreBackend::Rest => {
            let url = store
                .url
                .clone()
                .ok_or_else(|| PayhookError::config("PAYHOOK_STORE_URL not set"))?;
            let key = store
                .api_key
                .clone()
                .ok_or_else(|| PayhookError::config("PAYHOOK_STORE_API_KEY not set"))?;
            Ok(Arc::new(
                RestPaymentStore::new(url, key)
                    .with_table(store.table.clone())
                    .with_timeout(config.timeout.step_duration()),
            ))
        }
        #[cfg(feature = "database")]
        StoreBackend::Database => {
            let url = store
                .database_url
                .as_deref()
                .ok_or_else(|| PayhookError::config("DATABASE_URL not set"))?;
            let db_store = crate::reconcile::SeaOrmPaymentStore::connect(url).await?;
            db_store.create_table().await?;
            Ok(Arc::new(db_store))
        }
        #[cfg(not(feature = "database"))]
        StoreBackend::Database => Err(PayhookError::config(
            "Database store requires the `database` feature",
        )),
    }
}

fn build_mailer(config: &Config) -> Result<Arc<dyn Mailer>> {
    match config.notification.mailer {
        MailerKind::Console => Ok(Arc::new(ConsoleMailer::new())),
        #[cfg(feature = "email")]
        MailerKind::Smtp => Ok(Arc::new(crate::email::SmtpMailer::new(
            config.notification.smtp.clone(),
        )?)),
        #[cfg(not(feature = "email"))]
        MailerKind::Smtp => Err(PayhookError::config(
            "SMTP mailer requires the `email` feature",
        )),
    }
}

/// Builder for AppContext with fluent API
///
/// Anything left unset gets a development default: unverified mode, an
/// in-memory store, and confirmations logged by [`ConsoleMailer`].
#[must_use = "builder does nothing until you call build()"]
pub struct AppContextBuilder {
    verifier: Option<Arc<dyn WebhookVerifier>>,
    store: Option<Arc<dyn PaymentStore>>,
    notifier: Option<Arc<dyn PaymentNotifier>>,
    recipients: RecipientPolicy,
    step_timeout: Duration,
    default_currency: String,
    signature_header: String,
    handlers: Vec<(String, Arc<dyn EventHandler>)>,
    dev_mode: bool,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self {
            verifier: None,
            store: None,
            notifier: None,
            recipients: RecipientPolicy::default(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
            default_currency: DEFAULT_CURRENCY.to_string(),
            signature_header: "stripe-signature".to_string(),
            handlers: Vec::new(),
            dev_mode: false,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn WebhookVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn PaymentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn PaymentNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_recipients(mut self, recipients: RecipientPolicy) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into();
        self
    }

    pub fn with_signature_header(mut self, header: impl Into<String>) -> Self {
        self.signature_header = header.into();
        self
    }

    /// Register an extra handler, e.g. for `charge.refunded`
    pub fn with_handler(mut self, kind: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push((kind.into(), handler));
        self
    }

    pub fn with_dev_mode(mut self, enabled: bool) -> Self {
        self.dev_mode = enabled;
        self
    }

    /// # Errors
    ///
    /// Fails if the signature header name is not a valid HTTP header name.
    pub fn build(self) -> Result<AppContext> {
        let signature_header = HeaderName::from_bytes(self.signature_header.as_bytes())
            .map_err(|_| {
                PayhookError::config(format!(
                    "Invalid signature header name: {}",
                    self.signature_header
                ))
            })?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryPaymentStore::new()));
        let notifier = self.notifier.unwrap_or_else(|| {
            Arc::new(MailPaymentNotifier::new(
                Arc::new(ConsoleMailer::new()),
                "payments@localhost.localdomain",
            ))
        });
        let verifier = self.verifier.unwrap_or_else(|| Arc::new(UnverifiedMode));

        let sink = ReconciliationSink::new(store.clone(), notifier.clone())
            .with_recipients(self.recipients)
            .with_step_timeout(self.step_timeout);

        let mut dispatcher =
            EventDispatcher::for_sink(sink).with_default_currency(self.default_currency);
        for (kind, handler) in self.handlers {
            dispatcher = dispatcher.on(kind, handler);
        }

        Ok(AppContext {
            verifier,
            dispatcher: Arc::new(dispatcher),
            store,
            notifier,
            signature_header,
            dev_mode: self.dev_mode,
        })
    }
}

impl Default for AppContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
