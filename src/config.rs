use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use secrecy::SecretString;
use validator::ValidateEmail;

use crate::email::{SmtpConfig, TlsMode, mailbox_address};
use crate::error::{PayhookError, Result};
use crate::reconcile::DEFAULT_PAYMENTS_TABLE;
use crate::timeout::TimeoutConfig;
use crate::utils::{get_env_flag, get_env_non_empty, get_env_parsed, get_env_with_prefix};
use crate::webhooks::DEFAULT_TOLERANCE_SECONDS;

/// Main configuration for the payhook service
///
/// Holds secrets, so it is not serializable; see [`ConfigBuilder::from_env`]
/// for the variables it reads.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub timeout: TimeoutConfig,
    pub environment: Environment,
    pub webhook: WebhookConfig,
    pub notification: NotificationConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes (default: 1MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = PayhookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" | "test" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(PayhookError::config(format!(
                "Invalid environment '{}'. Must be development or production",
                other
            ))),
        }
    }
}

/// Inbound webhook endpoint settings
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Endpoint signing secret (`whsec_...`). `None` means unverified mode.
    pub signing_secret: Option<SecretString>,
    pub path: String,
    pub signature_header: String,
    pub tolerance_seconds: u64,
    pub default_currency: String,
}

impl WebhookConfig {
    pub fn tolerance(&self) -> Duration {
        Duration::from_secs(self.tolerance_seconds)
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            path: "/webhooks/stripe".to_string(),
            signature_header: "stripe-signature".to_string(),
            tolerance_seconds: DEFAULT_TOLERANCE_SECONDS,
            default_currency: "usd".to_string(),
        }
    }
}

/// Which mail backend delivers confirmations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailerKind {
    /// Log instead of sending
    #[default]
    Console,
    Smtp,
}

impl std::str::FromStr for MailerKind {
    type Err = PayhookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "smtp" => Ok(Self::Smtp),
            other => Err(PayhookError::config(format!(
                "Invalid mailer '{}'. Must be console or smtp",
                other
            ))),
        }
    }
}

/// Confirmation email settings
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub from: String,
    /// Used when an event has no customer email
    pub fallback_recipient: Option<String>,
    /// Receives every confirmation instead of the customer (sandbox mode)
    pub override_recipient: Option<String>,
    pub mailer: MailerKind,
    pub smtp: SmtpConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            from: "onboarding@resend.dev".to_string(),
            fallback_recipient: None,
            override_recipient: None,
            mailer: MailerKind::default(),
            smtp: SmtpConfig::new("smtp.resend.com"),
        }
    }
}

/// Which backend stores payment records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    /// PostgREST-style HTTP interface
    Rest,
    /// SeaORM connection (feature `database`)
    Database,
}

impl std::str::FromStr for StoreBackend {
    type Err = PayhookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rest" => Ok(Self::Rest),
            "database" | "db" => Ok(Self::Database),
            other => Err(PayhookError::config(format!(
                "Invalid store '{}'. Must be memory, rest or database",
                other
            ))),
        }
    }
}

/// Payment store settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Base URL for the REST backend
    pub url: Option<String>,
    pub api_key: Option<SecretString>,
    pub table: String,
    /// Connection string for the database backend
    pub database_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            api_key: None,
            table: DEFAULT_PAYMENTS_TABLE.to_string(),
            database_url: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_body_size() -> usize {
    // Processor events are a few KB; anything near this is not a webhook
    1024 * 1024
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Builder for Config with environment variable support
///
/// ```rust,ignore
/// use payhook::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .from_env()?
///     .with_fallback_recipient("ops@example.com")
///     .build()?;
/// ```
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.config.server.max_body_size = max_body_size;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.config.environment = environment;
        self
    }

    pub fn with_signing_secret(mut self, secret: impl Into<SecretString>) -> Self {
        self.config.webhook.signing_secret = Some(secret.into());
        self
    }

    pub fn with_webhook_path(mut self, path: impl Into<String>) -> Self {
        self.config.webhook.path = path.into();
        self
    }

    pub fn with_signature_header(mut self, header: impl Into<String>) -> Self {
        self.config.webhook.signature_header = header.into();
        self
    }

    pub fn with_signature_tolerance(mut self, tolerance: Duration) -> Self {
        self.config.webhook.tolerance_seconds = tolerance.as_secs();
        self
    }

    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.config.webhook.default_currency = currency.into();
        self
    }

    pub fn with_mail_from(mut self, from: impl Into<String>) -> Self {
        self.config.notification.from = from.into();
        self
    }

    pub fn with_fallback_recipient(mut self, address: impl Into<String>) -> Self {
        self.config.notification.fallback_recipient = Some(address.into());
        self
    }

    pub fn with_override_recipient(mut self, address: impl Into<String>) -> Self {
        self.config.notification.override_recipient = Some(address.into());
        self
    }

    pub fn with_mailer(mut self, mailer: MailerKind) -> Self {
        self.config.notification.mailer = mailer;
        self
    }

    pub fn with_smtp(mut self, smtp: SmtpConfig) -> Self {
        self.config.notification.smtp = smtp;
        self.config.notification.mailer = MailerKind::Smtp;
        self
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.config.store = store;
        self
    }

    /// Load configuration from environment variables
    ///
    /// Every key is looked up as `PAYHOOK_<KEY>` first and then as `<KEY>`, so
    /// conventional names such as `PORT`, `STRIPE_WEBHOOK_SECRET`, `SMTP_HOST`
    /// and `DATABASE_URL` work unprefixed.
    ///
    /// # Errors
    ///
    /// Returns an error for enumerated settings with unknown values
    /// (`PAYHOOK_ENV`, `MAILER`, `SMTP_TLS`, `STORE`).
    pub fn from_env(mut self) -> Result<Self> {
        let c = &mut self.config;

        if let Some(host) = get_env_with_prefix("HOST") {
            c.server.host = host;
        }
        if let Some(port) = get_env_parsed("PORT") {
            c.server.port = port;
        }
        if let Some(size) = get_env_parsed("MAX_BODY_SIZE") {
            c.server.max_body_size = size;
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            c.logging.level = level;
        }
        if let Some(json) = get_env_flag("LOG_JSON") {
            c.logging.json = json;
        }
        // No unprefixed fallback: POSIX shells use `ENV` for their own purposes
        if let Some(env) = std::env::var("PAYHOOK_ENV").ok().filter(|v| !v.trim().is_empty()) {
            c.environment = env.parse()?;
        }

        c.timeout = TimeoutConfig::from_env();

        // Webhook endpoint
        if let Some(secret) = get_env_non_empty("STRIPE_WEBHOOK_SECRET") {
            c.webhook.signing_secret = Some(SecretString::from(secret));
        }
        if let Some(path) = get_env_non_empty("WEBHOOK_PATH") {
            c.webhook.path = path;
        }
        if let Some(header) = get_env_non_empty("SIGNATURE_HEADER") {
            c.webhook.signature_header = header;
        }
        if let Some(seconds) = get_env_parsed("SIGNATURE_TOLERANCE_SECONDS") {
            c.webhook.tolerance_seconds = seconds;
        }
        if let Some(currency) = get_env_non_empty("DEFAULT_CURRENCY") {
            c.webhook.default_currency = currency;
        }

        // Notifications
        if let Some(from) = get_env_non_empty("MAIL_FROM") {
            c.notification.from = from;
        }
        if let Some(address) = get_env_non_empty("FALLBACK_RECIPIENT") {
            c.notification.fallback_recipient = Some(address);
        }
        if let Some(address) = get_env_non_empty("OVERRIDE_RECIPIENT") {
            c.notification.override_recipient = Some(address);
        }
        if let Some(mailer) = get_env_non_empty("MAILER") {
            c.notification.mailer = mailer.parse()?;
        }
        if let Some(host) = get_env_non_empty("SMTP_HOST") {
            c.notification.smtp.host = host;
        }
        if let Some(port) = get_env_parsed("SMTP_PORT") {
            c.notification.smtp.port = Some(port);
        }
        if let Some(tls) = get_env_non_empty("SMTP_TLS") {
            c.notification.smtp.tls = tls.parse::<TlsMode>()?;
        }
        if let Some(username) = get_env_non_empty("SMTP_USERNAME") {
            c.notification.smtp.username = Some(username);
        }
        if let Some(password) = get_env_non_empty("SMTP_PASSWORD") {
            c.notification.smtp.password = Some(SecretString::from(password));
        }

        // Payment store
        if let Some(backend) = get_env_non_empty("STORE") {
            c.store.backend = backend.parse()?;
        }
        if let Some(url) = get_env_non_empty("STORE_URL") {
            c.store.url = Some(url);
        }
        if let Some(key) = get_env_non_empty("STORE_API_KEY") {
            c.store.api_key = Some(SecretString::from(key));
        }
        if let Some(table) = get_env_non_empty("STORE_TABLE") {
            c.store.table = table;
        }
        if let Some(url) = get_env_non_empty("DATABASE_URL") {
            c.store.database_url = Some(url);
        }

        Ok(self)
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns [`PayhookError::Config`] if:
    /// - the server address, log level or a timeout is invalid
    /// - no signing secret is configured in production
    /// - a recipient or sender address is not an email address
    /// - the selected store or mailer is missing its settings
    pub fn build(self) -> Result<Config> {
        let c = &self.config;

        c.server.addr().map_err(|e| {
            PayhookError::config(format!(
                "Invalid server address {}:{} - {}",
                c.server.host, c.server.port, e
            ))
        })?;
        if c.server.port == 0 {
            return Err(PayhookError::config("Server port must be greater than 0"));
        }
        if c.server.max_body_size == 0 {
            return Err(PayhookError::config("Maximum body size must be greater than 0"));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&c.logging.level.to_lowercase().as_str()) {
            return Err(PayhookError::config(format!(
                "Invalid log level: {}. Must be one of: {}",
                c.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if c.timeout.enabled && c.timeout.timeout_seconds == 0 {
            return Err(PayhookError::config(
                "Request timeout must be greater than 0 when enabled",
            ));
        }
        if c.timeout.step_timeout_seconds == 0 {
            return Err(PayhookError::config("Step timeout must be greater than 0"));
        }

        // Webhook endpoint
        if c.webhook.signing_secret.is_none() && c.environment.is_production() {
            return Err(PayhookError::config(
                "STRIPE_WEBHOOK_SECRET is required in production; unverified mode is for development only",
            ));
        }
        if c.webhook.tolerance_seconds == 0 {
            return Err(PayhookError::config(
                "Signature tolerance must be greater than 0",
            ));
        }
        if !c.webhook.path.starts_with('/') {
            return Err(PayhookError::config(format!(
                "Webhook path must start with '/', got: {}",
                c.webhook.path
            )));
        }
        if axum::http::HeaderName::from_bytes(c.webhook.signature_header.as_bytes()).is_err() {
            return Err(PayhookError::config(format!(
                "Invalid signature header name: {}",
                c.webhook.signature_header
            )));
        }
        let currency = &c.webhook.default_currency;
        if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(PayhookError::config(format!(
                "Default currency must be a 3-letter code, got: {}",
                currency
            )));
        }

        // Notifications
        if mailbox_address(&c.notification.from).is_none() {
            return Err(PayhookError::config(format!(
                "Invalid mail sender: {}",
                c.notification.from
            )));
        }
        for (name, address) in [
            ("fallback recipient", &c.notification.fallback_recipient),
            ("override recipient", &c.notification.override_recipient),
        ] {
            if let Some(address) = address {
                if !address.trim().validate_email() {
                    return Err(PayhookError::config(format!(
                        "Invalid {}: {}",
                        name, address
                    )));
                }
            }
        }
        if c.notification.mailer == MailerKind::Smtp {
            if !cfg!(feature = "email") {
                return Err(PayhookError::config(
                    "SMTP mailer selected but payhook was built without the `email` feature",
                ));
            }
            if c.notification.smtp.host.trim().is_empty() {
                return Err(PayhookError::config("SMTP_HOST is required for the smtp mailer"));
            }
        }

        // Payment store
        match c.store.backend {
            StoreBackend::Memory => {}
            StoreBackend::Rest => {
                if c.store.url.is_none() {
                    return Err(PayhookError::config(
                        "PAYHOOK_STORE_URL is required for the rest store",
                    ));
                }
                if c.store.api_key.is_none() {
                    return Err(PayhookError::config(
                        "PAYHOOK_STORE_API_KEY is required for the rest store",
                    ));
                }
            }
            StoreBackend::Database => {
                if !cfg!(feature = "database") {
                    return Err(PayhookError::config(
                        "Database store selected but payhook was built without the `database` feature",
                    ));
                }
                if c.store.database_url.is_none() {
                    return Err(PayhookError::config(
                        "DATABASE_URL is required for the database store",
                    ));
                }
            }
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.webhook.path, "/webhooks/stripe");
        assert_eq!(config.webhook.signature_header, "stripe-signature");
        assert_eq!(config.webhook.tolerance(), Duration::from_secs(300));
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.notification.mailer, MailerKind::Console);
        assert_eq!(config.notification.smtp.effective_port(), 465);
        assert!(config.webhook.signing_secret.is_none());
    }

    #[test]
    fn test_production_requires_secret() {
        let err = ConfigBuilder::new()
            .with_environment(Environment::Production)
            .build()
            .unwrap_err();
        assert!(matches!(err, PayhookError::Config(_)));

        assert!(ConfigBuilder::new()
            .with_environment(Environment::Production)
            .with_signing_secret("whsec_test")
            .build()
            .is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ConfigBuilder::new().with_log_level("loud").build().is_err());
        assert!(ConfigBuilder::new().with_port(0).build().is_err());
        assert!(ConfigBuilder::new().with_webhook_path("webhooks").build().is_err());
        assert!(ConfigBuilder::new().with_signature_header("bad header").build().is_err());
        assert!(ConfigBuilder::new()
            .with_signature_tolerance(Duration::ZERO)
            .build()
            .is_err());
        assert!(ConfigBuilder::new().with_default_currency("dollar").build().is_err());
        assert!(ConfigBuilder::new()
            .with_fallback_recipient("not-an-address")
            .build()
            .is_err());
        assert!(ConfigBuilder::new()
            .with_timeout(TimeoutConfig::builder().step_timeout(Duration::ZERO).build())
            .build()
            .is_err());
    }

    #[test]
    fn test_mail_from_display_name_allowed() {
        assert!(ConfigBuilder::new()
            .with_mail_from("Payments <payments@example.com>")
            .build()
            .is_ok());
    }

    #[test]
    fn test_invalid_mail_addresses_rejected() {
        for from in ["garbage<", "Payments <garbage>", "payments@", "a@b."] {
            assert!(
                ConfigBuilder::new().with_mail_from(from).build().is_err(),
                "sender {:?} should be rejected",
                from
            );
        }
        assert!(ConfigBuilder::new()
            .with_override_recipient("a@b.")
            .build()
            .is_err());
        assert!(ConfigBuilder::new()
            .with_fallback_recipient(" ops@example.com ")
            .build()
            .is_ok());
    }

    #[test]
    fn test_rest_store_requires_url_and_key() {
        let store = StoreConfig {
            backend: StoreBackend::Rest,
            ..Default::default()
        };
        assert!(ConfigBuilder::new().with_store(store.clone()).build().is_err());

        let store = StoreConfig {
            url: Some("https://db.example.com".to_string()),
            api_key: Some(SecretString::from("key")),
            ..store
        };
        assert!(ConfigBuilder::new().with_store(store).build().is_ok());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("SMTP".parse::<MailerKind>().unwrap(), MailerKind::Smtp);
        assert_eq!("db".parse::<StoreBackend>().unwrap(), StoreBackend::Database);
        assert!("staging".parse::<Environment>().is_err());
        assert!("carrier-pigeon".parse::<MailerKind>().is_err());
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ConfigBuilder::new()
            .with_signing_secret("whsec_very_secret")
            .build()
            .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("whsec_very_secret"));
    }
}
