//! SMTP delivery through lettre's async tokio transport.

#[cfg(feature = "email")]
use async_trait::async_trait;
#[cfg(feature = "email")]
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
#[cfg(feature = "email")]
use secrecy::ExposeSecret;
use secrecy::SecretString;

#[cfg(feature = "email")]
use super::mailer::{Email, Mailer};
use crate::error::{PayhookError, Result};

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// TLS from the first byte (SMTPS), usually port 465.
    #[default]
    Implicit,
    /// Plain connection upgraded with STARTTLS, usually port 587.
    StartTls,
    /// No encryption. Local relays and test servers only.
    None,
}

impl TlsMode {
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Implicit => 465,
            Self::StartTls => 587,
            Self::None => 25,
        }
    }
}

impl std::str::FromStr for TlsMode {
    type Err = PayhookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "implicit" | "tls" | "smtps" => Ok(Self::Implicit),
            "starttls" => Ok(Self::StartTls),
            "none" | "plain" => Ok(Self::None),
            other => Err(PayhookError::config(format!(
                "Invalid SMTP TLS mode '{}'. Must be implicit, starttls or none",
                other
            ))),
        }
    }
}

/// SMTP connection settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    /// Falls back to the TLS mode's conventional port.
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub tls: TlsMode,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: None,
            password: None,
            tls: TlsMode::default(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<SecretString>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    /// Port actually used for the connection.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.tls.default_port())
    }
}

#[cfg(feature = "email")]
/// SMTP mailer.
///
/// Requires the `email` feature.
///
/// ```rust,ignore
/// use payhook::email::{SmtpConfig, SmtpMailer, TlsMode};
///
/// let mailer = SmtpMailer::new(
///     SmtpConfig::new("smtp.resend.com")
///         .tls(TlsMode::Implicit)
///         .credentials("resend", api_key),
/// )?;
/// ```
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

#[cfg(feature = "email")]
impl SmtpMailer {
    /// Build the transport. No connection is made until the first send.
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let transport_error = |e: lettre::transport::smtp::Error| {
            PayhookError::config(format!("Failed to create SMTP transport: {}", e))
        };

        let mut builder = match config.tls {
            TlsMode::Implicit => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host).map_err(transport_error)?
            }
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(transport_error)?,
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };

        builder = builder.port(config.effective_port());

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    fn build_message(&self, email: &Email) -> Result<Message> {
        let mut builder = Message::builder()
            .from(parse_mailbox("from", &email.from)?)
            .subject(&email.subject);

        for to in &email.to {
            builder = builder.to(parse_mailbox("to", to)?);
        }
        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(parse_mailbox("reply_to", reply_to)?);
        }

        let built = match (&email.text, &email.html) {
            (Some(text), Some(html)) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.clone()),
                    ),
            ),
            (Some(text), None) => builder.header(ContentType::TEXT_PLAIN).body(text.clone()),
            (None, Some(html)) => builder.header(ContentType::TEXT_HTML).body(html.clone()),
            (None, None) => {
                return Err(PayhookError::bad_request(
                    "Email must have either text or HTML body",
                ));
            }
        };

        built.map_err(|e| PayhookError::internal(format!("Failed to build email: {}", e)))
    }
}

#[cfg(feature = "email")]
fn parse_mailbox(field: &str, address: &str) -> Result<Mailbox> {
    address.trim().parse().map_err(|e| {
        PayhookError::bad_request(format!("Invalid '{}' address '{}': {}", field, address, e))
    })
}

#[cfg(feature = "email")]
#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;
        let message = self.build_message(email)?;

        self.transport.send(message).await.map_err(|e| {
            tracing::warn!(
                target: "payhook::email::smtp",
                host = %self.config.host,
                error = %e,
                "SMTP send failed"
            );
            PayhookError::service_unavailable(format!("Failed to send email: {}", e))
        })?;

        tracing::debug!(
            target: "payhook::email::smtp",
            recipients = email.to.len(),
            "email accepted by SMTP relay"
        );
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(feature = "email")]
impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.config.host)
            .field("port", &self.config.effective_port())
            .field("tls", &self.config.tls)
            .finish()
    }
}
