//! Console mailer for development.
//!
//! Writes each message to the log instead of delivering it. Bodies are redacted
//! unless full output is switched on, since confirmations carry customer
//! addresses and amounts. Not for production.

use async_trait::async_trait;

use super::mailer::{Email, Mailer};
use crate::error::Result;

/// Mailer that logs messages through `tracing` instead of sending them.
///
/// ```rust,ignore
/// use payhook::email::ConsoleMailer;
///
/// // Default: only sizes of the bodies are logged
/// let mailer = ConsoleMailer::new();
///
/// // Local debugging: log full bodies
/// let mailer = ConsoleMailer::new().with_full_output(true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConsoleMailer {
    show_full_content: bool,
}

impl ConsoleMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log full bodies. Default: `false`.
    pub fn with_full_output(mut self, enabled: bool) -> Self {
        if enabled {
            tracing::warn!(
                target: "payhook::email::console",
                "ConsoleMailer full output enabled; email content will appear in logs"
            );
        }
        self.show_full_content = enabled;
        self
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;

        if self.show_full_content {
            tracing::info!(
                target: "payhook::email::console",
                from = %email.from,
                to = ?email.to,
                subject = %email.subject,
                text = email.text.as_deref().unwrap_or(""),
                html = email.html.as_deref().unwrap_or(""),
                "email (not sent)"
            );
        } else {
            tracing::info!(
                target: "payhook::email::console",
                from = %email.from,
                recipients = email.to.len(),
                subject = %email.subject,
                text_bytes = email.text.as_ref().map_or(0, String::len),
                html_bytes = email.html.as_ref().map_or(0, String::len),
                "email (not sent, body redacted)"
            );
        }

        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_mailer_accepts_valid_email() {
        let mailer = ConsoleMailer::new();
        let email = Email::new("from@test.com", "to@test.com", "Receipt").text("Paid");
        assert!(mailer.send(&email).await.is_ok());
        assert!(mailer.is_healthy());
    }

    #[tokio::test]
    async fn test_console_mailer_validates_email() {
        let mailer = ConsoleMailer::new().with_full_output(true);
        let email = Email::new("from@test.com", "to@test.com", "Receipt");
        assert!(mailer.send(&email).await.is_err());
    }
}
