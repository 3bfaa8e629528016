//! Mailer seam and message type.
//!
//! Backends (SMTP, console, test doubles) implement [`Mailer`]; the payment
//! notifier only ever builds an [`Email`] and hands it over.

use async_trait::async_trait;
use validator::ValidateEmail;

use crate::error::{PayhookError, Result};

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    /// Sender address, e.g. `"Payments <payments@example.com>"`.
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    /// Plain text body (optional if html is provided)
    pub text: Option<String>,
    /// HTML body (optional if text is provided)
    pub html: Option<String>,
    pub reply_to: Option<String>,
}

impl Email {
    pub fn new(from: impl Into<String>, to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: vec![to.into()],
            subject: subject.into(),
            text: None,
            html: None,
            reply_to: None,
        }
    }

    /// Add another recipient.
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text = Some(body.into());
        self
    }

    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html = Some(body.into());
        self
    }

    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Check the message has a sender, at least one non-blank recipient, a
    /// subject and a body.
    pub fn validate(&self) -> Result<()> {
        if self.from.trim().is_empty() {
            return Err(PayhookError::bad_request("Email 'from' is required"));
        }
        if self.to.is_empty() || self.to.iter().any(|to| to.trim().is_empty()) {
            return Err(PayhookError::bad_request("Email recipient is required"));
        }
        if self.subject.is_empty() {
            return Err(PayhookError::bad_request("Email 'subject' is required"));
        }
        if self.text.is_none() && self.html.is_none() {
            return Err(PayhookError::bad_request(
                "Email must have either 'text' or 'html' body",
            ));
        }
        Ok(())
    }
}

/// Address part of a mailbox, either bare (`ops@example.com`) or with a
/// display name (`Payments <ops@example.com>`).
///
/// Returns `None` unless the address is a valid email address.
pub(crate) fn mailbox_address(mailbox: &str) -> Option<&str> {
    let mailbox = mailbox.trim();
    let address = match mailbox.rsplit_once('<') {
        Some((_name, rest)) => rest.strip_suffix('>')?.trim(),
        None => mailbox,
    };
    address.validate_email().then_some(address)
}

/// Email delivery backend.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver `email`. An `Ok` means the backend accepted it.
    async fn send(&self, email: &Email) -> Result<()>;

    /// Check if the backend is usable
    fn is_healthy(&self) -> bool;
}
