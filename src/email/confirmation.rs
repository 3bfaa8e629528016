//! Payment confirmation notices.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::mailer::{Email, Mailer};
use super::money::format_minor_units;
use crate::error::Result;

/// What the customer (or configured recipient) is told about a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub recipient: String,
    /// Amount in minor units.
    pub amount_minor: i64,
    pub currency: String,
    /// Checkout session ID, quoted back as the transaction reference.
    pub reference_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl PaymentConfirmation {
    /// Amount formatted for display, e.g. `19.99 USD`.
    pub fn display_amount(&self) -> String {
        format_minor_units(self.amount_minor, &self.currency)
    }
}

/// Delivers payment confirmations.
#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    async fn send_payment_confirmation(&self, confirmation: &PaymentConfirmation) -> Result<()>;

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Subject line for every confirmation.
pub const CONFIRMATION_SUBJECT: &str = "Payment confirmed";

/// [`PaymentNotifier`] that renders an email and sends it through a [`Mailer`].
#[derive(Clone)]
pub struct MailPaymentNotifier {
    mailer: Arc<dyn Mailer>,
    from: String,
    reply_to: Option<String>,
}

impl MailPaymentNotifier {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
            reply_to: None,
        }
    }

    pub fn with_reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Build the message without sending it.
    pub fn render(&self, confirmation: &PaymentConfirmation) -> Email {
        let amount = confirmation.display_amount();
        let when = confirmation
            .occurred_at
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string();

        let text = format!(
            "Thank you for your payment.\n\n\
             Amount: {amount}\n\
             Transaction ID: {reference}\n\
             Time: {when}\n\n\
             This message was sent automatically. Please do not reply.\n",
            amount = amount,
            reference = confirmation.reference_id,
            when = when,
        );

        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #4F46E5;">Payment successful</h2>
  <p>Thank you for your payment. Here are the details:</p>
  <div style="background-color: #F3F4F6; padding: 20px; border-radius: 8px; margin: 20px 0;">
    <p><strong>Amount:</strong> {amount}</p>
    <p><strong>Transaction ID:</strong> {reference}</p>
    <p><strong>Time:</strong> {when}</p>
  </div>
  <hr style="border: none; border-top: 1px solid #E5E7EB; margin: 30px 0;">
  <p style="color: #6B7280; font-size: 12px;">This message was sent automatically. Please do not reply.</p>
</div>"#,
            amount = escape_html(&amount),
            reference = escape_html(&confirmation.reference_id),
            when = escape_html(&when),
        );

        let mut email = Email::new(&self.from, &confirmation.recipient, CONFIRMATION_SUBJECT)
            .text(text)
            .html(html);
        if let Some(reply_to) = &self.reply_to {
            email = email.reply_to(reply_to);
        }
        email
    }
}

impl std::fmt::Debug for MailPaymentNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailPaymentNotifier")
            .field("from", &self.from)
            .finish()
    }
}

#[async_trait]
impl PaymentNotifier for MailPaymentNotifier {
    async fn send_payment_confirmation(&self, confirmation: &PaymentConfirmation) -> Result<()> {
        let email = self.render(confirmation);
        self.mailer.send(&email).await
    }

    fn is_healthy(&self) -> bool {
        self.mailer.is_healthy()
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::ConsoleMailer;
    use chrono::TimeZone;

    fn confirmation() -> PaymentConfirmation {
        PaymentConfirmation {
            recipient: "buyer@example.com".to_string(),
            amount_minor: 1999,
            currency: "usd".to_string(),
            reference_id: "sess_abc".to_string(),
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_render() {
        let notifier =
            MailPaymentNotifier::new(Arc::new(ConsoleMailer::new()), "payments@example.com");
        let email = notifier.render(&confirmation());

        assert_eq!(email.to, vec!["buyer@example.com"]);
        assert_eq!(email.subject, CONFIRMATION_SUBJECT);
        let text = email.text.unwrap();
        assert!(text.contains("19.99 USD"));
        assert!(text.contains("sess_abc"));
        assert!(text.contains("2024-03-01 12:30:00 UTC"));
        assert!(email.html.unwrap().contains("sess_abc"));
        assert!(email.reply_to.is_none());
    }

    #[test]
    fn test_render_escapes_reference() {
        let notifier = MailPaymentNotifier::new(Arc::new(ConsoleMailer::new()), "p@example.com")
            .with_reply_to("support@example.com");
        let mut c = confirmation();
        c.reference_id = "<script>".to_string();

        let email = notifier.render(&c);
        let html = email.html.unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert_eq!(email.reply_to.as_deref(), Some("support@example.com"));
    }

    #[tokio::test]
    async fn test_send_through_mailer() {
        let notifier =
            MailPaymentNotifier::new(Arc::new(ConsoleMailer::new()), "payments@example.com");
        assert!(notifier.send_payment_confirmation(&confirmation()).await.is_ok());
        assert!(notifier.is_healthy());
    }

    #[test]
    fn test_display_amount_zero_decimal() {
        let mut c = confirmation();
        c.currency = "jpy".to_string();
        assert_eq!(c.display_amount(), "1999 JPY");
    }
}
