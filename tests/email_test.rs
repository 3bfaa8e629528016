//! Confirmation emails produced by the webhook flow

use std::sync::Arc;

use chrono::Utc;
use payhook::email::{
    CONFIRMATION_SUBJECT, ConsoleMailer, Email, MailPaymentNotifier, Mailer, PaymentConfirmation,
    PaymentNotifier, format_minor_units,
};
use payhook::testing::{
    self,
    fixtures::{RecordingMailer, checkout_completed_payload},
};
use payhook::{App, AppContext, InMemoryPaymentStore};

fn confirmation(amount_minor: i64, currency: &str) -> PaymentConfirmation {
    PaymentConfirmation {
        recipient: "buyer@example.com".to_string(),
        amount_minor,
        currency: currency.to_string(),
        reference_id: "sess_abc".to_string(),
        occurred_at: Utc::now(),
    }
}

#[test]
fn test_minor_unit_formatting() {
    assert_eq!(format_minor_units(1999, "usd"), "19.99 USD");
    assert_eq!(format_minor_units(5, "eur"), "0.05 EUR");
    assert_eq!(format_minor_units(0, "usd"), "0.00 USD");
    assert_eq!(format_minor_units(1500, "jpy"), "1500 JPY");
    assert_eq!(format_minor_units(12345, "kwd"), "12.345 KWD");
}

#[tokio::test]
async fn test_notifier_sends_rendered_email() {
    let mailer = RecordingMailer::new();
    let notifier = MailPaymentNotifier::new(Arc::new(mailer.clone()), "payments@example.com");

    notifier
        .send_payment_confirmation(&confirmation(1500, "jpy"))
        .await
        .unwrap();

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, "payments@example.com");
    assert_eq!(sent[0].to, vec!["buyer@example.com"]);
    assert_eq!(sent[0].subject, CONFIRMATION_SUBJECT);
    let text = sent[0].text.as_deref().unwrap();
    assert!(text.contains("1500 JPY"));
    assert!(text.contains("sess_abc"));
}

#[tokio::test]
async fn test_blank_recipient_is_rejected_by_mailer() {
    let mailer = RecordingMailer::new();
    let notifier = MailPaymentNotifier::new(Arc::new(mailer.clone()), "payments@example.com");

    let mut bad = confirmation(100, "usd");
    bad.recipient = "   ".to_string();
    assert!(notifier.send_payment_confirmation(&bad).await.is_err());
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_console_mailer_accepts_valid_email() {
    let mailer = ConsoleMailer::new().with_full_output(true);
    let email = Email::new("payments@example.com", "buyer@example.com", "Receipt").text("Paid");
    assert!(mailer.send(&email).await.is_ok());

    let empty = Email::new("payments@example.com", "buyer@example.com", "Receipt");
    assert!(mailer.send(&empty).await.is_err());
}

#[tokio::test]
async fn test_webhook_produces_email() {
    let mailer = RecordingMailer::new();
    let context = AppContext::builder()
        .with_store(Arc::new(InMemoryPaymentStore::new()))
        .with_notifier(Arc::new(MailPaymentNotifier::new(
            Arc::new(mailer.clone()),
            "payments@example.com",
        )))
        .build()
        .unwrap();
    let router = App::builder()
        .with_context(context)
        .build()
        .unwrap()
        .into_test_router();

    let payload = checkout_completed_payload("sess_mail", 2500, "gbp", Some("buyer@example.com"));
    testing::post(router, "/webhooks/stripe")
        .text_body(payload)
        .execute()
        .await
        .assert_ok();

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["buyer@example.com"]);
    assert!(sent[0].html.as_deref().unwrap().contains("25.00 GBP"));
    assert!(sent[0].text.as_deref().unwrap().contains("sess_mail"));
}
