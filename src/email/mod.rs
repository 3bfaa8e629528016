//! Outbound email.
//!
//! - [`Mailer`] / [`Email`]: transport seam and message type
//! - [`SmtpMailer`]: SMTP via lettre (feature `email`)
//! - [`ConsoleMailer`]: logs messages instead of sending them
//! - [`MailPaymentNotifier`]: renders payment confirmations onto any mailer

mod confirmation;
mod console;
mod mailer;
pub mod money;
mod smtp;

pub use confirmation::{
    CONFIRMATION_SUBJECT, MailPaymentNotifier, PaymentConfirmation, PaymentNotifier,
};
pub use console::ConsoleMailer;
pub(crate) use mailer::mailbox_address;
pub use mailer::{Email, Mailer};
pub use money::format_minor_units;
#[cfg(feature = "email")]
pub use smtp::SmtpMailer;
pub use smtp::{SmtpConfig, TlsMode};
