//! Request and step timeouts.
//!
//! The request limit is a tower-http layer returning 408. The step limit
//! bounds each call the reconciliation sink makes to the store and the mailer.

mod config;
mod layer;

pub use config::{TimeoutConfig, TimeoutConfigBuilder};
pub use layer::build_timeout_layer;
