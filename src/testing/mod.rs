//! Testing utilities
//!
//! - Alba-style HTTP scenarios driven through the router without a server
//! - [`fixtures`]: recording and failing collaborators plus signed payload builders

pub mod fixtures;
mod scenario;

pub use scenario::{Scenario, ScenarioAssert, get, post};
