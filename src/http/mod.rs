//! Route composition.

pub mod routes;

pub use routes::RouteModule;
