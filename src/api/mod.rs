//! HTTP API for the CareControl service.

pub mod handlers;
pub mod routes;

pub use routes::configure;
