//! HTTP API Module
//!
//! Optional health, status and metrics endpoints for the resolver.

mod routes;
mod metrics;

pub use routes::run_api_server;
pub use metrics::Metrics;
