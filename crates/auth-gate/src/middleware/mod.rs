//! HTTP middleware for the gate.
//!
//! # Components
//!
//! - `auth` - Admits requests carrying a valid bearer token
//! - `http_metrics` - HTTP request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, ClaimsExt};
pub use http_metrics::http_metrics_middleware;
