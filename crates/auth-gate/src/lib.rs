//! Bearer Token Gate Library
//!
//! Authenticates HTTP requests carrying `Authorization: Bearer <JWT>` against
//! an identity provider's published signing keys (JWKS). The gate runs as
//! axum middleware in front of protected routes:
//!
//! ```text
//! extractor -> jwks (KeySetCache) -> verifier -> Claims in request extensions
//! ```
//!
//! Every failure is an `AuthError` rendered as `401 {"message": "..."}`.
//!
//! # Modules
//!
//! - `auth` - Extraction, key set cache, verification and the gate itself
//! - `config` - Configuration from environment
//! - `errors` - Rejection kinds and their HTTP response
//! - `handlers` - Demo service handlers
//! - `middleware` - Auth and HTTP metrics middleware
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
