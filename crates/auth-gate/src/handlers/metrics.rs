//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated to allow Prometheus to scrape metrics.
//! Labels carry rejection kinds and route names only, never tokens or subjects.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// ```text
/// # TYPE gate_auth_requests_total counter
/// gate_auth_requests_total{outcome="signature_expired",stage="keys_fetched"} 3
/// ```
#[tracing::instrument(skip_all, name = "gate.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

// The handle can only be installed once per process; the route is covered
// end-to-end in tests/health_tests.rs.
