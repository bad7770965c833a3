//! Metrics definitions for the authentication gate.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gate_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: known routes plus `/other`
//! - `outcome`: `verified` or one of the ten rejection kinds
//! - `stage`: `start`, `header_extracted`, `keys_fetched`, `verified`
//! - `status`: `success` or `error`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gate_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Key set fetches cross the network and are bounded by the fetch timeout
        .set_buckets_for_metric(
            Matcher::Prefix("gate_jwks_fetch".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gate_http_requests_total`, `gate_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures every response, including 401 rejections from the gate and
/// framework-level 404/405 responses.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gate_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("gate_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        401 => "unauthorized",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/private" => "/private",
        "/api/v1/me" => "/api/v1/me",
        _ => "/other",
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record the verdict of one pass through the gate.
///
/// Metric: `gate_auth_requests_total`
/// Labels: `outcome`, `stage`
///
/// `outcome` is `verified` or an `AuthError::kind()` code. `stage` is the
/// last stage the request reached.
pub fn record_auth_outcome(outcome: &str, stage: &str) {
    counter!("gate_auth_requests_total",
        "outcome" => outcome.to_string(),
        "stage" => stage.to_string()
    )
    .increment(1);
}

// ============================================================================
// Key Set Metrics
// ============================================================================

/// Record a key set fetch from the identity provider.
///
/// Metric: `gate_jwks_fetch_total`, `gate_jwks_fetch_duration_seconds`
/// Labels: `status`
pub fn record_jwks_fetch(status: &str, duration: Duration) {
    histogram!("gate_jwks_fetch_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("gate_jwks_fetch_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a key set cache lookup.
///
/// Metric: `gate_jwks_cache_lookups_total`
/// Labels: `result` (`hit`, `miss`, `stale`)
pub fn record_jwks_cache_lookup(result: &str) {
    counter!("gate_jwks_cache_lookups_total",
        "result" => result.to_string()
    )
    .increment(1);
}
