//! HTTP routes for the demo service.

use crate::auth::AuthGate;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/` - Public message
/// - `/health` - Liveness probe
/// - `/metrics` - Prometheus metrics endpoint
/// - `/private` - Protected message (GET and POST)
/// - `/api/v1/me` - Verified claims of the caller
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(gate: Arc<AuthGate>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::public_message))
        .route("/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // route_layer: unmatched paths still 404 instead of 401
    let protected_routes = Router::new()
        .route(
            "/private",
            get(handlers::private_message).post(handlers::private_message),
        )
        .route("/api/v1/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(gate, require_auth));

    // Later layers wrap earlier ones: metrics sees every response, including
    // timeouts and gate rejections
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
