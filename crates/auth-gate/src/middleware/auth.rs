//! Authentication middleware for protected routes.
//!
//! Runs the `AuthGate` before the handler. Verified `Claims` are inserted into
//! request extensions; any rejection becomes the 401 JSON response and the
//! handler never runs.

use crate::auth::{AuthGate, Claims};
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Authentication middleware.
///
/// # Response
///
/// - Returns 401 Unauthorized with `{"message": ...}` if the token is rejected
/// - Continues to next handler with `Claims` in extensions if the token is valid
#[instrument(skip_all, name = "gate.middleware.auth")]
pub async fn require_auth(
    State(gate): State<Arc<AuthGate>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let claims = gate.authenticate(req.headers()).await?;

    tracing::trace!(target: "gate.middleware.auth", "Claims attached to request");
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extension trait for extracting claims from request.
pub trait ClaimsExt {
    /// Get the authenticated claims from request extensions.
    ///
    /// Returns `None` if auth middleware was not applied to this request.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{KeySetCache, SignatureVerifier};
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use http_body_util::BodyExt;
    use jsonwebtoken::Algorithm;
    use std::time::Duration;
    use tower::ServiceExt;

    // Handler echoing whether claims reached it
    async fn echo(req: Request) -> String {
        match req.claims() {
            Some(claims) => claims.sub.clone().unwrap_or_default(),
            None => "no-claims".to_string(),
        }
    }

    fn unreachable_gate() -> Arc<AuthGate> {
        // Nothing listens on port 9; extraction failures never reach it
        let cache = KeySetCache::new(Duration::from_secs(1))
            .unwrap()
            .with_scheme("http");
        Arc::new(AuthGate::new(
            "127.0.0.1:9",
            Arc::new(cache),
            SignatureVerifier::new("127.0.0.1:9", "my-api", vec![Algorithm::RS256]),
        ))
    }

    fn app(gate: Arc<AuthGate>) -> Router {
        Router::new()
            .route("/protected", get(echo))
            .route_layer(middleware::from_fn_with_state(gate, require_auth))
            .route("/open", get(echo))
    }

    #[tokio::test]
    async fn test_missing_header_rejected_before_handler() {
        let response = app(unreachable_gate())
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Missing authorization header");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_key_set_unavailable() {
        let response = app(unreachable_gate())
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("authorization", "Bearer a.b.c")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json["message"],
            "Unable to retrieve signing keys from the identity provider."
        );
    }

    #[tokio::test]
    async fn test_unprotected_route_has_no_claims() {
        let response = app(unreachable_gate())
            .oneshot(Request::builder().uri("/open").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"no-claims");
    }

    #[test]
    fn test_claims_ext_reads_extensions() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        assert!(req.claims().is_none());

        let claims: Claims = serde_json::from_value(serde_json::json!({
            "iss": "https://example.auth0.com/",
            "aud": "my-api",
            "exp": 1,
            "sub": "alice"
        }))
        .unwrap();
        req.extensions_mut().insert(claims);

        assert_eq!(req.claims().unwrap().sub.as_deref(), Some("alice"));
    }
}
