//! Current caller handler.
//!
//! Echoes the verified claims of the bearer token.

use crate::auth::{Audience, Claims};
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/api/v1/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Subject (user or client ID), when the token carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    pub iss: String,

    pub aud: Audience,

    /// Token expiration timestamp.
    pub exp: i64,

    /// Token scopes.
    pub scopes: Vec<String>,

    /// Claims outside the registered set, e.g. `azp` or namespaced claims.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

/// Handler for GET /api/v1/me
///
/// ```json
/// {
///   "sub": "auth0|alice",
///   "iss": "https://example.auth0.com/",
///   "aud": "my-api",
///   "exp": 1234567890,
///   "scopes": ["read:messages"]
/// }
/// ```
#[instrument(skip_all, name = "gate.handlers.me")]
pub async fn get_me(Extension(claims): Extension<Claims>) -> Json<MeResponse> {
    tracing::debug!(target: "gate.handlers.me", "Returning caller claims");

    let scopes = claims.scopes().iter().map(|s| s.to_string()).collect();

    Json(MeResponse {
        sub: claims.sub,
        iss: claims.iss,
        aud: claims.aud,
        exp: claims.exp,
        scopes,
        custom: claims.custom,
    })
}
