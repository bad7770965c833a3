//! Demo message endpoints, one public and one behind the gate.

use axum::Json;
use serde::Serialize;

pub const PUBLIC_MESSAGE: &str =
    "Hello from a public endpoint! You don't need to be authenticated to see this.";

pub const PRIVATE_MESSAGE: &str =
    "Hello from a private endpoint! You need to be authenticated to see this.";

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Handler for GET /
pub async fn public_message() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: PUBLIC_MESSAGE,
    })
}

/// Handler for GET|POST /private
///
/// Only reached after the auth middleware verified the bearer token.
pub async fn private_message() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: PRIVATE_MESSAGE,
    })
}
