//! Authentication error types.
//!
//! Every rejection produced by the gate is an `AuthError`. Each kind has one
//! fixed client-facing message and maps to `401 Unauthorized` with a JSON body
//! `{"message": "..."}`. Internal causes (transport errors, decoder errors)
//! are logged where they happen and never reach the client.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Value of the `WWW-Authenticate` header on every rejection (RFC 6750).
const WWW_AUTHENTICATE_VALUE: &str = "Bearer error=\"invalid_token\"";

/// Reason a request was not admitted.
///
/// The `Display` text is exactly the message returned to the client.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid authorization header, must start with Bearer.")]
    MalformedScheme,

    #[error("Invalid authorization header, token not found.")]
    MissingToken,

    #[error("Invalid authorization header, too many parts.")]
    TooManyParts,

    #[error("Invalid authorization header. Use an RS256 signed JWT Access Token.")]
    UnverifiableHeader,

    #[error("Invalid authorization header. Unable to find appropriate key.")]
    KeyNotFound,

    #[error("Unable to retrieve signing keys from the identity provider.")]
    KeySetUnavailable,

    #[error("Unable to parse authentication token.")]
    SignatureInvalid,

    #[error("Authorization token expired.")]
    SignatureExpired,

    #[error("Invalid claims. Please check the audience and issuer.")]
    ClaimsInvalid,
}

impl AuthError {
    /// Stable snake_case code for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_header",
            AuthError::MalformedScheme => "malformed_scheme",
            AuthError::MissingToken => "missing_token",
            AuthError::TooManyParts => "too_many_parts",
            AuthError::UnverifiableHeader => "unverifiable_header",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::KeySetUnavailable => "key_set_unavailable",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::SignatureExpired => "signature_expired",
            AuthError::ClaimsInvalid => "claims_invalid",
        }
    }

    /// HTTP status for this error. Always 401.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            message: self.to_string(),
        };

        let mut response = (self.status_code(), Json(body)).into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(WWW_AUTHENTICATE_VALUE),
        );

        response
    }
}
