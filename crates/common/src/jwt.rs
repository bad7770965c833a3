//! JWT header utilities shared across gate components.
//!
//! This module reads the protected header of a compact JWT without verifying
//! the signature. It is the first step of verification: the `kid` selects a
//! key from the issuer's key set and the `alg` is checked against the
//! configured allow-list before any cryptographic work happens.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing read here is trusted until the signature is verified
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::parse_unverified_header;
//!
//! let header = parse_unverified_header(token)?;
//! let key = key_set.find(&header.kid);
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Typical access tokens are well under 2KB. Anything larger is rejected
/// BEFORE base64 decoding or signature verification.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while reading an unverified JWT header.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token header could not be read")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token header could not be read")]
    MalformedToken,

    /// Token is missing a non-empty `kid` header.
    #[error("The access token header could not be read")]
    MissingKid,

    /// Token is missing the `alg` header.
    #[error("The access token header could not be read")]
    MissingAlg,
}

// =============================================================================
// Header Types
// =============================================================================

/// Protected header fields of a JWT, read before signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedHeader {
    /// Signing algorithm as declared by the token (e.g. "RS256").
    pub alg: String,

    /// Key ID used to select the verification key.
    pub kid: String,

    /// Optional media type (usually "JWT" or "at+jwt").
    pub typ: Option<String>,
}

// =============================================================================
// Functions
// =============================================================================

/// Read the `alg`, `kid` and `typ` header fields without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - This function does NOT validate the token signature
/// - The `kid` value should only be used for key lookup in a trusted JWKS
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not three segments, bad base64url, or header is not a JSON object
/// - `MissingKid` - `kid` absent, empty, or not a string
/// - `MissingAlg` - `alg` absent, empty, or not a string
pub fn parse_unverified_header(token: &str) -> Result<UnverifiedHeader, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut segments = token.split('.');
    let header_part = segments.next().ok_or(JwtValidationError::MalformedToken)?;
    let segment_count = 1 + segments.count();
    if segment_count != 3 || header_part.is_empty() {
        tracing::debug!(
            target: "common.jwt",
            parts = segment_count,
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let fields = header.as_object().ok_or_else(|| {
        tracing::debug!(target: "common.jwt", "JWT header is not a JSON object");
        JwtValidationError::MalformedToken
    })?;

    // String values only, rejecting empty ones
    let field = |name: &str| {
        fields
            .get(name)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    };

    let kid = field("kid").ok_or(JwtValidationError::MissingKid)?;
    let alg = field("alg").ok_or(JwtValidationError::MissingAlg)?;

    Ok(UnverifiedHeader {
        alg,
        kid,
        typ: field("typ"),
    })
}

// =============================================================================
// Tests
// =============================================================================
