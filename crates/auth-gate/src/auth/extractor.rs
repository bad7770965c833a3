//! Bearer token extraction from the `Authorization` header.

use crate::errors::AuthError;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::fmt;

/// A bearer credential exactly as presented by the client.
///
/// Never logged: Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct RawToken(String);

impl RawToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawToken").field(&"[REDACTED]").finish()
    }
}

/// Extract the bearer token from request headers.
///
/// The header value is split on ASCII whitespace. The first part must equal
/// `bearer` ignoring ASCII case and exactly one further part must follow.
/// The scheme and part count are checked on the raw bytes, so a token body
/// that is not visible ASCII is reported against the token, not the scheme.
///
/// # Errors
///
/// - `MissingHeader` - No `Authorization` header, or its value is blank
/// - `MalformedScheme` - Scheme is not `bearer`
/// - `MissingToken` - Only the scheme is present
/// - `TooManyParts` - More than two whitespace-separated parts
/// - `UnverifiableHeader` - The token contains bytes outside visible ASCII
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<RawToken, AuthError> {
    let header_value = headers.get(AUTHORIZATION).ok_or_else(|| {
        tracing::debug!(target: "gate.auth.extractor", "Missing Authorization header");
        AuthError::MissingHeader
    })?;

    let mut parts = header_value
        .as_bytes()
        .split(u8::is_ascii_whitespace)
        .filter(|part| !part.is_empty());

    let scheme = parts.next().ok_or_else(|| {
        tracing::debug!(target: "gate.auth.extractor", "Authorization header is blank");
        AuthError::MissingHeader
    })?;

    if !scheme.eq_ignore_ascii_case(b"bearer") {
        tracing::debug!(target: "gate.auth.extractor", "Authorization scheme is not Bearer");
        return Err(AuthError::MalformedScheme);
    }

    let token = parts.next().ok_or_else(|| {
        tracing::debug!(target: "gate.auth.extractor", "Bearer scheme without token");
        AuthError::MissingToken
    })?;

    if parts.next().is_some() {
        tracing::debug!(target: "gate.auth.extractor", "Authorization header has too many parts");
        return Err(AuthError::TooManyParts);
    }

    if !token.iter().all(u8::is_ascii_graphic) {
        tracing::debug!(target: "gate.auth.extractor", "Bearer token is not visible ASCII");
        return Err(AuthError::UnverifiableHeader);
    }

    // Visible ASCII is valid UTF-8
    let token = std::str::from_utf8(token).map_err(|_| AuthError::UnverifiableHeader)?;

    Ok(RawToken::new(token))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extracts_token() {
        let token = extract_bearer_token(&headers_with("Bearer abc.def.ghi")).unwrap();
        assert_eq!(token.as_str(), "abc.def.ghi");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        for scheme in ["bearer", "BEARER", "BeArEr"] {
            let token = extract_bearer_token(&headers_with(&format!("{scheme} tok"))).unwrap();
            assert_eq!(token.as_str(), "tok");
        }
    }

    #[test]
    fn test_extra_whitespace_is_ignored() {
        let token = extract_bearer_token(&headers_with("  Bearer \t  tok  ")).unwrap();
        assert_eq!(token.as_str(), "tok");
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            extract_bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingHeader)
        );
    }

    #[test]
    fn test_blank_header_is_missing() {
        assert_eq!(
            extract_bearer_token(&headers_with("")),
            Err(AuthError::MissingHeader)
        );
        assert_eq!(
            extract_bearer_token(&headers_with("   ")),
            Err(AuthError::MissingHeader)
        );
    }

    #[test]
    fn test_wrong_scheme() {
        assert_eq!(
            extract_bearer_token(&headers_with("Basic abc123")),
            Err(AuthError::MalformedScheme)
        );
        // Scheme is checked before the part count
        assert_eq!(
            extract_bearer_token(&headers_with("Token")),
            Err(AuthError::MalformedScheme)
        );
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer-ish tok")),
            Err(AuthError::MalformedScheme)
        );
    }

    #[test]
    fn test_token_not_found() {
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer")),
            Err(AuthError::MissingToken)
        );
        assert_eq!(
            extract_bearer_token(&headers_with("bearer   ")),
            Err(AuthError::MissingToken)
        );
    }

    #[test]
    fn test_too_many_parts() {
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer a b")),
            Err(AuthError::TooManyParts)
        );
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer a b c d")),
            Err(AuthError::TooManyParts)
        );
    }

    fn headers_with_bytes(value: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_bytes(value).unwrap());
        headers
    }

    #[test]
    fn test_non_ascii_token_is_unverifiable() {
        assert_eq!(
            extract_bearer_token(&headers_with_bytes(b"Bearer \xfftoken")),
            Err(AuthError::UnverifiableHeader)
        );
        assert_eq!(
            extract_bearer_token(&headers_with_bytes(b"bearer abc.\xc3\xa9.sig")),
            Err(AuthError::UnverifiableHeader)
        );
    }

    #[test]
    fn test_non_ascii_scheme_is_malformed() {
        assert_eq!(
            extract_bearer_token(&headers_with_bytes(b"B\xe9arer token")),
            Err(AuthError::MalformedScheme)
        );
    }

    #[test]
    fn test_non_ascii_parts_still_counted() {
        assert_eq!(
            extract_bearer_token(&headers_with_bytes(b"Bearer \xfftoken extra")),
            Err(AuthError::TooManyParts)
        );
    }

    #[test]
    fn test_raw_token_debug_is_redacted() {
        let token = RawToken::new("eyJhbGciOiJSUzI1NiJ9.secret.sig");
        let debug_str = format!("{:?}", token);
        assert!(!debug_str.contains("secret"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
