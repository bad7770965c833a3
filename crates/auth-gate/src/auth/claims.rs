//! Verified token claims.
//!
//! `Claims` only exists after a token's signature and registered claims have
//! been verified. Handlers read it from request extensions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The `aud` claim: a single string or an array of strings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `audience` is one of the token's audiences.
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

impl fmt::Debug for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::Single(aud) => write!(f, "{aud:?}"),
            Audience::Multiple(auds) => f.debug_list().entries(auds).finish(),
        }
    }
}

/// Claims carried by a verified access token.
///
/// Registered claims are typed; everything else lands in `custom`.
/// The `sub` field is redacted in Debug output.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer URL, e.g. `https://example.auth0.com/`.
    pub iss: String,

    /// Audience(s) the token was issued for.
    pub aud: Audience,

    /// Expiration (Unix epoch seconds).
    pub exp: i64,

    /// Subject (user or client identifier). Some providers omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issued-at (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Space-separated scopes, when the provider includes them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Any other claims present in the token.
    #[serde(flatten)]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("sub", &"[REDACTED]")
            .field("iat", &self.iat)
            .field("scope", &self.scope)
            .field("custom_claims", &self.custom.len())
            .finish()
    }
}

impl Claims {
    /// Scopes as a list; empty when the token has none.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().contains(&scope)
    }
}
