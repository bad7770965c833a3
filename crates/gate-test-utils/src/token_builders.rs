//! Builder patterns for test token claims
//!
//! Provides a fluent API for the registered and custom claims the gate checks.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// Defaults to a token for `issuer_domain` and `audience` that expires in one
/// hour.
///
/// # Example
/// ```rust,ignore
/// let claims = TestClaimsBuilder::new("example.auth0.com", "my-api")
///     .for_subject("auth0|alice")
///     .with_scope("read:messages")
///     .expired_by(7200)
///     .build();
/// ```
pub struct TestClaimsBuilder {
    iss: String,
    aud: Value,
    sub: String,
    exp: i64,
    iat: i64,
    scope: Option<String>,
    extra: Map<String, Value>,
    omitted: Vec<String>,
}

impl TestClaimsBuilder {
    /// Create a builder with `iss = "https://{issuer_domain}/"` and `aud = audience`.
    pub fn new(issuer_domain: &str, audience: &str) -> Self {
        let now = Utc::now();
        Self {
            iss: format!("https://{}/", issuer_domain),
            aud: json!(audience),
            sub: "auth0|test-subject".to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            scope: None,
            extra: Map::new(),
            omitted: Vec::new(),
        }
    }

    /// Set the subject
    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set the raw `iss` value
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Set a single audience
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = json!(audience);
        self
    }

    /// Set an audience array
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = json!(audiences);
        self
    }

    /// Set the scope (space-separated)
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    /// Set expiration in seconds from now
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set expiration `seconds` in the past
    pub fn expired_by(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() - Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set an absolute expiration timestamp
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = timestamp;
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Add a custom claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Leave a claim out of the built payload entirely
    pub fn without(mut self, name: &str) -> Self {
        self.omitted.push(name.to_string());
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(self.iss));
        claims.insert("aud".to_string(), self.aud);
        claims.insert("sub".to_string(), json!(self.sub));
        claims.insert("exp".to_string(), json!(self.exp));
        claims.insert("iat".to_string(), json!(self.iat));
        if let Some(scope) = self.scope {
            claims.insert("scope".to_string(), json!(scope));
        }
        claims.extend(self.extra);
        for name in &self.omitted {
            claims.remove(name);
        }
        Value::Object(claims)
    }
}
