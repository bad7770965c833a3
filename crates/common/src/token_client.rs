//! OAuth 2.0 client-credentials token client.
//!
//! Requests an access token from the identity provider's `/oauth/token`
//! endpoint for a machine client. Used by operators and tests to obtain a
//! token that the gate will accept.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::secret::{ExposeSecret, SecretString};
//! use common::token_client::{fetch_client_credentials_token, ClientCredentialsConfig};
//!
//! let config = ClientCredentialsConfig::new(
//!     "example.auth0.com".to_string(),
//!     "my-client".to_string(),
//!     SecretString::from("secret"),
//!     "my-api".to_string(),
//! );
//!
//! let token = fetch_client_credentials_token(&config).await?;
//! let header = format!("Bearer {}", token.access_token.expose_secret());
//! ```
//!
//! # Security
//!
//! - Client secret and access token are `SecretString` (never logged)
//! - Error response bodies are logged at trace level only
//! - HTTP timeouts prevent hanging connections

use crate::secret::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

// =============================================================================
// Constants
// =============================================================================

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout for HTTP client.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Grant type sent with every request.
const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while requesting a token.
#[derive(Error, Debug, Clone)]
pub enum TokenError {
    /// Transport failure or unexpected status from the provider.
    #[error("HTTP client error: {0}")]
    HttpError(String),

    /// Credentials rejected by the provider (400, 401, 403).
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// Token response parsing failed.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a client-credentials token request.
#[derive(Clone)]
pub struct ClientCredentialsConfig {
    /// Identity provider domain (e.g., `example.auth0.com`).
    pub domain: String,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: SecretString,

    /// API audience the token is requested for.
    pub audience: String,

    /// HTTP request timeout.
    pub http_timeout: Duration,

    /// URL scheme for the token endpoint. `https` unless overridden.
    pub scheme: String,
}

impl std::fmt::Debug for ClientCredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsConfig")
            .field("domain", &self.domain)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("audience", &self.audience)
            .field("http_timeout", &self.http_timeout)
            .field("scheme", &self.scheme)
            .finish()
    }
}

impl ClientCredentialsConfig {
    /// Create a new configuration with default timeout and the `https` scheme.
    #[must_use]
    pub fn new(
        domain: String,
        client_id: String,
        client_secret: SecretString,
        audience: String,
    ) -> Self {
        Self {
            domain,
            client_id,
            client_secret,
            audience,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            scheme: "https".to_string(),
        }
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Override the URL scheme (local development and tests only).
    #[must_use]
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Full URL of the token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}://{}/oauth/token", self.scheme, self.domain)
    }
}

// =============================================================================
// Token Types
// =============================================================================

/// An access token returned by the provider.
pub struct AccessToken {
    /// The bearer token itself.
    pub access_token: SecretString,

    /// Token type as reported by the provider (usually "Bearer").
    pub token_type: String,

    /// Expiration as a Unix timestamp, computed from `expires_in`.
    pub expires_at: i64,

    /// Granted scopes, if the provider reports them.
    pub scope: Option<String>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
    grant_type: &'a str,
}

/// OAuth 2.0 token response body.
#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    token_type: String,
    expires_in: u64,
    #[serde(default)]
    scope: Option<String>,
}

impl std::fmt::Debug for OAuthTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

// =============================================================================
// Token Request
// =============================================================================

/// Request an access token using the client-credentials grant.
///
/// Sends a JSON body with `client_id`, `client_secret`, `audience` and
/// `grant_type` to `{scheme}://{domain}/oauth/token`. No retries: the caller
/// decides whether a failure is worth repeating.
///
/// # Errors
///
/// - `TokenError::Configuration` - If the HTTP client cannot be built
/// - `TokenError::HttpError` - Network failure, timeout, or unexpected status
/// - `TokenError::AuthenticationRejected` - Provider returned 400, 401 or 403
/// - `TokenError::InvalidResponse` - Success status with an unparseable body
#[instrument(skip_all, fields(domain = %config.domain))]
pub async fn fetch_client_credentials_token(
    config: &ClientCredentialsConfig,
) -> Result<AccessToken, TokenError> {
    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(config.http_timeout))
        .build()
        .map_err(|e| TokenError::Configuration(format!("Failed to build HTTP client: {e}")))?;

    let url = config.token_url();

    debug!(
        target: "common.token_client",
        client_id = %config.client_id,
        url = %url,
        "Requesting client-credentials token"
    );

    let body = TokenRequest {
        client_id: &config.client_id,
        client_secret: config.client_secret.expose_secret(),
        audience: &config.audience,
        grant_type: CLIENT_CREDENTIALS_GRANT,
    };

    let response = http_client
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            debug!(target: "common.token_client", error = %e, "HTTP request failed");
            TokenError::HttpError(e.to_string())
        })?;

    let status = response.status();

    if status.is_success() {
        let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
            warn!(target: "common.token_client", error = %e, "Failed to parse token response");
            TokenError::InvalidResponse(e.to_string())
        })?;

        let now = chrono::Utc::now().timestamp();
        let expires_in = i64::try_from(token_response.expires_in).map_err(|_| {
            TokenError::InvalidResponse("expires_in out of range".to_string())
        })?;

        debug!(
            target: "common.token_client",
            expires_in_secs = token_response.expires_in,
            "Token acquired successfully"
        );

        Ok(AccessToken {
            access_token: SecretString::from(token_response.access_token),
            token_type: token_response.token_type,
            expires_at: now.saturating_add(expires_in),
            scope: token_response.scope,
        })
    } else if matches!(status.as_u16(), 400 | 401 | 403) {
        // Body may echo request details, so it stays at trace level
        let body = response.text().await.unwrap_or_else(|e| {
            trace!(target: "common.token_client", error = %e, "Failed to read error response body");
            "<failed to read body>".to_string()
        });
        warn!(
            target: "common.token_client",
            status = %status,
            "Client credentials rejected by provider"
        );
        trace!(
            target: "common.token_client",
            body = %body,
            "Rejection response body"
        );
        Err(TokenError::AuthenticationRejected(format!(
            "Status {status}"
        )))
    } else {
        warn!(
            target: "common.token_client",
            status = %status,
            "Unexpected response from token endpoint"
        );
        Err(TokenError::HttpError(format!("Unexpected status: {status}")))
    }
}

// =============================================================================
// Tests
// =============================================================================
