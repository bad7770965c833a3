//! The authentication gate: extract, fetch keys, verify.
//!
//! A request moves through `Start → HeaderExtracted → KeysFetched → Verified`,
//! or is rejected at the first failing stage with that stage's `AuthError`.
//! Keys are always looked up for the configured issuer, never for a value
//! taken from the token.

use crate::auth::claims::Claims;
use crate::auth::extractor::extract_bearer_token;
use crate::auth::jwks::{KeySetCache, KeySetCacheError};
use crate::auth::verifier::SignatureVerifier;
use crate::config::Config;
use crate::errors::AuthError;
use crate::observability::metrics::record_auth_outcome;
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::instrument;

/// Last stage a request reached in the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    Start,
    HeaderExtracted,
    KeysFetched,
    Verified,
}

impl GateStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStage::Start => "start",
            GateStage::HeaderExtracted => "header_extracted",
            GateStage::KeysFetched => "keys_fetched",
            GateStage::Verified => "verified",
        }
    }
}

/// Admits or rejects requests for one issuer and audience.
///
/// `Send + Sync`; share it through `Arc`.
pub struct AuthGate {
    issuer_domain: String,
    key_cache: Arc<KeySetCache>,
    verifier: SignatureVerifier,
}

impl AuthGate {
    pub fn new(issuer_domain: &str, key_cache: Arc<KeySetCache>, verifier: SignatureVerifier) -> Self {
        Self {
            issuer_domain: issuer_domain.to_string(),
            key_cache,
            verifier,
        }
    }

    /// Build a gate with its own key set cache from configuration.
    ///
    /// # Errors
    ///
    /// Returns `KeySetCacheError` if the key set HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, KeySetCacheError> {
        let key_cache = KeySetCache::new(config.jwks_fetch_timeout())?
            .with_ttl(config.jwks_cache_ttl())
            .with_min_refresh_interval(config.jwks_min_refresh_interval());

        Ok(Self::new(
            &config.issuer_domain,
            Arc::new(key_cache),
            SignatureVerifier::from_config(config),
        ))
    }

    pub fn issuer_domain(&self) -> &str {
        &self.issuer_domain
    }

    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        &self.key_cache
    }

    /// Authenticate a request from its headers.
    ///
    /// # Errors
    ///
    /// Returns the `AuthError` of the first failing stage.
    #[instrument(skip_all, fields(issuer = %self.issuer_domain))]
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let mut stage = GateStage::Start;

        let result = self.run(headers, &mut stage).await;

        match &result {
            Ok(_) => {
                tracing::debug!(target: "gate.auth.gate", "Request authenticated");
                record_auth_outcome("verified", GateStage::Verified.as_str());
            }
            Err(error) => {
                tracing::info!(
                    target: "gate.auth.gate",
                    reason = error.kind(),
                    stage = stage.as_str(),
                    "Request rejected"
                );
                record_auth_outcome(error.kind(), stage.as_str());
            }
        }

        result
    }

    async fn run(&self, headers: &HeaderMap, stage: &mut GateStage) -> Result<Claims, AuthError> {
        let token = extract_bearer_token(headers)?;
        *stage = GateStage::HeaderExtracted;

        let key_set = self.key_cache.get(&self.issuer_domain).await?;
        *stage = GateStage::KeysFetched;

        match self.verifier.verify(&token, &key_set) {
            Err(AuthError::KeyNotFound) => {
                // The provider may have rotated in a key we have not seen yet
                match self
                    .key_cache
                    .refresh_for_unknown_kid(&self.issuer_domain, &key_set)
                    .await
                {
                    Some(refreshed) => self.verifier.verify(&token, &refreshed),
                    None => Err(AuthError::KeyNotFound),
                }
            }
            other => other,
        }
    }

    /// Prefetch the configured issuer's key set. Failure is logged, not fatal.
    #[instrument(skip_all, fields(issuer = %self.issuer_domain))]
    pub async fn warm(&self) {
        match self.key_cache.get(&self.issuer_domain).await {
            Ok(key_set) => {
                tracing::info!(
                    target: "gate.auth.gate",
                    key_count = key_set.len(),
                    "Signing keys prefetched"
                );
            }
            Err(_) => {
                tracing::warn!(
                    target: "gate.auth.gate",
                    "Signing key prefetch failed, keys will be fetched on first request"
                );
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use gate_test_utils::crypto_fixtures::{jwks_document, TestKeypair};
    use gate_test_utils::token_builders::TestClaimsBuilder;
    use jsonwebtoken::Algorithm;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AUDIENCE: &str = "my-api";

    struct Fixture {
        mock_server: MockServer,
        gate: AuthGate,
        domain: String,
    }

    async fn fixture(keypairs: &[&TestKeypair], min_refresh_interval: Duration) -> Fixture {
        let mock_server = MockServer::start().await;
        mount_jwks(&mock_server, keypairs).await;

        let domain = mock_server.uri().trim_start_matches("http://").to_string();
        let cache = KeySetCache::new(Duration::from_secs(2))
            .unwrap()
            .with_scheme("http")
            .with_min_refresh_interval(min_refresh_interval);
        let verifier = SignatureVerifier::new(&domain, AUDIENCE, vec![Algorithm::RS256]);
        let gate = AuthGate::new(&domain, Arc::new(cache), verifier);

        Fixture {
            mock_server,
            gate,
            domain,
        }
    }

    async fn mount_jwks(mock_server: &MockServer, keypairs: &[&TestKeypair]) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keypairs)))
            .mount(mock_server)
            .await;
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_gate_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthGate>();
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(GateStage::Start.as_str(), "start");
        assert_eq!(GateStage::HeaderExtracted.as_str(), "header_extracted");
        assert_eq!(GateStage::KeysFetched.as_str(), "keys_fetched");
        assert_eq!(GateStage::Verified.as_str(), "verified");
    }

    #[tokio::test]
    async fn test_authenticate_valid_token() {
        let keypair = TestKeypair::primary();
        let f = fixture(&[&keypair], Duration::from_secs(10)).await;
        let token = keypair.sign(
            &TestClaimsBuilder::new(&f.domain, AUDIENCE)
                .for_subject("auth0|alice")
                .build(),
        );

        let claims = f.gate.authenticate(&bearer(&token)).await.unwrap();
        assert_eq!(claims.sub.as_deref(), Some("auth0|alice"));
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_key_fetch() {
        let keypair = TestKeypair::primary();
        let f = fixture(&[&keypair], Duration::from_secs(10)).await;

        let result = f.gate.authenticate(&HeaderMap::new()).await;

        assert_eq!(result.unwrap_err(), AuthError::MissingHeader);
        assert!(f.mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keys_fetched_for_configured_issuer_only() {
        let keypair = TestKeypair::primary();
        let f = fixture(&[&keypair], Duration::from_secs(10)).await;
        let token = keypair.sign(
            &TestClaimsBuilder::new("evil.example.com", AUDIENCE).build(),
        );

        let result = f.gate.authenticate(&bearer(&token)).await;

        assert_eq!(result.unwrap_err(), AuthError::ClaimsInvalid);
        assert!(f.gate.key_cache().cached("evil.example.com").await.is_none());
        assert!(f.gate.key_cache().cached(&f.domain).await.is_some());
    }

    #[tokio::test]
    async fn test_unknown_kid_triggers_one_refresh() {
        let old_key = TestKeypair::primary();
        let new_key = TestKeypair::secondary();
        let f = fixture(&[&old_key], Duration::ZERO).await;
        f.gate.warm().await;

        f.mock_server.reset().await;
        mount_jwks(&f.mock_server, &[&old_key, &new_key]).await;

        let token = new_key.sign(&TestClaimsBuilder::new(&f.domain, AUDIENCE).build());
        let claims = f.gate.authenticate(&bearer(&token)).await;

        assert!(claims.is_ok());
        assert_eq!(f.mock_server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_kid_within_refresh_interval_is_rejected() {
        let old_key = TestKeypair::primary();
        let new_key = TestKeypair::secondary();
        let f = fixture(&[&old_key], Duration::from_secs(60)).await;
        f.gate.warm().await;

        let token = new_key.sign(&TestClaimsBuilder::new(&f.domain, AUDIENCE).build());
        let result = f.gate.authenticate(&bearer(&token)).await;

        assert_eq!(result.unwrap_err(), AuthError::KeyNotFound);
        assert_eq!(f.mock_server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_warm_failure_is_not_fatal() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        let domain = mock_server.uri().trim_start_matches("http://").to_string();
        let cache = KeySetCache::new(Duration::from_secs(2))
            .unwrap()
            .with_scheme("http");
        let gate = AuthGate::new(
            &domain,
            Arc::new(cache),
            SignatureVerifier::new(&domain, AUDIENCE, vec![Algorithm::RS256]),
        );

        gate.warm().await;

        assert!(gate.key_cache().cached(&domain).await.is_none());
    }
}
