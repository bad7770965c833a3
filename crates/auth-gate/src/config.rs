//! Gate configuration.
//!
//! Configuration is loaded from environment variables once at startup and is
//! immutable afterwards. The variable names match the ones used by Auth0
//! quickstarts so existing deployments can reuse their environment.

use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default key set freshness window in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default key set fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the key set fetch timeout in seconds.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Default minimum gap between unknown-kid refreshes in seconds.
pub const DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECONDS: u64 = 10;

/// Default algorithm allow-list.
pub const DEFAULT_ALGORITHMS: &str = "RS256";

/// Gate configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Identity provider domain, e.g. `example.auth0.com`.
    /// Tokens must carry `iss == "https://{issuer_domain}/"`.
    pub issuer_domain: String,

    /// Audience every accepted token must contain.
    pub audience: String,

    /// Signature algorithms accepted in token headers. RSA family only.
    pub algorithms: Vec<Algorithm>,

    /// How long a fetched key set is served before refetching.
    pub jwks_cache_ttl_seconds: u64,

    /// Timeout for a single key set fetch.
    pub jwks_fetch_timeout_seconds: u64,

    /// Minimum age of a cached key set before an unknown `kid` triggers a refetch.
    pub jwks_min_refresh_interval_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("issuer_domain", &self.issuer_domain)
            .field("audience", &self.audience)
            .field("algorithms", &self.algorithms)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field("jwks_fetch_timeout_seconds", &self.jwks_fetch_timeout_seconds)
            .field(
                "jwks_min_refresh_interval_seconds",
                &self.jwks_min_refresh_interval_seconds,
            )
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid issuer domain: {0}")]
    InvalidIssuerDomain(String),

    #[error("Invalid audience: {0}")]
    InvalidAudience(String),

    #[error("Invalid algorithm configuration: {0}")]
    InvalidAlgorithms(String),

    #[error("Invalid JWKS cache configuration: {0}")]
    InvalidJwksCache(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let issuer_domain = vars
            .get("AUTH0_DOMAIN")
            .ok_or_else(|| ConfigError::MissingEnvVar("AUTH0_DOMAIN".to_string()))?
            .trim()
            .to_string();

        if issuer_domain.is_empty() {
            return Err(ConfigError::InvalidIssuerDomain(
                "AUTH0_DOMAIN must not be empty".to_string(),
            ));
        }

        // A bare host is expected; the issuer URL is derived from it
        if issuer_domain.contains("://") || issuer_domain.contains('/') {
            return Err(ConfigError::InvalidIssuerDomain(format!(
                "AUTH0_DOMAIN must be a bare host name, got '{}'",
                issuer_domain
            )));
        }

        let audience = vars
            .get("API_AUDIENCE")
            .ok_or_else(|| ConfigError::MissingEnvVar("API_AUDIENCE".to_string()))?
            .clone();

        if audience.trim().is_empty() {
            return Err(ConfigError::InvalidAudience(
                "API_AUDIENCE must not be empty".to_string(),
            ));
        }

        let algorithms = parse_algorithms(
            vars.get("ALGORITHMS")
                .map(String::as_str)
                .unwrap_or(DEFAULT_ALGORITHMS),
        )?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwks_cache_ttl_seconds = parse_seconds(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
        )?;

        let jwks_fetch_timeout_seconds = parse_seconds(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
        )?;

        if jwks_fetch_timeout_seconds == 0 {
            return Err(ConfigError::InvalidJwksCache(
                "JWKS_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        if jwks_fetch_timeout_seconds > MAX_JWKS_FETCH_TIMEOUT_SECONDS {
            return Err(ConfigError::InvalidJwksCache(format!(
                "JWKS_FETCH_TIMEOUT_SECONDS must not exceed {} seconds, got {}",
                MAX_JWKS_FETCH_TIMEOUT_SECONDS, jwks_fetch_timeout_seconds
            )));
        }

        let jwks_min_refresh_interval_seconds = parse_seconds(
            vars,
            "JWKS_MIN_REFRESH_INTERVAL_SECONDS",
            DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECONDS,
        )?;

        Ok(Config {
            bind_address,
            issuer_domain,
            audience,
            algorithms,
            jwks_cache_ttl_seconds,
            jwks_fetch_timeout_seconds,
            jwks_min_refresh_interval_seconds,
        })
    }

    /// Issuer URL tokens must carry in `iss`.
    pub fn expected_issuer(&self) -> String {
        format!("https://{}/", self.issuer_domain)
    }

    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }

    pub fn jwks_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_fetch_timeout_seconds)
    }

    pub fn jwks_min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.jwks_min_refresh_interval_seconds)
    }
}

/// Parse a comma-separated algorithm allow-list.
///
/// Only RSA signature algorithms are accepted. Symmetric algorithms would let
/// anyone holding the public key mint tokens, and mixing key families is not
/// supported by a single RSA key set.
fn parse_algorithms(value: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let mut algorithms = Vec::new();

    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let algorithm = Algorithm::from_str(name).map_err(|_| {
            ConfigError::InvalidAlgorithms(format!("unknown algorithm '{}'", name))
        })?;

        if !is_rsa_family(algorithm) {
            return Err(ConfigError::InvalidAlgorithms(format!(
                "algorithm '{}' is not an RSA signature algorithm",
                name
            )));
        }

        if !algorithms.contains(&algorithm) {
            algorithms.push(algorithm);
        }
    }

    if algorithms.is_empty() {
        return Err(ConfigError::InvalidAlgorithms(
            "ALGORITHMS must name at least one algorithm".to_string(),
        ));
    }

    Ok(algorithms)
}

fn is_rsa_family(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match vars.get(name) {
        Some(value_str) => value_str.trim().parse().map_err(|e| {
            ConfigError::InvalidJwksCache(format!(
                "{} must be a valid non-negative integer, got '{}': {}",
                name, value_str, e
            ))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            ("AUTH0_DOMAIN".to_string(), "example.auth0.com".to_string()),
            ("API_AUDIENCE".to_string(), "my-api".to_string()),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.issuer_domain, "example.auth0.com");
        assert_eq!(config.audience, "my-api");
        assert_eq!(config.algorithms, vec![Algorithm::RS256]);
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.jwks_cache_ttl_seconds, DEFAULT_JWKS_CACHE_TTL_SECONDS);
        assert_eq!(
            config.jwks_fetch_timeout_seconds,
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS
        );
        assert_eq!(
            config.jwks_min_refresh_interval_seconds,
            DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECONDS
        );
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("ALGORITHMS".to_string(), "RS256, RS512,PS256".to_string());
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "60".to_string());
        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "3".to_string());
        vars.insert(
            "JWKS_MIN_REFRESH_INTERVAL_SECONDS".to_string(),
            "0".to_string(),
        );

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(
            config.algorithms,
            vec![Algorithm::RS256, Algorithm::RS512, Algorithm::PS256]
        );
        assert_eq!(config.jwks_cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.jwks_fetch_timeout(), Duration::from_secs(3));
        assert_eq!(config.jwks_min_refresh_interval(), Duration::ZERO);
    }

    #[test]
    fn test_expected_issuer() {
        let config = Config::from_vars(&base_vars()).unwrap();
        assert_eq!(config.expected_issuer(), "https://example.auth0.com/");
    }

    #[test]
    fn test_from_vars_missing_domain() {
        let mut vars = base_vars();
        vars.remove("AUTH0_DOMAIN");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "AUTH0_DOMAIN"));
    }

    #[test]
    fn test_from_vars_missing_audience() {
        let mut vars = base_vars();
        vars.remove("API_AUDIENCE");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "API_AUDIENCE"));
    }

    #[test]
    fn test_empty_domain_rejected() {
        let mut vars = base_vars();
        vars.insert("AUTH0_DOMAIN".to_string(), "  ".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidIssuerDomain(_))));
    }

    #[test]
    fn test_domain_with_scheme_rejected() {
        let mut vars = base_vars();
        vars.insert(
            "AUTH0_DOMAIN".to_string(),
            "https://example.auth0.com/".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidIssuerDomain(msg)) if msg.contains("bare host name"))
        );
    }

    #[test]
    fn test_empty_audience_rejected() {
        let mut vars = base_vars();
        vars.insert("API_AUDIENCE".to_string(), String::new());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidAudience(_))));
    }

    #[test]
    fn test_algorithms_reject_hmac() {
        let mut vars = base_vars();
        vars.insert("ALGORITHMS".to_string(), "RS256,HS256".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidAlgorithms(msg)) if msg.contains("HS256"))
        );
    }

    #[test]
    fn test_algorithms_reject_ec_and_eddsa() {
        for name in ["ES256", "EdDSA"] {
            let mut vars = base_vars();
            vars.insert("ALGORITHMS".to_string(), name.to_string());

            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidAlgorithms(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_algorithms_reject_unknown() {
        let mut vars = base_vars();
        vars.insert("ALGORITHMS".to_string(), "none".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidAlgorithms(msg)) if msg.contains("unknown algorithm"))
        );
    }

    #[test]
    fn test_algorithms_reject_empty_list() {
        let mut vars = base_vars();
        vars.insert("ALGORITHMS".to_string(), " , ".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidAlgorithms(_))));
    }

    #[test]
    fn test_algorithms_deduplicated() {
        let mut vars = base_vars();
        vars.insert("ALGORITHMS".to_string(), "RS256,RS256".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.algorithms, vec![Algorithm::RS256]);
    }

    #[test]
    fn test_fetch_timeout_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwksCache(msg)) if msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_fetch_timeout_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "61".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwksCache(msg)) if msg.contains("must not exceed 60"))
        );
    }

    #[test]
    fn test_cache_ttl_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert(
            "JWKS_CACHE_TTL_SECONDS".to_string(),
            "five-minutes".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwksCache(msg)) if msg.contains("JWKS_CACHE_TTL_SECONDS"))
        );
    }

    #[test]
    fn test_cache_ttl_rejects_negative() {
        let mut vars = base_vars();
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "-5".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidJwksCache(_))));
    }

    #[test]
    fn test_debug_output_lists_fields() {
        let config = Config::from_vars(&base_vars()).unwrap();
        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("example.auth0.com"));
        assert!(debug_output.contains("RS256"));
    }
}
