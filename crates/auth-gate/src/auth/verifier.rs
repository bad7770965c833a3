//! Token signature and claim verification.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (via `common::jwt`)
//! - The header algorithm must be in the configured RSA allow-list
//! - The public key is rebuilt only from the key set's `n`/`e`
//! - Issuer, audience and expiry are checked with zero leeway

use crate::auth::claims::Claims;
use crate::auth::extractor::RawToken;
use crate::auth::jwks::{KeySet, SigningKey};
use crate::config::Config;
use crate::errors::AuthError;
use common::jwt::parse_unverified_header;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::str::FromStr;

/// Verifies tokens against a key set for one issuer and audience.
#[derive(Clone)]
pub struct SignatureVerifier {
    /// Issuer URL tokens must carry, `https://{domain}/`.
    expected_issuer: String,

    /// Header algorithms accepted for verification.
    algorithms: Vec<Algorithm>,

    /// Issuer and audience checks. Expiry is checked separately so that it
    /// only wins when it is the sole violated claim.
    validation: Validation,
}

impl SignatureVerifier {
    /// Create a verifier for tokens issued by `https://{issuer_domain}/` to `audience`.
    pub fn new(issuer_domain: &str, audience: &str, algorithms: Vec<Algorithm>) -> Self {
        let expected_issuer = format!("https://{}/", issuer_domain);

        let mut validation = Validation::default();
        validation.algorithms = algorithms.clone();
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_issuer(&[expected_issuer.as_str()]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Self {
            expected_issuer,
            algorithms,
            validation,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.issuer_domain,
            &config.audience,
            config.algorithms.clone(),
        )
    }

    pub fn expected_issuer(&self) -> &str {
        &self.expected_issuer
    }

    /// Verify `token` against `key_set` at the current time.
    ///
    /// # Errors
    ///
    /// - `UnverifiableHeader` - Header unreadable, missing `kid`, or algorithm not allowed
    /// - `KeyNotFound` - No usable RSA signing key with the token's `kid`
    /// - `SignatureInvalid` - Signature, key material, or payload structure is bad
    /// - `ClaimsInvalid` - Issuer or audience mismatch
    /// - `SignatureExpired` - Only `exp` is violated
    pub fn verify(&self, token: &RawToken, key_set: &KeySet) -> Result<Claims, AuthError> {
        self.verify_at(token, key_set, chrono::Utc::now().timestamp())
    }

    /// Verify `token` as of `now` (Unix epoch seconds).
    pub fn verify_at(
        &self,
        token: &RawToken,
        key_set: &KeySet,
        now: i64,
    ) -> Result<Claims, AuthError> {
        let header = parse_unverified_header(token.as_str()).map_err(|e| {
            tracing::debug!(target: "gate.auth.verifier", error = ?e, "Token header unreadable");
            AuthError::UnverifiableHeader
        })?;

        let algorithm = Algorithm::from_str(&header.alg).map_err(|_| {
            tracing::debug!(target: "gate.auth.verifier", alg = %header.alg, "Unknown token algorithm");
            AuthError::UnverifiableHeader
        })?;

        if !self.algorithms.contains(&algorithm) {
            tracing::warn!(
                target: "gate.auth.verifier",
                alg = ?algorithm,
                "Token algorithm not in allow-list"
            );
            return Err(AuthError::UnverifiableHeader);
        }

        let signing_key = key_set.find(&header.kid).ok_or_else(|| {
            tracing::debug!(
                target: "gate.auth.verifier",
                kid = %header.kid,
                key_count = key_set.len(),
                "No signing key for token kid"
            );
            AuthError::KeyNotFound
        })?;

        let decoding_key = rsa_decoding_key(signing_key)?;

        let token_data =
            decode::<Claims>(token.as_str(), &decoding_key, &self.validation).map_err(|e| {
                tracing::debug!(target: "gate.auth.verifier", error = %e, "Token verification failed");
                map_decode_error(e.kind())
            })?;

        let claims = token_data.claims;

        if claims.exp <= now {
            tracing::debug!(
                target: "gate.auth.verifier",
                exp = claims.exp,
                now = now,
                "Token expired"
            );
            return Err(AuthError::SignatureExpired);
        }

        tracing::debug!(target: "gate.auth.verifier", kid = %header.kid, "Token verified");
        Ok(claims)
    }
}

/// Rebuild an RSA public key from a key set entry.
fn rsa_decoding_key(key: &SigningKey) -> Result<DecodingKey, AuthError> {
    if key.kty != "RSA" {
        tracing::warn!(
            target: "gate.auth.verifier",
            kid = %key.kid,
            kty = %key.kty,
            "Signing key is not an RSA key"
        );
        return Err(AuthError::KeyNotFound);
    }

    let (Some(n), Some(e)) = (key.n.as_deref(), key.e.as_deref()) else {
        tracing::error!(target: "gate.auth.verifier", kid = %key.kid, "RSA key missing n or e");
        return Err(AuthError::SignatureInvalid);
    };

    DecodingKey::from_rsa_components(n, e).map_err(|err| {
        tracing::error!(
            target: "gate.auth.verifier",
            kid = %key.kid,
            error = %err,
            "Invalid RSA key components"
        );
        AuthError::SignatureInvalid
    })
}

fn map_decode_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::SignatureExpired,
        ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => AuthError::ClaimsInvalid,
        _ => AuthError::SignatureInvalid,
    }
}
