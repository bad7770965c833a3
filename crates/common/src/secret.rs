//! Secret types for keeping credentials out of logs.
//!
//! Re-exports [`secrecy`] types. The gate handles two kinds of secrets:
//! the OAuth client secret used for the client-credentials grant, and the
//! access tokens that grant returns. Both are wrapped in `SecretString` so
//! that deriving `Debug` on a containing struct can never print them.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct ClientCredentials {
//!     client_id: String,
//!     client_secret: SecretString,
//! }
//!
//! let creds = ClientCredentials {
//!     client_id: "gate-client".to_string(),
//!     client_secret: SecretString::from("s3cr3t"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("s3cr3t"));
//! assert_eq!(creds.client_secret.expose_secret(), "s3cr3t");
//! ```
//!
//! Secrets are zeroized on drop.

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("eyJhbGciOiJSUzI1NiJ9.payload.sig");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("eyJhbGciOiJSUzI1NiJ9"));
    }

    #[test]
    fn test_deserialize_token_response_field() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct TokenBody {
            access_token: SecretString,
            token_type: String,
        }

        let json = r#"{"access_token": "opaque-token-value", "token_type": "Bearer"}"#;
        let body: TokenBody = serde_json::from_str(json).expect("deserialize");

        assert_eq!(body.access_token.expose_secret(), "opaque-token-value");

        let debug = format!("{body:?}");
        assert!(!debug.contains("opaque-token-value"));
        assert!(debug.contains("Bearer"));
    }

    #[test]
    fn test_clone_keeps_value() {
        let secret = SecretString::from("client-secret");
        let cloned = secret.clone();
        assert_eq!(cloned.expose_secret(), "client-secret");
    }
}
