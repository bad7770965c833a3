//! Bearer token authentication.
//!
//! # Components
//!
//! - `extractor` - Bearer token extraction from the `Authorization` header
//! - `jwks` - Per-issuer key set cache fed from the provider's JWKS endpoint
//! - `verifier` - Signature and registered-claim verification
//! - `claims` - Claims of a verified token
//! - `gate` - The pipeline tying the above together

pub mod claims;
pub mod extractor;
pub mod gate;
pub mod jwks;
pub mod verifier;

pub use claims::{Audience, Claims};
pub use extractor::{extract_bearer_token, RawToken};
pub use gate::{AuthGate, GateStage};
pub use jwks::{KeySet, KeySetCache, KeySetCacheError, SigningKey};
pub use verifier::SignatureVerifier;
