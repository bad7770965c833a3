//! # Gate Test Utilities
//!
//! Shared test utilities for the bearer token gate.
//!
//! This crate provides:
//! - Fixed RSA keypairs that sign tokens and publish JWKs (`crypto_fixtures`)
//! - Claim builders (`token_builders`)
//! - A spawned gate server backed by a mock JWKS endpoint (`server_harness`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gate_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let keypair = TestKeypair::primary();
//!     let server = TestGateServer::spawn(&[&keypair]).await?;
//!
//!     let token = keypair.sign(&server.claims().build());
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/private", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
