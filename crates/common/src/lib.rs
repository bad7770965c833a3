//! Common utilities shared across the bearer gate crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for reading JWT headers before verification
pub mod jwt;

/// Module for the OAuth 2.0 client-credentials grant
pub mod token_client;
