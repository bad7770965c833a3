//! HTTP request handlers for the demo service.

pub mod health;
pub mod me;
pub mod messages;
pub mod metrics;

pub use health::health_check;
pub use me::get_me;
pub use messages::{private_message, public_message};
pub use metrics::metrics_handler;
