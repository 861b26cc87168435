//! Shared building blocks for the IPC messenger workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): error location tracking and secret handling
//! - **messenger-core**: value store, dispatchers, contracts and transports
//! - **messenger-demo**: application wiring everything together
//!
//! Nothing in here knows about channels or envelopes.

pub mod error;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_token::RedactedToken;

#[cfg(test)]
mod tests;
