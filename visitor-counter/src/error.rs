//! Error types for the counter function.

use thiserror::Error;

/// A store operation failed.
///
/// Every variant displays as the bare description, which is exactly what ends
/// up in the `error` field of a failure response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Reading the counter record failed.
    #[error("{0}")]
    Fetch(String),
    /// Writing the counter record failed.
    #[error("{0}")]
    Update(String),
    /// The record exists but `visitor_count` is not a non-negative integer.
    #[error("malformed {attribute} attribute: {value}")]
    Malformed { attribute: &'static str, value: String },
    /// Incrementing would exceed `u64::MAX`.
    #[error("visitor_count overflow")]
    Overflow,
}

/// Startup configuration is missing or unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("ALLOWED_ORIGIN is not a valid header value: {0}")]
    InvalidOrigin(String),
    #[error("unknown INCREMENT_MODE {0:?}, expected \"atomic\" or \"read-modify-write\"")]
    InvalidIncrementMode(String),
}
