use http::StatusCode;
use thiserror::Error;

/// Failures raised by the runtime itself, as opposed to errors returned by a handler.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A variable the Lambda service always sets is absent.
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
    /// A variable is present but cannot be parsed.
    #[error("invalid value for environment variable {name}: {value}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
    /// An invocation arrived without a required header.
    #[error("missing or invalid invocation header {0}")]
    MissingHeader(&'static str),
    /// The Runtime API answered with a non-success status.
    #[error("runtime api returned {status} for {path}")]
    UnexpectedStatus {
        /// Status returned.
        status: StatusCode,
        /// Path relative to the API version prefix.
        path: String,
    },
}
