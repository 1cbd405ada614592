//! Function configuration, read once when the execution environment starts.

use crate::error::ConfigError;
use http::HeaderValue;
use std::{env, str::FromStr};

/// Origin allowed to read the counter when `ALLOWED_ORIGIN` is not set.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://thomaskjohn.com";

/// How the counter is advanced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum IncrementMode {
    /// A single atomic add on the store. Safe under concurrent invocations.
    #[default]
    Atomic,
    /// Fetch, add one, write back. Concurrent invocations can lose increments.
    ReadModifyWrite,
}

impl FromStr for IncrementMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(IncrementMode::Atomic),
            "read-modify-write" => Ok(IncrementMode::ReadModifyWrite),
            _ => Err(ConfigError::InvalidIncrementMode(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// DynamoDB table holding the counter record (`TABLE_NAME`).
    pub table_name: String,
    /// Value of `Access-Control-Allow-Origin` (`ALLOWED_ORIGIN`).
    pub allowed_origin: HeaderValue,
    /// `INCREMENT_MODE`.
    pub increment_mode: IncrementMode,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let table_name = lookup("TABLE_NAME")
            .filter(|name| !name.trim().is_empty())
            .ok_or(ConfigError::Missing("TABLE_NAME"))?;

        let origin = lookup("ALLOWED_ORIGIN").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGIN.to_owned());
        let allowed_origin = HeaderValue::from_str(&origin).map_err(|_| ConfigError::InvalidOrigin(origin.clone()))?;

        let increment_mode = match lookup("INCREMENT_MODE") {
            Some(mode) => mode.parse()?,
            None => IncrementMode::default(),
        };

        Ok(Config {
            table_name,
            allowed_origin,
            increment_mode,
        })
    }
}
