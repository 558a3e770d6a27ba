// src/error.rs
// Error types for lookup, delivery and configuration

use std::time::Duration;
use thiserror::Error;

use crate::reference::Translation;

/// Failure returned by the verse lookup capability and the passage fetcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Terminal: the backend has no such passage (or no backend serves the translation).
    #[error("passage not found: {0}")]
    NotFound(String),

    /// Network, timeout, 429 or 5xx-class failure. Never retried by the fetcher.
    #[error("transient lookup failure: {0}")]
    Transient(String),

    /// The backend for this translation needs an API key and none is configured.
    #[error("{} translation requires an API key", .0.marker())]
    MissingApiKey(Translation),
}

impl FetchError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        // Any reqwest failure that reaches here happened before a usable status code
        Self::Transient(e.to_string())
    }
}

/// Failure returned by the chat send capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Rate limited by the transport; `retry_after` is the server-suggested wait, if any.
    #[error("throttled by transport (retry after {retry_after:?})")]
    Throttled { retry_after: Option<Duration> },

    /// Any other transport failure. Not retried.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SendError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Convenience type alias for configuration results
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
