//! Error types for configuration and cache operations
//!
//! Configuration faults are startup-time problems and propagate to the
//! caller. Cache faults are runtime problems and are contained by
//! [`SetCache`](crate::SetCache) before they reach application code.

use std::time::Duration;

use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for backend and transport operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised while building a [`CacheConfig`](crate::CacheConfig)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is not set
    #[error("Missing environment variable: {0}")]
    MissingVar(String),

    /// Endpoint is not of the form `host:port`
    #[error("Malformed endpoint '{endpoint}': {reason}")]
    MalformedEndpoint { endpoint: String, reason: String },

    /// Timeout value could not be parsed or is zero
    #[error("Invalid timeout '{value}': {reason}")]
    InvalidTimeout { value: String, reason: String },

    /// Reconnect policy values are inconsistent
    #[error("Invalid reconnect policy: {0}")]
    InvalidPolicy(String),
}

/// Errors that can occur while talking to the set store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The endpoint could not be parsed at connect time
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Building the client or opening the connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Opening the connection did not finish in time
    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The store rejected or failed a command
    #[error("Command {command} failed: {message}")]
    CommandFailed { command: String, message: String },

    /// A reply did not have the shape the operation expects
    #[error("Failed to decode reply: {0}")]
    Decode(String),

    /// A member value could not be serialized
    #[error("Failed to encode member: {0}")]
    Encode(String),

    /// A reconnect episode ran out of attempts
    #[error("Reconnect gave up after {attempts} attempts: {last_error}")]
    ReconnectExhausted { attempts: u32, last_error: String },

    /// The connection was closed after a failed reconnect episode
    #[error("Connection is closed")]
    ConnectionClosed,
}

impl CacheError {
    /// Returns `true` for faults that mean the store could not be reached at all
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            CacheError::ConnectionFailed(_)
                | CacheError::ConnectTimeout(_)
                | CacheError::ReconnectExhausted { .. }
                | CacheError::ConnectionClosed
        )
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Decode(err.to_string())
    }
}
