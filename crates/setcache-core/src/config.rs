//! Cache connection configuration
//!
//! The only required input is a `host:port` endpoint. Everything else has a
//! default that matches the reconnect behavior described in
//! [`ReconnectPolicy`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::policy::ReconnectPolicy;

/// Environment variable holding the `host:port` endpoint
pub const ENDPOINT_ENV: &str = "SETCACHE_REDIS_ENDPOINT";

/// Optional environment variable overriding the connect timeout (e.g. `5s`)
pub const CONNECT_TIMEOUT_ENV: &str = "SETCACHE_CONNECT_TIMEOUT";

/// Default time allowed for opening the connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Host and port of the backend store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Connection URL understood by the Redis client
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    /// Parse `host:port`; exactly two non-empty components are accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| ConfigError::MalformedEndpoint {
            endpoint: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.trim().split(':').collect();
        let [host, port] = parts.as_slice() else {
            return Err(malformed("expected exactly one ':' between host and port"));
        };

        if host.is_empty() {
            return Err(malformed("host cannot be empty"));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| malformed("port must be a number between 1 and 65535"))?;
        if port == 0 {
            return Err(malformed("port cannot be zero"));
        }

        Ok(Endpoint::new(*host, port))
    }
}

/// Configuration for a [`SetCache`](crate::SetCache)
///
/// The endpoint is kept as the raw string it was given. [`CacheConfig::from_env`]
/// checks it eagerly at startup; [`SetCache::connect`](crate::SetCache::connect)
/// parses it again and treats a bad value as a contained connect fault.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Raw `host:port` string
    pub endpoint: String,
    /// Time allowed for opening the connection
    pub connect_timeout: Duration,
    /// Reconnect classifier and backoff schedule
    pub reconnect: ReconnectPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:6379".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Create config for the given `host:port` endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Load config from the environment
    ///
    /// Reads `SETCACHE_REDIS_ENDPOINT` (required) and
    /// `SETCACHE_CONNECT_TIMEOUT` (optional, humantime syntax).
    pub fn from_env() -> ConfigResult<Self> {
        let endpoint = std::env::var(ENDPOINT_ENV)
            .map_err(|_| ConfigError::MissingVar(ENDPOINT_ENV.to_string()))?;

        let mut config = Self::new(endpoint);
        if let Ok(raw) = std::env::var(CONNECT_TIMEOUT_ENV) {
            config.connect_timeout = parse_timeout(&raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the reconnect policy
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Parse the endpoint string
    pub fn endpoint(&self) -> ConfigResult<Endpoint> {
        self.endpoint.parse()
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.endpoint()?;

        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                value: "0".to_string(),
                reason: "connect timeout cannot be zero".to_string(),
            });
        }

        self.reconnect.validate()
    }
}

fn parse_timeout(raw: &str) -> ConfigResult<Duration> {
    let timeout = humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::InvalidTimeout {
        value: raw.to_string(),
        reason: e.to_string(),
    })?;

    if timeout.is_zero() {
        return Err(ConfigError::InvalidTimeout {
            value: raw.to_string(),
            reason: "connect timeout cannot be zero".to_string(),
        });
    }
    Ok(timeout)
}
