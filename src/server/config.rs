//! # Server Configuration Module
//!
//! Configuration is read from (in order of precedence):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Default values
//!
//! The age threshold and digest algorithm are fixed policy and deliberately
//! absent from this struct.

use crate::error::{HashServerError, Result};
use clap::{ArgAction, Parser};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::{metadata::ParseLevelError, Level};

/// Wrapper for `tracing::Level` to handle serialization/deserialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevel(Level);

impl LogLevel {
    /// Returns the inner `tracing::Level` value.
    #[must_use]
    pub fn inner(&self) -> Level {
        self.0
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        Self(level)
    }
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        log_level.0
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self(s.parse().map_err(serde::de::Error::custom)?))
    }
}

/// Hash server configuration
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "hash-server",
    about = "Issue ids for secrets and serve their SHA-512 digests after a delay",
    version,
    long_about = None
)]
pub struct ServerConfig {
    /// Network address to bind the server to
    ///
    /// Use "0.0.0.0:8080" for all interfaces or "127.0.0.1:8080" for
    /// localhost only.
    #[arg(
        short = 'b',
        long = "bind",
        value_name = "ADDRESS:PORT",
        default_value = "0.0.0.0:8080",
        env = "HASH_SERVER_BIND_ADDR",
        help = "Network address to bind the server to"
    )]
    pub bind_addr: SocketAddr,

    /// Logging level (error, warn, info, debug, trace)
    ///
    /// Digests are only logged at debug and below. Secrets are never logged.
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        default_value = "info",
        env = "LOG_LEVEL",
        help = "Logging level (error, warn, info, debug, trace)"
    )]
    pub log_level: LogLevel,

    /// Maximum request body size in bytes
    ///
    /// Larger submissions are rejected with 413 before reaching the store.
    #[arg(
        short = 'm',
        long = "max-payload-size",
        value_name = "BYTES",
        default_value_t = crate::MAX_PAYLOAD_SIZE,
        env = "MAX_PAYLOAD_SIZE",
        help = "Maximum request payload size in bytes"
    )]
    pub max_payload_size: usize,

    /// Request timeout in milliseconds
    #[arg(
        short = 't',
        long = "request-timeout",
        value_name = "MILLISECONDS",
        default_value_t = crate::REQUEST_TIMEOUT_MS,
        env = "REQUEST_TIMEOUT_MS",
        help = "Request timeout in milliseconds"
    )]
    pub request_timeout_ms: u64,

    /// Number of Tokio worker threads
    ///
    /// Defaults to twice the CPU count, between 4 and 16.
    #[arg(
        short = 'w',
        long = "worker-threads",
        value_name = "COUNT",
        env = "WORKER_THREADS",
        help = "Number of worker threads (default: 2x CPU cores, max 16)"
    )]
    pub worker_threads: Option<usize>,

    /// Expose Prometheus metrics at /metrics
    #[arg(
        long = "enable-metrics",
        env = "ENABLE_METRICS",
        help = "Enable Prometheus metrics endpoint"
    )]
    pub enable_metrics: bool,

    /// Expose health status at /health
    #[arg(
        long = "enable-health-check",
        env = "ENABLE_HEALTH_CHECK",
        value_name = "BOOL",
        action = ArgAction::Set,
        default_value_t = true,
        help = "Enable health check endpoint"
    )]
    pub enable_health_check: bool,
}

impl ServerConfig {
    /// Create a new configuration with default values
    ///
    /// ## Example
    /// ```rust
    /// use hash_server::ServerConfig;
    ///
    /// let config = ServerConfig::new();
    /// assert_eq!(config.bind_addr.port(), 8080);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from command-line arguments and environment
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Load configuration from environment variables only
    ///
    /// Missing variables keep their default values.
    ///
    /// ## Errors
    /// - `HashServerError::ConfigError` if a variable is set but unparseable
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(bind_addr) = env_value("HASH_SERVER_BIND_ADDR")? {
            config.bind_addr = bind_addr;
        }
        if let Some(log_level) = env_value("LOG_LEVEL")? {
            config.log_level = log_level;
        }
        if let Some(max_size) = env_value("MAX_PAYLOAD_SIZE")? {
            config.max_payload_size = max_size;
        }
        if let Some(timeout) = env_value("REQUEST_TIMEOUT_MS")? {
            config.request_timeout_ms = timeout;
        }
        if let Some(workers) = env_value("WORKER_THREADS")? {
            config.worker_threads = Some(workers);
        }
        if let Some(metrics) = env_value("ENABLE_METRICS")? {
            config.enable_metrics = metrics;
        }
        if let Some(health) = env_value("ENABLE_HEALTH_CHECK")? {
            config.enable_health_check = health;
        }

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// ## Errors
    /// - `HashServerError::ConfigError` for a zero payload limit, zero
    ///   timeout or zero worker count
    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.ip().is_unspecified() {
            tracing::warn!(
                "Binding to wildcard address {} - ensure this is secure for your environment",
                self.bind_addr
            );
        }

        if self.max_payload_size == 0 {
            return Err(HashServerError::config_error(
                "Maximum payload size cannot be zero",
                None,
            ));
        }

        if self.max_payload_size > 100 * 1024 * 1024 {
            tracing::warn!(
                "Very large maximum payload size: {} bytes",
                self.max_payload_size
            );
        }

        if self.request_timeout_ms == 0 {
            return Err(HashServerError::config_error(
                "Request timeout cannot be zero",
                None,
            ));
        }

        if let Some(workers) = self.worker_threads {
            if workers == 0 {
                return Err(HashServerError::config_error(
                    "Worker thread count cannot be zero",
                    None,
                ));
            }

            if workers > 64 {
                tracing::warn!(
                    "Very high worker thread count: {} - this may cause excessive context switching",
                    workers
                );
            }
        }

        Ok(())
    }

    /// Configured worker thread count, or twice the CPU count in `4..=16`
    #[must_use]
    pub fn get_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get() * 2)
                .unwrap_or(4)
                .clamp(4, 16)
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], crate::DEFAULT_PORT)),
            log_level: LogLevel::from(Level::INFO),
            max_payload_size: crate::MAX_PAYLOAD_SIZE,
            request_timeout_ms: crate::REQUEST_TIMEOUT_MS,
            worker_threads: None,
            enable_metrics: false,
            enable_health_check: true,
        }
    }
}

/// Parse environment variable `name`, if set
fn env_value<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw.parse().map(Some).map_err(|e| {
            HashServerError::config_error(
                format!("Invalid value for {name} '{raw}': {e}"),
                Some(Box::new(e)),
            )
        }),
        Err(_) => Ok(None),
    }
}
