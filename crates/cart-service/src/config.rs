//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::ConfigError;
use common::config::{env_lookup, optional, optional_parsed, required};
use messaging::{BrokerConfig, RetryPolicy};

/// Listen port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

/// `DATABASE_URL` prefix that selects the in-memory cart store.
pub const MEMORY_DATABASE_URL: &str = "memory://";

/// Cart service configuration.
///
/// Reads from environment variables:
/// - broker settings, see [`BrokerConfig`]
/// - `DATABASE_URL`: Postgres URL, or `memory://` (required)
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `MAX_DELIVERY_ATTEMPTS`: deliveries before dead-lettering (default: `5`)
/// - `RETRY_DELAY_MS`: base wait before a retry, scaled by the attempt number (default: `500`)
/// - `SHUTDOWN_TIMEOUT_SECS`: wait for the in-flight message on shutdown (default: `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: String,
    pub broker: BrokerConfig,
    pub max_delivery_attempts: u32,
    pub retry_delay: Duration,
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    /// Loads configuration through `lookup`. Reports the first missing required value.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let broker = BrokerConfig::from_lookup(lookup)?;
        Ok(Self {
            database_url: required(lookup, "DATABASE_URL")?,
            broker,
            host: optional(lookup, "HOST", "0.0.0.0"),
            port: optional_parsed(lookup, "PORT", DEFAULT_PORT)?,
            log_level: optional(lookup, "RUST_LOG", "info"),
            max_delivery_attempts: optional_parsed(lookup, "MAX_DELIVERY_ATTEMPTS", 5)?,
            retry_delay: Duration::from_millis(optional_parsed(lookup, "RETRY_DELAY_MS", 500)?),
            shutdown_timeout: Duration::from_secs(optional_parsed(
                lookup,
                "SHUTDOWN_TIMEOUT_SECS",
                10,
            )?),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when `DATABASE_URL` selects the in-memory store.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with(MEMORY_DATABASE_URL)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_delivery_attempts).with_delay(self.retry_delay)
    }
}
