//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::ConfigError;
use common::config::{env_lookup, optional, optional_parsed, required};
use messaging::{BrokerConfig, RetryPolicy};

/// Listen port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3001;

/// `DATABASE_URL` prefix that selects the in-memory order store.
pub const MEMORY_DATABASE_URL: &str = "memory://";

/// Order service configuration.
///
/// Same variables as the cart service; only the default port differs.
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
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

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

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with(MEMORY_DATABASE_URL)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_delivery_attempts).with_delay(self.retry_delay)
    }
}
