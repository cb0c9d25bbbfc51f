//! Broker connection settings.

use common::ConfigError;
use common::config::{optional, required, required_parsed};

/// Connection settings for the AMQP broker.
///
/// Reads:
/// - `RABBITMQHOST`: broker host (required)
/// - `RABBITMQPORT`: broker port (required)
/// - `RABBITUSER` / `RABBITPASSWORD`: credentials (required)
/// - `RABBITMQVHOST`: virtual host (default: `"/"`)
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
}

impl BrokerConfig {
    /// Loads broker settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&common::config::env_lookup)
    }

    /// Loads broker settings through `lookup`.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: required(lookup, "RABBITMQHOST")?,
            port: required_parsed(lookup, "RABBITMQPORT")?,
            user: required(lookup, "RABBITUSER")?,
            password: required(lookup, "RABBITPASSWORD")?,
            vhost: optional(lookup, "RABBITMQVHOST", "/"),
        })
    }

    /// `amqp://user@host:port/vhost` with the password left out, for logs.
    pub fn redacted_uri(&self) -> String {
        format!(
            "amqp://{}@{}:{}/{}",
            self.user,
            self.host,
            self.port,
            self.vhost.trim_start_matches('/')
        )
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("vhost", &self.vhost)
            .finish()
    }
}
