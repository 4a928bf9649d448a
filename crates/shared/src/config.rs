//! Application configuration management.

use std::time::Duration;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Ledger runtime tuning.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
///
/// Without a URL the server runs on the in-memory ledger store.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Ledger runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Idle interval before a keep-alive is sent on change streams.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Upper bound for a single read against the ledger store.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Buffered change events per (client, year) before slow subscribers lag.
    #[serde(default = "default_notifier_capacity")]
    pub notifier_capacity: usize,
}

impl LedgerConfig {
    /// Rejects zero intervals and capacities.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` naming the offending key.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let zero = [
            ("ledger.keep_alive_secs", self.keep_alive_secs == 0),
            ("ledger.query_timeout_secs", self.query_timeout_secs == 0),
            ("ledger.notifier_capacity", self.notifier_capacity == 0),
        ];
        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((key, _)) => Err(config::ConfigError::Message(format!(
                "{key} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }

    /// Keep-alive interval as a `Duration`.
    #[must_use]
    pub const fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Query timeout as a `Duration`.
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            keep_alive_secs: default_keep_alive_secs(),
            query_timeout_secs: default_query_timeout_secs(),
            notifier_capacity: default_notifier_capacity(),
        }
    }
}

fn default_keep_alive_secs() -> u64 {
    25
}

fn default_query_timeout_secs() -> u64 {
    10
}

fn default_notifier_capacity() -> usize {
    64
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or a ledger
    /// interval is zero.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("CAREBUDGET").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.ledger.validate()?;
        Ok(config)
    }
}
