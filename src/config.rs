//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::data::DatabaseOptions;
use crate::service::RetryPolicy;

/// Main engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Pool size (default: 8)
    pub max_connections: u32,
    /// How long a connection waits on a locked database (default: 5000)
    pub busy_timeout_ms: u64,
}

/// Sync engine tuning
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Buffered change sets per subscriber before it starts lagging
    pub change_feed_capacity: usize,
    pub follow_request_poll: FollowRequestPollConfig,
}

/// Pending follow-request refresh schedule
#[derive(Debug, Clone, Deserialize)]
pub struct FollowRequestPollConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FEDISYNC_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("database.path", "fedisync.db")?
            .set_default("database.max_connections", 8)?
            .set_default("database.busy_timeout_ms", 5000)?
            .set_default("sync.change_feed_capacity", 256)?
            .set_default("sync.follow_request_poll.initial_delay_ms", 2000)?
            .set_default("sync.follow_request_poll.max_delay_ms", 60_000)?
            .set_default("sync.follow_request_poll.max_attempts", 8)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("FEDISYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            max_connections: self.database.max_connections,
            busy_timeout: Duration::from_millis(self.database.busy_timeout_ms),
            change_feed_capacity: self.sync.change_feed_capacity,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let poll = &self.sync.follow_request_poll;
        RetryPolicy {
            initial_delay: Duration::from_millis(poll.initial_delay_ms),
            max_delay: Duration::from_millis(poll.max_delay_ms),
            max_attempts: poll.max_attempts,
        }
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.database.max_connections == 0 {
            return Err(crate::error::AppError::Config(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if self.sync.change_feed_capacity == 0 {
            return Err(crate::error::AppError::Config(
                "sync.change_feed_capacity must be greater than 0".to_string(),
            ));
        }

        let poll = &self.sync.follow_request_poll;
        if poll.initial_delay_ms > poll.max_delay_ms {
            return Err(crate::error::AppError::Config(format!(
                "sync.follow_request_poll.initial_delay_ms ({}) exceeds max_delay_ms ({})",
                poll.initial_delay_ms, poll.max_delay_ms
            )));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        if self.database.busy_timeout_ms == 0 {
            tracing::warn!("database.busy_timeout_ms is 0; concurrent writers will fail fast");
        }

        Ok(())
    }
}
