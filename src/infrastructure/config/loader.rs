use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("hypervisor endpoint cannot be empty")]
    EmptyHypervisorEndpoint,

    #[error("cron interval must be positive")]
    ZeroCronInterval,

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from `path`, merged in precedence order
    /// (lowest to highest): programmatic defaults, the YAML file,
    /// `VMSCHED_`-prefixed environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("VMSCHED_").split("__"))
            .extract()
            .context("failed to extract configuration")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.hypervisor.endpoint.is_empty() {
            return Err(ConfigError::EmptyHypervisorEndpoint);
        }
        if config.scheduler.cron_interval_secs == 0 {
            return Err(ConfigError::ZeroCronInterval);
        }
        match config.log.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
        Ok(())
    }
}
