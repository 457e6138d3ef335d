//! Configuration loading: hierarchical
//! merge of programmatic defaults, an optional YAML file, and environment
//! variables, matching the layering convention used throughout this
//! codebase's config loaders.

use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level mesh configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Broadcast-style broker behavior.
    pub broker: BrokerConfig,
    /// Per-task dispatch timeout, in milliseconds.
    pub task_timeout_ms: u64,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Default max retry attempts for reliable deliveries that don't
    /// specify their own.
    pub default_max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// `json` or `pretty`.
    pub format: String,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig {
                default_max_retries: 3,
            },
            task_timeout_ms: 30_000,
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

impl MeshConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {0}, must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}, must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("task_timeout_ms must be greater than zero")]
    ZeroTaskTimeout,

    #[error("figment extraction failed: {0}")]
    Extraction(#[from] figment::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging (lowest to highest
    /// precedence): programmatic defaults, `amcp.yaml` in the working
    /// directory, then `AMCP_`-prefixed environment variables.
    pub fn load() -> Result<MeshConfig, ConfigError> {
        let config: MeshConfig = Figment::new()
            .merge(Serialized::defaults(MeshConfig::default()))
            .merge(Yaml::file("amcp.yaml"))
            .merge(Env::prefixed("AMCP_").split("__"))
            .extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<MeshConfig, ConfigError> {
        let config: MeshConfig = Figment::new()
            .merge(Serialized::defaults(MeshConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &MeshConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        if config.task_timeout_ms == 0 {
            return Err(ConfigError::ZeroTaskTimeout);
        }
        Ok(())
    }
}
