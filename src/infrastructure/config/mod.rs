//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::ForemanConfig;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error(
        "Invalid backoff configuration: base_delay_ms ({0}) must be less than max_delay_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("state_dir cannot be empty or absolute")]
    InvalidStateDir,

    #[error("Invalid agent timeout: {0}. Must be positive unless no_timeout is set")]
    InvalidAgentTimeout(u64),

    #[error("Invalid e2e timeout: {0}. Must be positive")]
    InvalidE2eTimeout(u64),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. ai/foreman.yaml (project config, created by init)
    /// 3. ai/local.yaml (project local overrides, optional)
    /// 4. Environment variables (FOREMAN_* prefix, highest priority)
    pub fn load() -> Result<ForemanConfig> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration rooted at a specific project directory.
    pub fn load_from(project_root: &Path) -> Result<ForemanConfig> {
        let config: ForemanConfig = Figment::new()
            .merge(Serialized::defaults(ForemanConfig::default()))
            .merge(Yaml::file(project_root.join("ai/foreman.yaml")))
            .merge(Yaml::file(project_root.join("ai/local.yaml")))
            .merge(Env::prefixed("FOREMAN_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &ForemanConfig) -> Result<(), ConfigError> {
        if config.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.retry.max_attempts));
        }

        if config.retry.base_delay_ms >= config.retry.max_delay_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.base_delay_ms,
                config.retry.max_delay_ms,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.state_dir.is_empty() || Path::new(&config.state_dir).is_absolute() {
            return Err(ConfigError::InvalidStateDir);
        }

        if !config.agent.no_timeout && config.agent.timeout_secs == 0 {
            return Err(ConfigError::InvalidAgentTimeout(config.agent.timeout_secs));
        }

        if config.verify.e2e_timeout_secs == 0 {
            return Err(ConfigError::InvalidE2eTimeout(config.verify.e2e_timeout_secs));
        }

        Ok(())
    }
}
