use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::{Config, TimeWindow};

/// Project directory holding config, database and logs
pub const CONFIG_DIR: &str = ".lab-agent";

/// Environment variable prefix; `__` separates nested keys
pub const ENV_PREFIX: &str = "LAB_AGENT_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid planner max_retries: {0}. Cannot be 0")]
    InvalidPlannerRetries(u32),

    #[error("Memory namespace prefix cannot be empty")]
    EmptyNamespacePrefix,

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid MCP server '{id}': {reason}")]
    InvalidMcpServer { id: String, reason: String },

    #[error("Invalid night_ops_window: {0}. Expected HH:MM-HH:MM")]
    InvalidNightOpsWindow(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current project
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .lab-agent/config.yaml (project config, created by init)
    /// 3. .lab-agent/local.yaml (local overrides, optional)
    /// 4. Environment variables (LAB_AGENT_* prefix)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`] with `root` as the project directory.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.planner.max_retries == 0 {
            return Err(ConfigError::InvalidPlannerRetries(config.planner.max_retries));
        }
        if config.planner.memory_namespace_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyNamespacePrefix);
        }

        let llm = &config.llm;
        if llm.rate_limit.requests_per_second <= 0.0 {
            return Err(ConfigError::InvalidRateLimit(llm.rate_limit.requests_per_second));
        }
        if llm.rate_limit.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(llm.rate_limit.burst_size));
        }
        if llm.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(llm.retry.max_retries));
        }
        if llm.retry.initial_backoff_ms >= llm.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                llm.retry.initial_backoff_ms,
                llm.retry.max_backoff_ms,
            ));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let logging = &config.logging;
        if !["trace", "debug", "info", "warn", "error"].contains(&logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(logging.level.clone()));
        }
        if !["json", "pretty"].contains(&logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(logging.format.clone()));
        }
        if !["daily", "hourly", "never"].contains(&logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(logging.rotation.clone()));
        }

        let mut seen = HashSet::new();
        for server in &config.mcp.servers {
            let invalid = |reason: &str| ConfigError::InvalidMcpServer {
                id: server.id.clone(),
                reason: reason.to_string(),
            };
            if server.id.is_empty() {
                return Err(invalid("id cannot be empty"));
            }
            if server.id.contains('.') {
                return Err(invalid("id cannot contain '.'"));
            }
            if server.url.is_empty() {
                return Err(invalid("url cannot be empty"));
            }
            if !seen.insert(server.id.as_str()) {
                return Err(invalid("duplicate id"));
            }
        }

        if TimeWindow::parse(&config.safety.night_ops_window).is_err() {
            return Err(ConfigError::InvalidNightOpsWindow(
                config.safety.night_ops_window.clone(),
            ));
        }

        Ok(())
    }
}
