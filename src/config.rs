//! Application configuration.
//!
//! Supports YAML files and environment variable overrides.

use std::time::Duration;

use serde::Deserialize;

use crate::types::MutationMode;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "RA_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "RA";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "RA_LOG";

/// Default undo window, matching the notification auto-hide delay.
pub const DEFAULT_UNDO_TIMEOUT_MS: u64 = 4000;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Main configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults applied to CRUD mutations.
    pub mutations: MutationConfig,
    /// Undo window settings.
    pub undo: UndoConfig,
}

/// Defaults applied to mutations built from the application context.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Mode used when a mutation does not choose one.
    pub default_mode: MutationMode,
    /// Whether pessimistic mutations return their result by default.
    pub return_promise: bool,
}

/// Undo window configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    /// Delay before a pending undoable mutation is committed.
    pub timeout_ms: u64,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_UNDO_TIMEOUT_MS,
        }
    }
}

impl UndoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&env_path, FileFormat::Yaml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(CONFIG_ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Parse configuration from an inline YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }
}
