//! Bootstrap utilities for applications.
//!
//! Shared initialization code: logging, configuration and the admin context.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, ConfigError, LOG_ENV_VAR};
use crate::context::AdminContext;
use crate::interfaces::DataProvider;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing with the RA_LOG environment variable.
///
/// Defaults to "info" level if RA_LOG is not set. Panics if a global
/// subscriber is already installed; use [`try_init_tracing`] where that
/// can happen.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Like [`init_tracing`], but returns `false` instead of panicking when a
/// subscriber is already installed.
pub fn try_init_tracing() -> bool {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

/// Load configuration and build the admin context over `data_provider`.
///
/// See [`Config::load`] for the configuration sources.
pub fn init_context(
    data_provider: Arc<dyn DataProvider>,
    config_path: Option<&str>,
) -> Result<AdminContext, ConfigError> {
    let config = Config::load(config_path)?;
    info!(
        config_path = config_path.unwrap_or("<default>"),
        "Configuration loaded"
    );
    Ok(AdminContext::from_config(data_provider, config))
}
