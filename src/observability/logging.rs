//! # Logging
//!
//! Installs the global `tracing` subscriber.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the configured
//! log level applied to this crate. `LOG_FORMAT=json` switches to one JSON
//! object per line.

use crate::config::ApiConfig;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
fn default_filter(level: &str) -> String {
    format!("lieutenant_api={level},tower_http={level}")
}

/// Initialize the global subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(config: &ApiConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(&config.log_level).into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json_logs() {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
