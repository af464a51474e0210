//! # Lieutenant API
//!
//! Serves the tenant and cluster REST API.
//!
//! ## Startup
//!
//! 1. Read configuration from the environment
//! 2. Install the tracing subscriber and the rustls crypto provider
//! 3. Register Prometheus metrics
//! 4. Build the credential resolver and serve HTTP until Ctrl-C

use anyhow::{Context, Result};
use lieutenant_api::auth::{AuthResolver, KubeClientFactory};
use lieutenant_api::config::ApiConfig;
use lieutenant_api::observability::{logging, metrics};
use lieutenant_api::server::{start_server, AppState};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ApiConfig::from_env();
    logging::init_logging(&config)?;

    // kube's rustls-tls feature needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        info!("rustls crypto provider already installed");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("BUILD_GIT_HASH"),
        built = env!("BUILD_DATETIME"),
        "Starting Lieutenant API"
    );
    info!(
        namespace = %config.namespace,
        client_cache_size = config.client_cache_size,
        instance = %config.instance_name,
        port = config.port,
        "Configuration loaded"
    );

    metrics::register_metrics().context("Failed to register metrics")?;

    let factory = Arc::new(KubeClientFactory::new(config.namespace.clone()));
    let resolver = AuthResolver::new(factory, config.client_cache_size);
    let state = AppState::new(config, resolver);

    start_server(state).await?;

    info!("Lieutenant API stopped");
    Ok(())
}
