//! # HTTP Server
//!
//! REST API for tenants and clusters plus the agent install endpoint.
//!
//! Provides endpoints:
//! - `/healthz` - Liveness probe (always returns `ok`)
//! - `/metrics` - Prometheus metrics in text format
//! - `/tenants`, `/tenants/{id}` - Tenant CRUD
//! - `/clusters`, `/clusters/{id}`, `/clusters/{id}/compileMeta` - Cluster CRUD
//! - `/install/steward.json` - One-time agent install manifests
//!
//! Everything except the probes, metrics and the install endpoint requires a
//! bearer token; see [`crate::auth`].

mod body;
mod clusters;
mod error;
mod install;
mod tenants;

pub use body::{install_url, parse_strict, public_base_url};
pub use error::ApiError;

use crate::auth::{authenticate, AuthResolver};
use crate::config::ApiConfig;
use crate::observability::metrics::REGISTRY;
use anyhow::Context;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Router};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// State shared by all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub resolver: Arc<AuthResolver>,
}

impl AppState {
    #[must_use]
    pub fn new(config: ApiConfig, resolver: AuthResolver) -> Self {
        Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/tenants",
            get(tenants::list_tenants).post(tenants::create_tenant),
        )
        .route(
            "/tenants/{id}",
            get(tenants::get_tenant)
                .patch(tenants::update_tenant)
                .delete(tenants::delete_tenant),
        )
        .route(
            "/clusters",
            get(clusters::list_clusters).post(clusters::create_cluster),
        )
        .route(
            "/clusters/{id}",
            get(clusters::get_cluster)
                .patch(clusters::update_cluster)
                .put(clusters::put_cluster)
                .delete(clusters::delete_cluster),
        )
        .route(
            "/clusters/{id}/compileMeta",
            post(clusters::post_compile_meta),
        )
        .route("/install/steward.json", get(install::install_steward))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.resolver),
            authenticate,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until the process receives Ctrl-C
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let port = state.config.port;
    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

async fn healthz_handler() -> &'static str {
    "ok"
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}
