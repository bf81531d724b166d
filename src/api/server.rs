//! API Server
//!
//! Runs the plugin's REST server and, optionally, a metrics server exposing
//! `/metrics` and `/healthz`. Both stop when the plugin's shutdown token is
//! cancelled.

use crate::error::{Error, Result};
use crate::plugin::Plugin;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::rest::RestRouter;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// REST API bind address
    pub rest_addr: String,
    /// Metrics bind address, disabled when `None`
    pub metrics_addr: Option<String>,
    /// Max request body size
    pub max_body_size: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            rest_addr: "0.0.0.0:45003".to_string(),
            metrics_addr: None,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

pub struct ApiServer {
    config: ApiServerConfig,
    plugin: Arc<Plugin>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, plugin: Arc<Plugin>) -> Self {
        Self { config, plugin }
    }

    /// Serve until the shutdown token is cancelled
    pub async fn run(&self) -> Result<()> {
        info!("Starting Unmanaged Racks Plugin API");
        info!("  REST API: {}", self.config.rest_addr);
        if let Some(addr) = &self.config.metrics_addr {
            info!("  Metrics: {}", addr);
        }

        let rest_handle = self.spawn_rest_server();
        let metrics_handle = self.spawn_metrics_server();

        match rest_handle.await {
            Ok(Err(e)) => error!("REST server error: {}", e),
            Err(e) => error!("REST server task failed: {}", e),
            Ok(Ok(())) => {}
        }
        // The metrics server outliving the REST server would be useless
        self.plugin.shutdown_token().cancel();
        if let Some(handle) = metrics_handle {
            if let Ok(Err(e)) = handle.await {
                error!("Metrics server error: {}", e);
            }
        }
        Ok(())
    }

    fn spawn_rest_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let addr = self.config.rest_addr.clone();
        let app = RestRouter::new(Arc::clone(&self.plugin))
            .with_max_body_size(self.config.max_body_size)
            .build();
        let shutdown = self.plugin.shutdown_token().clone();

        tokio::spawn(async move { serve("REST", addr, app, shutdown).await })
    }

    fn spawn_metrics_server(&self) -> Option<tokio::task::JoinHandle<Result<()>>> {
        let addr = self.config.metrics_addr.clone()?;
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/healthz", get(health_handler))
            .with_state(Arc::clone(&self.plugin));
        let shutdown = self.plugin.shutdown_token().clone();

        Some(tokio::spawn(async move {
            serve("Metrics", addr, app, shutdown).await
        }))
    }
}

async fn serve(name: &'static str, addr: String, app: Router, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind {} server on {}: {}", name, addr, e)))?;
    info!("{} server listening on {}", name, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("{} server shutting down", name);
        })
        .await
        .map_err(|e| Error::Internal(format!("{} server error: {}", name, e)))?;

    Ok(())
}

async fn metrics_handler(State(plugin): State<Arc<Plugin>>) -> impl IntoResponse {
    match plugin.metrics().encode() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn health_handler(State(plugin): State<Arc<Plugin>>) -> impl IntoResponse {
    if plugin.healthy().await {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
    }
}
