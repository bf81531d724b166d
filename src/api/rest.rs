//! REST API Handlers
//!
//! Chassis CRUD, the plugin's manager, status/startup activation and the
//! inbound event sink. Every failure is answered with a Redfish error body
//! and the status code carried by the error.

use crate::domain::chassis::{ChassisCreateRequest, RackUpdateRequest};
use crate::error::{Error, Result};
use crate::plugin::Plugin;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    plugin: Arc<Plugin>,
    max_body_size: usize,
}

impl RestRouter {
    pub fn new(plugin: Arc<Plugin>) -> Self {
        Self {
            plugin,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let base = self.plugin.config().base_path.clone();
        let events = self.plugin.config().event_destination_path.clone();
        let state = AppState {
            plugin: self.plugin,
        };

        Router::new()
            // Chassis endpoints
            .route(
                &format!("{}/Chassis", base),
                get(list_chassis).post(create_chassis),
            )
            .route(
                &format!("{}/Chassis/:id", base),
                get(get_chassis).patch(patch_chassis).delete(delete_chassis),
            )
            // Manager endpoints
            .route(&format!("{}/Managers", base), get(list_managers))
            .route(&format!("{}/Managers/:id", base), get(get_manager))
            // Plugin lifecycle
            .route(&format!("{}/Status", base), get(plugin_status))
            .route(&format!("{}/Startup", base), post(plugin_startup))
            // Event sink
            .route(&events, post(receive_events))
            .layer(DefaultBodyLimit::max(self.max_body_size))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    plugin: Arc<Plugin>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List chassis
async fn list_chassis(State(state): State<AppState>) -> Response {
    match state.plugin.chassis().collection().await {
        Ok(collection) => (StatusCode::OK, Json(collection)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Create a rack group or rack
async fn create_chassis(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ChassisCreateRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    match state.plugin.chassis().create(request).await {
        Ok(chassis) => (
            StatusCode::CREATED,
            [(LOCATION, chassis.oid.clone())],
            Json(chassis),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Read one chassis
async fn get_chassis(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let chassis = state.plugin.chassis();
    match chassis.get(&chassis.oid_for(&id)).await {
        Ok(found) => (StatusCode::OK, Json(found)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Reconcile `Links.Contains` of a rack
async fn patch_chassis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let request: RackUpdateRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    let chassis = state.plugin.chassis();
    match chassis.update(&chassis.oid_for(&id), request).await {
        Ok(updated) => (StatusCode::OK, Json(updated)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Delete an empty chassis
async fn delete_chassis(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let chassis = state.plugin.chassis();
    match chassis.delete(&chassis.oid_for(&id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

async fn list_managers(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(state.plugin.managers())).into_response()
}

async fn get_manager(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let manager = state.plugin.manager();
    if manager.id != id {
        return error_response(&Error::ResourceNotFound {
            kind: "Manager".into(),
            oid: format!("{}/Managers/{}", state.plugin.config().base_path, id),
        });
    }
    (StatusCode::OK, Json(manager.clone())).into_response()
}

/// Plugin status; the first call activates the plugin
async fn plugin_status(State(state): State<AppState>) -> Response {
    state.plugin.activate();
    (StatusCode::OK, Json(state.plugin.status())).into_response()
}

async fn plugin_startup(State(state): State<AppState>) -> Response {
    info!("Startup requested");
    state.plugin.activate();
    StatusCode::OK.into_response()
}

/// Inbound Redfish event delivery
async fn receive_events(State(state): State<AppState>, body: Bytes) -> Response {
    let raw = String::from_utf8_lossy(&body);
    match state.plugin.reconciler().process(&raw).await {
        Ok(report) => {
            debug!(
                "Event delivery processed: {} detached, {} skipped, {} failed",
                report.detached.len(),
                report.skipped,
                report.failed
            );
            StatusCode::OK.into_response()
        }
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::MalformedJson(e.to_string()))
}

fn error_response(err: &Error) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        debug!("Request rejected: {}", err);
    }
    (status, Json(err.to_redfish())).into_response()
}
