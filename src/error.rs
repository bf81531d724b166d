//! Error types for the Unmanaged Racks Plugin
//!
//! Provides a single error enum shared by the store, the chassis handlers,
//! the event reconciler and the southbound Redfish client, together with
//! its mapping onto HTTP status codes and Redfish error bodies.

use crate::redfish::messages::{self, CommonError};
use crate::redfish::validation::Violation;
use axum::http::StatusCode;
use thiserror::Error;

/// Unified error type for the plugin
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),

    #[error("Request rejected: {}", .0.info.message)]
    Rejected(Violation),

    #[error("Resource not found: {kind}/{oid}")]
    ResourceNotFound { kind: String, oid: String },

    #[error("Resource already exists: {kind}/{name}")]
    ResourceExists { kind: String, name: String },

    #[error("Resource in use: {oid}")]
    ResourceInUse { oid: String },

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Transaction aborted, watched keys changed: {keys:?}")]
    TransactionAborted { keys: Vec<String> },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    // =========================================================================
    // Upstream (southbound) Errors
    // =========================================================================
    #[error("Upstream connection error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Upstream {uri} answered with status {status}")]
    UpstreamStatus { uri: String, status: u16 },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status used when this error terminates a request
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MalformedJson(_) => StatusCode::BAD_REQUEST,
            Error::Rejected(violation) => violation.status,
            Error::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            Error::ResourceExists { .. } | Error::ResourceInUse { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error is transient
    ///
    /// Transient errors are retried by the transaction helper a bounded
    /// number of times before they surface as 500.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::StoreUnavailable(_)
                | Error::TransactionAborted { .. }
                | Error::Redis(_)
                | Error::Upstream(_)
        )
    }

    /// Render the Redfish error body for this error
    pub fn to_redfish(&self) -> CommonError {
        match self {
            Error::MalformedJson(reason) => {
                CommonError::with_info(vec![messages::malformed_json(reason)])
            }
            Error::Rejected(violation) => CommonError::with_info(vec![violation.info.clone()]),
            Error::ResourceNotFound { kind, oid } => {
                CommonError::with_info(vec![messages::resource_not_found(kind, oid, "")])
            }
            Error::ResourceExists { kind, name } => CommonError::with_info(vec![
                messages::resource_already_exists(kind, "Name", name, ""),
            ]),
            Error::ResourceInUse { oid } => CommonError::with_info(vec![messages::resource_in_use(
                &format!("there are existing elements(Links.Contains) under {}", oid),
            )]),
            other => CommonError::general(other.to_string()),
        }
    }
}

/// Result type alias for the plugin
pub type Result<T> = std::result::Result<T, Error>;
