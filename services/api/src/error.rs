//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and how core
//! errors surface as HTTP responses.

use crate::config::ConfigError;
use axum::http::StatusCode;
use study_tracker_core::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maps a core error to the status and message a handler returns.
pub fn port_error_response(error: PortError) -> (StatusCode, String) {
    let status = match &error {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Validation(_) => StatusCode::BAD_REQUEST,
        PortError::EditWindowExpired(_) | PortError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        PortError::MalformedImport(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PortError::Storage(_) | PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {}", error);
    }
    (status, error.to_string())
}
