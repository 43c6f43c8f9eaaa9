//! Unified error handling for the back-office server.
//!
//! Handlers return `Result<_, AppError>`. The response body is a short,
//! user-facing message; internal details are only logged.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use bakery_core::ProductionError;

use crate::catalogue::CatalogueError;
use crate::db::RepositoryError;
use crate::offline::OfflineError;
use crate::offline::sync::SyncError;
use crate::services::WasteError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Remote store operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Offline cache operation failed.
    #[error("Offline cache error: {0}")]
    Offline(#[from] OfflineError),

    /// Production sheet lines were rejected.
    #[error("{0}")]
    Production(#[from] ProductionError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Company or operator missing from the request.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The remote store is unreachable and the operation needs it.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CatalogueError> for AppError {
    fn from(err: CatalogueError) -> Self {
        match err {
            CatalogueError::Remote(e) => Self::Database(e),
            CatalogueError::Offline(e) => Self::Offline(e),
        }
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Offline(e) => Self::Offline(e),
            SyncError::Remote(e) => Self::Database(e),
        }
    }
}

impl From<WasteError> for AppError {
    fn from(err: WasteError) -> Self {
        match err {
            WasteError::Invalid(msg) => Self::BadRequest(msg),
            WasteError::UnknownProduct(_) => Self::BadRequest(err.to_string()),
            WasteError::Stale => Self::Database(RepositoryError::Conflict(err.to_string())),
            WasteError::Remote(e) => Self::Database(e),
            WasteError::Offline(e) => Self::Offline(e),
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(RepositoryError::Validation(_))
            | Self::Production(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Database(_) | Self::Offline(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the operator.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg) | RepositoryError::Validation(msg)) => {
                msg.clone()
            }
            Self::Database(e) if e.is_unavailable() => {
                "The database is unreachable, try again later".to_string()
            }
            // Don't expose internal error details to clients
            Self::Database(_) | Self::Offline(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(error = %self, "Remote store unavailable");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
