//! Error handling module for the roster backend.
//!
//! Three layers: `RemoteError` for collection I/O, `RosterError` for the store
//! operations, and `AppError` mapping both onto HTTP status codes and response
//! envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::RecordId;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const WRITE_ERROR: &str = "WRITE_ERROR";
}

/// Failure raised by a remote collection.
#[derive(Debug)]
pub enum RemoteError {
    /// Storage backend failed
    Database(String),
    /// Document body could not be encoded or decoded
    Serialization(String),
    /// The collection no longer accepts requests
    Closed,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Database(msg) => write!(f, "database error: {}", msg),
            RemoteError::Serialization(msg) => write!(f, "serialization error: {}", msg),
            RemoteError::Closed => write!(f, "collection closed"),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<sqlx::Error> for RemoteError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        RemoteError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Serialization(err.to_string())
    }
}

/// Failure of a roster store operation.
#[derive(Debug)]
pub enum RosterError {
    /// Shared secret did not match
    Auth,
    /// No record with this id in the local mirror
    NotFound(RecordId),
    /// Remote write failed; nothing was applied locally
    Write(RemoteError),
}

impl std::fmt::Display for RosterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterError::Auth => write!(f, "incorrect shared secret"),
            RosterError::NotFound(id) => write!(f, "record {} not found", id),
            RosterError::Write(err) => write!(f, "remote write failed: {}", err),
        }
    }
}

impl std::error::Error for RosterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterError::Write(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RemoteError> for RosterError {
    fn from(err: RemoteError) -> Self {
        RosterError::Write(err)
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Mutation without the correct shared secret
    Unauthorized(String),
    /// Resource not found
    NotFound(String),
    /// Remote store rejected or lost a write
    Write(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Write(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Write(_) => codes::WRITE_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) | AppError::NotFound(msg) | AppError::Write(msg) => {
                msg.clone()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<RosterError> for AppError {
    fn from(err: RosterError) -> Self {
        match err {
            RosterError::Auth => AppError::Unauthorized("Incorrect shared secret".to_string()),
            RosterError::NotFound(id) => AppError::NotFound(format!("Record {} not found", id)),
            RosterError::Write(e) => AppError::Write(format!("Remote write failed: {}", e)),
        }
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
    pub revision: i64,
}

impl ErrorResponse {
    pub fn new(error: &AppError, revision: i64) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
            },
            revision,
        }
    }
}

/// Wrapper type for errors that carry the mirror revision they were raised at.
pub struct AppErrorWithRevision {
    pub error: AppError,
    pub revision: i64,
}

impl IntoResponse for AppErrorWithRevision {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = ErrorResponse::new(&self.error, self.revision);
        (status, Json(body)).into_response()
    }
}
