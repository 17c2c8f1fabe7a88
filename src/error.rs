//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.
//!
//! Rejected keys are not errors: a validation verdict, good or bad, is a normal response. These errors cover requests the service cannot act on.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::store::StoreError;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The key store failed outside of a validation (health check).
    ///
    /// Returns HTTP 503 Service Unavailable.
    #[error("Key store error: {0}")]
    Store(#[from] StoreError),

    /// Session header missing, malformed, or naming an unknown or expired session.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Session not found")]
    SessionNotFound,

    /// A validation or download is already running for this session.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("A request for this session is already in progress")]
    SessionBusy,

    /// The download trigger was used without a successful validation.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("A valid key is required before downloading")]
    DownloadNotAllowed,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// A background task running a session step did not complete.
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("Internal task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::SessionNotFound => (
                StatusCode::NOT_FOUND,
                "session_not_found",
                self.to_string(),
            ),
            AppError::SessionBusy => (StatusCode::CONFLICT, "session_busy", self.to_string()),
            AppError::DownloadNotAllowed => (
                StatusCode::FORBIDDEN,
                "download_not_allowed",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Store(ref err) => {
                tracing::error!("Key store error: {}", err);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "The key store is unavailable".to_string(),
                )
            }
            AppError::Task(ref err) => {
                tracing::error!("Session task failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
