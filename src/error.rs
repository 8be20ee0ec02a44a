//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur in the application.
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Store Errors**: The remote resource store could not be reached or the
///   query failed
/// - **Authentication Errors**: Missing or invalid session token
/// - **Lookup Misses**: Requested resource does not exist (also the normal
///   terminal outcome of a failed delete)
/// - **Validation Errors**: Invalid submission data (empty name, bad URL)
/// - **Codec Errors**: A QR image could not be generated
///
/// Per-frame QR decode misreads are deliberately NOT represented here: the
/// codec swallows them so continuous scanning is never interrupted.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The remote store call failed (connection error, query error).
    ///
    /// Wraps any sqlx::Error using the `#[from]` attribute. Surfaced to the
    /// caller as a visible message and never retried automatically; the
    /// failed operation stays re-triggerable.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    /// Session token is missing, invalid, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized. Every registry and scanner operation
    /// requires an active identity context.
    #[error("Invalid session token")]
    InvalidSession,

    /// Requested resource does not exist.
    ///
    /// Returns HTTP 404 Not Found. Also raised when a delete affects zero
    /// rows, since the store reports the miss.
    #[error("Resource not found")]
    NotFound,

    /// Submitted data failed validation (e.g. empty resource name).
    ///
    /// Returns HTTP 400 Bad Request. Recoverable: the user corrects the
    /// input and resubmits, no retry happens on their behalf.
    #[error("{0}")]
    ValidationRejected(String),

    /// A QR code image could not be produced for a payload.
    ///
    /// Returns HTTP 500. Callers must not render a stale image; they show a
    /// pending/error presentation instead.
    #[error("Could not generate code image: {0}")]
    EncodeFailed(String),

    /// A scan session is already running.
    ///
    /// Returns HTTP 409 Conflict. The camera feed is exclusively owned by
    /// one active session.
    #[error("A scan session is already active")]
    ScannerBusy,
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidSession` → 401 Unauthorized
/// - `NotFound` → 404 Not Found
/// - `ValidationRejected` → 400 Bad Request
/// - `ScannerBusy` → 409 Conflict
/// - `EncodeFailed` → 500 Internal Server Error
/// - `StoreUnavailable` → 503 Service Unavailable (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::InvalidSession => (
                StatusCode::UNAUTHORIZED,
                "invalid_session",
                self.to_string(),
            ),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::ValidationRejected(ref msg) => {
                (StatusCode::BAD_REQUEST, "validation_rejected", msg.clone())
            }
            AppError::ScannerBusy => (StatusCode::CONFLICT, "scanner_busy", self.to_string()),
            AppError::EncodeFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "encode_failed",
                self.to_string(),
            ),
            AppError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                "The resource store is unavailable".to_string(),
            ),
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        // Return the response with status code and JSON body
        (status, body).into_response()
    }
}
