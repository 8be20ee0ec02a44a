//! Scan validation HTTP handler.
//!
//! `POST /api/v1/scans` resolves a decoded payload string against the
//! registry, exactly as the scan session controller does for camera decodes.
//! Clients that run their own decoder (or want to re-check a text) call this
//! directly.

use crate::{
    error::AppError,
    models::resource::ResourceResponse,
    services::{
        scan_service::MSG_NOT_FOUND,
        validation_service::{self, ScanResolution},
    },
    state::AppState,
};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

/// Request body carrying one decoded payload.
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    /// The text read out of a scanned code.
    pub payload: String,
}

/// Validation outcome returned to the client.
///
/// # JSON Example
///
/// ```json
/// {
///   "status": "matched",
///   "message": "Valid resource: Exit Poll",
///   "resource": { "id": "...", "name": "Exit Poll", ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    /// `"matched"` or `"unresolved"`.
    pub status: &'static str,

    /// Display message for the scan result.
    pub message: String,

    /// The matched resource, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceResponse>,
}

/// Validate one payload against the registry.
///
/// # Lookup Order
///
/// Id first (authoritative, ids are unique), URL second (heuristic
/// fallback). An unmatched payload is a normal `"unresolved"` outcome with
/// HTTP 200, not an error; only a store failure produces an error status.
///
/// # Response
///
/// - **Success (200 OK)**: Matched or unresolved outcome
/// - **Error (401)**: Invalid session token
/// - **Error (503)**: Store unreachable; the client may simply re-submit
pub async fn validate_scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, AppError> {
    let resolution =
        validation_service::resolve_payload(state.store.as_ref(), &request.payload).await?;

    let response = match resolution {
        ScanResolution::Matched(resource) => ScanResponse {
            status: "matched",
            message: format!("Valid resource: {}", resource.name),
            resource: Some(resource.into()),
        },
        ScanResolution::Unresolved => ScanResponse {
            status: "unresolved",
            message: MSG_NOT_FOUND.to_string(),
            resource: None,
        },
    };

    Ok(Json(response))
}
