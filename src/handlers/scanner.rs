//! Scan session HTTP handlers.
//!
//! The camera lives on the client (a kiosk, a phone, a browser); frames are
//! pushed to this service one image at a time. These endpoints manage the
//! single active scan session and feed it:
//! - POST /api/v1/scanner/session - Start a session
//! - GET /api/v1/scanner/session - Current session snapshot
//! - DELETE /api/v1/scanner/session - Tear the session down
//! - POST /api/v1/scanner/frames - Ingest one camera frame

use std::sync::Arc;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    services::scan_service::{CameraControl, CameraFeed, ScanSession, ScanSnapshot},
    state::AppState,
};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
};
use image::GrayImage;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Frames buffered between HTTP ingestion and the decode loop. A full
/// buffer just drops frames; the feed is continuous and the next one is
/// already on its way.
const FRAME_BUFFER: usize = 16;

/// The running scan session and the sending half of its frame feed.
pub struct ActiveScanner {
    frames: mpsc::Sender<GrayImage>,
    session: ScanSession,
}

/// Camera control for an HTTP-fed session: the device itself is on the
/// client, so there is no local handle to free. Releasing only marks the
/// feed closed.
struct IngestCamera;

impl CameraControl for IngestCamera {
    fn release(&mut self) -> anyhow::Result<()> {
        tracing::debug!("frame ingestion feed closed");
        Ok(())
    }
}

/// Start a scan session.
///
/// # Endpoint
///
/// `POST /api/v1/scanner/session`
///
/// # Behavior
///
/// Only one session runs at a time; the camera feed has exactly one owner.
/// The session is constructed with the caller's identity context; without a
/// valid session token the request never reaches this handler.
///
/// # Response
///
/// - **Success (201 Created)**: Initial session snapshot
/// - **Error (401)**: Invalid session token
/// - **Error (409)**: A session is already active
pub async fn start_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<(StatusCode, Json<ScanSnapshot>), AppError> {
    let mut slot = state.scanner.lock().await;
    if slot.is_some() {
        return Err(AppError::ScannerBusy);
    }

    let (frames_tx, frames_rx) = mpsc::channel(FRAME_BUFFER);
    let feed = CameraFeed {
        frames: frames_rx,
        control: Box::new(IngestCamera),
    };

    let session = ScanSession::start(auth, Arc::clone(&state.store), feed);
    let snapshot = session.snapshot();

    *slot = Some(ActiveScanner {
        frames: frames_tx,
        session,
    });

    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Current snapshot of the active session.
///
/// # Endpoint
///
/// `GET /api/v1/scanner/session`
///
/// # Response
///
/// - **Success (200 OK)**: Phase, last decoded text, validation message and
///   matched resource (if any)
/// - **Error (404)**: No active session
pub async fn session_state(
    State(state): State<AppState>,
) -> Result<Json<ScanSnapshot>, AppError> {
    let slot = state.scanner.lock().await;
    let active = slot.as_ref().ok_or(AppError::NotFound)?;

    Ok(Json(active.session.snapshot()))
}

/// Tear the active session down.
///
/// # Endpoint
///
/// `DELETE /api/v1/scanner/session`
///
/// # Behavior
///
/// The camera feed is released synchronously; any in-flight validation loses
/// its effect on session state (its lookup is allowed to finish and is
/// discarded). Afterwards a new session can be started.
///
/// # Response
///
/// - **Success (204 No Content)**: Session torn down
/// - **Error (404)**: No active session
pub async fn stop_session(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let active = {
        let mut slot = state.scanner.lock().await;
        slot.take().ok_or(AppError::NotFound)?
    };

    active.session.teardown().await;

    Ok(StatusCode::NO_CONTENT)
}

/// Ingest one camera frame.
///
/// # Endpoint
///
/// `POST /api/v1/scanner/frames`
///
/// # Request Body
///
/// Raw image bytes (PNG, JPEG, anything the image decoder recognizes).
/// Converted to greyscale before being handed to the decode loop.
///
/// # Behavior
///
/// Frames are fire-and-forget: a frame arriving while the buffer is full is
/// silently dropped, mirroring how a live camera feed overwrites unread
/// frames. Whether a frame contained a readable code is never reported here;
/// poll the session snapshot instead.
///
/// # Response
///
/// - **Success (202 Accepted)**: Frame queued (or dropped under pressure)
/// - **Error (400)**: Body is not a decodable image
/// - **Error (404)**: No active session
pub async fn ingest_frame(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let frame = image::load_from_memory(&body)
        .map_err(|_| {
            AppError::ValidationRejected("request body is not a decodable image".to_string())
        })?
        .to_luma8();

    let slot = state.scanner.lock().await;
    let active = slot.as_ref().ok_or(AppError::NotFound)?;

    match active.frames.try_send(frame) {
        Ok(()) => {}
        // Buffer full: drop the frame, the feed keeps flowing
        Err(TrySendError::Full(_)) => {}
        // The session loop is gone; treat like no active session
        Err(TrySendError::Closed(_)) => return Err(AppError::NotFound),
    }

    Ok(StatusCode::ACCEPTED)
}
