//! Scan session controller - the camera-driven decode-and-validate loop.
//!
//! One controller owns one scanning interaction end to end: it consumes the
//! continuous camera feed, hands decoded texts to the validation engine, and
//! publishes the current result for the rest of the system to display.
//!
//! # Lifecycle
//!
//! - **Idle**: constructed, loop not yet running
//! - **Scanning**: camera feed attached, decode loop live
//! - **Validating**: a decoded text's lookup is in flight
//! - **Resolved**: last lookup finished (matched resource or not-found);
//!   the feed is never paused, so the next decode re-enters Validating
//! - **Torn down**: camera released, no further events accepted
//!
//! # Ordering
//!
//! The camera keeps delivering frames while a lookup is outstanding. Each
//! decoded text gets a monotonically increasing sequence number and lookups
//! run as spawned tasks; a result is applied only if its sequence number is
//! still the latest issued, so the displayed result always corresponds to
//! the most recently decoded payload. Superseded lookups run to completion
//! and are discarded.
//!
//! # Identity
//!
//! A session is constructed with the caller's identity context (scanning
//! cannot start without one) and is torn down explicitly by its owner when
//! that context ends.

use std::sync::Arc;

use image::GrayImage;
use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::resource::Resource,
    services::{
        qr_codec,
        resource_store::ResourceStore,
        validation_service::{self, ScanResolution},
    },
};

/// Message shown while a lookup is in flight.
pub const MSG_LOOKING_UP: &str = "Looking up resource...";

/// Message shown when a scanned code matches nothing in the registry.
pub const MSG_NOT_FOUND: &str = "Code not recognized or resource not found.";

/// Message shown when the store could not be reached for a lookup. The feed
/// keeps running, so rescanning retries naturally.
pub const MSG_STORE_UNAVAILABLE: &str = "The resource store is unavailable. Try scanning again.";

/// Exclusive handle on a camera's frame feed.
///
/// Frames arrive over the channel; `control` releases the underlying device
/// at teardown. Exactly one active controller holds a feed at a time.
pub struct CameraFeed {
    /// Greyscale frames as delivered by the camera.
    pub frames: mpsc::Receiver<GrayImage>,

    /// Handle used to release the device when the session ends.
    pub control: Box<dyn CameraControl>,
}

/// Release half of a camera handle.
pub trait CameraControl: Send {
    /// Release the camera device.
    ///
    /// Called exactly once, during teardown. A failure is reported by the
    /// session (logged), never retried, and never blocks teardown.
    fn release(&mut self) -> anyhow::Result<()>;
}

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Scanning,
    Validating,
    Resolved,
    TornDown,
}

/// Point-in-time view of a scan session, published through a watch channel.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSnapshot {
    /// Current lifecycle phase.
    pub phase: ScanPhase,

    /// Most recently decoded text, if any.
    pub decoded_text: Option<String>,

    /// Human-readable status of the last (or in-flight) validation.
    pub message: Option<String>,

    /// The matched resource, when the last validation resolved one.
    pub resource: Option<Resource>,
}

impl ScanSnapshot {
    fn idle() -> Self {
        Self {
            phase: ScanPhase::Idle,
            decoded_text: None,
            message: None,
            resource: None,
        }
    }
}

/// Handle to a running scan session.
///
/// Dropping the handle signals the loop to stop; calling [`teardown`]
/// additionally waits until the camera has been released and the final
/// `TornDown` snapshot is published.
///
/// [`teardown`]: ScanSession::teardown
pub struct ScanSession {
    state: watch::Receiver<ScanSnapshot>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ScanSession {
    /// Start a scanning session for an authenticated caller.
    ///
    /// Takes exclusive ownership of the camera feed and moves straight into
    /// the Scanning phase. The identity context is required by construction:
    /// there is no way to start a session without one.
    pub fn start(
        identity: AuthContext,
        store: Arc<dyn ResourceStore>,
        camera: CameraFeed,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ScanSnapshot::idle());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_session(identity, store, camera, state_tx, shutdown_rx));

        Self {
            state: state_rx,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }

    /// The session's current snapshot.
    pub fn snapshot(&self) -> ScanSnapshot {
        self.state.borrow().clone()
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.state.clone()
    }

    /// Tear the session down: stop the loop, release the camera, publish the
    /// final `TornDown` snapshot. In-flight validations lose their effect on
    /// session state; the underlying lookups run to completion unobserved.
    pub async fn teardown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        // Signal the loop even if the owner never called teardown
        let _ = self.shutdown.send(true);
    }
}

/// The session loop. Runs until torn down or the camera feed closes.
async fn run_session(
    identity: AuthContext,
    store: Arc<dyn ResourceStore>,
    camera: CameraFeed,
    state_tx: watch::Sender<ScanSnapshot>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::info!(user = %identity.email, "scan session started");

    let CameraFeed { frames, mut control } = camera;
    let mut texts = qr_codec::decoded_texts(frames);

    // Lookup results come back tagged with the sequence number they were
    // issued under.
    let (results_tx, mut results_rx) =
        mpsc::channel::<(u64, Result<ScanResolution, AppError>)>(8);
    let mut latest_seq: u64 = 0;

    let _ = state_tx.send(ScanSnapshot {
        phase: ScanPhase::Scanning,
        decoded_text: None,
        message: None,
        resource: None,
    });

    loop {
        tokio::select! {
            // Owner tore us down, or the handle was dropped
            _ = shutdown_rx.changed() => break,

            maybe_text = texts.recv() => {
                let Some(text) = maybe_text else {
                    // Camera feed closed from the producing side
                    break;
                };

                latest_seq += 1;
                let seq = latest_seq;

                let _ = state_tx.send(ScanSnapshot {
                    phase: ScanPhase::Validating,
                    decoded_text: Some(text.clone()),
                    message: Some(MSG_LOOKING_UP.to_string()),
                    resource: None,
                });

                // Run the lookup off the loop so the feed never blocks on
                // the store
                let store = Arc::clone(&store);
                let results = results_tx.clone();
                tokio::spawn(async move {
                    let outcome =
                        validation_service::resolve_payload(store.as_ref(), &text).await;
                    let _ = results.send((seq, outcome)).await;
                });
            }

            Some((seq, outcome)) = results_rx.recv() => {
                if seq != latest_seq {
                    // A newer decode superseded this lookup; discard it
                    continue;
                }

                let decoded_text = state_tx.borrow().decoded_text.clone();
                let snapshot = match outcome {
                    Ok(ScanResolution::Matched(resource)) => ScanSnapshot {
                        phase: ScanPhase::Resolved,
                        decoded_text,
                        message: Some(format!("Valid resource: {}", resource.name)),
                        resource: Some(resource),
                    },
                    Ok(ScanResolution::Unresolved) => ScanSnapshot {
                        phase: ScanPhase::Resolved,
                        decoded_text,
                        message: Some(MSG_NOT_FOUND.to_string()),
                        resource: None,
                    },
                    Err(err) => {
                        tracing::warn!(error = %err, "validation lookup failed");
                        ScanSnapshot {
                            phase: ScanPhase::Resolved,
                            decoded_text,
                            message: Some(MSG_STORE_UNAVAILABLE.to_string()),
                            resource: None,
                        }
                    }
                };
                let _ = state_tx.send(snapshot);
            }
        }
    }

    // The camera must come back regardless of what stopped the loop. A
    // failed release is reported, not retried, and does not block teardown.
    if let Err(err) = control.release() {
        tracing::error!(error = %err, "failed to release camera");
    }

    let _ = state_tx.send(ScanSnapshot {
        phase: ScanPhase::TornDown,
        decoded_text: None,
        message: None,
        resource: None,
    });

    tracing::info!(user = %identity.email, "scan session torn down");
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use image::Luma;
    use uuid::Uuid;

    use super::*;
    use crate::{
        models::resource::NewResource,
        services::resource_store::testing::MemoryStore,
    };

    fn identity() -> AuthContext {
        AuthContext {
            session_id: Uuid::new_v4(),
            email: "tester@example.com".to_string(),
        }
    }

    fn submission(name: &str, url: &str) -> NewResource {
        NewResource {
            name: name.to_string(),
            description: String::new(),
            url: url.to_string(),
        }
    }

    fn frame_for(payload: &str) -> GrayImage {
        let png = qr_codec::encode_png(payload, 260).unwrap();
        image::load_from_memory(&png).unwrap().to_luma8()
    }

    /// Camera double that records whether it was released.
    struct TrackingCamera {
        released: Arc<AtomicBool>,
        fail: bool,
    }

    impl CameraControl for TrackingCamera {
        fn release(&mut self) -> anyhow::Result<()> {
            self.released.store(true, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("device busy");
            }
            Ok(())
        }
    }

    fn camera(fail: bool) -> (mpsc::Sender<GrayImage>, CameraFeed, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel(16);
        let released = Arc::new(AtomicBool::new(false));
        let feed = CameraFeed {
            frames: rx,
            control: Box::new(TrackingCamera {
                released: Arc::clone(&released),
                fail,
            }),
        };
        (tx, feed, released)
    }

    async fn wait_for(
        rx: &mut watch::Receiver<ScanSnapshot>,
        what: &str,
        predicate: impl FnMut(&ScanSnapshot) -> bool,
    ) -> ScanSnapshot {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
            .unwrap()
            .clone()
    }

    /// Store wrapper that delays URL lookups per payload, to stage the
    /// overlap between an old slow validation and a newer fast one.
    struct StaggeredStore {
        inner: MemoryStore,
        url_delays_ms: HashMap<String, u64>,
    }

    #[async_trait]
    impl ResourceStore for StaggeredStore {
        async fn list(&self) -> Result<Vec<Resource>, AppError> {
            self.inner.list().await
        }

        async fn create(&self, new: NewResource) -> Result<Resource, AppError> {
            self.inner.create(new).await
        }

        async fn delete_by_id(&self, id: Uuid) -> Result<(), AppError> {
            self.inner.delete_by_id(id).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Resource>, AppError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_url(&self, url: &str) -> Result<Option<Resource>, AppError> {
            if let Some(ms) = self.url_delays_ms.get(url) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            self.inner.find_by_url(url).await
        }
    }

    #[tokio::test]
    async fn known_code_resolves_to_its_resource() {
        let store = Arc::new(MemoryStore::new());
        let created = store.create(submission("Satisfaction", "")).await.unwrap();

        let (frames, feed, _released) = camera(false);
        let session = ScanSession::start(identity(), store, feed);
        let mut state = session.subscribe();

        wait_for(&mut state, "scanning", |s| s.phase == ScanPhase::Scanning).await;

        frames.send(frame_for(&created.id.to_string())).await.unwrap();

        let resolved =
            wait_for(&mut state, "resolution", |s| s.phase == ScanPhase::Resolved).await;
        assert_eq!(resolved.decoded_text.as_deref(), Some(created.id.to_string().as_str()));
        assert_eq!(
            resolved.message.as_deref(),
            Some("Valid resource: Satisfaction")
        );
        assert_eq!(resolved.resource.unwrap().id, created.id);

        session.teardown().await;
    }

    #[tokio::test]
    async fn unknown_code_reports_not_found() {
        let store = Arc::new(MemoryStore::new());
        store.create(submission("Satisfaction", "")).await.unwrap();

        let (frames, feed, _released) = camera(false);
        let session = ScanSession::start(identity(), store, feed);
        let mut state = session.subscribe();

        frames.send(frame_for("not-a-real-id")).await.unwrap();

        let resolved =
            wait_for(&mut state, "resolution", |s| s.phase == ScanPhase::Resolved).await;
        assert_eq!(resolved.message.as_deref(), Some(MSG_NOT_FOUND));
        assert!(resolved.resource.is_none());

        session.teardown().await;
    }

    #[tokio::test]
    async fn unreadable_frames_never_reach_session_state() {
        let store = Arc::new(MemoryStore::new());
        let created = store.create(submission("Satisfaction", "")).await.unwrap();

        let (frames, feed, _released) = camera(false);
        let session = ScanSession::start(identity(), store, feed);
        let mut state = session.subscribe();

        // A run of noise, then a readable code
        for _ in 0..3 {
            frames
                .send(GrayImage::from_pixel(200, 200, Luma([128u8])))
                .await
                .unwrap();
        }
        frames.send(frame_for(&created.id.to_string())).await.unwrap();

        let resolved =
            wait_for(&mut state, "resolution", |s| s.phase == ScanPhase::Resolved).await;
        assert_eq!(
            resolved.decoded_text.as_deref(),
            Some(created.id.to_string().as_str())
        );

        session.teardown().await;
    }

    #[tokio::test]
    async fn superseded_lookup_result_is_discarded() {
        let inner = MemoryStore::new();
        inner
            .create(submission("Slow Survey", "https://forms.example/slow"))
            .await
            .unwrap();
        inner
            .create(submission("Fast Survey", "https://forms.example/fast"))
            .await
            .unwrap();
        let store = Arc::new(StaggeredStore {
            inner,
            url_delays_ms: HashMap::from([("https://forms.example/slow".to_string(), 300)]),
        });

        let (frames, feed, _released) = camera(false);
        let session = ScanSession::start(identity(), store, feed);
        let mut state = session.subscribe();

        // The slow payload is decoded first, the fast one supersedes it
        // while its lookup is still in flight
        frames.send(frame_for("https://forms.example/slow")).await.unwrap();
        frames.send(frame_for("https://forms.example/fast")).await.unwrap();

        let resolved =
            wait_for(&mut state, "resolution", |s| s.phase == ScanPhase::Resolved).await;
        assert_eq!(
            resolved.message.as_deref(),
            Some("Valid resource: Fast Survey")
        );

        // The slow lookup completes afterwards; its result must not replace
        // the newer one
        tokio::time::sleep(Duration::from_millis(400)).await;
        let after = session.snapshot();
        assert_eq!(after.message.as_deref(), Some("Valid resource: Fast Survey"));
        assert_eq!(after.resource.unwrap().name, "Fast Survey");

        session.teardown().await;
    }

    #[tokio::test]
    async fn store_outage_is_surfaced_and_scanning_continues() {
        let store = Arc::new(MemoryStore::new());
        store.unavailable.store(true, Ordering::SeqCst);

        let (frames, feed, _released) = camera(false);
        let session = ScanSession::start(identity(), store.clone(), feed);
        let mut state = session.subscribe();

        frames.send(frame_for("not-a-real-id")).await.unwrap();
        let resolved =
            wait_for(&mut state, "outage message", |s| s.phase == ScanPhase::Resolved).await;
        assert_eq!(resolved.message.as_deref(), Some(MSG_STORE_UNAVAILABLE));

        // Store comes back; the next scan of the same code succeeds without
        // any cached outcome getting in the way
        store.unavailable.store(false, Ordering::SeqCst);
        frames.send(frame_for("not-a-real-id")).await.unwrap();
        let retried = wait_for(&mut state, "retry", |s| {
            s.phase == ScanPhase::Resolved && s.message.as_deref() == Some(MSG_NOT_FOUND)
        })
        .await;
        assert!(retried.resource.is_none());

        session.teardown().await;
    }

    #[tokio::test]
    async fn teardown_releases_camera_and_accepts_no_further_events() {
        let store = Arc::new(MemoryStore::new());
        let created = store.create(submission("Satisfaction", "")).await.unwrap();

        let (frames, feed, released) = camera(false);
        let session = ScanSession::start(identity(), store, feed);
        let mut state = session.subscribe();
        wait_for(&mut state, "scanning", |s| s.phase == ScanPhase::Scanning).await;

        session.teardown().await;
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(state.borrow().phase, ScanPhase::TornDown);

        // Frames sent after teardown change nothing
        let _ = frames.send(frame_for(&created.id.to_string())).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(state.borrow().phase, ScanPhase::TornDown);
    }

    #[tokio::test]
    async fn camera_release_failure_does_not_block_teardown() {
        let store = Arc::new(MemoryStore::new());

        let (_frames, feed, released) = camera(true);
        let session = ScanSession::start(identity(), store, feed);
        let mut state = session.subscribe();
        wait_for(&mut state, "scanning", |s| s.phase == ScanPhase::Scanning).await;

        // Release fails, teardown still completes and reports TornDown
        session.teardown().await;
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(state.borrow().phase, ScanPhase::TornDown);
    }
}
