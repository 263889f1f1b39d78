//! services/scanner/src/scan/controller.rs
//!
//! The activate/deactivate surface of the scan loop. One `ScanController`
//! drives one session at a time: it acquires the camera stream, spawns the
//! sampling task and guarantees the stream is released on every exit path.

use crate::scan::{
    scan_task::scan_process,
    state::{AppState, SessionState},
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use veritrace_core::domain::{CodeCorners, StatusSnapshot, StreamRequest};
use veritrace_core::ports::{MediaError, NavigationSink};

/// The channels a session publishes into. Shared between the sampling loop
/// and its resolution tasks.
pub struct SessionOutputs {
    pub status: watch::Sender<StatusSnapshot>,
    pub overlay: watch::Sender<Option<CodeCorners>>,
    pub navigator: Arc<dyn NavigationSink>,
}

/// Owns the camera resource for one scan session and drives the
/// sample-decode-dedupe-emit cycle at a bounded rate.
pub struct ScanController {
    app: Arc<AppState>,
    outputs: Arc<SessionOutputs>,
    session: Arc<Mutex<SessionState>>,
    status_rx: watch::Receiver<StatusSnapshot>,
    overlay_rx: watch::Receiver<Option<CodeCorners>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ScanController {
    pub fn new(app: Arc<AppState>, navigator: Arc<dyn NavigationSink>) -> Self {
        let (status_tx, status_rx) = watch::channel(StatusSnapshot::idle());
        let (overlay_tx, overlay_rx) = watch::channel(None);
        Self {
            app,
            outputs: Arc::new(SessionOutputs {
                status: status_tx,
                overlay: overlay_tx,
                navigator,
            }),
            session: Arc::new(Mutex::new(SessionState::new())),
            status_rx,
            overlay_rx,
            task: Mutex::new(None),
        }
    }

    /// Subscribe to the status output (state machine value + latest error
    /// annotation).
    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_rx.clone()
    }

    /// Subscribe to the overlay output (bounding quad of the last detected
    /// code, or none).
    pub fn overlay(&self) -> watch::Receiver<Option<CodeCorners>> {
        self.overlay_rx.clone()
    }

    /// Request the camera and start the sampling loop.
    ///
    /// A no-op while a session is already live. On denial or hardware
    /// absence the session moves to `Error` with a user-facing message and
    /// no loop is started; there is no automatic retry.
    pub async fn activate(&self) -> Result<(), MediaError> {
        {
            let state = self.session.lock().await;
            if state.session.camera_active {
                return Ok(());
            }
        }

        let request = StreamRequest {
            ideal_width: self.app.config.frame_width,
            ideal_height: self.app.config.frame_height,
            ..StreamRequest::default()
        };

        match self.app.media.request_video_stream(request).await {
            Ok(stream) => {
                let token = CancellationToken::new();
                {
                    let mut state = self.session.lock().await;
                    state.session.activated();
                    state.cancellation_token = token.clone();
                    let _ = self.outputs.status.send(state.session.status());
                }
                let handle = tokio::spawn(scan_process(
                    self.app.clone(),
                    self.session.clone(),
                    self.outputs.clone(),
                    stream,
                    token,
                ));
                *self.task.lock().await = Some(handle);
                Ok(())
            }
            Err(e) => {
                warn!("Camera acquisition failed: {e}");
                let mut state = self.session.lock().await;
                state.session.camera_failed(media_error_message(&e));
                let _ = self.outputs.status.send(state.session.status());
                Err(e)
            }
        }
    }

    /// Stop the sampling loop and release the camera.
    ///
    /// Idempotent and legal from every state. By the time this returns the
    /// loop has exited and the stream is released; a resolver call still in
    /// flight will observe the cancelled token and discard its result.
    pub async fn deactivate(&self) {
        let handle = self.task.lock().await.take();
        {
            let state = self.session.lock().await;
            state.cancellation_token.cancel();
        }
        if let Some(handle) = handle {
            // The loop exits at the next poll; awaiting it here is what
            // makes the release synchronous with this call.
            let _ = handle.await;
        }
        let mut state = self.session.lock().await;
        state.session.deactivated();
        let _ = self.outputs.status.send(state.session.status());
        let _ = self.outputs.overlay.send(None);
        info!("Scan session deactivated.");
    }
}

/// User-facing message for a fatal camera failure.
fn media_error_message(error: &MediaError) -> &'static str {
    match error {
        MediaError::PermissionDenied(_) => "Cannot access camera. Check permissions and try again.",
        MediaError::DeviceUnavailable(_) => "Cannot access camera. No camera detected.",
    }
}
