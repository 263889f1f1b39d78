//! services/scanner/src/scan/scan_task.rs
//!
//! This module contains the asynchronous "worker" function that drives the
//! sample-decode-dedupe-emit cycle for one scan session.

use crate::scan::{
    controller::SessionOutputs,
    resolve_task::resolve_process,
    state::{AppState, SessionState},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use veritrace_core::ports::VideoStream;

/// The main asynchronous task for sampling camera frames.
///
/// This is a long-running task that wakes at the configured cadence
/// (decoupled from the capture rate, so decode cost stays bounded), takes
/// the most recent frame, runs one decode attempt and hands accepted
/// payloads to the resolver. It owns the camera stream and is designed to
/// be gracefully cancelled via a `CancellationToken`; the stream is
/// released on every exit path.
pub async fn scan_process(
    app_state: Arc<AppState>,
    session_state_lock: Arc<Mutex<SessionState>>,
    outputs: Arc<SessionOutputs>,
    mut stream: Box<dyn VideoStream>,
    cancellation_token: CancellationToken,
) {
    info!("Scan loop started.");

    let mut ticker = time::interval(Duration::from_millis(app_state.config.decode_interval_ms));
    // A late tick must not cause a burst of decode attempts.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if cancellation_token.is_cancelled() {
            break;
        }

        let Some(frame) = stream.latest_frame() else {
            continue;
        };

        let Some(code) = app_state.decoder.decode(&frame) else {
            // Decode miss: not an error, no state change. Clear a stale
            // quad without re-notifying subscribers every tick.
            outputs.overlay.send_if_modified(|corners| corners.take().is_some());
            continue;
        };

        // Publish the bounding quad for the host UI. Observational only.
        let _ = outputs.overlay.send(Some(code.corners));

        let event = {
            let mut state = session_state_lock.lock().await;
            let event = state.session.try_accept(&code.payload);
            if event.is_some() {
                let _ = outputs.status.send(state.session.status());
            }
            event
        };

        if let Some(event) = event {
            debug!(payload = %event.payload, "Decode accepted; handing to resolver");
            tokio::spawn(resolve_process(
                app_state.resolver.clone(),
                session_state_lock.clone(),
                outputs.clone(),
                cancellation_token.clone(),
                event,
            ));
        }
    }

    stream.release();
    let _ = outputs.overlay.send(None);
    info!("Scan loop stopped; camera released.");
}
