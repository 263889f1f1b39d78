//! services/scanner/src/scan/resolve_task.rs
//!
//! This module contains the asynchronous "worker" function responsible for
//! one resolution cycle of an accepted decode.

use crate::scan::{controller::SessionOutputs, state::SessionState};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use veritrace_core::domain::{DecodeEvent, Resolution};
use veritrace_core::ports::CodeResolver;

/// Message shown when a code decodes cleanly but matches no record.
pub const NOT_FOUND_MESSAGE: &str = "Invalid code! Product not found.";
/// Message shown when the lookup call itself fails.
pub const TRANSPORT_ERROR_MESSAGE: &str = "Error verifying code. Try again.";

/// Resolve one accepted `DecodeEvent` and apply the outcome to the session.
///
/// The session token is re-checked under the session lock before the result
/// is acted on: a session torn down while the lookup was in flight must not
/// navigate or mutate state. There is no automatic retry of the lookup; the
/// user re-presents the code.
pub async fn resolve_process(
    resolver: Arc<dyn CodeResolver>,
    session_state_lock: Arc<Mutex<SessionState>>,
    outputs: Arc<SessionOutputs>,
    cancellation_token: CancellationToken,
    event: DecodeEvent,
) {
    info!(payload = %event.payload, "Resolving decoded code");
    let result = resolver.resolve(&event.payload).await;

    let mut state = session_state_lock.lock().await;
    if cancellation_token.is_cancelled() {
        info!("Session ended while resolving; discarding result.");
        return;
    }

    match result {
        Ok(Resolution::Found { record_id }) => {
            info!(%record_id, "Code resolved; navigating");
            state.session.resolution_found();
            let _ = outputs.status.send(state.session.status());
            outputs.navigator.navigate_to_record(&record_id);
            // Terminal for the session: stop the sampling loop, which
            // releases the camera.
            cancellation_token.cancel();
        }
        Ok(Resolution::NotFound) => {
            warn!(payload = %event.payload, "Code did not match any record");
            state.session.resolution_missed(NOT_FOUND_MESSAGE);
            let _ = outputs.status.send(state.session.status());
        }
        Err(e) => {
            error!("Lookup failed: {e}");
            state.session.resolution_missed(TRANSPORT_ERROR_MESSAGE);
            let _ = outputs.status.send(state.session.status());
        }
    }
}
