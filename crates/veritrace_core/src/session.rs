//! crates/veritrace_core/src/session.rs
//!
//! The pure scan-session state machine. The controller in the scanner
//! service drives this from its sampling loop; keeping the transitions and
//! the dedupe policy here makes them testable without a camera or runtime.
//!
//! ```text
//! Idle --activate--> Scanning
//! Scanning --decode accepted--> Resolving
//! Resolving --found--> Idle (terminal; navigation fires)
//! Resolving --not found / resolver error--> Scanning
//! Scanning --camera error--> Error
//! Error --activate retry--> Scanning | Error
//! any state --deactivate--> Idle
//! ```

use uuid::Uuid;

use crate::domain::{DecodeEvent, ScanState, StatusSnapshot};

/// One active camera-scanning session.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub id: Uuid,
    pub camera_active: bool,
    pub last_payload: Option<String>,
    state: ScanState,
    message: Option<String>,
    /// Payload of the resolution currently in flight, if any.
    resolving: Option<String>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            camera_active: false,
            last_payload: None,
            state: ScanState::Idle,
            message: None,
            resolving: None,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// The status output exposed to the host UI.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state,
            message: self.message.clone(),
        }
    }

    /// Camera stream granted; the sampling loop is about to start.
    /// Valid from `Idle` and from `Error` (manual retry). Clears any prior
    /// error message and forgets the previous session's last payload.
    pub fn activated(&mut self) {
        self.camera_active = true;
        self.last_payload = None;
        self.resolving = None;
        self.message = None;
        self.state = ScanState::Scanning;
    }

    /// Camera acquisition or stream failure. Fatal to the session: the
    /// loop stops and only an explicit re-activate leaves this state.
    pub fn camera_failed(&mut self, message: impl Into<String>) {
        self.camera_active = false;
        self.resolving = None;
        self.message = Some(message.into());
        self.state = ScanState::Error;
    }

    /// Explicit teardown. Legal from every state and idempotent.
    pub fn deactivated(&mut self) {
        self.camera_active = false;
        self.resolving = None;
        self.message = None;
        self.state = ScanState::Idle;
    }

    /// The dedupe policy: a decode is accepted only if no resolution is in
    /// flight and the payload differs from the most recently accepted one.
    /// A simple last-value comparison, not a time-windowed cache: the same
    /// code re-fires only after a different code was seen in between.
    pub fn should_accept(&self, payload: &str) -> bool {
        self.resolving.is_none() && self.last_payload.as_deref() != Some(payload)
    }

    /// Run the dedupe policy and, on acceptance, transition to `Resolving`.
    /// Returns the `DecodeEvent` to hand to the resolver, or `None` if the
    /// decode was suppressed as a duplicate.
    pub fn try_accept(&mut self, payload: &str) -> Option<DecodeEvent> {
        if !self.should_accept(payload) {
            return None;
        }
        self.last_payload = Some(payload.to_string());
        self.resolving = Some(payload.to_string());
        // A freshly accepted decode clears any stale error annotation.
        self.message = None;
        self.state = ScanState::Resolving;
        Some(DecodeEvent::new(payload.to_string()))
    }

    /// The resolver found a record. Terminal for the session: navigation
    /// fires and the camera is released by the caller.
    pub fn resolution_found(&mut self) {
        self.camera_active = false;
        self.resolving = None;
        self.message = None;
        self.state = ScanState::Idle;
    }

    /// The resolver reported no record, or the lookup call itself failed.
    /// Non-fatal: the message is surfaced but the camera stays live and
    /// scanning resumes.
    pub fn resolution_missed(&mut self, message: impl Into<String>) {
        self.resolving = None;
        self.message = Some(message.into());
        self.state = ScanState::Scanning;
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}
