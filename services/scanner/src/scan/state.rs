//! services/scanner/src/scan/state.rs
//!
//! Defines the application's shared and session-specific states.

use crate::config::Config;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use veritrace_core::ports::{CodeResolver, FrameDecoder, MediaSourceProvider};
use veritrace_core::session::ScanSession;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub media: Arc<dyn MediaSourceProvider>,
    pub decoder: Arc<dyn FrameDecoder>,
    pub resolver: Arc<dyn CodeResolver>,
}

//=========================================================================================
// SessionState (Specific to One Scan Session)
//=========================================================================================

/// The state for a single, active scan session: the pure state machine plus
/// the token that tears down its sampling loop.
pub struct SessionState {
    pub session: ScanSession,
    /// A token to gracefully cancel the sampling loop and any in-flight
    /// resolution. Replaced on every activation.
    pub cancellation_token: CancellationToken,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session: ScanSession::new(),
            cancellation_token: CancellationToken::new(),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
