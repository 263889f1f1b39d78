//! crates/veritrace_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the scan pipeline.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! scan loop to be independent of the concrete camera backend, barcode
//! library, lookup backend and host UI.

use async_trait::async_trait;
use crate::domain::{DecodedCode, FrameBuffer, Resolution, StreamRequest};

//=========================================================================================
// Port Error Types
//=========================================================================================

/// Fatal camera-acquisition failures. Both variants end the session; the
/// user must explicitly re-activate.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
}

/// The lookup call itself failed (network, backend). Non-fatal to the
/// session; scanning continues.
#[derive(Debug, thiserror::Error)]
#[error("Lookup failed: {0}")]
pub struct ResolveError(pub String);

/// A convenience type alias for media-port results.
pub type MediaResult<T> = Result<T, MediaError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Grants access to a camera video stream (OS capability).
#[async_trait]
pub trait MediaSourceProvider: Send + Sync {
    /// Request a stream matching `request`. On success the returned handle
    /// exclusively owns the camera until released.
    async fn request_video_stream(
        &self,
        request: StreamRequest,
    ) -> MediaResult<Box<dyn VideoStream>>;
}

/// An open camera stream. Exactly one release must occur per acquired
/// stream, on every code path.
pub trait VideoStream: Send {
    /// The most recent captured frame, if any has arrived yet.
    /// Non-blocking; the same frame may be returned on consecutive calls.
    fn latest_frame(&mut self) -> Option<FrameBuffer>;

    /// Stop all camera tracks. Idempotent; implementations also release
    /// on drop so the camera cannot leak past the owning task.
    fn release(&mut self);
}

/// A barcode/QR decode attempt over one pixel buffer. Implementations try
/// both normal and inverted polarity.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, frame: &FrameBuffer) -> Option<DecodedCode>;
}

/// Looks up a decoded payload. Callable repeatedly and concurrently; the
/// controller does not assume request ordering.
#[async_trait]
pub trait CodeResolver: Send + Sync {
    async fn resolve(&self, payload: &str) -> Result<Resolution, ResolveError>;
}

/// Receives a resolved record identifier and transitions the host UI.
/// Fire-and-forget; the controller does not await a result.
pub trait NavigationSink: Send + Sync {
    fn navigate_to_record(&self, record_id: &str);
}
