//! crates/veritrace_core/src/domain.rs
//!
//! Defines the pure, core data structures for the scan pipeline.
//! These structs are independent of any camera backend, decoder library or
//! serialization format.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// The state machine value of an active scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// No camera held; nothing happening.
    Idle,
    /// Camera live, sampling loop running.
    Scanning,
    /// A decoded payload has been handed to the resolver.
    Resolving,
    /// Fatal camera failure; requires an explicit re-activate.
    Error,
}

impl ScanState {
    /// Stable string form, used at the protocol boundary.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Scanning => "scanning",
            ScanState::Resolving => "resolving",
            ScanState::Error => "error",
        }
    }
}

/// What the host UI sees: the current state plus the latest error
/// annotation, if any. The message clears once a subsequent attempt
/// succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: ScanState,
    pub message: Option<String>,
}

impl StatusSnapshot {
    pub fn idle() -> Self {
        Self {
            state: ScanState::Idle,
            message: None,
        }
    }
}

/// A single captured video frame as a tightly packed 8-bit luma plane.
///
/// Created on every sampling tick and discarded after the decode attempt.
/// `Bytes` keeps the clone handed to the decoder cheap.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Bytes,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32, pixels: Bytes) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// A pixel coordinate inside a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// The bounding quadrilateral of a detected code, published for the host UI
/// to draw. Purely observational; has no effect on control flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodeCorners {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

/// A successful decode attempt over one frame.
#[derive(Debug, Clone)]
pub struct DecodedCode {
    pub payload: String,
    pub corners: CodeCorners,
}

/// A decode accepted by the dedupe policy and handed to the resolver.
#[derive(Debug, Clone)]
pub struct DecodeEvent {
    pub payload: String,
    pub accepted_at: DateTime<Utc>,
}

impl DecodeEvent {
    pub fn new(payload: String) -> Self {
        Self {
            payload,
            accepted_at: Utc::now(),
        }
    }
}

/// Which camera to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    /// The rear, world-facing camera.
    Environment,
    /// The front, user-facing camera.
    User,
}

/// A request for a camera video stream.
#[derive(Debug, Clone, Copy)]
pub struct StreamRequest {
    pub facing: CameraFacing,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for StreamRequest {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Environment,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// The outcome of looking up a decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The payload maps to a known record.
    Found { record_id: String },
    /// No record carries this code.
    NotFound,
}
