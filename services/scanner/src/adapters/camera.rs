//! services/scanner/src/adapters/camera.rs
//!
//! This module contains the camera adapter, the concrete implementation of
//! the `MediaSourceProvider` port. It opens a local camera with `nokhwa`,
//! runs capture in a background thread and publishes the most recent frame
//! as a tightly packed luma plane.

use async_trait::async_trait;
use bytes::Bytes;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use veritrace_core::domain::{FrameBuffer, StreamRequest};
use veritrace_core::ports::{MediaError, MediaResult, MediaSourceProvider, VideoStream};

const CAPTURE_FPS: u32 = 30;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A camera adapter that implements the `MediaSourceProvider` port.
///
/// The requested facing is satisfied by deployment configuration: the
/// configured device index selects which attached camera is opened.
#[derive(Clone)]
pub struct NokhwaMediaSource {
    camera_index: u32,
}

impl NokhwaMediaSource {
    /// Creates a new `NokhwaMediaSource` for the given device index.
    pub fn new(camera_index: u32) -> Self {
        Self { camera_index }
    }
}

//=========================================================================================
// `MediaSourceProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl MediaSourceProvider for NokhwaMediaSource {
    async fn request_video_stream(
        &self,
        request: StreamRequest,
    ) -> MediaResult<Box<dyn VideoStream>> {
        let (ready_tx, ready_rx) = mpsc::channel::<MediaResult<()>>();
        let (frame_tx, frame_rx) = watch::channel::<Option<FrameBuffer>>(None);
        let stop = Arc::new(AtomicBool::new(false));

        let index = self.camera_index;
        let stop_flag = stop.clone();
        thread::spawn(move || capture_loop(index, request, ready_tx, frame_tx, stop_flag));

        // The open result arrives over a blocking channel; don't stall the
        // runtime thread while waiting for the device.
        let opened = tokio::task::spawn_blocking(move || ready_rx.recv()).await;
        match opened {
            Ok(Ok(Ok(()))) => Ok(Box::new(NokhwaVideoStream {
                frames: frame_rx,
                stop,
                released: false,
            })),
            Ok(Ok(Err(e))) => Err(e),
            _ => Err(MediaError::DeviceUnavailable(
                "camera thread exited before the device opened".to_string(),
            )),
        }
    }
}

//=========================================================================================
// The Stream Handle
//=========================================================================================

/// Exclusive handle on an open camera. Dropping the handle stops the
/// capture thread, so the device cannot leak past the owning task.
struct NokhwaVideoStream {
    frames: watch::Receiver<Option<FrameBuffer>>,
    stop: Arc<AtomicBool>,
    released: bool,
}

impl VideoStream for NokhwaVideoStream {
    fn latest_frame(&mut self) -> Option<FrameBuffer> {
        self.frames.borrow().clone()
    }

    fn release(&mut self) {
        if !self.released {
            self.stop.store(true, Ordering::Relaxed);
            self.released = true;
        }
    }
}

impl Drop for NokhwaVideoStream {
    fn drop(&mut self) {
        self.release();
    }
}

//=========================================================================================
// Background Capture Loop
//=========================================================================================

fn capture_loop(
    index: u32,
    request: StreamRequest,
    ready_tx: mpsc::Sender<MediaResult<()>>,
    frame_tx: watch::Sender<Option<FrameBuffer>>,
    stop: Arc<AtomicBool>,
) {
    info!(
        "Opening camera {} ({:?} facing, ideal {}x{})",
        index, request.facing, request.ideal_width, request.ideal_height
    );

    let format = CameraFormat::new(
        Resolution::new(request.ideal_width, request.ideal_height),
        FrameFormat::MJPEG,
        CAPTURE_FPS,
    );
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

    let mut camera = match Camera::new(CameraIndex::Index(index), requested) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready_tx.send(Err(map_open_error(e)));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = ready_tx.send(Err(map_open_error(e)));
        return;
    }

    info!(
        "Camera opened: {} at {:?}",
        camera.info().human_name(),
        camera.resolution()
    );
    let _ = ready_tx.send(Ok(()));

    while !stop.load(Ordering::Relaxed) {
        let frame = match camera.frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Frame capture error: {}", e);
                thread::sleep(Duration::from_millis(100));
                continue;
            }
        };

        let decoded = match frame.decode_image::<RgbFormat>() {
            Ok(img) => img,
            Err(e) => {
                warn!("Frame decode error: {}", e);
                thread::sleep(Duration::from_millis(100));
                continue;
            }
        };

        let width = decoded.width();
        let height = decoded.height();
        let luma = rgb_to_luma(decoded.as_raw());

        if frame_tx
            .send(Some(FrameBuffer::new(width, height, luma)))
            .is_err()
        {
            // Receiver gone; the stream handle was dropped without release.
            break;
        }
    }

    // The camera is dropped here, closing the device.
    info!("Camera capture loop ended");
}

/// Convert a packed RGB buffer to an 8-bit luma plane using the standard
/// luminance weights.
fn rgb_to_luma(rgb: &[u8]) -> Bytes {
    let mut luma = Vec::with_capacity(rgb.len() / 3);
    for chunk in rgb.chunks_exact(3) {
        let gray =
            (chunk[0] as u32 * 299 + chunk[1] as u32 * 587 + chunk[2] as u32 * 114) / 1000;
        luma.push(gray as u8);
    }
    Bytes::from(luma)
}

/// Nokhwa reports everything as one error type; permission failures are
/// only distinguishable by message.
fn map_open_error(error: nokhwa::NokhwaError) -> MediaError {
    let text = error.to_string();
    let lowered = text.to_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("access") {
        MediaError::PermissionDenied(text)
    } else {
        MediaError::DeviceUnavailable(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_conversion_weights_green_highest() {
        let red = rgb_to_luma(&[255, 0, 0]);
        let green = rgb_to_luma(&[0, 255, 0]);
        let blue = rgb_to_luma(&[0, 0, 255]);
        assert!(green[0] > red[0]);
        assert!(red[0] > blue[0]);
    }

    #[test]
    fn luma_conversion_ignores_trailing_partial_pixel() {
        let luma = rgb_to_luma(&[10, 10, 10, 20]);
        assert_eq!(luma.len(), 1);
    }
}
