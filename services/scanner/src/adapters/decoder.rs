//! services/scanner/src/adapters/decoder.rs
//!
//! This module contains the QR decoder adapter, the concrete implementation
//! of the `FrameDecoder` port. It runs `rqrr` over a grayscale view of the
//! frame, retrying on an inverted copy when the normal-polarity pass finds
//! nothing.

use tracing::debug;
use veritrace_core::domain::{CodeCorners, DecodedCode, FrameBuffer, Point};
use veritrace_core::ports::FrameDecoder;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A decoder adapter that implements the `FrameDecoder` port using `rqrr`.
#[derive(Clone, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    /// Creates a new `RqrrDecoder`.
    pub fn new() -> Self {
        Self
    }
}

//=========================================================================================
// `FrameDecoder` Trait Implementation
//=========================================================================================

impl FrameDecoder for RqrrDecoder {
    fn decode(&self, frame: &FrameBuffer) -> Option<DecodedCode> {
        let expected_size = (frame.width * frame.height) as usize;
        if frame.width == 0 || frame.height == 0 || frame.pixels.len() < expected_size {
            debug!(
                "Frame buffer too small: {} < {}",
                frame.pixels.len(),
                expected_size
            );
            return None;
        }
        let luma = &frame.pixels[..expected_size];

        decode_luma(luma, frame.width as usize, frame.height as usize).or_else(|| {
            // Codes printed light-on-dark decode only on the inverted plane.
            let inverted: Vec<u8> = luma.iter().map(|v| 255 - v).collect();
            decode_luma(&inverted, frame.width as usize, frame.height as usize)
        })
    }
}

/// One decode pass over a tightly packed luma plane.
fn decode_luma(luma: &[u8], width: usize, height: usize) -> Option<DecodedCode> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
        luma.get(y * width + x).copied().unwrap_or(0)
    });

    let grids = prepared.detect_grids();
    debug!("Found {} potential QR grids", grids.len());

    for grid in grids {
        match grid.decode() {
            Ok((_, content)) => {
                return Some(DecodedCode {
                    payload: content,
                    corners: corners_from_bounds(&grid.bounds),
                });
            }
            Err(e) => {
                debug!("Grid decode failed: {:?}", e);
            }
        }
    }

    None
}

/// Grid bounds arrive clockwise from the top-left corner.
fn corners_from_bounds(bounds: &[rqrr::Point; 4]) -> CodeCorners {
    let point = |p: &rqrr::Point| Point {
        x: p.x as f32,
        y: p.y as f32,
    };
    CodeCorners {
        top_left: point(&bounds[0]),
        top_right: point(&bounds[1]),
        bottom_right: point(&bounds[2]),
        bottom_left: point(&bounds[3]),
    }
}

//=========================================================================================
// Image-File Input
//=========================================================================================

/// Build a luma `FrameBuffer` from an encoded image (PNG, JPEG), for
/// file-based input such as an uploaded photo of a label.
pub fn luma_frame_from_image(image_data: &[u8]) -> Option<FrameBuffer> {
    let img = match image::load_from_memory(image_data) {
        Ok(img) => img,
        Err(e) => {
            debug!("Failed to load image: {}", e);
            return None;
        }
    };

    let gray = img.to_luma8();
    let (width, height) = (gray.width(), gray.height());
    Some(FrameBuffer::new(width, height, gray.into_raw().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn undersized_buffer_is_a_miss_not_a_panic() {
        let decoder = RqrrDecoder::new();
        let frame = FrameBuffer::new(640, 480, Bytes::from_static(&[0u8; 16]));
        assert!(decoder.decode(&frame).is_none());
    }

    #[test]
    fn empty_frame_is_a_miss() {
        let decoder = RqrrDecoder::new();
        let frame = FrameBuffer::new(0, 0, Bytes::new());
        assert!(decoder.decode(&frame).is_none());
    }

    #[test]
    fn uniform_frame_decodes_nothing() {
        let decoder = RqrrDecoder::new();
        let frame = FrameBuffer::new(64, 64, Bytes::from(vec![128u8; 64 * 64]));
        assert!(decoder.decode(&frame).is_none());
    }

    #[test]
    fn garbage_bytes_are_not_an_image() {
        assert!(luma_frame_from_image(&[]).is_none());
        assert!(luma_frame_from_image(b"definitely not a png").is_none());
    }
}
