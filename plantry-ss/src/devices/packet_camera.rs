//! Packet photo capturer
//!
//! The live preview runs in the browser; captured frames arrive through the
//! scan API as full camera frames. `capture()` crops the frame to the guide
//! rectangle the preview overlays (75% of frame width, 1.5× that width tall,
//! centered) so the stored image is just the packet. The gallery-upload path
//! bypasses the camera entirely and never requires `start()`/`stop()`.

use std::io::Cursor;

use crate::devices::DeviceError;

/// Upload/frame size limit (10 MB)
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Guide rectangle width as a fraction of frame width
const GUIDE_WIDTH_FRACTION: f64 = 0.75;

/// Guide rectangle aspect (height = width × 1.5, portrait packet)
const GUIDE_ASPECT: f64 = 1.5;

/// A processed still image ready for storage
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    /// PNG-encoded image bytes
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Packet camera contract
pub trait PacketCamera: Send {
    /// Activate the camera bridge (preview is browser-side)
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Release the camera; idempotent
    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// Render the given full frame into a guide-cropped still image
    fn capture(&mut self, frame: &[u8]) -> Result<CapturedImage, DeviceError>;
}

/// Browser-bridged packet camera
#[derive(Debug, Default)]
pub struct BridgedPacketCamera {
    started: bool,
}

impl BridgedPacketCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PacketCamera for BridgedPacketCamera {
    fn start(&mut self) -> Result<(), DeviceError> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn is_active(&self) -> bool {
        self.started
    }

    fn capture(&mut self, frame: &[u8]) -> Result<CapturedImage, DeviceError> {
        if !self.started {
            return Err(DeviceError::NotActive("packet camera"));
        }
        let image = decode_image(frame)?;
        let (x, y, width, height) = guide_rect(image.width(), image.height());
        encode_png(image.crop_imm(x, y, width, height))
    }
}

/// Gallery upload path: produce a still image from a user-chosen file
///
/// No camera involved, no crop — the user already framed the packet.
pub fn decode_upload(bytes: &[u8]) -> Result<CapturedImage, DeviceError> {
    encode_png(decode_image(bytes)?)
}

/// Guide rectangle for a frame of the given dimensions
///
/// Returns `(x, y, width, height)`. The rectangle is 75% of the frame width,
/// 1.5× that width tall, centered, and clamped to the frame bounds.
pub fn guide_rect(frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
    let width = ((frame_width as f64 * GUIDE_WIDTH_FRACTION) as u32).max(1);
    let height = (((width as f64) * GUIDE_ASPECT) as u32).clamp(1, frame_height.max(1));
    let x = (frame_width.saturating_sub(width)) / 2;
    let y = (frame_height.saturating_sub(height)) / 2;
    (x, y, width, height)
}

fn decode_image(bytes: &[u8]) -> Result<image::DynamicImage, DeviceError> {
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(DeviceError::TooLarge {
            got: bytes.len(),
            limit: MAX_IMAGE_BYTES,
        });
    }

    // Sniff the content type before handing bytes to the decoder; rejects
    // PDFs, HEIC and friends with a message naming the actual type.
    match infer::get(bytes) {
        Some(kind) if matches!(kind.mime_type(), "image/png" | "image/jpeg") => {}
        Some(kind) => {
            return Err(DeviceError::UnsupportedImage(kind.mime_type().to_string()));
        }
        None => {
            return Err(DeviceError::UnsupportedImage("unknown".to_string()));
        }
    }

    image::load_from_memory(bytes).map_err(|e| DeviceError::DecodeFailed(e.to_string()))
}

fn encode_png(image: image::DynamicImage) -> Result<CapturedImage, DeviceError> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| DeviceError::DecodeFailed(e.to_string()))?;
    Ok(CapturedImage {
        png,
        width: image.width(),
        height: image.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Solid-color PNG of the given dimensions
    fn test_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 160, 90]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn guide_rect_landscape_frame_clamps_height() {
        // 640x480: 75% width = 480, ideal height 720 clamps to 480
        let (x, y, w, h) = guide_rect(640, 480);
        assert_eq!((w, h), (480, 480));
        assert_eq!((x, y), (80, 0));
    }

    #[test]
    fn guide_rect_portrait_frame_keeps_aspect() {
        // 480x960: 75% width = 360, height 540 fits
        let (x, y, w, h) = guide_rect(480, 960);
        assert_eq!((w, h), (360, 540));
        assert_eq!((x, y), (60, 210));
    }

    #[test]
    fn capture_requires_active_camera() {
        let mut camera = BridgedPacketCamera::new();
        let err = camera.capture(&test_png(64, 64)).unwrap_err();
        assert!(matches!(err, DeviceError::NotActive(_)));
    }

    #[test]
    fn capture_crops_to_guide_rect() {
        let mut camera = BridgedPacketCamera::new();
        camera.start().unwrap();

        let captured = camera.capture(&test_png(640, 480)).unwrap();
        assert_eq!((captured.width, captured.height), (480, 480));
        assert!(!captured.png.is_empty());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut camera = BridgedPacketCamera::new();
        camera.stop(); // never started
        assert!(!camera.is_active());

        camera.start().unwrap();
        camera.stop();
        camera.stop();
        assert!(!camera.is_active());
    }

    #[test]
    fn upload_path_skips_the_crop() {
        let captured = decode_upload(&test_png(640, 480)).unwrap();
        assert_eq!((captured.width, captured.height), (640, 480));
    }

    #[test]
    fn upload_rejects_non_image_payloads() {
        let err = decode_upload(b"%PDF-1.4 not an image").unwrap_err();
        assert!(matches!(err, DeviceError::UnsupportedImage(_)));
    }

    #[test]
    fn upload_rejects_oversized_payloads() {
        let bytes = vec![0u8; MAX_IMAGE_BYTES + 1];
        let err = decode_upload(&bytes).unwrap_err();
        assert!(matches!(err, DeviceError::TooLarge { .. }));
    }
}
