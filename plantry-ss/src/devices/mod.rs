//! Capture device adapters
//!
//! **[SSA-DEV-010]** The physical camera and the barcode decoder loop run in
//! the browser; these adapters own the server-side resource accounting the
//! workflow's invariants are written against. At most one capture device is
//! active per scan session, acquisition always tears down the previous
//! device first, and `stop()` is idempotent on both adapters.

pub mod barcode_reader;
pub mod packet_camera;

pub use barcode_reader::{BarcodeReader, BridgedBarcodeReader};
pub use packet_camera::{decode_upload, BridgedPacketCamera, CapturedImage, PacketCamera};

use thiserror::Error;

/// Capture device errors
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Operation requires an active device
    #[error("{0} is not active")]
    NotActive(&'static str),

    /// Payload is not a supported image type
    #[error("Unsupported image payload: {0}")]
    UnsupportedImage(String),

    /// Image bytes could not be decoded
    #[error("Image decode failed: {0}")]
    DecodeFailed(String),

    /// Payload exceeds the configured size limit
    #[error("Image too large: {got} bytes (limit {limit})")]
    TooLarge { got: usize, limit: usize },

    /// Device failed to start
    #[error("Device start failed: {0}")]
    StartFailed(String),
}

type ReaderFactory = Box<dyn Fn() -> Box<dyn BarcodeReader> + Send + Sync>;
type CameraFactory = Box<dyn Fn() -> Box<dyn PacketCamera> + Send + Sync>;

/// The one device currently held by a session
enum ActiveDevice {
    Reader(Box<dyn BarcodeReader>),
    Camera(Box<dyn PacketCamera>),
}

/// Per-session device holder enforcing single-device exclusivity
///
/// Holding the active device in an `Option` makes "two devices at once"
/// unrepresentable; `acquire_*` releases whatever was held before starting
/// the new device.
pub struct DeviceBay {
    reader_factory: ReaderFactory,
    camera_factory: CameraFactory,
    active: Option<ActiveDevice>,
}

impl DeviceBay {
    pub fn new(reader_factory: ReaderFactory, camera_factory: CameraFactory) -> Self {
        Self {
            reader_factory,
            camera_factory,
            active: None,
        }
    }

    /// Production bay using the browser-bridged adapters
    pub fn bridged() -> Self {
        Self::new(
            Box::new(|| Box::new(BridgedBarcodeReader::new()) as Box<dyn BarcodeReader>),
            Box::new(|| Box::new(BridgedPacketCamera::new()) as Box<dyn PacketCamera>),
        )
    }

    /// Release the current device (if any) and start a barcode reader
    pub fn acquire_reader(&mut self) -> Result<(), DeviceError> {
        self.release();
        let mut reader = (self.reader_factory)();
        reader.start()?;
        self.active = Some(ActiveDevice::Reader(reader));
        Ok(())
    }

    /// Release the current device (if any) and start a packet camera
    pub fn acquire_camera(&mut self) -> Result<(), DeviceError> {
        self.release();
        let mut camera = (self.camera_factory)();
        camera.start()?;
        self.active = Some(ActiveDevice::Camera(camera));
        Ok(())
    }

    /// Synchronously stop and drop whatever device is held
    ///
    /// Safe to call at any time, including when nothing is active.
    pub fn release(&mut self) {
        match self.active.take() {
            Some(ActiveDevice::Reader(mut reader)) => reader.stop(),
            Some(ActiveDevice::Camera(mut camera)) => camera.stop(),
            None => {}
        }
    }

    /// Active barcode reader, if one is held
    pub fn reader_mut(&mut self) -> Option<&mut dyn BarcodeReader> {
        match self.active.as_mut() {
            Some(ActiveDevice::Reader(reader)) => Some(reader.as_mut()),
            _ => None,
        }
    }

    /// Active packet camera, if one is held
    pub fn camera_mut(&mut self) -> Option<&mut dyn PacketCamera> {
        match self.active.as_mut() {
            Some(ActiveDevice::Camera(camera)) => Some(camera.as_mut()),
            _ => None,
        }
    }

    /// Name of the held device kind (diagnostics)
    pub fn active_kind(&self) -> Option<&'static str> {
        match self.active {
            Some(ActiveDevice::Reader(_)) => Some("barcode_reader"),
            Some(ActiveDevice::Camera(_)) => Some("packet_camera"),
            None => None,
        }
    }
}

impl Drop for DeviceBay {
    fn drop(&mut self) {
        self.release();
    }
}
