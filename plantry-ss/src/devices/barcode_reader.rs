//! Barcode reader adapter
//!
//! The continuous frame-capture/decode loop runs in the browser against the
//! rear camera; decoded text reaches this adapter through the scan API. The
//! adapter enforces the reader contract: decodes are only accepted while
//! started, at most one decode is delivered per session, and `stop()` is
//! idempotent (safe even if `start()` failed or was never called).

use crate::devices::DeviceError;

/// Barcode reader contract
pub trait BarcodeReader: Send {
    /// Begin accepting decode events
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Stop the reader; idempotent
    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// Offer a decoded string to the reader
    ///
    /// Returns the normalized barcode for the first decode while active;
    /// `None` for anything after that (or while stopped). The caller must
    /// stop the reader immediately after the first accepted decode.
    fn accept_decode(&mut self, raw: &str) -> Option<String>;
}

/// Browser-bridged barcode reader
#[derive(Debug, Default)]
pub struct BridgedBarcodeReader {
    started: bool,
    delivered: bool,
}

impl BridgedBarcodeReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BarcodeReader for BridgedBarcodeReader {
    fn start(&mut self) -> Result<(), DeviceError> {
        self.started = true;
        self.delivered = false;
        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn is_active(&self) -> bool {
        self.started
    }

    fn accept_decode(&mut self, raw: &str) -> Option<String> {
        if !self.started || self.delivered {
            return None;
        }
        let barcode = raw.trim();
        if barcode.is_empty() {
            return None;
        }
        self.delivered = true;
        Some(barcode.to_string())
    }
}
