//! Shared test helpers: in-memory fakes for every workflow collaborator
//!
//! The fakes share one ordered call log so tests can assert cross-component
//! sequencing (device teardown before acquisition, pipeline call order).

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;

use plantry_common::events::EventBus;
use plantry_common::{Error, Result};

use plantry_ss::devices::{
    BarcodeReader, CapturedImage, DeviceBay, DeviceError, PacketCamera,
};
use plantry_ss::models::{
    ExtractedSeedData, MatchVerdict, SavePayload, SavedStash, ScanSession, VendorProduct,
};
use plantry_ss::services::{
    BarcodeLookup, CatalogMatcher, ExtractionError, ImageStore, PacketExtractor, StashPersister,
};
use plantry_ss::workflow::{ScanController, SessionHandle, WorkflowDeps};

pub type CallLog = Arc<StdMutex<Vec<String>>>;

pub fn new_log() -> CallLog {
    Arc::new(StdMutex::new(Vec::new()))
}

pub fn log_entries(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn push(log: &CallLog, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

// ============================================================================
// Fake devices
// ============================================================================

pub struct FakeReader {
    log: CallLog,
    started: bool,
    delivered: bool,
}

impl BarcodeReader for FakeReader {
    fn start(&mut self) -> std::result::Result<(), DeviceError> {
        push(&self.log, "reader.start");
        self.started = true;
        self.delivered = false;
        Ok(())
    }

    fn stop(&mut self) {
        push(&self.log, "reader.stop");
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

pub struct FakeCamera {
    log: CallLog,
    started: bool,
}

impl PacketCamera for FakeCamera {
    fn start(&mut self) -> std::result::Result<(), DeviceError> {
        push(&self.log, "camera.start");
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        push(&self.log, "camera.stop");
        self.started = false;
    }

    fn is_active(&self) -> bool {
        self.started
    }

    fn capture(&mut self, frame: &[u8]) -> std::result::Result<CapturedImage, DeviceError> {
        if !self.started {
            return Err(DeviceError::NotActive("packet camera"));
        }
        push(&self.log, "camera.capture");
        Ok(CapturedImage {
            png: frame.to_vec(),
            width: 1,
            height: 1,
        })
    }
}

pub fn fake_device_bay(log: &CallLog) -> DeviceBay {
    let reader_log = log.clone();
    let camera_log = log.clone();
    DeviceBay::new(
        Box::new(move || {
            Box::new(FakeReader {
                log: reader_log.clone(),
                started: false,
                delivered: false,
            })
        }),
        Box::new(move || {
            Box::new(FakeCamera {
                log: camera_log.clone(),
                started: false,
            })
        }),
    )
}

// ============================================================================
// Fake collaborators
// ============================================================================

pub struct FakeLookup {
    log: CallLog,
    products: HashMap<String, VendorProduct>,
    fail: bool,
}

#[async_trait]
impl BarcodeLookup for FakeLookup {
    async fn lookup(&self, barcode: &str) -> Result<Option<VendorProduct>> {
        push(&self.log, format!("lookup.{}", barcode));
        if self.fail {
            return Err(Error::Internal("directory unavailable".to_string()));
        }
        Ok(self.products.get(barcode).cloned())
    }
}

#[derive(Clone)]
pub enum ExtractionOutcome {
    Success(ExtractedSeedData),
    Rejected(String),
}

pub struct FakeExtractor {
    log: CallLog,
    outcome: ExtractionOutcome,
}

#[async_trait]
impl PacketExtractor for FakeExtractor {
    async fn extract(
        &self,
        image_url: &str,
        barcode: Option<&str>,
    ) -> std::result::Result<ExtractedSeedData, ExtractionError> {
        push(
            &self.log,
            format!("extractor.extract({}, {:?})", image_url, barcode),
        );
        match &self.outcome {
            ExtractionOutcome::Success(data) => Ok(data.clone()),
            ExtractionOutcome::Rejected(reason) => Err(ExtractionError::Rejected(reason.clone())),
        }
    }
}

pub struct FakeMatcher {
    log: CallLog,
    verdict: MatchVerdict,
}

#[async_trait]
impl CatalogMatcher for FakeMatcher {
    async fn match_variety(
        &self,
        variety_name: &str,
        plant_type_name: &str,
    ) -> Result<MatchVerdict> {
        push(
            &self.log,
            format!("matcher.match({}, {})", variety_name, plant_type_name),
        );
        Ok(self.verdict.clone())
    }
}

pub struct FakePersister {
    log: CallLog,
    pub saved: Arc<StdMutex<Vec<SavePayload>>>,
    fail: bool,
}

#[async_trait]
impl StashPersister for FakePersister {
    async fn save(&self, payload: &SavePayload) -> Result<SavedStash> {
        push(&self.log, "persister.save");
        if self.fail {
            return Err(Error::Internal("stash write failed".to_string()));
        }
        self.saved.lock().unwrap().push(payload.clone());
        let variety_name = match &payload.source {
            plantry_ss::models::SaveSource::BarcodeMatch { product } => product.product_name.clone(),
            plantry_ss::models::SaveSource::PacketExtraction { extracted, .. } => {
                extracted.variety_name.clone()
            }
        };
        Ok(SavedStash {
            stash_id: uuid::Uuid::new_v4(),
            variety_id: None,
            variety_name,
        })
    }
}

pub struct MemImageStore {
    log: CallLog,
}

#[async_trait]
impl ImageStore for MemImageStore {
    async fn store(&self, _image: &CapturedImage) -> Result<String> {
        push(&self.log, "images.store");
        Ok("/packet_images/test.png".to_string())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Product returned for barcode "0123456789012"
pub fn cherokee_purple() -> VendorProduct {
    VendorProduct {
        barcode: "0123456789012".to_string(),
        product_name: "Cherokee Purple Tomato".to_string(),
        vendor_name: "Baker Creek".to_string(),
        plant_type_name: "Tomato".to_string(),
        packet_size: Some("25 seeds".to_string()),
        packet_image_url: None,
        variety_id: None,
        scan_count: 3,
        last_scanned_at: None,
    }
}

/// Extraction result used by the photo-path scenarios
pub fn brandywine_extraction() -> ExtractedSeedData {
    ExtractedSeedData {
        variety_name: "Brandywine".to_string(),
        plant_type_name: "Tomato".to_string(),
        vendor_name: Some("Baker Creek".to_string()),
        days_to_maturity: Some(85),
        spacing_recommended: Some("24-36 in".to_string()),
        sun_requirement: Some("Full sun".to_string()),
        water_requirement: None,
        seed_line_type: Some("Heirloom".to_string()),
        packet_size: Some("30 seeds".to_string()),
        retail_price: Some(3.75),
        confidence_score: Some(0.92),
    }
}

/// Knobs for building a test workflow
pub struct FixtureConfig {
    pub products: HashMap<String, VendorProduct>,
    pub extraction: ExtractionOutcome,
    pub verdict: MatchVerdict,
    pub lookup_fails: bool,
    pub persist_fails: bool,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        let mut products = HashMap::new();
        products.insert("0123456789012".to_string(), cherokee_purple());
        Self {
            products,
            extraction: ExtractionOutcome::Success(brandywine_extraction()),
            verdict: MatchVerdict::create_new(),
            lookup_fails: false,
            persist_fails: false,
        }
    }
}

pub struct Fixture {
    pub log: CallLog,
    pub saved: Arc<StdMutex<Vec<SavePayload>>>,
    pub bus: EventBus,
}

impl Fixture {
    pub fn deps(&self, config: FixtureConfig) -> WorkflowDeps {
        WorkflowDeps {
            lookup: Arc::new(FakeLookup {
                log: self.log.clone(),
                products: config.products,
                fail: config.lookup_fails,
            }),
            extractor: Arc::new(FakeExtractor {
                log: self.log.clone(),
                outcome: config.extraction,
            }),
            matcher: Arc::new(FakeMatcher {
                log: self.log.clone(),
                verdict: config.verdict,
            }),
            persister: Arc::new(FakePersister {
                log: self.log.clone(),
                saved: self.saved.clone(),
                fail: config.persist_fails,
            }),
            images: Arc::new(MemImageStore {
                log: self.log.clone(),
            }),
        }
    }
}

pub fn fixture() -> Fixture {
    Fixture {
        log: new_log(),
        saved: Arc::new(StdMutex::new(Vec::new())),
        bus: EventBus::new(64),
    }
}

/// Controller wired to fakes, for direct state-machine tests
pub fn test_controller(config: FixtureConfig) -> (ScanController, Fixture) {
    let fx = fixture();
    let controller = ScanController::new(
        fx.deps(config),
        fake_device_bay(&fx.log),
        fx.bus.clone(),
    );
    (controller, fx)
}

/// Session handle wired to fakes, for end-to-end scenarios
pub fn test_handle(config: FixtureConfig) -> (SessionHandle, Fixture) {
    let fx = fixture();
    let handle = SessionHandle::new(fx.deps(config), fake_device_bay(&fx.log), fx.bus.clone());
    (handle, fx)
}

/// PNG bytes the image pipeline accepts
pub fn tiny_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([90, 140, 70]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Poll the session until it reaches the named step (pipeline and timer
/// work run on spawned tasks)
pub async fn wait_for_step(handle: &SessionHandle, step_name: &str) -> ScanSession {
    for _ in 0..400 {
        let snapshot = handle.snapshot().await;
        if snapshot.step.name() == step_name {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "session never reached step '{}', stuck at '{}'",
        step_name,
        handle.snapshot().await.step.name()
    );
}
