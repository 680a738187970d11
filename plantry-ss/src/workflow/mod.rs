//! Scan workflow orchestration
//!
//! `ScanController` is the pure state machine; `SessionHandle` wraps it in
//! the session lock and drives the two detached activities — the 2.5 s
//! not-found auto-advance timer and the sequential AI pipeline. The lock is
//! never held across a remote call, so closing the session stays possible
//! while the pipeline is in flight.

pub mod controller;

pub use controller::{
    DecodeOutcome, PipelineStart, ScanController, WorkflowDeps, WorkflowError,
};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use plantry_common::events::EventBus;

use crate::devices::DeviceBay;
use crate::models::{
    ExtractedSeedData, ReviewDraft, SavedStash, ScanSession, StashFields,
};

/// Fixed duration of the informational not-found pause
pub const NOT_FOUND_ADVANCE: Duration = Duration::from_millis(2500);

/// Shared handle to one live scan session
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    inner: Arc<Mutex<ScanController>>,
}

impl SessionHandle {
    pub fn new(deps: WorkflowDeps, devices: DeviceBay, events: EventBus) -> Self {
        let controller = ScanController::new(deps, devices, events);
        let id = controller.session().session_id;
        Self {
            id,
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Snapshot of the session for the status API
    pub async fn snapshot(&self) -> ScanSession {
        self.inner.lock().await.session().clone()
    }

    pub async fn select_barcode_path(&self) -> Result<(), WorkflowError> {
        self.inner.lock().await.select_barcode_path()
    }

    pub async fn select_photo_path(&self) -> Result<(), WorkflowError> {
        self.inner.lock().await.select_photo_path()
    }

    pub async fn proceed_to_photo(&self) -> Result<(), WorkflowError> {
        self.inner.lock().await.proceed_to_photo()
    }

    pub async fn on_device_error(&self, message: &str) -> Result<(), WorkflowError> {
        self.inner.lock().await.on_device_error(message)
    }

    /// Feed a decode in; arms the auto-advance timer when the barcode was
    /// unknown
    pub async fn on_barcode_decoded(&self, raw: &str) -> Result<(), WorkflowError> {
        let outcome = {
            let mut controller = self.inner.lock().await;
            controller.on_barcode_decoded(raw).await?
        };

        if let DecodeOutcome::NotFound { timer, generation } = outcome {
            let handle = self.clone();
            tokio::spawn(async move {
                tokio::select! {
                    // Closing (or any transition) cancels the timer; nothing
                    // may fire after close
                    _ = timer.cancelled() => {}
                    _ = tokio::time::sleep(NOT_FOUND_ADVANCE) => {
                        handle.inner.lock().await.timer_fired(generation);
                    }
                }
            });
        }
        Ok(())
    }

    pub async fn update_stash_fields(&self, fields: StashFields) -> Result<(), WorkflowError> {
        self.inner.lock().await.update_stash_fields(fields)
    }

    /// Camera capture path: crop the frame, then run the pipeline detached
    pub async fn on_frame(&self, frame: &[u8]) -> Result<(), WorkflowError> {
        let start = self.inner.lock().await.on_frame(frame)?;
        self.spawn_pipeline(start);
        Ok(())
    }

    /// Gallery upload path: same pipeline, no camera
    pub async fn on_upload(&self, bytes: &[u8]) -> Result<(), WorkflowError> {
        let start = self.inner.lock().await.on_upload(bytes)?;
        self.spawn_pipeline(start);
        Ok(())
    }

    pub async fn update_review(
        &self,
        extracted: Option<ExtractedSeedData>,
        stash: Option<StashFields>,
    ) -> Result<(), WorkflowError> {
        self.inner.lock().await.update_review(extracted, stash)
    }

    pub async fn confirm(&self) -> Result<SavedStash, WorkflowError> {
        self.inner.lock().await.confirm().await
    }

    pub async fn rescan(&self) -> Result<(), WorkflowError> {
        self.inner.lock().await.rescan()
    }

    /// Synchronous device teardown + discard; idempotent
    pub async fn close(&self) {
        self.inner.lock().await.close();
    }

    fn spawn_pipeline(&self, start: PipelineStart) {
        let handle = self.clone();
        tokio::spawn(async move {
            run_ai_pipeline(handle, start).await;
        });
    }

    async fn progress(&self, generation: u64, percent: u8, message: &str) {
        self.inner
            .lock()
            .await
            .ai_progress(generation, percent, message);
    }

    async fn fail(&self, generation: u64, error: String) {
        self.inner.lock().await.ai_failed(generation, error);
    }
}

/// **[SSA-AI-010]** The sequential analysis pipeline
///
/// Upload → extraction → catalog match, strictly in that order: each call
/// needs the previous call's output. Progress values are informational;
/// only the success or failure of the three calls drives the transition.
async fn run_ai_pipeline(handle: SessionHandle, start: PipelineStart) {
    let PipelineStart { image, generation } = start;

    let (deps, barcode, session_id) = {
        let controller = handle.inner.lock().await;
        (
            controller.deps(),
            controller.session().scanned_barcode.clone(),
            controller.session().session_id,
        )
    };

    // Stage 1: persist the captured photo
    handle
        .progress(generation, 10, "Uploading packet photo...")
        .await;
    let packet_image_url = match deps.images.store(&image).await {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Packet photo upload failed");
            handle
                .fail(generation, format!("Photo upload failed: {}", e))
                .await;
            return;
        }
    };

    // Stage 2: vision extraction (only after the upload resolved)
    handle
        .progress(generation, 30, "Reading the packet...")
        .await;
    let extracted = match deps
        .extractor
        .extract(&packet_image_url, barcode.as_deref())
        .await
    {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Packet extraction failed");
            handle.fail(generation, e.to_string()).await;
            return;
        }
    };

    // Stage 3: catalog match (only after extraction succeeded)
    handle
        .progress(generation, 60, "Matching against the seed catalog...")
        .await;
    let verdict = match deps
        .matcher
        .match_variety(&extracted.variety_name, &extracted.plant_type_name)
        .await
    {
        Ok(verdict) => verdict,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Catalog match failed");
            handle
                .fail(generation, format!("Catalog match failed: {}", e))
                .await;
            return;
        }
    };

    handle
        .progress(generation, 95, "Preparing review...")
        .await;

    let draft = ReviewDraft {
        extracted,
        verdict,
        packet_image_url,
        stash: StashFields::default(),
    };

    handle.progress(generation, 100, "Done").await;
    handle.inner.lock().await.ai_complete(generation, draft);
}
