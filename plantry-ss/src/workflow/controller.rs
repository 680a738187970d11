//! Scan workflow controller
//!
//! **[SSA-WF-010]** Owns one `ScanSession` and drives it through the strict
//! step machine. Every transition handler is responsible for the device
//! side effects of the step it leaves and the step it enters:
//!
//! | transition              | side effect                      |
//! |-------------------------|----------------------------------|
//! | any → barcode_scan      | acquire barcode reader           |
//! | barcode_scan → other    | release barcode reader           |
//! | any → packet_capture    | acquire packet camera            |
//! | packet_capture → other  | release packet camera            |
//! | decode success          | scan_history row (via lookup)    |
//! | confirm success         | stash record (+ barcode update)  |
//!
//! Remote failures never leave the session in a dead step: they surface as
//! the step's `error` and revert to the nearest interactive step.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use plantry_common::events::{EventBus, PlantryEvent};

use crate::devices::{CapturedImage, DeviceBay, DeviceError};
use crate::models::{
    ExtractedSeedData, ReviewDraft, SavePayload, SaveSource, SavedStash, ScanProgress,
    ScanSession, ScanStep, StashFields,
};
use crate::services::{BarcodeLookup, CatalogMatcher, ImageStore, PacketExtractor, StashPersister};

/// Scan workflow errors surfaced to the API layer
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The action is not defined for the session's current step
    #[error("Action '{action}' is not valid in step '{step}'")]
    InvalidAction {
        action: &'static str,
        step: &'static str,
    },

    /// The session was closed; no further actions are accepted
    #[error("Scan session is closed")]
    Closed,

    /// Capture device problem (bad frame, inactive camera, ...)
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Persistence/lookup failure already surfaced on the step
    #[error("Storage error: {0}")]
    Storage(#[from] plantry_common::Error),
}

/// Collaborators injected into every controller
#[derive(Clone)]
pub struct WorkflowDeps {
    pub lookup: Arc<dyn BarcodeLookup>,
    pub extractor: Arc<dyn PacketExtractor>,
    pub matcher: Arc<dyn CatalogMatcher>,
    pub persister: Arc<dyn StashPersister>,
    pub images: Arc<dyn ImageStore>,
}

/// Result of feeding a decode into the controller
#[derive(Debug)]
pub enum DecodeOutcome {
    /// Barcode matched; session is now in `found`
    Found,
    /// Barcode unknown; caller must arm the auto-advance timer
    NotFound {
        timer: CancellationToken,
        generation: u64,
    },
    /// Decode was dropped (duplicate, empty, or reader inactive)
    Ignored,
    /// Directory lookup failed; session reverted to `barcode_scan` with error
    LookupFailed,
}

/// Everything the AI pipeline driver needs to run detached
#[derive(Debug)]
pub struct PipelineStart {
    pub image: CapturedImage,
    pub generation: u64,
}

/// **[SSA-WF-020]** The scan workflow state machine
pub struct ScanController {
    session: ScanSession,
    devices: DeviceBay,
    deps: WorkflowDeps,
    events: EventBus,
    closed: bool,
    /// Bumped on every transition (and on close); in-flight timers and
    /// pipeline runs carry the generation they started under and no-op if
    /// the session has since moved on
    generation: u64,
    /// Cancellation for the pending not-found auto-advance timer
    timer_token: Option<CancellationToken>,
}

impl ScanController {
    pub fn new(deps: WorkflowDeps, devices: DeviceBay, events: EventBus) -> Self {
        let session = ScanSession::new();

        tracing::info!(session_id = %session.session_id, "Scan session opened");
        let _ = events.emit(PlantryEvent::ScanSessionStarted {
            session_id: session.session_id,
            timestamp: Utc::now(),
        });

        Self {
            session,
            devices,
            deps,
            events,
            closed: false,
            generation: 0,
            timer_token: None,
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn deps(&self) -> WorkflowDeps {
        self.deps.clone()
    }

    /// Active device kind, if any (diagnostics and tests)
    pub fn active_device(&self) -> Option<&'static str> {
        self.devices.active_kind()
    }

    // ========================================================================
    // Transition plumbing
    // ========================================================================

    fn ensure_open(&self) -> Result<(), WorkflowError> {
        if self.closed {
            Err(WorkflowError::Closed)
        } else {
            Ok(())
        }
    }

    fn invalid(&self, action: &'static str) -> WorkflowError {
        WorkflowError::InvalidAction {
            action,
            step: self.session.step.name(),
        }
    }

    /// Commit a step change: cancel any pending timer, bump the generation,
    /// log and broadcast the transition
    fn set_step(&mut self, step: ScanStep) {
        if let Some(token) = self.timer_token.take() {
            token.cancel();
        }
        self.generation += 1;

        let transition = self.session.transition_to(step);
        tracing::info!(
            session_id = %transition.session_id,
            from = transition.from_step,
            to = transition.to_step,
            "Scan step changed"
        );
        let _ = self.events.emit(PlantryEvent::ScanStepChanged {
            session_id: transition.session_id,
            from_step: transition.from_step.to_string(),
            to_step: transition.to_step.to_string(),
            timestamp: transition.transitioned_at,
        });
    }

    /// Enter barcode_scan: mandatory teardown of whatever device was held,
    /// then a fresh reader acquisition
    fn enter_barcode_scan(&mut self, error: Option<String>) {
        self.devices.release();
        let error = match self.devices.acquire_reader() {
            Ok(()) => error,
            // Reader init failure is not fatal: the step is entered with the
            // error surfaced and the user may retry or switch to photo
            Err(e) => Some(e.to_string()),
        };
        self.set_step(ScanStep::BarcodeScan { error });
    }

    /// Enter packet_capture: teardown first, then camera acquisition.
    /// Camera failure is surfaced but never blocks the step — the gallery
    /// upload fallback works without a camera.
    fn enter_packet_capture(&mut self, error: Option<String>) {
        self.devices.release();
        let error = match self.devices.acquire_camera() {
            Ok(()) => error,
            Err(e) => Some(error.map_or_else(|| e.to_string(), |prev| format!("{} ({})", prev, e))),
        };
        self.set_step(ScanStep::PacketCapture { error });
    }

    // ========================================================================
    // Path selection
    // ========================================================================

    /// User picked "scan barcode" on the choice step
    pub fn select_barcode_path(&mut self) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        match self.session.step {
            ScanStep::Choice => {
                self.enter_barcode_scan(None);
                Ok(())
            }
            _ => Err(self.invalid("select-barcode")),
        }
    }

    /// User picked "photo packet" — from the choice step, or as a manual
    /// switch away from an active (possibly failed) barcode reader
    pub fn select_photo_path(&mut self) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        match self.session.step {
            ScanStep::Choice | ScanStep::BarcodeScan { .. } => {
                self.enter_packet_capture(None);
                Ok(())
            }
            _ => Err(self.invalid("select-photo")),
        }
    }

    /// Short-circuit the informational not-found pause
    pub fn proceed_to_photo(&mut self) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        match self.session.step {
            ScanStep::NotFoundTransition => {
                self.enter_packet_capture(None);
                Ok(())
            }
            _ => Err(self.invalid("proceed-to-photo")),
        }
    }

    /// Auto-advance timer callback; stale or post-close firings are no-ops
    pub fn timer_fired(&mut self, generation: u64) {
        if self.closed || generation != self.generation {
            return;
        }
        if matches!(self.session.step, ScanStep::NotFoundTransition) {
            tracing::debug!(
                session_id = %self.session.session_id,
                "Not-found pause elapsed, advancing to packet capture"
            );
            self.enter_packet_capture(None);
        }
    }

    // ========================================================================
    // Barcode path
    // ========================================================================

    /// Browser reported a device initialization failure
    pub fn on_device_error(&mut self, message: &str) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        let step_name = self.session.step.name();
        match &mut self.session.step {
            ScanStep::BarcodeScan { error } | ScanStep::PacketCapture { error } => {
                *error = Some(message.to_string());
                tracing::warn!(
                    session_id = %self.session.session_id,
                    step = step_name,
                    message,
                    "Capture device error reported"
                );
                Ok(())
            }
            _ => Err(WorkflowError::InvalidAction {
                action: "device-error",
                step: step_name,
            }),
        }
    }

    /// A decode arrived from the browser reader loop
    pub async fn on_barcode_decoded(
        &mut self,
        raw: &str,
    ) -> Result<DecodeOutcome, WorkflowError> {
        self.ensure_open()?;
        if !matches!(self.session.step, ScanStep::BarcodeScan { .. }) {
            return Err(self.invalid("barcode"));
        }

        let Some(reader) = self.devices.reader_mut() else {
            // No live reader (init failed): the decode has nowhere to go
            return Ok(DecodeOutcome::Ignored);
        };
        let Some(barcode) = reader.accept_decode(raw) else {
            return Ok(DecodeOutcome::Ignored);
        };
        // One decode per reader session: stop immediately after the first
        reader.stop();

        let session_id = self.session.session_id;
        let lookup = self.deps.lookup.clone();
        match lookup.lookup(&barcode).await {
            Ok(found) => {
                self.session.scanned_barcode = Some(barcode.clone());
                let _ = self.events.emit(PlantryEvent::BarcodeDecoded {
                    session_id,
                    barcode: barcode.clone(),
                    found: found.is_some(),
                    timestamp: Utc::now(),
                });

                match found {
                    Some(product) => {
                        self.devices.release();
                        self.set_step(ScanStep::Found {
                            product,
                            stash: StashFields::default(),
                            error: None,
                        });
                        Ok(DecodeOutcome::Found)
                    }
                    None => {
                        self.devices.release();
                        self.set_step(ScanStep::NotFoundTransition);
                        let token = CancellationToken::new();
                        self.timer_token = Some(token.clone());
                        Ok(DecodeOutcome::NotFound {
                            timer: token,
                            generation: self.generation,
                        })
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    barcode,
                    error = %e,
                    "Barcode lookup failed, returning to scanner"
                );
                // Nearest interactive step is barcode_scan itself; re-enter
                // so the reader is re-armed after its post-decode stop
                self.enter_barcode_scan(Some(format!("Barcode lookup failed: {}", e)));
                Ok(DecodeOutcome::LookupFailed)
            }
        }
    }

    /// Edit stash fields on the found step
    pub fn update_stash_fields(&mut self, fields: StashFields) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        match &mut self.session.step {
            ScanStep::Found { stash, .. } => {
                *stash = fields;
                Ok(())
            }
            _ => Err(self.invalid("stash-fields")),
        }
    }

    // ========================================================================
    // Photo path
    // ========================================================================

    /// A full camera frame arrived; crop it and hand back a pipeline start
    pub fn on_frame(&mut self, frame: &[u8]) -> Result<PipelineStart, WorkflowError> {
        self.ensure_open()?;
        if !matches!(self.session.step, ScanStep::PacketCapture { .. }) {
            return Err(self.invalid("frame"));
        }

        let Some(camera) = self.devices.camera_mut() else {
            return Err(WorkflowError::Device(DeviceError::NotActive(
                "packet camera",
            )));
        };

        match camera.capture(frame) {
            Ok(image) => Ok(self.begin_ai_processing(image)),
            Err(e) => {
                // Bad frame: surface on the step, stay put (the user can
                // recapture or fall back to upload)
                if let ScanStep::PacketCapture { error } = &mut self.session.step {
                    *error = Some(e.to_string());
                }
                Err(WorkflowError::Device(e))
            }
        }
    }

    /// Gallery upload path — no camera involvement at all
    pub fn on_upload(&mut self, bytes: &[u8]) -> Result<PipelineStart, WorkflowError> {
        self.ensure_open()?;
        if !matches!(self.session.step, ScanStep::PacketCapture { .. }) {
            return Err(self.invalid("upload"));
        }

        let image = crate::devices::decode_upload(bytes)?;
        Ok(self.begin_ai_processing(image))
    }

    /// Leave packet_capture (releasing the camera) and start the pipeline
    fn begin_ai_processing(&mut self, image: CapturedImage) -> PipelineStart {
        self.devices.release();
        self.set_step(ScanStep::AiProcessing {
            progress: ScanProgress::default(),
        });
        PipelineStart {
            image,
            generation: self.generation,
        }
    }

    /// Pipeline progress callback (informational only)
    pub fn ai_progress(&mut self, generation: u64, percent: u8, message: &str) {
        if self.closed || generation != self.generation {
            return;
        }
        if let ScanStep::AiProcessing { progress } = &mut self.session.step {
            progress.advance_to(percent, message);
            let _ = self.events.emit(PlantryEvent::ScanProgressUpdate {
                session_id: self.session.session_id,
                percent: progress.percent,
                message: progress.message.clone(),
                timestamp: Utc::now(),
            });
        }
    }

    /// Pipeline finished: move to review with the draft
    pub fn ai_complete(&mut self, generation: u64, draft: ReviewDraft) {
        if self.closed || generation != self.generation {
            return;
        }
        if matches!(self.session.step, ScanStep::AiProcessing { .. }) {
            self.set_step(ScanStep::Review { draft, error: None });
        }
    }

    /// Pipeline failed: back to packet_capture with the error surfaced.
    /// Nothing from the failed attempt is retained.
    pub fn ai_failed(&mut self, generation: u64, error: String) {
        if self.closed || generation != self.generation {
            return;
        }
        if matches!(self.session.step, ScanStep::AiProcessing { .. }) {
            let _ = self.events.emit(PlantryEvent::ScanExtractionFailed {
                session_id: self.session.session_id,
                error: error.clone(),
                timestamp: Utc::now(),
            });
            self.enter_packet_capture(Some(error));
        }
    }

    /// Edit the review draft (wholesale field-group replacement, so what
    /// the user sees is exactly what save receives)
    pub fn update_review(
        &mut self,
        extracted: Option<ExtractedSeedData>,
        stash: Option<StashFields>,
    ) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        match &mut self.session.step {
            ScanStep::Review { draft, .. } => {
                if let Some(extracted) = extracted {
                    draft.extracted = extracted;
                }
                if let Some(stash) = stash {
                    draft.stash = stash;
                }
                Ok(())
            }
            _ => Err(self.invalid("review")),
        }
    }

    // ========================================================================
    // Confirm / rescan / close
    // ========================================================================

    /// Commit the session's data as a stash record
    pub async fn confirm(&mut self) -> Result<SavedStash, WorkflowError> {
        self.ensure_open()?;

        let payload = match &self.session.step {
            ScanStep::Found { product, stash, .. } => SavePayload {
                scanned_barcode: self.session.scanned_barcode.clone(),
                source: SaveSource::BarcodeMatch {
                    product: product.clone(),
                },
                stash: stash.clone(),
            },
            ScanStep::Review { draft, .. } => SavePayload {
                scanned_barcode: self.session.scanned_barcode.clone(),
                source: SaveSource::PacketExtraction {
                    extracted: draft.extracted.clone(),
                    verdict: draft.verdict.clone(),
                    packet_image_url: draft.packet_image_url.clone(),
                },
                stash: draft.stash.clone(),
            },
            _ => return Err(self.invalid("confirm")),
        };

        let persister = self.deps.persister.clone();
        match persister.save(&payload).await {
            Ok(saved) => {
                let _ = self.events.emit(PlantryEvent::StashSaved {
                    session_id: self.session.session_id,
                    stash_id: saved.stash_id,
                    variety_name: saved.variety_name.clone(),
                    timestamp: Utc::now(),
                });
                self.set_step(ScanStep::Success {
                    stash_id: saved.stash_id,
                });
                Ok(saved)
            }
            Err(e) => {
                tracing::error!(
                    session_id = %self.session.session_id,
                    error = %e,
                    "Stash save failed"
                );
                // Remain on the current step with the error surfaced; the
                // user retries manually
                if let ScanStep::Found { error, .. } | ScanStep::Review { error, .. } =
                    &mut self.session.step
                {
                    *error = Some(format!("Save failed: {}", e));
                }
                Err(WorkflowError::Storage(e))
            }
        }
    }

    /// "Scan another" / "rescan": found returns to the scanner, review
    /// returns to the camera, success resets the whole session
    pub fn rescan(&mut self) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        match self.session.step {
            ScanStep::Found { .. } => {
                self.enter_barcode_scan(None);
                Ok(())
            }
            ScanStep::Review { .. } => {
                self.enter_packet_capture(None);
                Ok(())
            }
            ScanStep::Success { .. } => {
                self.devices.release();
                self.generation += 1;
                let transition = self.session.reset();
                let _ = self.events.emit(PlantryEvent::ScanStepChanged {
                    session_id: transition.session_id,
                    from_step: transition.from_step.to_string(),
                    to_step: transition.to_step.to_string(),
                    timestamp: transition.transitioned_at,
                });
                Ok(())
            }
            _ => Err(self.invalid("rescan")),
        }
    }

    /// Close the workflow: synchronously tear down any active device,
    /// cancel the pending timer, refuse all further actions. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(token) = self.timer_token.take() {
            token.cancel();
        }
        self.generation += 1;
        self.devices.release();
        self.closed = true;

        tracing::info!(session_id = %self.session.session_id, "Scan session closed");
        let _ = self.events.emit(PlantryEvent::ScanSessionClosed {
            session_id: self.session.session_id,
            timestamp: Utc::now(),
        });
    }
}
