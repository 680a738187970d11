//! Scan workflow state machine
//!
//! **[SSA-WF-010]** A scan session progresses through 8 defined steps:
//! CHOICE → BARCODE_SCAN → FOUND → SUCCESS (barcode path), or
//! CHOICE → BARCODE_SCAN → NOT_FOUND_TRANSITION → PACKET_CAPTURE →
//! AI_PROCESSING → REVIEW → SUCCESS (photo path).
//!
//! Each step is a variant carrying only the data meaningful to that step,
//! so states like "found without a product" are unrepresentable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::records::{ReviewDraft, StashFields, VendorProduct};

/// **[SSA-WF-010]** Scan workflow step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScanStep {
    /// User picks a path (barcode vs. packet photo)
    Choice,

    /// Barcode reader active, waiting for a decode
    BarcodeScan {
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Barcode matched a known vendor product; stash fields editable
    Found {
        product: VendorProduct,
        stash: StashFields,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Barcode unknown; informational pause before the photo path
    NotFoundTransition,

    /// Packet camera active (gallery upload always available as fallback)
    PacketCapture {
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Upload → extraction → catalog match pipeline running; no device active
    AiProcessing { progress: ScanProgress },

    /// Extracted data + stash fields editable before commit
    Review {
        draft: ReviewDraft,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Stash record committed; user may scan another or close
    Success { stash_id: Uuid },
}

impl ScanStep {
    /// Wire name of this step (matches the serde tag)
    pub fn name(&self) -> &'static str {
        match self {
            ScanStep::Choice => "choice",
            ScanStep::BarcodeScan { .. } => "barcode_scan",
            ScanStep::Found { .. } => "found",
            ScanStep::NotFoundTransition => "not_found_transition",
            ScanStep::PacketCapture { .. } => "packet_capture",
            ScanStep::AiProcessing { .. } => "ai_processing",
            ScanStep::Review { .. } => "review",
            ScanStep::Success { .. } => "success",
        }
    }

    /// Step error banner, if the step carries one
    pub fn error(&self) -> Option<&str> {
        match self {
            ScanStep::BarcodeScan { error }
            | ScanStep::Found { error, .. }
            | ScanStep::PacketCapture { error }
            | ScanStep::Review { error, .. } => error.as_deref(),
            _ => None,
        }
    }

    /// Terminal-per-item step (a stash record was committed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStep::Success { .. })
    }
}

/// **[SSA-WF-010]** Step transition record (logged and broadcast)
#[derive(Debug, Clone, Serialize)]
pub struct StepTransition {
    pub session_id: Uuid,
    pub from_step: &'static str,
    pub to_step: &'static str,
    pub transitioned_at: DateTime<Utc>,
}

/// **[SSA-WF-020]** Scan session (in-memory only, never persisted)
///
/// Discarded on close or completion; only explicit confirm-and-save
/// transitions produce durable records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    /// Unique session identifier
    pub session_id: Uuid,

    /// Current workflow step (with step-specific payload)
    pub step: ScanStep,

    /// Barcode decoded earlier in this session, carried into the photo
    /// path and the final save
    pub scanned_barcode: Option<String>,

    /// Session start time
    pub started_at: DateTime<Utc>,
}

impl ScanSession {
    /// Create new scan session at the path-choice step
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            step: ScanStep::Choice,
            scanned_barcode: None,
            started_at: Utc::now(),
        }
    }

    /// Move to a new step, returning the transition record
    pub fn transition_to(&mut self, new_step: ScanStep) -> StepTransition {
        let transition = StepTransition {
            session_id: self.session_id,
            from_step: self.step.name(),
            to_step: new_step.name(),
            transitioned_at: Utc::now(),
        };
        self.step = new_step;
        transition
    }

    /// Reset for "scan another" from the success step
    pub fn reset(&mut self) -> StepTransition {
        self.scanned_barcode = None;
        self.transition_to(ScanStep::Choice)
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

/// **[SSA-AI-020]** Pipeline progress (informational only)
///
/// Progress values never drive transitions; they exist for the progress bar
/// and the SSE stream. The percentage is monotonically non-decreasing for
/// the lifetime of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Percentage complete (0 - 100)
    pub percent: u8,

    /// Current operation description
    pub message: String,
}

impl ScanProgress {
    /// Advance the indicator; regressions are clamped to the current value
    pub fn advance_to(&mut self, percent: u8, message: impl Into<String>) {
        self.percent = percent.clamp(self.percent, 100);
        self.message = message.into();
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self {
            percent: 0,
            message: String::from("Preparing..."),
        }
    }
}
