//! Data models for plantry-ss

pub mod records;
pub mod scan_session;

pub use records::{
    ExtractedSeedData, MatchAction, MatchVerdict, ReviewDraft, SavePayload, SaveSource,
    SavedStash, ScanHistoryRecord, StashFields, StashRecord, VendorProduct,
};
pub use scan_session::{ScanProgress, ScanSession, ScanStep, StepTransition};
