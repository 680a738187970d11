//! Data contracts between the scan workflow and its collaborators
//!
//! **[SSA-DC-010]** Every boundary the workflow crosses (vendor directory,
//! packet-vision extraction, catalog matching, stash persistence) exchanges
//! one of the explicit types below. Keeping the contracts in one module makes
//! the workflow's inputs and outputs analyzable at a glance.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Vendor barcode directory
// ============================================================================

/// Product matched from the vendor barcode directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorProduct {
    /// Physical barcode digits (EAN/UPC as printed)
    pub barcode: String,
    pub product_name: String,
    pub vendor_name: String,
    pub plant_type_name: String,
    /// Printed packet size (e.g. "25 seeds", "500 mg")
    pub packet_size: Option<String>,
    /// Stored packet image from an earlier scan, if any
    pub packet_image_url: Option<String>,
    /// Linked catalog variety, if this barcode has been matched before
    pub variety_id: Option<Uuid>,
    /// How many times this barcode has been scanned
    pub scan_count: i64,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Packet-vision extraction
// ============================================================================

/// Structured fields produced by the packet-vision extraction service
///
/// All fields except the two names are optional: packet fronts vary wildly
/// and the service returns whatever it could read. Empty names are allowed
/// through on purpose; the review step is where the user corrects them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSeedData {
    #[serde(default)]
    pub variety_name: String,
    #[serde(default)]
    pub plant_type_name: String,
    pub vendor_name: Option<String>,
    pub days_to_maturity: Option<i64>,
    /// Recommended plant spacing as printed (e.g. "12-18 in")
    pub spacing_recommended: Option<String>,
    pub sun_requirement: Option<String>,
    pub water_requirement: Option<String>,
    /// Heirloom / hybrid / open-pollinated
    pub seed_line_type: Option<String>,
    pub packet_size: Option<String>,
    pub retail_price: Option<f64>,
    /// Service-reported extraction confidence (0.0 - 1.0)
    pub confidence_score: Option<f64>,
}

// ============================================================================
// Catalog matching
// ============================================================================

/// Catalog match action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchAction {
    /// Extracted data corresponds to an existing catalog variety; saving
    /// links the barcode to it
    LinkBarcode,
    /// No catalog variety matched; saving creates a new catalog entry
    CreateNew,
}

/// Verdict from the catalog-match lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchVerdict {
    pub action: MatchAction,
    /// Matched variety (LinkBarcode only)
    pub variety_id: Option<Uuid>,
    /// Canonical catalog spelling of the matched variety (LinkBarcode only)
    pub matched_name: Option<String>,
}

impl MatchVerdict {
    pub fn create_new() -> Self {
        Self {
            action: MatchAction::CreateNew,
            variety_id: None,
            matched_name: None,
        }
    }

    pub fn link(variety_id: Uuid, matched_name: String) -> Self {
        Self {
            action: MatchAction::LinkBarcode,
            variety_id: Some(variety_id),
            matched_name: Some(matched_name),
        }
    }
}

// ============================================================================
// Stash fields and review draft
// ============================================================================

/// User-editable fields destined for the persisted stash record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StashFields {
    /// Packet quantity (packets, not seeds)
    pub quantity: i64,
    /// "Packed for" year printed on the packet
    pub packed_for_year: i32,
    pub storage_location: Option<String>,
}

impl Default for StashFields {
    fn default() -> Self {
        Self {
            quantity: 1,
            packed_for_year: Utc::now().year(),
            storage_location: None,
        }
    }
}

/// Everything shown (and editable) on the review step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub extracted: ExtractedSeedData,
    pub verdict: MatchVerdict,
    /// Stored URL of the captured packet photo
    pub packet_image_url: String,
    pub stash: StashFields,
}

// ============================================================================
// Stash persistence
// ============================================================================

/// Where the data being saved came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SaveSource {
    /// Barcode matched a known vendor product; save straight from it
    BarcodeMatch { product: VendorProduct },
    /// Packet photo was analyzed; save from the (possibly user-edited)
    /// extraction plus the catalog verdict
    PacketExtraction {
        extracted: ExtractedSeedData,
        verdict: MatchVerdict,
        packet_image_url: String,
    },
}

/// Payload handed to the stash persister at confirm time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavePayload {
    /// Barcode carried through the session, if one was decoded
    pub scanned_barcode: Option<String>,
    pub source: SaveSource,
    pub stash: StashFields,
}

/// Result of a committed save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedStash {
    pub stash_id: Uuid,
    pub variety_id: Option<Uuid>,
    pub variety_name: String,
}

// ============================================================================
// Persisted rows surfaced by the read API
// ============================================================================

/// One barcode scan attempt (append-only analytics row)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanHistoryRecord {
    pub scan_id: Uuid,
    pub barcode: String,
    pub found: bool,
    pub scanned_at: DateTime<Utc>,
}

/// A seed stash entry as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StashRecord {
    pub stash_id: Uuid,
    pub variety_id: Option<Uuid>,
    pub variety_name: String,
    pub plant_type_name: String,
    pub vendor_name: Option<String>,
    pub barcode: Option<String>,
    pub packet_image_url: Option<String>,
    pub quantity: i64,
    pub packed_for_year: i32,
    pub storage_location: Option<String>,
    pub extraction_confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
}
