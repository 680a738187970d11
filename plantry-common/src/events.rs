//! Event types for the Plantry event system
//!
//! Provides shared event definitions and EventBus for all Plantry modules.
//! Events are broadcast via EventBus and can be serialized for SSE
//! transmission; every module uses this central enum for type safety and
//! exhaustive matching.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Plantry event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlantryEvent {
    /// A scan/identify session was opened
    ScanSessionStarted {
        /// Scan session UUID
        session_id: Uuid,
        /// When the session was opened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The scan workflow moved between steps
    ///
    /// Triggers:
    /// - SSE: switch the visible step panel
    ScanStepChanged {
        /// Scan session UUID
        session_id: Uuid,
        /// Step name before the transition
        from_step: String,
        /// Step name after the transition
        to_step: String,
        /// When the transition happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A barcode was decoded and looked up in the vendor directory
    BarcodeDecoded {
        /// Scan session UUID
        session_id: Uuid,
        /// The decoded barcode digits
        barcode: String,
        /// Whether the vendor directory knew the barcode
        found: bool,
        /// When the decode arrived
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Packet-analysis pipeline progress update
    ///
    /// NOTE: informational only; the workflow transition is driven by the
    /// pipeline outcome, never by progress values.
    ScanProgressUpdate {
        /// Scan session UUID
        session_id: Uuid,
        /// Percentage complete (0-100, monotonically increasing)
        percent: u8,
        /// Current operation description
        message: String,
        /// When the update was emitted
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Packet-analysis pipeline failed
    ScanExtractionFailed {
        /// Scan session UUID
        session_id: Uuid,
        /// User-facing failure description
        error: String,
        /// When the failure was detected
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A confirmed scan was committed to the seed stash
    StashSaved {
        /// Scan session UUID
        session_id: Uuid,
        /// New stash record UUID
        stash_id: Uuid,
        /// Variety name as saved
        variety_name: String,
        /// When the save committed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A scan session was closed and discarded
    ScanSessionClosed {
        /// Scan session UUID
        session_id: Uuid,
        /// When the session was closed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlantryEvent {
    /// SSE event name for this event
    pub fn event_type(&self) -> &'static str {
        match self {
            PlantryEvent::ScanSessionStarted { .. } => "ScanSessionStarted",
            PlantryEvent::ScanStepChanged { .. } => "ScanStepChanged",
            PlantryEvent::BarcodeDecoded { .. } => "BarcodeDecoded",
            PlantryEvent::ScanProgressUpdate { .. } => "ScanProgressUpdate",
            PlantryEvent::ScanExtractionFailed { .. } => "ScanExtractionFailed",
            PlantryEvent::StashSaved { .. } => "StashSaved",
            PlantryEvent::ScanSessionClosed { .. } => "ScanSessionClosed",
        }
    }
}

/// Broadcast bus carrying [`PlantryEvent`]s to SSE handlers and observers
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlantryEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use plantry_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlantryEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` otherwise. Emitting with no subscribers is routine (no SSE
    /// client connected); callers decide whether that matters.
    pub fn emit(
        &self,
        event: PlantryEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<PlantryEvent>> {
        self.tx.send(event)
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
