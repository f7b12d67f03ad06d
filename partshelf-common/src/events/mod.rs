//! Event types for the partshelf event system
//!
//! Provides shared event definitions and EventBus for all partshelf modules.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// partshelf event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. All modules share this central enum for type safety and
/// exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PartshelfEvent {
    /// A voice extraction session was created
    ///
    /// Triggers:
    /// - SSE: open the assistant panel for this session
    ExtractionSessionStarted {
        /// Session UUID
        session_id: Uuid,
        /// When the session was created
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The session moved to a new phase
    ///
    /// Triggers:
    /// - SSE: switch the assistant panel view (images, voice, processing,
    ///   missing_fields, supplemental_voice, complete, error)
    ExtractionPhaseChanged {
        /// Session UUID
        session_id: Uuid,
        /// Phase before the transition
        old_phase: String,
        /// Phase after the transition
        new_phase: String,
        /// When the phase changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A processing step changed status during a transcribe+extract attempt
    ///
    /// Triggers:
    /// - SSE: update the step checklist for the current attempt
    ExtractionStepUpdate {
        /// Session UUID
        session_id: Uuid,
        /// Attempt number the step belongs to (stale attempts are dropped)
        attempt: u32,
        /// Step name ("transcribe", "encode_images", "extract")
        step: String,
        /// Step status ("pending", "running", "completed", "failed")
        status: String,
        /// Step output or error text, if any
        detail: Option<String>,
        /// When the step status changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A processing attempt finished and the extracted data is complete
    ///
    /// Triggers:
    /// - SSE: show the review/apply view
    ExtractionSessionCompleted {
        /// Session UUID
        session_id: Uuid,
        /// When the session reached the complete phase
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A processing attempt failed and the session entered the error phase
    ///
    /// Triggers:
    /// - SSE: show the error view with the failure message
    ExtractionSessionFailed {
        /// Session UUID
        session_id: Uuid,
        /// Human-readable failure message
        message: String,
        /// When the failure occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PartshelfEvent {
    /// Event type name for SSE event framing
    pub fn event_type(&self) -> &str {
        match self {
            PartshelfEvent::ExtractionSessionStarted { .. } => "ExtractionSessionStarted",
            PartshelfEvent::ExtractionPhaseChanged { .. } => "ExtractionPhaseChanged",
            PartshelfEvent::ExtractionStepUpdate { .. } => "ExtractionStepUpdate",
            PartshelfEvent::ExtractionSessionCompleted { .. } => "ExtractionSessionCompleted",
            PartshelfEvent::ExtractionSessionFailed { .. } => "ExtractionSessionFailed",
        }
    }
}

/// Event bus for broadcasting partshelf events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Multiple producers (any component can emit)
/// - Multiple consumers (SSE handlers, loggers)
/// - Bounded buffering (old events dropped when capacity is exceeded)
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PartshelfEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PartshelfEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PartshelfEvent,
    ) -> Result<usize, broadcast::error::SendError<PartshelfEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Useful for non-critical events where it's acceptable if no component
    /// is currently listening (e.g. step progress with no open UI).
    pub fn emit_lossy(&self, event: PartshelfEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
