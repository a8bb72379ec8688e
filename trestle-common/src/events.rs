//! Event types and EventBus for the Trestle field application
//!
//! Events are broadcast via the EventBus so collaborators (the 3D viewer
//! bridge, the review screen, the snapshot saver) observe state changes
//! without holding references into the state container.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::ElementId;

/// Application-wide event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrestleEvent {
    /// A structure's element tree finished loading (fresh or restored)
    StructureLoaded {
        structure_id: String,
        element_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Displayed sibling set changed (drill-in, go-back, or reset)
    NavigationChanged {
        /// Drill depth after the transition (0 = root)
        depth: usize,
        timestamp: DateTime<Utc>,
    },

    /// An element was selected for assessment or viewer highlight
    ElementSelected {
        identity: ElementId,
        timestamp: DateTime<Utc>,
    },

    /// A condition rating was committed to the canonical tree
    RatingApplied {
        identity: ElementId,
        /// Rated leaves so far, for wizard progress display
        rated_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A maintenance action was recorded
    MaintenanceActionRecorded {
        action_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// The durable snapshot was written
    SnapshotSaved { timestamp: DateTime<Utc> },

    /// A prior session was restored from the durable store
    SessionRestored {
        structure_id: String,
        rated_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Persistence is degraded; ratings continue in memory only
    PersistenceDegraded {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Submission began (image uploads + remote send)
    SubmissionStarted { timestamp: DateTime<Utc> },

    /// Submission succeeded and the local snapshot was cleared
    SubmissionCompleted {
        inspection_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Submission failed; the local snapshot is preserved for retry
    SubmissionFailed {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// Central event distribution bus.
///
/// Wraps tokio::broadcast: non-blocking publish, multiple concurrent
/// subscribers, automatic cleanup when subscribers drop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TrestleEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TrestleEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Err` when no subscriber is listening.
    pub fn emit(
        &self,
        event: TrestleEvent,
    ) -> Result<usize, broadcast::error::SendError<TrestleEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening.
    ///
    /// For non-critical notifications where a missing subscriber is fine.
    pub fn emit_lossy(&self, event: TrestleEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
