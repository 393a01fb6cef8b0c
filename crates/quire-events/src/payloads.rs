//! Event payload types emitted by the edit pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to each event published on the bus.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed domain events surfaced by course editing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An edit passed its preflight checks and opened a job sequence.
    EditStarted {
        /// Course the edit applies to.
        course_id: String,
        /// Job sequence recording the edit.
        sequence_id: Uuid,
        /// Human summary of the requested change.
        description: String,
    },
    /// The pipeline entered a new step.
    EditProgress {
        /// Course the edit applies to.
        course_id: String,
        /// Job sequence recording the edit.
        sequence_id: Uuid,
        /// Step identifier, e.g. `git_push`.
        step: String,
    },
    /// The edit finished and its change is durable.
    EditCompleted {
        /// Course the edit applies to.
        course_id: String,
        /// Job sequence recording the edit.
        sequence_id: Uuid,
    },
    /// The edit terminated in failure.
    EditFailed {
        /// Course the edit applies to.
        course_id: String,
        /// Job sequence recording the edit.
        sequence_id: Uuid,
        /// Rendered failure detail.
        message: String,
    },
    /// The edit was a no-op and never acquired the course lock.
    EditSkipped {
        /// Course the edit applies to.
        course_id: String,
        /// Human summary of the requested change.
        description: String,
    },
    /// Component health changed; `degraded` lists unhealthy components.
    HealthChanged {
        /// Components currently reporting degraded health.
        degraded: Vec<String>,
    },
}

impl Event {
    /// Machine-friendly discriminator used for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EditStarted { .. } => "edit_started",
            Self::EditProgress { .. } => "edit_progress",
            Self::EditCompleted { .. } => "edit_completed",
            Self::EditFailed { .. } => "edit_failed",
            Self::EditSkipped { .. } => "edit_skipped",
            Self::HealthChanged { .. } => "health_changed",
        }
    }
}

/// Metadata wrapper tracking the event id and emission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned by the bus.
    pub id: EventId,
    /// Time the event was published.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}
