//! Domain events emitted by Coffer operations.
//!
//! Events are handed to an optional [`EventSink`] after an operation
//! succeeds. The sink is the notification-hook seam for an external
//! collaborator; an absent sink is a no-op.

pub mod backup;
pub mod file;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use backup::BackupEvent;
pub use file::FileEvent;

/// Wrapper for all domain events with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub payload: EventPayload,
}

/// Union of all domain event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event")]
pub enum EventPayload {
    /// A file-related event.
    File(FileEvent),
    /// A backup-related event.
    Backup(BackupEvent),
}

impl DomainEvent {
    /// Create a new domain event.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Receiver for domain events.
///
/// Implementations must not block; publication is fire-and-forget and a
/// failing sink must never fail the originating operation.
pub trait EventSink: Send + Sync + std::fmt::Debug {
    /// Deliver one event.
    fn publish(&self, event: DomainEvent);
}
