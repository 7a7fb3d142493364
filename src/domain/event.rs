//! Change events published after a successful store write.

use crate::domain::dream::DreamPatch;

/// Event name constants, used in log lines
pub mod event_names {
    pub const DREAM_CREATED: &str = "dream.created";
    pub const DREAM_UPDATED: &str = "dream.updated";
    pub const DREAM_DELETED: &str = "dream.deleted";
}

/// Which stream an event belongs to; subscriptions are keyed on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => event_names::DREAM_CREATED,
            EventKind::Updated => event_names::DREAM_UPDATED,
            EventKind::Deleted => event_names::DREAM_DELETED,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change to the dreams table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DreamEvent {
    /// A dream was inserted. Carries nothing: where it lands depends on each
    /// listener's sort and filters, so listeners reload.
    Created,
    /// A dream changed; `changes` holds exactly the fields that were written
    /// and `updated_at` the stamp the store gave the write
    Updated {
        id: String,
        changes: DreamPatch,
        updated_at: String,
    },
    /// A dream was removed
    Deleted { id: String },
}

impl DreamEvent {
    pub fn updated(id: &str, changes: DreamPatch, updated_at: impl Into<String>) -> Self {
        DreamEvent::Updated {
            id: id.to_string(),
            changes,
            updated_at: updated_at.into(),
        }
    }

    pub fn deleted(id: &str) -> Self {
        DreamEvent::Deleted { id: id.to_string() }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            DreamEvent::Created => EventKind::Created,
            DreamEvent::Updated { .. } => EventKind::Updated,
            DreamEvent::Deleted { .. } => EventKind::Deleted,
        }
    }

    /// Id of the affected dream, if the event names one
    pub fn dream_id(&self) -> Option<&str> {
        match self {
            DreamEvent::Created => None,
            DreamEvent::Updated { id, .. } | DreamEvent::Deleted { id } => Some(id),
        }
    }
}
