//! Domain types for dreamlog
//!
//! - Dream: the persisted journal entry, plus its create/patch shapes
//! - Mood: 0..=5 rating with labels
//! - DreamEvent: change notifications carried by the event bus

pub mod dream;
pub mod event;
pub mod mood;

pub use dream::{Dream, DreamPatch, NewDream};
pub use event::{DreamEvent, EventKind, event_names};
pub use mood::Mood;
