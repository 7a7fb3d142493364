//! Dreamlog - local persistence core for a dream journal
//!
//! Dreams live in a single SQLite table behind `store::DreamStore`. Screens
//! read through `cache::ViewCache`, a paginated in-memory mirror; caches
//! stay in step with each other through the typed `events::EventBus`.

pub mod cache;
pub mod domain;
pub mod error;
pub mod events;
pub mod id;
pub mod insights;
pub mod store;

pub use error::{DreamError, Result};
