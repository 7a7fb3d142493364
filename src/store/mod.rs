//! Record store for dreamlog.
//!
//! A single `dreams` table in an embedded SQLite file. `DreamStore` owns the
//! connection; callers get typed rows back and build filters through
//! `ListOptions`.
//!
//! # Example
//!
//! ```ignore
//! use dreamlog::store::{DreamStore, DreamRepository, ListOptions};
//! use dreamlog::domain::NewDream;
//!
//! let store = DreamStore::open(Path::new("dreams.db"))?;
//! store.create_dream(NewDream::new("Flying over mountains", "2024-03-01T10:00:00Z")).await?;
//! let page = store.list_dreams(&ListOptions::new().search("fly")).await?;
//! ```

mod dream_store;
pub mod query;
mod traits;

pub use dream_store::DreamStore;
pub use query::{DEFAULT_LIMIT, DateRange, ListOptions, MoodRange, Predicate, SortOrder};
pub use traits::{DreamRepository, UpdateOutcome};
