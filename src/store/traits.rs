//! Repository trait the view cache is written against.
//!
//! `DreamStore` is the SQLite implementation; tests substitute doubles.

use async_trait::async_trait;

use crate::domain::{Dream, DreamPatch, NewDream};
use crate::error::Result;
use crate::store::query::ListOptions;

/// Result of a partial update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Row changed; carries the new `updated_at`
    Updated { updated_at: String },
    /// No row has this id
    NotFound,
}

impl UpdateOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, UpdateOutcome::Updated { .. })
    }
}

/// CRUD and query operations over the dreams table.
#[async_trait]
pub trait DreamRepository: Send + Sync {
    /// Ordered, filtered page of dreams.
    async fn list_dreams(&self, options: &ListOptions) -> Result<Vec<Dream>>;

    /// Number of dreams matching the filters; limit and offset are ignored.
    async fn count_dreams(&self, options: &ListOptions) -> Result<u64>;

    /// Every stored `date`, unfiltered.
    async fn list_all_dream_dates(&self) -> Result<Vec<String>>;

    /// `None` when no row has this id.
    async fn get_dream_by_id(&self, id: &str) -> Result<Option<Dream>>;

    /// Insert a dream, stamping `created_at` and `updated_at`.
    async fn create_dream(&self, dream: NewDream) -> Result<Dream>;

    /// Merge `patch` into the row and bump `updated_at`.
    async fn update_dream(&self, id: &str, patch: &DreamPatch) -> Result<UpdateOutcome>;

    /// Remove the row; `false` if there was nothing to remove.
    async fn delete_dream(&self, id: &str) -> Result<bool>;
}
