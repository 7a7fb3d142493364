//! Filters a view cache was last refreshed with.

use chrono::NaiveDate;

use crate::domain::{DreamPatch, Mood};
use crate::store::{ListOptions, MoodRange, SortOrder};

/// What a screen is looking at. Changing any of these restarts paging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheFilters {
    pub search: Option<String>,
    pub date: Option<NaiveDate>,
    pub favorite: Option<bool>,
    pub mood_range: Option<MoodRange>,
    pub sort_order: SortOrder,
}

impl CacheFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn date(mut self, day: NaiveDate) -> Self {
        self.date = Some(day);
        self
    }

    pub fn favorite(mut self, favorite: bool) -> Self {
        self.favorite = Some(favorite);
        self
    }

    pub fn mood_range(mut self, min: Mood, max: Mood) -> Self {
        self.mood_range = Some(MoodRange::new(min, max));
        self
    }

    pub fn sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Store query for the page starting at `offset`
    pub fn list_options(&self, limit: u32, offset: u32) -> ListOptions {
        ListOptions {
            sort_order: self.sort_order,
            limit,
            offset,
            search: self.search.clone(),
            date: self.date,
            favorite: self.favorite,
            mood_range: self.mood_range,
            date_range: None,
        }
    }

    /// Whether applying `patch` in place could leave this view out of order
    /// or holding rows it should not (or missing rows it should).
    pub fn affected_by(&self, patch: &DreamPatch) -> bool {
        let has_search = self.search.as_deref().is_some_and(|s| !s.is_empty());
        patch.touches_sort_key()
            || (has_search && patch.touches_search_text())
            || (self.favorite.is_some() && patch.favorite.is_some())
            || (self.mood_range.is_some() && patch.mood.is_some())
    }
}
