//! The Dream record and its write-side shapes.
//!
//! - `Dream`: a row as stored, timestamps included
//! - `NewDream`: what a caller supplies to create one (id minted client-side)
//! - `DreamPatch`: a partial update; only `Some` fields change

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::mood::Mood;
use crate::error::{DreamError, Result};
use crate::id::generate_dream_id;

/// A persisted dream journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dream {
    /// Client-generated primary key, immutable
    pub id: String,
    pub title: Option<String>,
    /// Never empty once persisted
    pub description: String,
    /// When the dream happened (RFC 3339), distinct from `created_at`
    pub date: String,
    pub mood: Option<Mood>,
    /// Local image URIs, opaque to the store
    pub images: Vec<String>,
    /// Local voice memo URI, opaque to the store
    pub audio_url: Option<String>,
    pub favorite: bool,
    /// Stamped by the store at insert
    pub created_at: String,
    /// Stamped by the store on every update
    pub updated_at: String,
}

impl Dream {
    /// Parsed occurrence time; `None` when the stored text is not RFC 3339
    pub fn occurred_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.date).ok()
    }

    /// Calendar day of `date` as written (its own offset, not converted)
    pub fn day(&self) -> Option<NaiveDate> {
        self.occurred_at().map(|at| at.date_naive())
    }

    /// Title if present and non-blank, otherwise the first line of the description
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => self.description.lines().next().unwrap_or(""),
        }
    }

    /// Merge the fields a patch carries into this record.
    ///
    /// Timestamps are left alone; the store owns them.
    pub fn apply(&mut self, patch: &DreamPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(date) = &patch.date {
            self.date = date.clone();
        }
        if let Some(mood) = patch.mood {
            self.mood = mood;
        }
        if let Some(images) = &patch.images {
            self.images = images.clone();
        }
        if let Some(audio_url) = &patch.audio_url {
            self.audio_url = audio_url.clone();
        }
        if let Some(favorite) = patch.favorite {
            self.favorite = favorite;
        }
    }
}

/// Fields supplied when creating a dream. `created_at`/`updated_at` are not
/// caller-controlled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDream {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub description: String,
    pub date: String,
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub favorite: bool,
}

impl NewDream {
    /// New dream with a freshly minted id
    pub fn new(description: impl Into<String>, date: impl Into<String>) -> Self {
        Self::with_id(generate_dream_id(), description, date)
    }

    pub fn with_id(id: impl Into<String>, description: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: description.into(),
            date: date.into(),
            mood: None,
            images: Vec::new(),
            audio_url: None,
            favorite: false,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn mood(mut self, mood: Mood) -> Self {
        self.mood = Some(mood);
        self
    }

    pub fn images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn audio_url(mut self, audio_url: impl Into<String>) -> Self {
        self.audio_url = Some(audio_url.into());
        self
    }

    pub fn favorite(mut self, favorite: bool) -> Self {
        self.favorite = favorite;
        self
    }

    /// Reject records the store must never hold
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DreamError::Validation("id must not be empty".to_string()));
        }
        validate_description(&self.description)?;
        validate_date(&self.date)
    }
}

/// Partial update: `None` leaves a field untouched.
///
/// Nullable columns use `Option<Option<_>>` so a patch can clear them
/// (`Some(None)`) as well as set them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DreamPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Option<Mood>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
}

impl DreamPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: Option<String>) -> Self {
        self.title = Some(title);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn mood(mut self, mood: Option<Mood>) -> Self {
        self.mood = Some(mood);
        self
    }

    pub fn images(mut self, images: Vec<String>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn audio_url(mut self, audio_url: Option<String>) -> Self {
        self.audio_url = Some(audio_url);
        self
    }

    pub fn favorite(mut self, favorite: bool) -> Self {
        self.favorite = Some(favorite);
        self
    }

    /// True when no field would change
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Touches a column the list is ordered by
    pub fn touches_sort_key(&self) -> bool {
        self.date.is_some()
    }

    /// Touches a column the substring search reads
    pub fn touches_search_text(&self) -> bool {
        self.title.is_some() || self.description.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(date) = &self.date {
            validate_date(date)?;
        }
        Ok(())
    }
}

fn validate_description(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(DreamError::Validation("description must not be empty".to_string()));
    }
    Ok(())
}

fn validate_date(date: &str) -> Result<()> {
    DateTime::parse_from_rfc3339(date)
        .map(|_| ())
        .map_err(|e| DreamError::Validation(format!("date '{}' is not RFC 3339: {}", date, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dream {
        Dream {
            id: "a1".to_string(),
            title: Some("Mountains".to_string()),
            description: "Flying over mountains".to_string(),
            date: "2024-03-01T10:00:00Z".to_string(),
            mood: Some(Mood::VeryPositive),
            images: vec![],
            audio_url: None,
            favorite: false,
            created_at: "2024-03-01T10:05:00.000000Z".to_string(),
            updated_at: "2024-03-01T10:05:00.000000Z".to_string(),
        }
    }

    #[test]
    fn test_new_dream_builder() {
        let dream = NewDream::with_id("a1", "Flying", "2024-03-01T10:00:00Z")
            .title("Sky")
            .mood(Mood::Positive)
            .favorite(true);
        assert_eq!(dream.id, "a1");
        assert_eq!(dream.title.as_deref(), Some("Sky"));
        assert_eq!(dream.mood, Some(Mood::Positive));
        assert!(dream.favorite);
        assert!(dream.validate().is_ok());
    }

    #[test]
    fn test_new_dream_mints_id() {
        let a = NewDream::new("one", "2024-03-01T10:00:00Z");
        let b = NewDream::new("two", "2024-03-01T10:00:00Z");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_validate_rejects_blank_description() {
        let dream = NewDream::with_id("a1", "   ", "2024-03-01T10:00:00Z");
        assert!(matches!(dream.validate(), Err(DreamError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_bad_date() {
        let dream = NewDream::with_id("a1", "text", "last tuesday");
        assert!(matches!(dream.validate(), Err(DreamError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_blank_id() {
        let dream = NewDream::with_id("", "text", "2024-03-01T10:00:00Z");
        assert!(dream.validate().is_err());
    }

    #[test]
    fn test_apply_patch_only_touches_given_fields() {
        let mut dream = sample();
        let patch = DreamPatch::new().favorite(true).audio_url(Some("file:///memo.m4a".to_string()));
        dream.apply(&patch);

        assert!(dream.favorite);
        assert_eq!(dream.audio_url.as_deref(), Some("file:///memo.m4a"));
        assert_eq!(dream.title.as_deref(), Some("Mountains"));
        assert_eq!(dream.description, "Flying over mountains");
        assert_eq!(dream.updated_at, "2024-03-01T10:05:00.000000Z");
    }

    #[test]
    fn test_apply_patch_can_clear_nullable_fields() {
        let mut dream = sample();
        dream.apply(&DreamPatch::new().title(None).mood(None));
        assert_eq!(dream.title, None);
        assert_eq!(dream.mood, None);
    }

    #[test]
    fn test_patch_serialization_skips_untouched() {
        let patch = DreamPatch::new().favorite(true);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "favorite": true }));
        assert!(DreamPatch::new().is_empty());
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_patch_field_classification() {
        assert!(DreamPatch::new().date("2024-03-02T00:00:00Z").touches_sort_key());
        assert!(DreamPatch::new().description("x").touches_search_text());
        assert!(!DreamPatch::new().favorite(true).touches_search_text());
    }

    #[test]
    fn test_day_and_display_title() {
        let mut dream = sample();
        assert_eq!(dream.day(), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(dream.display_title(), "Mountains");
        dream.title = Some("  ".to_string());
        assert_eq!(dream.display_title(), "Flying over mountains");
    }
}
