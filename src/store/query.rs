//! List options and the predicates they compile to.
//!
//! Every optional filter becomes one `Predicate`; predicates render to SQL
//! fragments with `?` placeholders and are ANDed together. User input only
//! ever travels as a bound parameter.

use chrono::{DateTime, NaiveDate};
use rusqlite::types::Value;

use crate::domain::Mood;
use crate::error::{DreamError, Result};

/// Default page size for list queries
pub const DEFAULT_LIMIT: u32 = 20;

/// Direction applied to both sort keys at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = DreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(DreamError::Query(format!("unknown sort order '{}'", other))),
        }
    }
}

/// Inclusive mood bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoodRange {
    pub min: Mood,
    pub max: Mood,
}

impl MoodRange {
    pub fn new(min: Mood, max: Mood) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, mood: Mood) -> bool {
        self.min <= mood && mood <= self.max
    }
}

/// Inclusive bounds on the `date` column, both RFC 3339
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// Options accepted by `list_dreams`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub sort_order: SortOrder,
    pub limit: u32,
    pub offset: u32,
    /// Case-insensitive substring on title OR description
    pub search: Option<String>,
    /// Calendar day of `date`, time of day ignored
    pub date: Option<NaiveDate>,
    pub favorite: Option<bool>,
    pub mood_range: Option<MoodRange>,
    pub date_range: Option<DateRange>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            sort_order: SortOrder::default(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            search: None,
            date: None,
            favorite: None,
            mood_range: None,
            date_range: None,
        }
    }
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
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

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Compile the set filters into predicates, rejecting impossible ranges.
    pub fn predicates(&self) -> Result<Vec<Predicate>> {
        let mut predicates = Vec::new();

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            predicates.push(Predicate::Search(search.to_string()));
        }
        if let Some(day) = self.date {
            predicates.push(Predicate::Day(day));
        }
        if let Some(favorite) = self.favorite {
            predicates.push(Predicate::Favorite(favorite));
        }
        if let Some(range) = self.mood_range {
            if range.min > range.max {
                return Err(DreamError::Query(format!(
                    "mood range {}..{} is inverted",
                    range.min.level(),
                    range.max.level()
                )));
            }
            predicates.push(Predicate::MoodBetween(range.min, range.max));
        }
        if let Some(range) = &self.date_range {
            for bound in [&range.start, &range.end] {
                DateTime::parse_from_rfc3339(bound)
                    .map_err(|e| DreamError::Query(format!("date bound '{}' is not RFC 3339: {}", bound, e)))?;
            }
            predicates.push(Predicate::DateBetween(range.start.clone(), range.end.clone()));
        }

        Ok(predicates)
    }
}

/// One filter condition over the dreams table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Search(String),
    /// Calendar day as written in the stored text, using its own offset;
    /// the value is not converted to UTC first
    Day(NaiveDate),
    Favorite(bool),
    MoodBetween(Mood, Mood),
    DateBetween(String, String),
}

impl Predicate {
    /// SQL fragment with positional placeholders
    pub fn sql(&self) -> &'static str {
        match self {
            Predicate::Search(_) => r"(title LIKE ? ESCAPE '\' OR description LIKE ? ESCAPE '\')",
            Predicate::Day(_) => "substr(date, 1, 10) = ?",
            Predicate::Favorite(_) => "favorite = ?",
            Predicate::MoodBetween(_, _) => "mood BETWEEN ? AND ?",
            Predicate::DateBetween(_, _) => "julianday(date) BETWEEN julianday(?) AND julianday(?)",
        }
    }

    /// Values for the placeholders in `sql()`, in order
    pub fn params(&self) -> Vec<Value> {
        match self {
            Predicate::Search(needle) => {
                let pattern = format!("%{}%", escape_like(needle));
                vec![Value::Text(pattern.clone()), Value::Text(pattern)]
            }
            Predicate::Day(day) => vec![Value::Text(day.format("%Y-%m-%d").to_string())],
            Predicate::Favorite(favorite) => vec![Value::Integer(i64::from(*favorite))],
            Predicate::MoodBetween(min, max) => vec![Value::Integer(min.level()), Value::Integer(max.level())],
            Predicate::DateBetween(start, end) => vec![Value::Text(start.clone()), Value::Text(end.clone())],
        }
    }
}

/// Rendered `WHERE` clause plus its parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

impl WhereClause {
    pub fn from_predicates(predicates: &[Predicate]) -> Self {
        if predicates.is_empty() {
            return Self::default();
        }
        let fragments: Vec<&str> = predicates.iter().map(Predicate::sql).collect();
        let params = predicates.iter().flat_map(Predicate::params).collect();
        Self {
            sql: format!(" WHERE {}", fragments.join(" AND ")),
            params,
        }
    }
}

/// Escape LIKE wildcards so the needle matches literally
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
