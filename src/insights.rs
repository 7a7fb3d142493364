//! Journal summaries computed over a slice of dreams.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use log::debug;
use rand::seq::IndexedRandom;
use serde::Serialize;

use crate::domain::{Dream, Mood};

/// Dreams that happened in one calendar month
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGroup {
    pub year: i32,
    pub month: u32,
    pub dreams: Vec<Dream>,
}

impl MonthGroup {
    /// e.g. "March 2024"
    pub fn label(&self) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(first) => first.format("%B %Y").to_string(),
            None => format!("{}-{:02}", self.year, self.month),
        }
    }
}

/// Bucket dreams by the month of their `date`.
///
/// Groups appear in the order their first dream appears in `dreams`, and
/// keep the input order inside each group. Dreams whose date does not parse
/// are left out.
pub fn group_by_month(dreams: &[Dream]) -> Vec<MonthGroup> {
    let mut groups: Vec<MonthGroup> = Vec::new();
    for dream in dreams {
        let Some(day) = dream.day() else {
            debug!("group_by_month: skipping {} with unparsable date", dream.id);
            continue;
        };
        match groups
            .iter_mut()
            .find(|g| g.year == day.year() && g.month == day.month())
        {
            Some(group) => group.dreams.push(dream.clone()),
            None => groups.push(MonthGroup {
                year: day.year(),
                month: day.month(),
                dreams: vec![dream.clone()],
            }),
        }
    }
    groups
}

/// Home-screen numbers for a journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalStats {
    pub total: usize,
    /// Dreams dated within the seven days before `now`
    pub last_week: usize,
    /// Rounded mean over dreams that carry a mood
    pub average_mood: Option<Mood>,
    /// Consecutive calendar days with a dream, ending at the most recent one.
    /// Counts distinct days, not 24-hour gaps; several dreams on a day count once.
    pub streak: u32,
    pub most_recent_id: Option<String>,
}

impl JournalStats {
    pub fn compute(dreams: &[Dream], now: DateTime<Utc>) -> Self {
        let week_ago = now - Duration::days(7);
        let last_week = dreams
            .iter()
            .filter_map(Dream::occurred_at)
            .filter(|at| *at > week_ago)
            .count();

        let rated: Vec<i64> = dreams.iter().filter_map(|d| d.mood).map(Mood::level).collect();
        let average_mood = if rated.is_empty() {
            None
        } else {
            let mean = rated.iter().sum::<i64>() as f64 / rated.len() as f64;
            Some(Mood::from_level_clamped(mean.round() as i64))
        };

        let most_recent = dreams
            .iter()
            .filter_map(|d| d.occurred_at().map(|at| (at, d)))
            .max_by_key(|(at, _)| *at)
            .map(|(_, d)| d);

        Self {
            total: dreams.len(),
            last_week,
            average_mood,
            streak: streak(dreams),
            most_recent_id: most_recent.map(|d| d.id.clone()),
        }
    }
}

fn streak(dreams: &[Dream]) -> u32 {
    let days: BTreeSet<NaiveDate> = dreams.iter().filter_map(Dream::day).collect();
    let mut count = 0;
    let mut expected = match days.last() {
        Some(day) => *day,
        None => return 0,
    };
    for day in days.iter().rev() {
        if *day != expected {
            break;
        }
        count += 1;
        match expected.pred_opt() {
            Some(prev) => expected = prev,
            None => break,
        }
    }
    count
}

/// A uniformly random dream, `None` for an empty journal
pub fn pick_random(dreams: &[Dream]) -> Option<&Dream> {
    dreams.choose(&mut rand::rng())
}
