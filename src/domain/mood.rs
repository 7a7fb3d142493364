//! Mood levels attached to a dream.
//!
//! Stored as an integer 0..=5 in the `mood` column and serialized the same
//! way; 0 means the dreamer did not rate it.

use serde::{Deserialize, Serialize};

use crate::error::DreamError;

/// How the dream felt, from unknown (0) to very positive (5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Mood {
    /// No mood recorded
    Unknown = 0,
    /// Disturbing or unpleasant
    VeryNegative = 1,
    /// Slightly uncomfortable
    Negative = 2,
    /// Neither good nor bad
    Neutral = 3,
    /// Pleasant experience
    Positive = 4,
    /// Amazing experience
    VeryPositive = 5,
}

impl Mood {
    pub const MIN_LEVEL: i64 = 0;
    pub const MAX_LEVEL: i64 = 5;

    /// All moods in ascending level order
    pub const ALL: [Mood; 6] = [
        Mood::Unknown,
        Mood::VeryNegative,
        Mood::Negative,
        Mood::Neutral,
        Mood::Positive,
        Mood::VeryPositive,
    ];

    /// Numeric level as stored in the database
    pub fn level(self) -> i64 {
        self as i64
    }

    /// Map any integer onto a mood, clamping out-of-range values into 0..=5
    pub fn from_level_clamped(level: i64) -> Self {
        let clamped = level.clamp(Self::MIN_LEVEL, Self::MAX_LEVEL);
        Self::ALL[clamped as usize]
    }

    /// Short human label
    pub fn label(self) -> &'static str {
        match self {
            Mood::Unknown => "Unknown",
            Mood::VeryNegative => "Very Negative",
            Mood::Negative => "Negative",
            Mood::Neutral => "Neutral",
            Mood::Positive => "Positive",
            Mood::VeryPositive => "Very Positive",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Mood::Unknown => "😶",
            Mood::VeryNegative => "😢",
            Mood::Negative => "😕",
            Mood::Neutral => "😐",
            Mood::Positive => "😊",
            Mood::VeryPositive => "🤩",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Mood::Unknown => "No mood recorded",
            Mood::VeryNegative => "Disturbing or unpleasant",
            Mood::Negative => "Slightly uncomfortable",
            Mood::Neutral => "Neither good nor bad",
            Mood::Positive => "Pleasant experience",
            Mood::VeryPositive => "Amazing experience",
        }
    }
}

impl TryFrom<i64> for Mood {
    type Error = DreamError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        if (Self::MIN_LEVEL..=Self::MAX_LEVEL).contains(&level) {
            Ok(Self::ALL[level as usize])
        } else {
            Err(DreamError::Validation(format!("mood level {} is outside 0..=5", level)))
        }
    }
}

impl From<Mood> for i64 {
    fn from(mood: Mood) -> Self {
        mood.level()
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.emoji(), self.label())
    }
}
