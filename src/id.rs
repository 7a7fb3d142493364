//! ID and timestamp utilities for dreamlog
//!
//! Dream ids are minted client-side before a record reaches the store.
//! Record timestamps come from [`StampClock`], which never hands out the
//! same instant twice.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generate a unique dream ID
///
/// Format: `{timestamp_ms}-{random_hex}`
/// Example: `1738300800123-a1b2c3d4`
pub fn generate_dream_id() -> String {
    let timestamp = now_ms();
    let random: u32 = rand::rng().random();
    format!("{}-{:08x}", timestamp, random)
}

/// Render an instant the way dreamlog stores it: RFC 3339, UTC, microseconds.
///
/// Fixed width, so lexical order on the text column matches chronological order.
pub fn format_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Monotonic source of `created_at` / `updated_at` stamps.
///
/// Two calls never return the same instant; a call landing in the same
/// microsecond as (or before) the previous one is pushed forward by 1µs.
#[derive(Debug, Default)]
pub struct StampClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl StampClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock whose first stamp sorts after `floor`, e.g. the newest stamp
    /// already on disk.
    pub fn starting_after(floor: DateTime<Utc>) -> Self {
        Self {
            last: Mutex::new(Some(floor)),
        }
    }

    /// Next stamp, strictly after every stamp this clock issued before.
    pub fn next(&self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let stamp = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }

    /// Next stamp rendered with [`format_stamp`].
    pub fn next_string(&self) -> String {
        format_stamp(self.next())
    }
}
