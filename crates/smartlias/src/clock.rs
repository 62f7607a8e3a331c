//! Time source and Manila-local date helpers.
//!
//! Everything is stored in UTC. The barangay operates on Philippine time
//! (UTC+08:00, no daylight saving), which matters for "today" in age
//! calculations and for user-facing timestamps.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};

/// Offset of Asia/Manila from UTC, in seconds.
pub const MANILA_OFFSET_SECS: i32 = 8 * 60 * 60;

/// The fixed Asia/Manila offset.
///
/// # Panics
///
/// Never in practice: the offset is a compile-time constant well inside
/// chrono's accepted range.
#[must_use]
pub fn manila_offset() -> FixedOffset {
    FixedOffset::east_opt(MANILA_OFFSET_SECS).expect("UTC+08:00 is a valid offset")
}

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date in Manila.
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&manila_offset()).date_naive()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Shared between clones.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map_or_else(|p| *p.into_inner(), |now| *now)
    }
}

/// Whole years between `birth_date` and `today`.
///
/// Returns `None` when the birth date lies in the future.
#[must_use]
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut years = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Format a UTC instant as Manila local time, `YYYY-MM-DD HH:MM:SS`.
#[must_use]
pub fn format_manila(at: DateTime<Utc>) -> String {
    at.with_timezone(&manila_offset())
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
