//! Wall clock abstraction and calendar helpers.
//!
//! Every time comparison in the engine goes through a [`Clock`] so that
//! streaks and quest regeneration can be driven deterministically in tests.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Calendar arithmetic in the learner's local offset.
#[derive(Debug, Clone, Copy)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl Calendar {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Build a calendar from an offset in minutes east of UTC.
    /// Out-of-range offsets fall back to UTC.
    pub fn from_offset_minutes(minutes: i32) -> Self {
        match FixedOffset::east_opt(minutes.saturating_mul(60)) {
            Some(offset) => Self { offset },
            None => Self::utc(),
        }
    }

    /// The local calendar day containing `ts`.
    pub fn day_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    /// Whole calendar days from `earlier` to `later` (negative if reversed).
    pub fn days_between(&self, earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
        (self.day_of(later) - self.day_of(earlier)).num_days()
    }

    /// ISO (year, week) pair of the local day containing `ts`.
    pub fn week_of(&self, ts: DateTime<Utc>) -> (i32, u32) {
        let week = self.day_of(ts).iso_week();
        (week.year(), week.week())
    }

    /// Start of the next local day after `ts`, in UTC.
    pub fn next_day_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let next = self.day_of(ts) + Duration::days(1);
        self.local_midnight(next)
    }

    /// Start of the next ISO week (Monday 00:00 local) after `ts`, in UTC.
    pub fn next_week_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let day = self.day_of(ts);
        let days_to_monday = 7 - i64::from(day.weekday().num_days_from_monday());
        self.local_midnight(day + Duration::days(days_to_monday))
    }

    fn local_midnight(&self, day: NaiveDate) -> DateTime<Utc> {
        let midnight = day.and_hms_opt(0, 0, 0).unwrap_or_default();
        self.offset
            .from_local_datetime(&midnight)
            .single()
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
    }
}
