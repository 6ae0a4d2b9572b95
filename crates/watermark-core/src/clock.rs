// # Clock
//
// "Today" and the processing timestamp are read through this trait so that
// resolution and merging can be tested against a fixed calendar.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

/// Source of the current local date and time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;

    /// Current local date.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Wall clock in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: NaiveDateTime,
}

impl FixedClock {
    /// Pin the clock to `now`.
    pub const fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    /// Pin the clock to noon on `date`.
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN) + chrono::Duration::hours(12))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now
    }
}

/// Drop sub-second precision; the log only stores whole seconds.
pub(crate) fn whole_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}
