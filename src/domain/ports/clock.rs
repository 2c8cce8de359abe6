//! Wall-clock port.
//!
//! Time-window checks read the lab's local time through this trait so that
//! tests can pin the hour.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeZone, Timelike};

pub trait Clock: Send + Sync {
    /// Current lab-local time
    fn now(&self) -> DateTime<FixedOffset>;

    fn hour(&self) -> u32 {
        self.now().hour()
    }
}

/// Clock backed by the host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<FixedOffset>);

impl FixedClock {
    pub fn new(at: DateTime<FixedOffset>) -> Self {
        Self(at)
    }

    /// 2025-01-15 at `hour:00` UTC.
    pub fn at_hour(hour: u32) -> Self {
        let at = NaiveDate::from_ymd_opt(2025, 1, 15)
            .and_then(|date| date.and_hms_opt(hour % 24, 0, 0))
            .map(|naive| FixedOffset::east_opt(0).map(|utc| utc.from_utc_datetime(&naive)));
        match at.flatten() {
            Some(at) => Self(at),
            None => Self(Local::now().fixed_offset()),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
