//! Calendar-month energy cycles.
//!
//! A cycle runs from the first instant of a month (UTC) to the last millisecond
//! before the next month starts.

use crate::errors::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};

/// The month window an energy pool accumulates usage over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleWindow {
    /// First instant of the month
    pub start: DateTime<Utc>,
    /// Last instant of the month
    pub end: DateTime<Utc>,
}

fn month_start(year: i32, month: u32) -> Result<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| Error::Config {
            message: format!("Cannot build cycle start for {year:04}-{month:02}"),
        })
}

impl CycleWindow {
    /// The cycle containing `now`.
    pub fn containing(now: DateTime<Utc>) -> Result<Self> {
        let (year, month) = (now.year(), now.month());
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };

        let start = month_start(year, month)?;
        let end = month_start(next_year, next_month)? - TimeDelta::milliseconds(1);
        Ok(Self { start, end })
    }

    /// Whether `now` is past the end of the cycle.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.end
    }

    /// Whether `at` falls inside the cycle.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}
