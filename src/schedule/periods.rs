//! Fixed historical windows that scheduled summaries cover.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::Serialize;
use tracing::debug;

use crate::summary::period::{format_date, format_timestamp};

/// One window to summarize, `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct JobPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl JobPeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `"YYYY-MM-DD_YYYY-MM-DD"`, used for result file names.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", format_date(self.start), format_date(self.end))
    }

    /// `"YYYY-MM-DD_to_YYYY-MM-DD"`.
    pub fn document_id(&self) -> String {
        format!("{}_to_{}", format_date(self.start), format_date(self.end))
    }
}

impl fmt::Display for JobPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            format_timestamp(self.start),
            format_timestamp(self.end)
        )
    }
}

/// Days after the start day that a period opened on `weekday` lasts, if
/// a period opens on that day at all.
fn span_days(weekday: Weekday) -> Option<i64> {
    match weekday {
        Weekday::Thu => Some(2),
        Weekday::Sun => Some(3),
        Weekday::Wed => Some(1),
        _ => None,
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    // 23:59:59 always exists
    date.and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|| start_of_day(date))
}

/// Periods opening between `start` and `end` inclusive:
/// Thursday to Saturday, Sunday to Wednesday, Wednesday to Thursday.
/// Each runs from 00:00:00 on its first day to 23:59:59 on its last.
pub fn generate_job_periods(start: NaiveDate, end: NaiveDate) -> Vec<JobPeriod> {
    let mut periods: Vec<JobPeriod> = Vec::new();
    for day in start.iter_days().take_while(|d| *d <= end) {
        let Some(days) = span_days(day.weekday()) else {
            continue;
        };
        let period = JobPeriod::new(start_of_day(day), end_of_day(day + Duration::days(days)));
        if periods.contains(&period) {
            debug!(%period, "Skipping period already in list");
        } else {
            debug!(%period, "Added period");
            periods.push(period);
        }
    }
    periods
}
