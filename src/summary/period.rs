//! Time periods and timestamps accepted in requests.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use regex::Regex;

use crate::errors::ValidationError;

/// `'%Y-%m-%d %H:%M:%S'`, the layout used in payloads and file names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static PERIOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*([mhdw])\s*$").unwrap());

/// Parse `"30m"`, `"6h"`, `"1d"` or `"2w"` into a duration.
pub fn parse_time_period(period: &str) -> Result<Duration, ValidationError> {
    let invalid = || ValidationError::InvalidTimePeriod(period.to_string());
    let caps = PERIOD_RE.captures(period).ok_or_else(invalid)?;
    let amount: i64 = caps[1].parse().map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid());
    }
    let duration = match &caps[2] {
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        _ => None,
    };
    duration.ok_or_else(invalid)
}

/// The instant `period` before `end`.
pub fn time_for_dating_back(
    end: DateTime<Utc>,
    period: &str,
) -> Result<DateTime<Utc>, ValidationError> {
    let duration = parse_time_period(period)?;
    end.checked_sub_signed(duration)
        .ok_or_else(|| ValidationError::InvalidTimePeriod(period.to_string()))
}

/// Parse `"now"`, an RFC 3339 timestamp, or a naive `YYYY-MM-DD HH:MM:SS`
/// (also with a `T` separator) taken as UTC. `"now"` is truncated to whole
/// seconds.
pub fn parse_endtime(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("now") {
        return Ok(now.trunc_subsecs(0));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(ValidationError::InvalidTimestamp(value.to_string()))
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}
