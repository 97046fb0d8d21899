use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};

use crate::errors::ApiError;

/// An inclusive, day-aligned date range with its gap-free list of
/// `YYYY-MM-DD` buckets. Start is floored to day start and end is ceiled to
/// day end, so `BETWEEN` comparisons against stored timestamps cover whole
/// calendar days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub buckets: Vec<String>,
}

/// Accepts either a bare `YYYY-MM-DD` day, an RFC 3339 timestamp, or a
/// `YYYY-MM-DDTHH:MM:SS` local timestamp.
fn parse_day(input: &str) -> Result<NaiveDate, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.date_naive());
    }
    if let Ok(day) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(day);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.date());
    }
    Err(ApiError::IncorrectTimestampFormat)
}

fn buckets_between(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    let mut buckets = Vec::new();
    let mut day = start;
    while day <= end {
        buckets.push(day.format("%Y-%m-%d").to_string());
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    buckets
}

impl DateRange {
    /// Resolves an explicit start/end pair of ISO-8601 timestamps.
    pub fn resolve(start: &str, end: &str) -> Result<Self, ApiError> {
        let start_day = parse_day(start)?;
        let end_day = parse_day(end)?;

        if start_day > end_day {
            return Err(ApiError::InvalidDateOrder);
        }

        Ok(DateRange {
            start: day_start(start_day),
            end: day_end(end_day),
            buckets: buckets_between(start_day, end_day),
        })
    }

    /// Resolves a trailing range anchored at `anchor`'s day end, reaching
    /// back far enough to cover the longest requested window. Every window
    /// length must be at least 2 days.
    pub fn trailing(anchor: &str, windows: &[u32]) -> Result<Self, ApiError> {
        let anchor_day = parse_day(anchor)?;

        if windows.is_empty() || windows.iter().any(|w| *w < 2) {
            return Err(ApiError::IncorrectParameterFormat);
        }
        let max_window = *windows.iter().max().unwrap_or(&2);

        let start_day = anchor_day
            .checked_sub_days(Days::new(u64::from(max_window)))
            .ok_or(ApiError::IncorrectParameterFormat)?;

        Ok(DateRange {
            start: day_start(start_day),
            end: day_end(anchor_day),
            buckets: buckets_between(start_day, anchor_day),
        })
    }

    pub fn day_count(&self) -> usize {
        self.buckets.len()
    }

    /// Range bounds formatted for binding against stored
    /// `YYYY-MM-DD HH:MM:SS` timestamps.
    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn day_start(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(0, 0, 0).expect("midnight is always valid")
}

fn day_end(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(23, 59, 59).expect("day end is always valid")
}
