//! Day keys and data windows.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SwathError;

/// Hour of day (UTC) at which a day's data window opens.
pub const WINDOW_START_HOUR: u32 = 12;

/// Calendar date identifying one Day Record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The day a timestamp falls on, in UTC.
    pub fn from_time(time: DateTime<Utc>) -> Self {
        Self(time.date_naive())
    }

    /// Parse a strict `YYYY-MM-DD` date.
    pub fn parse(s: &str) -> Result<Self, SwathError> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|e| SwathError::InvalidTime(format!("'{}' is not a YYYY-MM-DD date: {}", s, e)))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn previous(&self) -> Self {
        Self(self.0 - Duration::days(1))
    }

    pub fn next(&self) -> Self {
        Self(self.0 + Duration::days(1))
    }

    /// Compact form used in object storage prefixes, e.g. `20240501`.
    pub fn compact(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }

    /// The noon-to-noon UTC window starting on this date.
    pub fn data_window(&self) -> DataWindow {
        DataWindow::for_day(*self)
    }

    /// Every day from `start` to `end`, both inclusive. Empty if `start > end`.
    pub fn range_inclusive(start: DayKey, end: DayKey) -> Vec<DayKey> {
        let mut days = Vec::new();
        let mut current = start;
        while current <= end {
            days.push(current);
            current = current.next();
        }
        days
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = SwathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Inclusive time window `[start, end]` of source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DataWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Noon UTC on `day` through noon UTC on the following day.
    pub fn for_day(day: DayKey) -> Self {
        let noon = day
            .date()
            .and_hms_opt(WINDOW_START_HOUR, 0, 0)
            .unwrap_or_default();
        let start = Utc.from_utc_datetime(&noon);
        Self {
            start,
            end: start + Duration::hours(24),
        }
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time <= self.end
    }

    /// Calendar dates touched by the window, used to build per-date listing prefixes.
    pub fn days(&self) -> Vec<DayKey> {
        DayKey::range_inclusive(DayKey::from_time(self.start), DayKey::from_time(self.end))
    }

    pub fn start_string(&self) -> String {
        format_time(self.start)
    }

    pub fn end_string(&self) -> String {
        format_time(self.end)
    }
}

/// RFC 3339 with second precision and a `Z` suffix.
pub fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an ISO 8601 timestamp. Offsets are honored; naive values are taken as UTC.
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, SwathError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(SwathError::InvalidTime(format!("'{}' is not an ISO 8601 time", s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_day_key_round_trip() {
        let day = DayKey::parse("2024-05-01").unwrap();
        assert_eq!(day.to_string(), "2024-05-01");
        assert_eq!(day.compact(), "20240501");
        assert!(DayKey::parse("2024-13-01").is_err());
        assert!(DayKey::parse("05/01/2024").is_err());
    }

    #[test]
    fn test_window_is_noon_to_noon() {
        let window = DayKey::parse("2024-05-01").unwrap().data_window();
        assert_eq!(window.start_string(), "2024-05-01T12:00:00Z");
        assert_eq!(window.end_string(), "2024-05-02T12:00:00Z");
        let days: Vec<String> = window.days().iter().map(|d| d.to_string()).collect();
        assert_eq!(days, vec!["2024-05-01", "2024-05-02"]);
    }

    #[test]
    fn test_window_across_year_boundary() {
        let window = DayKey::parse("2023-12-31").unwrap().data_window();
        assert_eq!(window.end_string(), "2024-01-01T12:00:00Z");
    }

    #[test]
    fn test_range_inclusive() {
        let start = DayKey::parse("2024-02-27").unwrap();
        let end = DayKey::parse("2024-03-01").unwrap();
        let days = DayKey::range_inclusive(start, end);
        assert_eq!(days.len(), 4);
        assert_eq!(days[2].to_string(), "2024-02-29");
        assert!(DayKey::range_inclusive(end, start).is_empty());
    }

    #[test]
    fn test_parse_time_variants() {
        let z = parse_time("2024-05-01T18:30:00Z").unwrap();
        assert_eq!((z.hour(), z.minute()), (18, 30));

        let offset = parse_time("2024-05-01T13:30:00-05:00").unwrap();
        assert_eq!(offset, z);

        let naive = parse_time("2024-05-01T18:30:00").unwrap();
        assert_eq!(naive, z);

        let date_only = parse_time("2024-05-01").unwrap();
        assert_eq!((date_only.day(), date_only.hour()), (1, 0));

        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_day_from_time_uses_utc_date() {
        let t = parse_time("2024-05-01T23:59:59-05:00").unwrap();
        assert_eq!(DayKey::from_time(t).to_string(), "2024-05-02");
    }
}
