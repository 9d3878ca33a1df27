//! Date helpers behind the daily job and batch defaults.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use swath_common::{time::WINDOW_START_HOUR, DayKey};

/// Yesterday in UTC, the most recent day whose window can be complete.
pub fn previous_day(now: DateTime<Utc>) -> DayKey {
    DayKey::from_time(now).previous()
}

/// Time left until today's noon UTC, or zero once it has passed.
pub fn until_noon_utc(now: DateTime<Utc>) -> Duration {
    let Some(noon) = now.date_naive().and_hms_opt(WINDOW_START_HOUR, 0, 0) else {
        return Duration::ZERO;
    };
    (noon.and_utc() - now).to_std().unwrap_or(Duration::ZERO)
}

/// First day of a batch that ends on `end` and covers `lookback_days` before it.
pub fn lookback_start(end: DayKey, lookback_days: u32) -> DayKey {
    DayKey::new(end.date() - ChronoDuration::days(i64::from(lookback_days)))
}
