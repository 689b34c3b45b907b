//! # Contest periods
//!
//! A period is a fixed Sunday-to-Saturday window in UTC. Periods are never
//! persisted; they are derived from an instant, so two callers asking about
//! the same instant always agree. Exactly one period contains any instant,
//! and consecutive periods are contiguous and non-overlapping.
//!
//! Callers that cache period-scoped data re-evaluate at least once a minute
//! and drop their caches on rollover.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestPeriod {
    /// Most recent Sunday 00:00:00.000 at or before the query instant.
    pub start: DateTime<Utc>,
    /// Following Saturday 23:59:59.999.
    pub end: DateTime<Utc>,
}

impl ContestPeriod {
    /// Closed on both ends.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// The period containing `instant`.
pub fn period_containing(instant: DateTime<Utc>) -> ContestPeriod {
    let days_from_sunday = instant.weekday().num_days_from_sunday() as i64;
    let sunday = instant.date_naive() - Duration::days(days_from_sunday);
    let start = sunday
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        .and_utc();
    let end = start + Duration::days(7) - Duration::milliseconds(1);
    ContestPeriod { start, end }
}

/// The currently active period.
pub fn active_period(now: DateTime<Utc>) -> ContestPeriod {
    period_containing(now)
}
