//! Visit staleness detection.
//!
//! The page counts as stale once it has gone unvisited for
//! [`STALE_AFTER`]. The monitor re-checks every [`CHECK_INTERVAL`].

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Age at which a visit becomes stale (24 hours).
pub const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Period of the staleness monitor tick (hourly).
pub const CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Visit freshness classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitSignal {
    NeverVisited,
    Fresh { age: Duration },
    Stale { age: Duration },
}

impl VisitSignal {
    pub fn is_stale(&self) -> bool {
        matches!(self, VisitSignal::Stale { .. })
    }
}

/// Classify the last visit relative to `now`. A visit timestamp in the
/// future counts as zero age.
pub fn check_visit(last_visit: Option<DateTime<Utc>>, now: DateTime<Utc>) -> VisitSignal {
    let Some(last_visit) = last_visit else {
        return VisitSignal::NeverVisited;
    };
    let age_secs = now.signed_duration_since(last_visit).num_seconds().max(0) as u64;
    let age = Duration::from_secs(age_secs);
    if age >= STALE_AFTER {
        VisitSignal::Stale { age }
    } else {
        VisitSignal::Fresh { age }
    }
}

/// Compact age such as `45s`, `12m`, `5h`, `2d`.
pub fn format_age(age: Duration) -> String {
    let seconds = age.as_secs();
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

/// Age of a stored timestamp, formatted with [`format_age`].
pub fn format_datetime_age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(timestamp).num_seconds().max(0) as u64;
    format_age(Duration::from_secs(age))
}
