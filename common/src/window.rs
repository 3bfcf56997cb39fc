// Query windows for the two scheduling use-cases
//
// Both functions are pure: the same inputs always give the same bounds.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Missions whose estimated execution time is at or before `until`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyWindow {
    pub until: NaiveDateTime,
}

impl ReadyWindow {
    pub fn contains(&self, estimated: NaiveDateTime) -> bool {
        estimated <= self.until
    }
}

/// Missions with `after < estimated <= until`
///
/// The lower bound is open and sits one minute below the upper bound, so two
/// polls one minute apart never select the same mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingWindow {
    pub after: NaiveDateTime,
    pub until: NaiveDateTime,
}

impl UpcomingWindow {
    pub fn contains(&self, estimated: NaiveDateTime) -> bool {
        self.after < estimated && estimated <= self.until
    }
}

/// Window for missions ready to execute at `now`
pub fn ready_window(now: NaiveDateTime) -> ReadyWindow {
    ReadyWindow { until: now }
}

/// Window for missions starting in `minutes_before_execution` minutes
///
/// `None` when either bound falls outside the representable calendar range.
/// `minutes_before_execution` must be positive; configuration validation enforces it.
pub fn upcoming_window(
    now: NaiveDateTime,
    minutes_before_execution: i64,
) -> Option<UpcomingWindow> {
    let lead = Duration::try_minutes(minutes_before_execution)?;
    let until = now.checked_add_signed(lead)?;
    let after = until.checked_sub_signed(Duration::minutes(1))?;
    Some(UpcomingWindow { after, until })
}
