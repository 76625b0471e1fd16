use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::errors::{AppError, AppResult};

/// A booked half-open range `[start, end)` as exposed by the blocked-dates
/// query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockedRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A booking interval must be a non-empty half-open range: `end` strictly
/// after `start`. Rejected before any storage access.
///
/// # Errors
/// Returns a validation error for equal or inverted dates.
pub fn validate_range(start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    if end <= start {
        return Err(AppError::Validation("invalid date range".into()));
    }
    Ok(())
}

/// Half-open interval overlap: `[a_start, a_end)` intersects
/// `[b_start, b_end)`. Touching intervals (`a_end == b_start`) do not
/// conflict, so back-to-back bookings are allowed.
#[must_use]
pub fn ranges_conflict(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Expand blocked ranges into the individual civil dates they cover,
/// end exclusive, deduplicated and sorted.
#[must_use]
pub fn expand_ranges(ranges: &[BlockedRange]) -> Vec<NaiveDate> {
    let mut dates = BTreeSet::new();
    for r in ranges {
        let mut cur = r.start;
        while cur < r.end {
            dates.insert(cur);
            cur = cur + Days::new(1);
        }
    }
    dates.into_iter().collect()
}

/// SQL fragment selecting only bookings that still reserve the calendar.
/// Must stay in sync with `BookingStatus::is_inactive`.
pub const ACTIVE_STATUS_SQL: &str = "status NOT IN ('CLOSED', 'REJECTED', 'EXPIRED')";
