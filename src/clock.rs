use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Resolves "today" in the deployment's fixed civil-time zone.
///
/// Every date rule in the booking lifecycle (cancellation windows, return
/// windows, expiration) compares civil dates in this zone, never UTC dates:
/// a booking ending June 4th is overdue at June 5th *local* midnight.
#[derive(Debug, Clone, Copy)]
pub struct CivilClock {
    offset: FixedOffset,
}

impl CivilClock {
    /// # Panics
    /// Panics if `offset_hours` is not a valid UTC offset; `Config::from_env`
    /// bounds-checks it first.
    #[must_use]
    pub fn from_offset_hours(offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(offset_hours * 3600)
            .expect("offset must be within +/-23 hours");
        Self { offset }
    }

    /// Current civil date in the configured zone.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    /// Civil date of an arbitrary instant in the configured zone.
    #[must_use]
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}
