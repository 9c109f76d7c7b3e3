//! Date ranges and week arithmetic.

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone, Utc};

/// Number of working days shown per week (Monday to Friday).
pub const WORK_DAYS: u64 = 5;

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        DateRange { from, to }
    }

    pub fn day(date: NaiveDate) -> Self {
        DateRange { from: date, to: date }
    }

    /// Monday through Friday of the week containing `date`.
    pub fn work_week(date: NaiveDate) -> Self {
        let monday = monday_of(date);
        DateRange {
            from: monday,
            to: monday + Days::new(WORK_DAYS - 1),
        }
    }

    /// Monday through Sunday of the week containing `date`.
    pub fn full_week(date: NaiveDate) -> Self {
        let monday = monday_of(date);
        DateRange {
            from: monday,
            to: monday + Days::new(6),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Every date in the range, in order. Empty when `to` precedes `from`.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d <= to)
    }
}

/// The Monday of the week containing `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Days::new(date.weekday().num_days_from_monday() as u64)
}

/// Shift a date by a signed number of days, saturating at chrono's bounds.
pub fn offset_days(date: NaiveDate, days: i64) -> NaiveDate {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}

/// Local noon on `date`, as a UTC instant.
///
/// Completion records are stamped at noon so the timestamp never lands on
/// the wrong side of a date boundary.
pub fn noon_local(date: NaiveDate) -> DateTime<Utc> {
    let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default();
    Local
        .from_local_datetime(&noon)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| noon.and_utc())
}
