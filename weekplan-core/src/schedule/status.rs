//! What is happening now, and what comes next.

use chrono::{NaiveDateTime, Timelike};

use crate::date_range::DateRange;
use crate::document::CalendarDocument;
use crate::schedule::layout::Interval;
use crate::schedule::visible::DayItem;

/// Items in progress and the next item to start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowAndNext {
    pub current: Vec<DayItem>,
    pub next: Option<DayItem>,
}

impl CalendarDocument {
    /// Items in progress at `now`, and the next item starting after it
    /// within the rest of the week.
    pub fn now_and_next(&self, now: NaiveDateTime) -> NowAndNext {
        let today = now.date();
        let minute = now.hour() * 60 + now.minute();

        let current = self
            .day_items(today)
            .into_iter()
            .filter(|item| item.start_minutes() <= minute && minute < item.end_minutes())
            .collect();

        let rest_of_week = DateRange::new(today, DateRange::full_week(today).to);
        let next = self
            .items_in(&rest_of_week)
            .into_iter()
            .find(|item| item.date() > today || item.start_minutes() > minute);

        NowAndNext { current, next }
    }
}

/// Format minutes since midnight as a 12-hour clock time, e.g. `9:15 AM`.
pub fn format_start_time(minutes: u32) -> String {
    let hour = (minutes / 60) % 24;
    let minute = minutes % 60;
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", display_hour, minute, suffix)
}

/// Format a duration as `45m`, `1h` or `1h 30m`.
pub fn format_duration(minutes: u32) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}
