//! Identifier generation and validation.
//!
//! Item identifiers combine a millisecond timestamp with a random suffix so
//! that two items created within the same millisecond never collide.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::document::ItemId;
use crate::error::{WeekplanError, WeekplanResult};

/// Length of generated calendar IDs.
pub const CALENDAR_ID_LEN: usize = 6;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn timestamped(prefix: &str) -> String {
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), random_suffix())
}

pub fn task_id() -> ItemId {
    ItemId::new(timestamped("task"))
}

pub fn meeting_id() -> ItemId {
    ItemId::new(timestamped("meeting"))
}

pub fn project_id() -> ItemId {
    ItemId::new(timestamped("project"))
}

pub fn series_id() -> String {
    timestamped("series")
}

/// A fresh occurrence ID; unique per placement of a task on the calendar.
pub fn occurrence_id() -> String {
    timestamped("occ")
}

/// Occurrence ID for a stored placement that has none.
///
/// Derived from the placement itself, so every load of the same stored
/// document produces the same IDs.
pub fn derived_occurrence_id(task_id: &ItemId, date: NaiveDate, index: usize) -> String {
    format!("occ-{}-{}-{}", task_id, date, index)
}

/// Short random lowercase base36 identifier for a new calendar.
pub fn calendar_id() -> String {
    let mut n = Uuid::new_v4().as_u128();
    let mut id = String::with_capacity(CALENDAR_ID_LEN);
    for _ in 0..CALENDAR_ID_LEN {
        id.push(BASE36[(n % 36) as usize] as char);
        n /= 36;
    }
    id
}

/// Reject IDs that cannot name a calendar.
///
/// The literal `"undefined"` comes from clients that stringified a missing
/// ID; anything outside `[A-Za-z0-9_-]` could escape the storage namespace.
pub fn validate_calendar_id(id: &str) -> WeekplanResult<()> {
    let valid = !id.is_empty()
        && id != "undefined"
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(WeekplanError::InvalidCalendarId(id.to_string()))
    }
}
