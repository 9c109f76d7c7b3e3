//! Meeting and series operations, including per-date cancellation.

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::document::{
    CalendarDocument, DEFAULT_MEETING_COLOR, ItemId, MAX_DURATION_MINUTES, Meeting, MeetingKind,
};
use crate::error::{WeekplanError, WeekplanResult};
use crate::ids;
use crate::schedule::tasks::{MIN_DURATION_MINUTES, validate_duration, validate_name, validate_start};
use crate::schedule::visible::cancellation_key;

/// Where a new meeting goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingPlacement {
    OneOff(NaiveDate),
    /// Every week on this weekday (0 = Monday .. 4 = Friday).
    Weekly(u8),
}

/// Fields for a new meeting.
#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub name: String,
    pub placement: MeetingPlacement,
    pub start_minutes: u32,
    pub duration_minutes: u32,
    pub color: Option<String>,
    pub notes: String,
}

/// Changes to a meeting; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct MeetingEdit {
    pub name: Option<String>,
    pub start_minutes: Option<u32>,
    pub duration_minutes: Option<u32>,
    pub color: Option<String>,
    pub notes: Option<String>,
}

fn work_weekday(date: NaiveDate) -> WeekplanResult<u8> {
    let weekday = date.weekday().num_days_from_monday();
    if weekday > 4 {
        return Err(WeekplanError::InvalidInput(format!(
            "{} is not a weekday",
            date
        )));
    }
    Ok(weekday as u8)
}

impl CalendarDocument {
    pub fn add_meeting(&mut self, draft: NewMeeting) -> WeekplanResult<ItemId> {
        validate_name(&draft.name)?;
        validate_start(draft.start_minutes)?;
        validate_duration(draft.duration_minutes)?;

        let kind = match draft.placement {
            MeetingPlacement::OneOff(date) => MeetingKind::OneOff { date },
            MeetingPlacement::Weekly(by_day) if by_day <= 4 => MeetingKind::Series {
                series_id: ids::series_id(),
                by_day,
            },
            MeetingPlacement::Weekly(by_day) => {
                return Err(WeekplanError::InvalidInput(format!(
                    "byDay {} is outside Mon-Fri",
                    by_day
                )));
            }
        };

        let id = ids::meeting_id();
        self.meetings.push(Meeting {
            id: id.clone(),
            name: draft.name.trim().to_string(),
            kind,
            start_minutes: draft.start_minutes,
            duration_minutes: draft.duration_minutes,
            color: draft.color.unwrap_or_else(|| DEFAULT_MEETING_COLOR.to_string()),
            notes: draft.notes,
        });
        Ok(id)
    }

    fn meeting_mut(&mut self, id: &ItemId) -> WeekplanResult<&mut Meeting> {
        self.meetings
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| WeekplanError::UnknownMeeting(id.to_string()))
    }

    /// Edit a meeting. For a series this changes every week.
    pub fn edit_meeting(&mut self, id: &ItemId, edit: MeetingEdit) -> WeekplanResult<()> {
        if let Some(name) = &edit.name {
            validate_name(name)?;
        }
        if let Some(start) = edit.start_minutes {
            validate_start(start)?;
        }
        if let Some(duration) = edit.duration_minutes {
            validate_duration(duration)?;
        }

        let meeting = self.meeting_mut(id)?;
        if let Some(name) = edit.name {
            meeting.name = name.trim().to_string();
        }
        if let Some(start) = edit.start_minutes {
            meeting.start_minutes = start;
        }
        if let Some(duration) = edit.duration_minutes {
            meeting.duration_minutes = duration;
        }
        if let Some(color) = edit.color {
            meeting.color = color;
        }
        if let Some(notes) = edit.notes {
            meeting.notes = notes;
        }
        Ok(())
    }

    /// Move a meeting. A one-off takes the new date; a series moves to the
    /// new date's weekday for every week.
    pub fn move_meeting(&mut self, id: &ItemId, date: NaiveDate, start_minutes: u32) -> WeekplanResult<()> {
        validate_start(start_minutes)?;
        let meeting = self.meeting_mut(id)?;

        match &mut meeting.kind {
            MeetingKind::OneOff { date: current } => *current = date,
            MeetingKind::Series { by_day, .. } => *by_day = work_weekday(date)?,
        }
        meeting.start_minutes = start_minutes;
        Ok(())
    }

    pub fn resize_meeting(&mut self, id: &ItemId, duration_minutes: u32) -> WeekplanResult<()> {
        let meeting = self.meeting_mut(id)?;
        meeting.duration_minutes = duration_minutes.clamp(MIN_DURATION_MINUTES, MAX_DURATION_MINUTES);
        Ok(())
    }

    fn require_series(&self, series_id: &str) -> WeekplanResult<()> {
        if self.meetings.iter().any(|m| m.series_id() == Some(series_id)) {
            Ok(())
        } else {
            Err(WeekplanError::UnknownMeeting(series_id.to_string()))
        }
    }

    /// Hide one date's occurrence of a series.
    pub fn cancel_occurrence(&mut self, series_id: &str, date: NaiveDate) -> WeekplanResult<()> {
        self.require_series(series_id)?;
        let key = cancellation_key(series_id, date);
        debug!(%key, "Cancelled meeting occurrence");
        self.cancelled_instances.insert(key);
        Ok(())
    }

    /// Undo a cancellation. Returns whether a marker was removed.
    pub fn restore_occurrence(&mut self, series_id: &str, date: NaiveDate) -> bool {
        self.cancelled_instances
            .remove(&cancellation_key(series_id, date))
    }

    /// Delete a whole series and every cancellation marker it owns.
    pub fn delete_series(&mut self, series_id: &str) -> WeekplanResult<()> {
        self.require_series(series_id)?;
        self.meetings.retain(|m| m.series_id() != Some(series_id));

        let prefix = format!("{}:", series_id);
        self.cancelled_instances.retain(|key| !key.starts_with(&prefix));
        debug!(series = series_id, "Deleted meeting series");
        Ok(())
    }

    /// Delete a meeting; a recurring one takes its whole series with it.
    pub fn delete_meeting(&mut self, id: &ItemId) -> WeekplanResult<()> {
        let series_id = self
            .meeting(id)
            .ok_or_else(|| WeekplanError::UnknownMeeting(id.to_string()))?
            .series_id()
            .map(str::to_string);

        match series_id {
            Some(series_id) => self.delete_series(&series_id),
            None => {
                self.meetings.retain(|m| &m.id != id);
                Ok(())
            }
        }
    }
}
