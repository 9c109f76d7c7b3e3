//! What is visible on a date or in a range.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::date_range::DateRange;
use crate::document::{CalendarDocument, ItemId, MeetingKind, ScheduledTask, Task};
use crate::schedule::layout::Interval;

/// Cancellation marker key for one date of a series.
pub fn cancellation_key(series_id: &str, date: NaiveDate) -> String {
    format!("{}:{}", series_id, date)
}

/// One concrete meeting on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingOccurrence {
    pub meeting_id: ItemId,
    pub series_id: Option<String>,
    pub name: String,
    pub date: NaiveDate,
    pub start_minutes: u32,
    pub duration_minutes: u32,
    pub color: String,
    pub notes: String,
}

impl MeetingOccurrence {
    pub fn is_recurring(&self) -> bool {
        self.series_id.is_some()
    }

    /// Key that would cancel this occurrence, for recurring meetings.
    pub fn instance_key(&self) -> Option<String> {
        self.series_id
            .as_deref()
            .map(|series_id| cancellation_key(series_id, self.date))
    }
}

/// Anything that occupies time on a day.
#[derive(Debug, Clone, PartialEq)]
pub enum DayItem {
    Task(ScheduledTask),
    Meeting(MeetingOccurrence),
}

impl DayItem {
    pub fn name(&self) -> &str {
        match self {
            DayItem::Task(t) => &t.name,
            DayItem::Meeting(m) => &m.name,
        }
    }

    pub fn color(&self) -> &str {
        match self {
            DayItem::Task(t) => &t.color,
            DayItem::Meeting(m) => &m.color,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            DayItem::Task(t) => t.date,
            DayItem::Meeting(m) => m.date,
        }
    }

    pub fn duration_minutes(&self) -> u32 {
        match self {
            DayItem::Task(t) => t.duration_minutes,
            DayItem::Meeting(m) => m.duration_minutes,
        }
    }

    /// Start as fractional hours, e.g. 14.5 for 2:30 PM.
    pub fn start_time(&self) -> f64 {
        self.start_minutes() as f64 / 60.0
    }
}

impl Interval for DayItem {
    fn start_minutes(&self) -> u32 {
        match self {
            DayItem::Task(t) => t.start_minutes,
            DayItem::Meeting(m) => m.start_minutes,
        }
    }

    fn end_minutes(&self) -> u32 {
        self.start_minutes().saturating_add(self.duration_minutes())
    }
}

impl CalendarDocument {
    /// Meeting occurrences falling in `range`, ordered by date then start.
    ///
    /// Series emit one occurrence on each matching weekday unless that
    /// date carries a cancellation marker.
    pub fn visible_meetings(&self, range: &DateRange) -> Vec<MeetingOccurrence> {
        let mut visible = Vec::new();

        for meeting in &self.meetings {
            let occurrence = |date: NaiveDate, series_id: Option<&String>| MeetingOccurrence {
                meeting_id: meeting.id.clone(),
                series_id: series_id.cloned(),
                name: meeting.name.clone(),
                date,
                start_minutes: meeting.start_minutes,
                duration_minutes: meeting.duration_minutes,
                color: meeting.color.clone(),
                notes: meeting.notes.clone(),
            };

            match &meeting.kind {
                MeetingKind::OneOff { date } => {
                    if range.contains(*date) {
                        visible.push(occurrence(*date, None));
                    }
                }
                MeetingKind::Series { series_id, by_day } => {
                    for date in range.days() {
                        if date.weekday().num_days_from_monday() != *by_day as u32 {
                            continue;
                        }
                        if self
                            .cancelled_instances
                            .contains(&cancellation_key(series_id, date))
                        {
                            continue;
                        }
                        visible.push(occurrence(date, Some(series_id)));
                    }
                }
            }
        }

        visible.sort_by_key(|m| (m.date, m.start_minutes));
        visible
    }

    /// Scheduled task occurrences in `range`, ordered by date then start.
    pub fn scheduled_in(&self, range: &DateRange) -> Vec<&ScheduledTask> {
        let mut scheduled: Vec<_> = self
            .scheduled_tasks
            .iter()
            .filter(|s| range.contains(s.date))
            .collect();
        scheduled.sort_by_key(|s| (s.date, s.start_minutes));
        scheduled
    }

    /// Everything on `date`: scheduled tasks and visible meetings.
    pub fn day_items(&self, date: NaiveDate) -> Vec<DayItem> {
        self.items_in(&DateRange::day(date))
    }

    /// Everything in `range`, ordered by date then start.
    pub fn items_in(&self, range: &DateRange) -> Vec<DayItem> {
        let mut items: Vec<DayItem> = self
            .scheduled_in(range)
            .into_iter()
            .cloned()
            .map(DayItem::Task)
            .chain(self.visible_meetings(range).into_iter().map(DayItem::Meeting))
            .collect();
        items.sort_by_key(|i| (i.date(), i.start_minutes()));
        items
    }

    /// The unscheduled pool: tasks with no scheduled occurrence and no
    /// completion record. Membership is always derived, never stored.
    pub fn unscheduled_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| self.is_unscheduled(&task.id))
            .collect()
    }

    pub fn is_unscheduled(&self, id: &ItemId) -> bool {
        !self.scheduled_tasks.iter().any(|s| &s.id == id)
            && !self.completed_tasks.iter().any(|c| &c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DEFAULT_MEETING_COLOR, Meeting};
    use crate::schedule::layout::layout_day;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn meeting(id: &str, kind: MeetingKind, start_minutes: u32) -> Meeting {
        Meeting {
            id: ItemId::new(id),
            name: id.to_string(),
            kind,
            start_minutes,
            duration_minutes: 30,
            color: DEFAULT_MEETING_COLOR.to_string(),
            notes: String::new(),
        }
    }

    fn doc() -> CalendarDocument {
        let mut doc = CalendarDocument::empty(date(2024, 1, 1));
        doc.meetings.push(meeting(
            "sync",
            MeetingKind::Series { series_id: "S".into(), by_day: 1 },
            600,
        ));
        doc.meetings.push(meeting(
            "client",
            MeetingKind::OneOff { date: date(2024, 1, 3) },
            540,
        ));
        doc
    }

    #[test]
    fn test_series_one_per_week_on_weekday() {
        let doc = doc();
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 21));
        let series: Vec<_> = doc
            .visible_meetings(&range)
            .into_iter()
            .filter(|m| m.is_recurring())
            .map(|m| m.date)
            .collect();
        assert_eq!(series, vec![date(2024, 1, 2), date(2024, 1, 9), date(2024, 1, 16)]);
    }

    #[test]
    fn test_one_off_only_in_range() {
        let doc = doc();
        let week1 = doc.visible_meetings(&DateRange::work_week(date(2024, 1, 1)));
        assert!(week1.iter().any(|m| m.meeting_id == ItemId::new("client")));

        let week2 = doc.visible_meetings(&DateRange::work_week(date(2024, 1, 8)));
        assert!(!week2.iter().any(|m| m.meeting_id == ItemId::new("client")));
    }

    #[test]
    fn test_cancelled_date_hidden() {
        let mut doc = doc();
        doc.cancelled_instances.insert(cancellation_key("S", date(2024, 1, 9)));

        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 14));
        let dates: Vec<_> = doc
            .visible_meetings(&range)
            .into_iter()
            .filter(|m| m.is_recurring())
            .map(|m| m.date)
            .collect();
        assert_eq!(dates, vec![date(2024, 1, 2)]);
    }

    #[test]
    fn test_instance_key_and_start_time() {
        let doc = doc();
        let items = doc.day_items(date(2024, 1, 2));
        assert_eq!(items.len(), 1);
        match &items[0] {
            DayItem::Meeting(m) => {
                assert_eq!(m.instance_key().as_deref(), Some("S:2024-01-02"));
            }
            other => panic!("Expected meeting, got {:?}", other),
        }
        assert_eq!(items[0].start_time(), 10.0);
    }

    #[test]
    fn test_pool_membership_is_derived() {
        let mut doc = doc();
        for id in ["a", "b", "c"] {
            doc.tasks.push(Task {
                id: ItemId::new(id),
                name: id.into(),
                duration_minutes: 30,
                color: String::new(),
                notes: String::new(),
                project_id: None,
            });
        }
        doc.scheduled_tasks.push(ScheduledTask {
            id: ItemId::new("a"),
            occurrence_id: "o1".into(),
            date: date(2024, 1, 2),
            start_minutes: 540,
            duration_minutes: 30,
            name: "a".into(),
            color: String::new(),
            notes: String::new(),
            project_id: None,
        });

        let pool: Vec<_> = doc.unscheduled_tasks().iter().map(|t| t.id.to_string()).collect();
        assert_eq!(pool, vec!["b", "c"]);
    }

    #[test]
    fn test_layout_survives_extreme_durations() {
        let raw = serde_json::json!({
            "dateVersion": 2,
            "weekAnchorDate": "2024-01-01",
            "scheduledTasks": [
                { "id": "t1", "occurrenceId": "o1", "date": "2024-01-02", "startMinutes": 600,
                  "durationMinutes": 4294967295u32 },
                { "id": "t2", "occurrenceId": "o2", "date": "2024-01-02", "startMinutes": 660 }
            ]
        });
        let doc = crate::migrate::migrate_with_today(&raw, date(2024, 1, 3));
        let placed = layout_day(doc.day_items(date(2024, 1, 2)));
        assert_eq!(placed.len(), 2);
        assert!(placed.iter().all(|p| p.total_columns == 2));

        let mut doc = CalendarDocument::empty(date(2024, 1, 1));
        doc.scheduled_tasks.push(ScheduledTask {
            id: ItemId::new("t1"),
            occurrence_id: "o1".into(),
            date: date(2024, 1, 2),
            start_minutes: 600,
            duration_minutes: u32::MAX,
            name: "t1".into(),
            color: String::new(),
            notes: String::new(),
            project_id: None,
        });
        assert_eq!(doc.scheduled_tasks[0].end_minutes(), u32::MAX);
        let items = doc.day_items(date(2024, 1, 2));
        assert_eq!(items[0].end_minutes(), u32::MAX);
        assert_eq!(layout_day(items).len(), 1);
    }
}
