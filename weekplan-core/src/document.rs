//! Canonical calendar document schema.
//!
//! One `CalendarDocument` is persisted per calendar ID. This is the
//! absolute-date schema (`dateVersion: 2`); older relative-week documents
//! are converted by [`crate::migrate`] before they reach these types.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::date_range::monday_of;

/// Schema version written on every canonical document.
pub const DATE_VERSION: u32 = 2;

/// Default duration for items that don't carry one.
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Longest duration an item may have.
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;

/// Last minute of the day an item may start at.
pub const MAX_START_MINUTES: u32 = 24 * 60 - 1;

/// Display color used for meetings unless one is chosen.
pub const DEFAULT_MEETING_COLOR: &str = "#374151";

fn default_duration() -> u32 {
    DEFAULT_DURATION_MINUTES
}

/// Durations over a day are capped to one.
fn clamped_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let minutes = u64::deserialize(deserializer)?;
    Ok(minutes.min(MAX_DURATION_MINUTES as u64) as u32)
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Opaque item identifier.
///
/// Older documents used numeric IDs, so both JSON numbers and strings are
/// accepted; IDs are always written back as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        ItemId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Int(i64),
            Float(f64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => ItemId(s),
            RawId::Int(n) => ItemId(n.to_string()),
            RawId::Float(f) => ItemId(f.to_string()),
        })
    }
}

/// An unscheduled-pool task template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: ItemId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_duration", deserialize_with = "clamped_duration")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub project_id: Option<ItemId>,
}

/// A named group of tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ItemId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// How a meeting is placed on the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingKind {
    /// A single meeting on one date.
    OneOff { date: NaiveDate },
    /// One occurrence per week on `by_day` (0 = Monday .. 4 = Friday).
    Series { series_id: String, by_day: u8 },
}

/// A meeting, either one-off or a recurring weekly series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMeeting", into = "RawMeeting")]
pub struct Meeting {
    pub id: ItemId,
    pub name: String,
    pub kind: MeetingKind,
    pub start_minutes: u32,
    pub duration_minutes: u32,
    pub color: String,
    pub notes: String,
}

impl Meeting {
    pub fn is_recurring(&self) -> bool {
        matches!(self.kind, MeetingKind::Series { .. })
    }

    pub fn series_id(&self) -> Option<&str> {
        match &self.kind {
            MeetingKind::Series { series_id, .. } => Some(series_id),
            MeetingKind::OneOff { .. } => None,
        }
    }
}

/// Wire shape of a meeting; the variant is decided by `recurring`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeeting {
    id: ItemId,
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    series_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    by_day: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(default)]
    start_minutes: u32,
    #[serde(default = "default_duration", deserialize_with = "clamped_duration")]
    duration_minutes: u32,
    #[serde(default)]
    color: String,
    #[serde(default)]
    notes: String,
}

impl TryFrom<RawMeeting> for Meeting {
    type Error = String;

    fn try_from(raw: RawMeeting) -> Result<Self, Self::Error> {
        let kind = if raw.recurring {
            let by_day = raw
                .by_day
                .ok_or_else(|| format!("recurring meeting {} has no byDay", raw.id))?;
            if by_day > 4 {
                return Err(format!("meeting {} has byDay {} outside Mon-Fri", raw.id, by_day));
            }
            MeetingKind::Series {
                series_id: raw.series_id.unwrap_or_else(|| raw.id.to_string()),
                by_day,
            }
        } else {
            let date = raw
                .date
                .ok_or_else(|| format!("one-off meeting {} has no date", raw.id))?;
            MeetingKind::OneOff { date }
        };

        Ok(Meeting {
            id: raw.id,
            name: raw.name,
            kind,
            start_minutes: raw.start_minutes.min(MAX_START_MINUTES),
            duration_minutes: raw.duration_minutes,
            color: raw.color,
            notes: raw.notes,
        })
    }
}

impl From<Meeting> for RawMeeting {
    fn from(meeting: Meeting) -> Self {
        let (recurring, series_id, by_day, date) = match meeting.kind {
            MeetingKind::OneOff { date } => (false, None, None, Some(date)),
            MeetingKind::Series { series_id, by_day } => (true, Some(series_id), Some(by_day), None),
        };

        RawMeeting {
            id: meeting.id,
            name: meeting.name,
            recurring,
            series_id,
            by_day,
            date,
            start_minutes: meeting.start_minutes,
            duration_minutes: meeting.duration_minutes,
            color: meeting.color,
            notes: meeting.notes,
        }
    }
}

/// One placement of a task template on the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    /// The owning task's ID.
    pub id: ItemId,
    /// Unique per placement. Empty only before migration backfills it.
    #[serde(default)]
    pub occurrence_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub start_minutes: u32,
    #[serde(default = "default_duration", deserialize_with = "clamped_duration")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub project_id: Option<ItemId>,
}

impl ScheduledTask {
    pub fn end_minutes(&self) -> u32 {
        self.start_minutes.saturating_add(self.duration_minutes)
    }

    /// Rebuild the task template this occurrence was placed from.
    pub fn to_task(&self) -> Task {
        Task {
            id: self.id.clone(),
            name: self.name.clone(),
            duration_minutes: self.duration_minutes,
            color: self.color.clone(),
            notes: self.notes.clone(),
            project_id: self.project_id.clone(),
        }
    }
}

/// Terminal snapshot of a task at the moment it was completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTask {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_minutes: Option<u32>,
    #[serde(default = "default_duration", deserialize_with = "clamped_duration")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub project_id: Option<ItemId>,
    pub completed_at: DateTime<Utc>,
}

impl CompletedTask {
    pub fn to_task(&self) -> Task {
        Task {
            id: self.id.clone(),
            name: self.name.clone(),
            duration_minutes: self.duration_minutes,
            color: self.color.clone(),
            notes: self.notes.clone(),
            project_id: self.project_id.clone(),
        }
    }
}

/// The root persisted aggregate for one calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDocument {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
    #[serde(default)]
    pub scheduled_tasks: Vec<ScheduledTask>,
    #[serde(default)]
    pub completed_tasks: Vec<CompletedTask>,
    /// Cancellation markers, keyed `seriesId:YYYY-MM-DD`.
    #[serde(default)]
    pub cancelled_instances: BTreeSet<String>,
    pub date_version: u32,
    pub week_anchor_date: NaiveDate,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl CalendarDocument {
    /// A canonical document with every collection empty.
    pub fn empty(today: NaiveDate) -> Self {
        CalendarDocument {
            tasks: Vec::new(),
            projects: Vec::new(),
            meetings: Vec::new(),
            scheduled_tasks: Vec::new(),
            completed_tasks: Vec::new(),
            cancelled_instances: BTreeSet::new(),
            date_version: DATE_VERSION,
            week_anchor_date: monday_of(today),
            created: None,
            last_modified: None,
        }
    }

    /// Structural equality over the meaningful payload, ignoring the
    /// `created` and `lastModified` timestamps.
    pub fn payload_eq(&self, other: &CalendarDocument) -> bool {
        self.tasks == other.tasks
            && self.projects == other.projects
            && self.meetings == other.meetings
            && self.scheduled_tasks == other.scheduled_tasks
            && self.completed_tasks == other.completed_tasks
            && self.cancelled_instances == other.cancelled_instances
            && self.date_version == other.date_version
            && self.week_anchor_date == other.week_anchor_date
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
            && self.projects.is_empty()
            && self.meetings.is_empty()
            && self.scheduled_tasks.is_empty()
            && self.completed_tasks.is_empty()
            && self.cancelled_instances.is_empty()
    }

    pub fn task(&self, id: &ItemId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn occurrence(&self, occurrence_id: &str) -> Option<&ScheduledTask> {
        self.scheduled_tasks
            .iter()
            .find(|s| s.occurrence_id == occurrence_id)
    }

    pub fn completed(&self, id: &ItemId) -> Option<&CompletedTask> {
        self.completed_tasks.iter().find(|c| &c.id == id)
    }

    pub fn meeting(&self, id: &ItemId) -> Option<&Meeting> {
        self.meetings.iter().find(|m| &m.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_item_id_accepts_numbers() {
        let task: Task = serde_json::from_value(json!({ "id": 1712, "name": "Email" })).unwrap();
        assert_eq!(task.id, ItemId::new("1712"));
        assert_eq!(task.duration_minutes, DEFAULT_DURATION_MINUTES);
        assert_eq!(task.project_id, None);
        assert_eq!(serde_json::to_value(&task.id).unwrap(), json!("1712"));
    }

    #[test]
    fn test_meeting_variants_by_recurring_flag() {
        let one_off: Meeting = serde_json::from_value(json!({
            "id": "m1", "name": "Client", "date": "2024-01-08",
            "startMinutes": 600, "durationMinutes": 60
        }))
        .unwrap();
        assert_eq!(one_off.kind, MeetingKind::OneOff { date: date(2024, 1, 8) });

        let series: Meeting = serde_json::from_value(json!({
            "id": "m2", "name": "Sync", "recurring": true, "seriesId": "s1",
            "byDay": 1, "startMinutes": 855, "durationMinutes": 30
        }))
        .unwrap();
        assert_eq!(
            series.kind,
            MeetingKind::Series { series_id: "s1".into(), by_day: 1 }
        );

        let value = serde_json::to_value(&series).unwrap();
        assert_eq!(value["recurring"], json!(true));
        assert!(value.get("date").is_none());

        let value = serde_json::to_value(&one_off).unwrap();
        assert!(value.get("recurring").is_none());
        assert_eq!(value["date"], json!("2024-01-08"));
    }

    #[test]
    fn test_meeting_without_placement_is_rejected() {
        let result: Result<Meeting, _> =
            serde_json::from_value(json!({ "id": "m1", "name": "Lost", "startMinutes": 600 }));
        assert!(result.is_err());

        let result: Result<Meeting, _> = serde_json::from_value(
            json!({ "id": "m1", "recurring": true, "byDay": 6, "startMinutes": 600 }),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_payload_eq_ignores_timestamps() {
        let mut a = CalendarDocument::empty(date(2024, 1, 3));
        let mut b = a.clone();
        a.last_modified = Some(Utc::now());
        b.created = Some(Utc::now());
        assert!(a.payload_eq(&b));

        b.cancelled_instances.insert("s1:2024-01-02".into());
        assert!(!a.payload_eq(&b));
    }

    #[test]
    fn test_empty_document_is_canonical() {
        let doc = CalendarDocument::empty(date(2024, 1, 3));
        assert_eq!(doc.date_version, DATE_VERSION);
        assert_eq!(doc.week_anchor_date, date(2024, 1, 1));

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["tasks"], json!([]));
        assert_eq!(value["cancelledInstances"], json!([]));
        assert_eq!(value["dateVersion"], json!(2));
    }
}
