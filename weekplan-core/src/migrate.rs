//! Schema migration to the canonical absolute-date document.
//!
//! Legacy documents (no `dateVersion`) place items with relative
//! `{weekOffset, day, startTime}` coordinates, where `day` is 0-4 for
//! Monday-Friday and `startTime` is fractional hours. They are converted
//! against an anchor Monday: the Monday of the week containing the
//! document's `lastModified`, or of today when it has none.
//!
//! Migration never fails. Malformed items are defaulted where possible and
//! skipped otherwise, since a partially recovered calendar is more useful
//! than an unusable one.

use std::collections::HashSet;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::date_range::{monday_of, noon_local, offset_days};
use crate::document::{
    CalendarDocument, CompletedTask, DATE_VERSION, DEFAULT_DURATION_MINUTES, ItemId,
    MAX_DURATION_MINUTES, MAX_START_MINUTES, Meeting, MeetingKind, ScheduledTask, Task,
};
use crate::ids;

const LEGACY_DEFAULT_START_HOURS: f64 = 9.0;
const LEGACY_CANCEL_MARKER: &str = "-week";

/// Convert any stored or submitted document into the canonical schema,
/// using the local date as "today" when the document carries no anchor.
pub fn migrate(raw: &Value) -> CalendarDocument {
    migrate_with_today(raw, Local::now().date_naive())
}

/// [`migrate`] with an explicit "today".
///
/// Running this on its own canonical output returns the same document.
pub fn migrate_with_today(raw: &Value, today: NaiveDate) -> CalendarDocument {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let is_canonical = obj.get("dateVersion").is_some_and(|v| !v.is_null());
    if is_canonical {
        migrate_canonical(obj, today)
    } else {
        migrate_legacy(obj, today)
    }
}

/// Canonical input passes through, with fields that older servers
/// didn't write (project IDs, occurrence IDs) backfilled.
fn migrate_canonical(obj: &Map<String, Value>, today: NaiveDate) -> CalendarDocument {
    let mut scheduled_tasks: Vec<ScheduledTask> = parse_list(obj, "scheduledTasks");
    backfill_occurrence_ids(&mut scheduled_tasks);

    let week_anchor_date = obj
        .get("weekAnchorDate")
        .and_then(|v| serde_json::from_value::<NaiveDate>(v.clone()).ok())
        .unwrap_or_else(|| monday_of(today));

    CalendarDocument {
        tasks: parse_list(obj, "tasks"),
        projects: parse_list(obj, "projects"),
        meetings: parse_list(obj, "meetings"),
        scheduled_tasks,
        completed_tasks: parse_list(obj, "completedTasks"),
        cancelled_instances: string_list(obj, "cancelledInstances").into_iter().collect(),
        date_version: DATE_VERSION,
        week_anchor_date,
        created: timestamp(obj, "created"),
        last_modified: timestamp(obj, "lastModified"),
    }
}

fn migrate_legacy(obj: &Map<String, Value>, today: NaiveDate) -> CalendarDocument {
    let last_modified = timestamp(obj, "lastModified");
    let anchor_day = last_modified
        .map(|t| t.with_timezone(&Local).date_naive())
        .unwrap_or(today);
    let anchor = monday_of(anchor_day);
    debug!(%anchor, "Migrating legacy calendar document");

    let tasks = items(obj, "tasks")
        .enumerate()
        .map(|(index, item)| Task {
            id: legacy_id(item, "task", index),
            name: text(item, "name"),
            duration_minutes: duration(item),
            color: text(item, "color"),
            notes: text(item, "notes"),
            project_id: None,
        })
        .collect();

    let mut scheduled_tasks: Vec<ScheduledTask> = items(obj, "scheduledTasks")
        .enumerate()
        .map(|(index, item)| {
            let (date, start_minutes) = legacy_placement(item, anchor);
            ScheduledTask {
                id: legacy_id(item, "scheduled", index),
                occurrence_id: String::new(),
                date,
                start_minutes,
                duration_minutes: duration(item),
                name: text(item, "name"),
                color: text(item, "color"),
                notes: text(item, "notes"),
                project_id: None,
            }
        })
        .collect();
    backfill_occurrence_ids(&mut scheduled_tasks);

    let completed_tasks = items(obj, "completedTasks")
        .enumerate()
        .map(|(index, item)| {
            let (date, start_minutes) = legacy_placement(item, anchor);
            let completed_at = item
                .get("completedAt")
                .and_then(|v| serde_json::from_value::<DateTime<Utc>>(v.clone()).ok())
                .unwrap_or_else(|| noon_local(date));
            CompletedTask {
                id: legacy_id(item, "completed", index),
                occurrence_id: None,
                date: Some(date),
                start_minutes: Some(start_minutes),
                duration_minutes: duration(item),
                name: text(item, "name"),
                color: text(item, "color"),
                notes: text(item, "notes"),
                project_id: None,
                completed_at,
            }
        })
        .collect();

    let mut legacy_ids = Vec::new();
    let meetings: Vec<Meeting> = items(obj, "meetings")
        .enumerate()
        .map(|(index, item)| {
            let meeting = legacy_meeting(item, index, anchor);
            legacy_ids.push(item_id(item));
            meeting
        })
        .collect();

    let cancelled_instances = string_list(obj, "cancelledInstances")
        .into_iter()
        .map(|key| resolve_legacy_cancellation(&key, &meetings, &legacy_ids, anchor))
        .collect();

    CalendarDocument {
        tasks,
        projects: parse_list(obj, "projects"),
        meetings,
        scheduled_tasks,
        completed_tasks,
        cancelled_instances,
        date_version: DATE_VERSION,
        week_anchor_date: anchor,
        created: timestamp(obj, "created"),
        last_modified,
    }
}

fn legacy_meeting(item: &Value, index: usize, anchor: NaiveDate) -> Meeting {
    let id = legacy_id(item, "meeting", index);
    let recurring = item.get("recurring").and_then(Value::as_bool).unwrap_or(false);
    let (date, start_minutes) = legacy_placement(item, anchor);

    let kind = if recurring {
        let series_id = item
            .get("seriesId")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| id.to_string());
        MeetingKind::Series {
            series_id,
            by_day: legacy_day(item) as u8,
        }
    } else {
        MeetingKind::OneOff { date }
    };

    Meeting {
        id,
        name: text(item, "name"),
        kind,
        start_minutes,
        duration_minutes: duration(item),
        color: text(item, "color"),
        notes: text(item, "notes"),
    }
}

/// Rewrite `<id-or-seriesId>-week<N>` as `seriesId:date`.
///
/// Keys that don't name a known series are kept verbatim so that an
/// occurrence the user cancelled never silently reappears.
fn resolve_legacy_cancellation(
    key: &str,
    meetings: &[Meeting],
    legacy_ids: &[Option<ItemId>],
    anchor: NaiveDate,
) -> String {
    let Some((prefix, week)) = key.rsplit_once(LEGACY_CANCEL_MARKER) else {
        return key.to_string();
    };
    let Ok(week) = week.parse::<i64>() else {
        return key.to_string();
    };

    let series = meetings.iter().zip(legacy_ids).find_map(|(meeting, stored_id)| {
        let MeetingKind::Series { series_id, by_day } = &meeting.kind else {
            return None;
        };
        let id_matches = stored_id.as_ref().is_some_and(|id| id.as_str() == prefix);
        (id_matches || series_id == prefix).then_some((series_id, *by_day))
    });

    match series {
        Some((series_id, by_day)) => {
            let date = offset_days(anchor, week * 7 + by_day as i64);
            format!("{}:{}", series_id, date)
        }
        None => {
            warn!(key, "Keeping unresolvable legacy cancellation marker");
            key.to_string()
        }
    }
}

/// Replace occurrence IDs that are missing or shared with an earlier
/// occurrence.
///
/// Replacements are derived from each placement and its position, so
/// migrating the same stored document twice yields the same IDs.
fn backfill_occurrence_ids(scheduled: &mut [ScheduledTask]) {
    let mut taken: HashSet<String> = scheduled
        .iter()
        .map(|s| s.occurrence_id.clone())
        .filter(|id| !id.is_empty())
        .collect();
    let mut kept = HashSet::new();

    for (index, occurrence) in scheduled.iter_mut().enumerate() {
        if !occurrence.occurrence_id.is_empty() && kept.insert(occurrence.occurrence_id.clone()) {
            continue;
        }

        let base = ids::derived_occurrence_id(&occurrence.id, occurrence.date, index);
        let mut candidate = base.clone();
        let mut n = 1;
        while taken.contains(&candidate) {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }

        taken.insert(candidate.clone());
        kept.insert(candidate.clone());
        occurrence.occurrence_id = candidate;
    }
}

fn legacy_placement(item: &Value, anchor: NaiveDate) -> (NaiveDate, u32) {
    let week_offset = number(item, "weekOffset").unwrap_or(0.0).round() as i64;
    let date = offset_days(anchor, week_offset * 7 + legacy_day(item));
    let start_hours = number(item, "startTime").unwrap_or(LEGACY_DEFAULT_START_HOURS);
    (date, hours_to_minutes(start_hours))
}

fn legacy_day(item: &Value) -> i64 {
    number(item, "day").unwrap_or(0.0).round().clamp(0.0, 4.0) as i64
}

/// Fractional hours to whole minutes since midnight.
pub fn hours_to_minutes(hours: f64) -> u32 {
    (hours * 60.0).round().clamp(0.0, MAX_START_MINUTES as f64) as u32
}

fn duration(item: &Value) -> u32 {
    number(item, "duration")
        .or_else(|| number(item, "durationMinutes"))
        .filter(|d| *d > 0.0)
        .map(|d| d.round().min(MAX_DURATION_MINUTES as f64) as u32)
        .unwrap_or(DEFAULT_DURATION_MINUTES)
}

fn number(item: &Value, key: &str) -> Option<f64> {
    match item.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// The item's own ID, or one derived from its collection and position.
fn legacy_id(item: &Value, collection: &str, index: usize) -> ItemId {
    item_id(item).unwrap_or_else(|| ItemId::new(format!("legacy-{}-{}", collection, index)))
}

fn item_id(item: &Value) -> Option<ItemId> {
    item.get("id")
        .and_then(|v| serde_json::from_value::<ItemId>(v.clone()).ok())
}

fn timestamp(obj: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    obj.get(key)
        .and_then(|v| serde_json::from_value::<DateTime<Utc>>(v.clone()).ok())
}

fn items<'a>(obj: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Value> + use<'a> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|items| items.as_slice())
        .unwrap_or_default()
        .iter()
        .filter(|item| item.is_object())
}

fn string_list(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse each element on its own, skipping (and logging) malformed ones.
fn parse_list<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Vec<T> {
    items(obj, key)
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(collection = key, error = %e, "Skipping malformed item");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn legacy_doc() -> Value {
        json!({
            "tasks": [
                { "id": 1, "name": "Review proposal", "duration": 60, "color": "#3B82F6", "notes": "" },
                { "id": 2, "name": "Broken" }
            ],
            "meetings": [
                { "id": "m1", "name": "Client Meeting", "weekOffset": 0, "day": 0, "startTime": 10,
                  "duration": 60, "color": "#374151", "notes": "Q1", "recurring": false },
                { "id": "m2", "name": "Team Sync", "weekOffset": 0, "day": 1, "startTime": 14.25,
                  "duration": 30, "color": "#374151", "notes": "", "recurring": true, "seriesId": "series1" }
            ],
            "scheduledTasks": [
                { "id": 1, "name": "Review proposal", "duration": 60, "color": "#3B82F6", "notes": "",
                  "day": 2, "startTime": 14.5, "weekOffset": 1 }
            ],
            "completedTasks": [
                { "id": 3, "name": "Email", "duration": 45, "day": 4, "startTime": 9, "weekOffset": 0,
                  "completedAt": "2024-01-05T10:00:00.000Z" }
            ],
            "cancelledInstances": ["m2-week1", "series1-week-1", "ghost-week2", "not a marker"],
            "lastModified": "2024-01-03T12:00:00.000Z",
            "created": "2023-12-01T08:00:00.000Z"
        })
    }

    #[test]
    fn test_legacy_date_conversion() {
        let doc = migrate_with_today(&legacy_doc(), date(2030, 6, 1));

        assert_eq!(doc.date_version, DATE_VERSION);
        assert_eq!(doc.week_anchor_date, date(2024, 1, 1));

        let scheduled = &doc.scheduled_tasks[0];
        assert_eq!(scheduled.date, date(2024, 1, 10));
        assert_eq!(scheduled.start_minutes, 870);
        assert_eq!(scheduled.id, ItemId::new("1"));
        assert!(!scheduled.occurrence_id.is_empty());
        assert_eq!(scheduled.project_id, None);
    }

    #[test]
    fn test_legacy_meetings_become_series_and_dated() {
        let doc = migrate_with_today(&legacy_doc(), date(2030, 6, 1));

        assert_eq!(doc.meetings[0].kind, MeetingKind::OneOff { date: date(2024, 1, 1) });
        assert_eq!(doc.meetings[0].start_minutes, 600);

        assert_eq!(
            doc.meetings[1].kind,
            MeetingKind::Series { series_id: "series1".into(), by_day: 1 }
        );
        assert_eq!(doc.meetings[1].start_minutes, 855);
        assert_eq!(doc.meetings[1].duration_minutes, 30);
    }

    #[test]
    fn test_legacy_cancellations_resolved_against_anchor() {
        let doc = migrate_with_today(&legacy_doc(), date(2030, 6, 1));

        // Matched by meeting id and by series id; byDay 1 is Tuesday.
        assert!(doc.cancelled_instances.contains("series1:2024-01-09"));
        assert!(doc.cancelled_instances.contains("series1:2023-12-26"));
        // Unknown series and non-markers are kept as they were.
        assert!(doc.cancelled_instances.contains("ghost-week2"));
        assert!(doc.cancelled_instances.contains("not a marker"));
        assert_eq!(doc.cancelled_instances.len(), 4);
    }

    #[test]
    fn test_legacy_defaults_for_missing_fields() {
        let raw = json!({
            "scheduledTasks": [{ "id": "t1", "name": "Anything" }],
            "meetings": [{ "id": "m9", "name": "Mystery", "recurring": true }]
        });
        let today = date(2024, 5, 15);
        let doc = migrate_with_today(&raw, today);

        assert_eq!(doc.week_anchor_date, date(2024, 5, 13));
        let scheduled = &doc.scheduled_tasks[0];
        assert_eq!(scheduled.date, date(2024, 5, 13));
        assert_eq!(scheduled.start_minutes, 540);
        assert_eq!(scheduled.duration_minutes, 60);

        assert_eq!(
            doc.meetings[0].kind,
            MeetingKind::Series { series_id: "m9".into(), by_day: 0 }
        );
    }

    #[test]
    fn test_legacy_completed_keeps_timestamp() {
        let doc = migrate_with_today(&legacy_doc(), date(2030, 6, 1));
        let completed = &doc.completed_tasks[0];
        assert_eq!(completed.date, Some(date(2024, 1, 5)));
        assert_eq!(completed.completed_at.to_rfc3339(), "2024-01-05T10:00:00+00:00");
        assert_eq!(completed.duration_minutes, 45);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let today = date(2030, 6, 1);
        let once = migrate_with_today(&legacy_doc(), today);
        let twice = migrate_with_today(&serde_json::to_value(&once).unwrap(), today);
        assert_eq!(once, twice);

        let canonical = migrate_with_today(&json!({ "dateVersion": 2 }), today);
        let again = migrate_with_today(&serde_json::to_value(&canonical).unwrap(), today);
        assert_eq!(canonical, again);
    }

    #[test]
    fn test_canonical_backfills_ids() {
        let raw = json!({
            "dateVersion": 2,
            "weekAnchorDate": "2024-01-01",
            "tasks": [{ "id": "t1", "name": "Write", "durationMinutes": 30 }],
            "scheduledTasks": [
                { "id": "t1", "date": "2024-01-02", "startMinutes": 540, "durationMinutes": 30 },
                { "id": "t1", "occurrenceId": "dup", "date": "2024-01-03", "startMinutes": 540 },
                { "id": "t1", "occurrenceId": "dup", "date": "2024-01-04", "startMinutes": 540 }
            ]
        });
        let doc = migrate_with_today(&raw, date(2024, 1, 3));

        assert_eq!(doc.tasks[0].project_id, None);
        let ids: HashSet<_> = doc.scheduled_tasks.iter().map(|s| s.occurrence_id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("dup"));
        assert!(!ids.contains(""));
    }

    #[test]
    fn test_backfilled_ids_agree_across_migrations() {
        let today = date(2030, 6, 1);
        let first = migrate_with_today(&legacy_doc(), today);
        let second = migrate_with_today(&legacy_doc(), today);
        assert_eq!(first.scheduled_tasks, second.scheduled_tasks);
        assert_eq!(first, second);

        let raw = json!({
            "dateVersion": 2,
            "weekAnchorDate": "2024-01-01",
            "scheduledTasks": [
                { "id": "t1", "date": "2024-01-02", "startMinutes": 540 },
                { "id": "t1", "date": "2024-01-02", "startMinutes": 600 }
            ]
        });
        let first = migrate_with_today(&raw, today);
        let second = migrate_with_today(&raw, today);
        assert_eq!(first.scheduled_tasks, second.scheduled_tasks);
        assert_ne!(first.scheduled_tasks[0].occurrence_id, first.scheduled_tasks[1].occurrence_id);
    }

    #[test]
    fn test_backfill_avoids_ids_already_in_use() {
        let raw = json!({
            "dateVersion": 2,
            "scheduledTasks": [
                { "id": "t1", "date": "2024-01-02", "startMinutes": 540 },
                { "id": "t2", "occurrenceId": "occ-t1-2024-01-02-0", "date": "2024-01-03", "startMinutes": 540 }
            ]
        });
        let doc = migrate_with_today(&raw, date(2024, 1, 3));
        assert_eq!(doc.scheduled_tasks[0].occurrence_id, "occ-t1-2024-01-02-0-1");
        assert_eq!(doc.scheduled_tasks[1].occurrence_id, "occ-t1-2024-01-02-0");
    }

    #[test]
    fn test_durations_capped_at_a_day() {
        let legacy = json!({
            "scheduledTasks": [{ "id": "t1", "name": "Forever", "duration": 1e12 }]
        });
        let doc = migrate_with_today(&legacy, date(2024, 1, 3));
        assert_eq!(doc.scheduled_tasks[0].duration_minutes, MAX_DURATION_MINUTES);

        let canonical = json!({
            "dateVersion": 2,
            "tasks": [{ "id": "t1", "name": "Forever", "durationMinutes": 4294967295u32 }],
            "meetings": [{ "id": "m1", "date": "2024-01-02", "startMinutes": 600, "durationMinutes": 99999 }]
        });
        let doc = migrate_with_today(&canonical, date(2024, 1, 3));
        assert_eq!(doc.tasks[0].duration_minutes, MAX_DURATION_MINUTES);
        assert_eq!(doc.meetings[0].duration_minutes, MAX_DURATION_MINUTES);
    }

    #[test]
    fn test_malformed_input_never_fails() {
        let doc = migrate_with_today(&json!("not even an object"), date(2024, 1, 3));
        assert!(doc.is_empty());

        let raw = json!({
            "dateVersion": 2,
            "meetings": [{ "id": "m1" }, 42, { "id": "m2", "date": "2024-01-02", "startMinutes": 60 }],
            "cancelledInstances": [1, "s:2024-01-02"]
        });
        let doc = migrate_with_today(&raw, date(2024, 1, 3));
        assert_eq!(doc.meetings.len(), 1);
        assert_eq!(doc.cancelled_instances.len(), 1);
    }

    #[test]
    fn test_hours_to_minutes_rounds() {
        assert_eq!(hours_to_minutes(14.5), 870);
        assert_eq!(hours_to_minutes(9.3333), 560);
        assert_eq!(hours_to_minutes(-1.0), 0);
        assert_eq!(hours_to_minutes(30.0), MAX_START_MINUTES);
    }
}
