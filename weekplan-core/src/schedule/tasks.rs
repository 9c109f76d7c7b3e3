//! Task and occurrence state transitions.
//!
//! A task moves between the unscheduled pool, one or more scheduled
//! occurrences, and a single completion record. Pool membership is derived
//! (see [`CalendarDocument::unscheduled_tasks`]), so none of these
//! operations maintain a flag for it.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::date_range::{DateRange, noon_local};
use crate::document::{
    CalendarDocument, CompletedTask, ItemId, MAX_DURATION_MINUTES, MAX_START_MINUTES, ScheduledTask, Task,
};
use crate::error::{WeekplanError, WeekplanResult};
use crate::ids;
use crate::schedule::colors::ColorTable;

/// Shortest duration an occurrence can be resized to.
pub const MIN_DURATION_MINUTES: u32 = 15;

/// Fields for a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub duration_minutes: u32,
    pub notes: String,
    pub project_id: Option<ItemId>,
}

/// Changes to a task; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub name: Option<String>,
    pub duration_minutes: Option<u32>,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub project_id: Option<Option<ItemId>>,
}

pub(crate) fn validate_start(start_minutes: u32) -> WeekplanResult<()> {
    if start_minutes > MAX_START_MINUTES {
        return Err(WeekplanError::InvalidInput(format!(
            "start {} is past the end of the day",
            start_minutes
        )));
    }
    Ok(())
}

pub(crate) fn validate_name(name: &str) -> WeekplanResult<()> {
    if name.trim().is_empty() {
        return Err(WeekplanError::InvalidInput("name must not be empty".into()));
    }
    Ok(())
}

pub(crate) fn validate_duration(duration_minutes: u32) -> WeekplanResult<()> {
    if duration_minutes == 0 {
        return Err(WeekplanError::InvalidInput("duration must be positive".into()));
    }
    if duration_minutes > MAX_DURATION_MINUTES {
        return Err(WeekplanError::InvalidInput(format!(
            "duration {} is longer than a day",
            duration_minutes
        )));
    }
    Ok(())
}

impl CalendarDocument {
    /// Add a task to the unscheduled pool, colored by its first word.
    pub fn add_task(&mut self, draft: NewTask, colors: &mut ColorTable) -> WeekplanResult<ItemId> {
        let task = self.new_task(draft, colors)?;
        let id = task.id.clone();
        self.tasks.push(task);
        Ok(id)
    }

    fn new_task(&self, draft: NewTask, colors: &mut ColorTable) -> WeekplanResult<Task> {
        validate_name(&draft.name)?;
        validate_duration(draft.duration_minutes)?;
        if let Some(project_id) = &draft.project_id {
            self.require_project(project_id)?;
        }

        Ok(Task {
            id: ids::task_id(),
            color: colors.color_for(&draft.name),
            name: draft.name.trim().to_string(),
            duration_minutes: draft.duration_minutes,
            notes: draft.notes,
            project_id: draft.project_id,
        })
    }

    /// Edit a task template and keep its occurrences' copies in sync.
    ///
    /// Occurrence durations are left alone; they may have been resized.
    pub fn edit_task(&mut self, id: &ItemId, edit: TaskEdit) -> WeekplanResult<()> {
        let known = self.task(id).is_some() || self.scheduled_tasks.iter().any(|s| &s.id == id);
        if !known {
            return Err(WeekplanError::UnknownTask(id.to_string()));
        }
        if let Some(name) = &edit.name {
            validate_name(name)?;
        }
        if let Some(duration) = edit.duration_minutes {
            validate_duration(duration)?;
        }
        if let Some(Some(project_id)) = &edit.project_id {
            self.require_project(project_id)?;
        }

        if let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) {
            if let Some(name) = &edit.name {
                task.name = name.trim().to_string();
            }
            if let Some(duration) = edit.duration_minutes {
                task.duration_minutes = duration;
            }
            if let Some(color) = &edit.color {
                task.color = color.clone();
            }
            if let Some(notes) = &edit.notes {
                task.notes = notes.clone();
            }
            if let Some(project_id) = &edit.project_id {
                task.project_id = project_id.clone();
            }
        }

        for occurrence in self.scheduled_tasks.iter_mut().filter(|s| &s.id == id) {
            if let Some(name) = &edit.name {
                occurrence.name = name.trim().to_string();
            }
            if let Some(color) = &edit.color {
                occurrence.color = color.clone();
            }
            if let Some(notes) = &edit.notes {
                occurrence.notes = notes.clone();
            }
            if let Some(project_id) = &edit.project_id {
                occurrence.project_id = project_id.clone();
            }
        }

        Ok(())
    }

    /// Remove a task everywhere: template, occurrences and completion.
    pub fn delete_task(&mut self, id: &ItemId) -> WeekplanResult<()> {
        let before = self.tasks.len() + self.scheduled_tasks.len() + self.completed_tasks.len();

        self.tasks.retain(|t| &t.id != id);
        self.scheduled_tasks.retain(|s| &s.id != id);
        self.completed_tasks.retain(|c| &c.id != id);

        let after = self.tasks.len() + self.scheduled_tasks.len() + self.completed_tasks.len();
        if before == after {
            return Err(WeekplanError::UnknownTask(id.to_string()));
        }
        Ok(())
    }

    /// Place a pool task on the calendar. Returns the new occurrence ID.
    pub fn schedule_task(
        &mut self,
        id: &ItemId,
        date: NaiveDate,
        start_minutes: u32,
    ) -> WeekplanResult<String> {
        validate_start(start_minutes)?;
        let task = self
            .task(id)
            .cloned()
            .ok_or_else(|| WeekplanError::UnknownTask(id.to_string()))?;

        Ok(self.push_occurrence(&task, date, start_minutes, task.duration_minutes))
    }

    /// Create an occurrence for a task that has no pool entry, as the
    /// quick schedule-from-calendar flow does.
    pub fn schedule_adhoc(
        &mut self,
        draft: NewTask,
        date: NaiveDate,
        start_minutes: u32,
        colors: &mut ColorTable,
    ) -> WeekplanResult<(ItemId, String)> {
        validate_start(start_minutes)?;
        let task = self.new_task(draft, colors)?;
        let occurrence_id = self.push_occurrence(&task, date, start_minutes, task.duration_minutes);
        Ok((task.id, occurrence_id))
    }

    fn push_occurrence(
        &mut self,
        task: &Task,
        date: NaiveDate,
        start_minutes: u32,
        duration_minutes: u32,
    ) -> String {
        let occurrence_id = ids::occurrence_id();
        self.scheduled_tasks.push(ScheduledTask {
            id: task.id.clone(),
            occurrence_id: occurrence_id.clone(),
            date,
            start_minutes,
            duration_minutes,
            name: task.name.clone(),
            color: task.color.clone(),
            notes: task.notes.clone(),
            project_id: task.project_id.clone(),
        });
        debug!(task = %task.id, occurrence = %occurrence_id, %date, "Scheduled occurrence");
        occurrence_id
    }

    fn occurrence_mut(&mut self, occurrence_id: &str) -> WeekplanResult<&mut ScheduledTask> {
        self.scheduled_tasks
            .iter_mut()
            .find(|s| s.occurrence_id == occurrence_id)
            .ok_or_else(|| WeekplanError::UnknownOccurrence(occurrence_id.to_string()))
    }

    /// Move exactly one occurrence; siblings of the same task stay put.
    pub fn move_occurrence(
        &mut self,
        occurrence_id: &str,
        date: NaiveDate,
        start_minutes: u32,
    ) -> WeekplanResult<()> {
        validate_start(start_minutes)?;
        let occurrence = self.occurrence_mut(occurrence_id)?;
        occurrence.date = date;
        occurrence.start_minutes = start_minutes;
        Ok(())
    }

    /// Add another occurrence of the same task at a new date/time.
    pub fn duplicate_occurrence(
        &mut self,
        occurrence_id: &str,
        date: NaiveDate,
        start_minutes: u32,
    ) -> WeekplanResult<String> {
        validate_start(start_minutes)?;
        let source = self
            .occurrence(occurrence_id)
            .cloned()
            .ok_or_else(|| WeekplanError::UnknownOccurrence(occurrence_id.to_string()))?;

        Ok(self.push_occurrence(&source.to_task(), date, start_minutes, source.duration_minutes))
    }

    /// Change one occurrence's duration, kept between the minimum and a day.
    pub fn resize_occurrence(&mut self, occurrence_id: &str, duration_minutes: u32) -> WeekplanResult<()> {
        let occurrence = self.occurrence_mut(occurrence_id)?;
        occurrence.duration_minutes = duration_minutes.clamp(MIN_DURATION_MINUTES, MAX_DURATION_MINUTES);
        Ok(())
    }

    /// Take one occurrence off the calendar.
    ///
    /// If its task has no template in the pool (it was scheduled ad hoc),
    /// one is materialized from the occurrence.
    pub fn unschedule_occurrence(&mut self, occurrence_id: &str) -> WeekplanResult<()> {
        let index = self
            .scheduled_tasks
            .iter()
            .position(|s| s.occurrence_id == occurrence_id)
            .ok_or_else(|| WeekplanError::UnknownOccurrence(occurrence_id.to_string()))?;

        let occurrence = self.scheduled_tasks.remove(index);
        if self.task(&occurrence.id).is_none() {
            self.tasks.push(occurrence.to_task());
        }
        Ok(())
    }

    /// Complete a task.
    ///
    /// Every occurrence of the task within `within` (or anywhere, when
    /// `None`) is removed and exactly one completion record is kept per
    /// task. The record is stamped at local noon of the latest removed
    /// occurrence's date, or `now` when the task was completed from the
    /// pool.
    pub fn complete_task(
        &mut self,
        id: &ItemId,
        within: Option<&DateRange>,
        now: DateTime<Utc>,
    ) -> WeekplanResult<()> {
        let in_scope = |s: &ScheduledTask| &s.id == id && within.is_none_or(|r| r.contains(s.date));

        let latest = self
            .scheduled_tasks
            .iter()
            .filter(|s| in_scope(s))
            .max_by_key(|s| (s.date, s.start_minutes))
            .cloned();

        let already_completed = self.completed(id).is_some();
        if latest.is_none() && self.task(id).is_none() && !already_completed {
            return Err(WeekplanError::UnknownTask(id.to_string()));
        }

        self.scheduled_tasks.retain(|s| !in_scope(s));

        if already_completed {
            return Ok(());
        }

        let record = match latest {
            Some(occurrence) => CompletedTask {
                id: occurrence.id.clone(),
                occurrence_id: Some(occurrence.occurrence_id.clone()),
                date: Some(occurrence.date),
                start_minutes: Some(occurrence.start_minutes),
                duration_minutes: occurrence.duration_minutes,
                name: occurrence.name.clone(),
                color: occurrence.color.clone(),
                notes: occurrence.notes.clone(),
                project_id: occurrence.project_id.clone(),
                completed_at: noon_local(occurrence.date),
            },
            None => {
                let task = self
                    .task(id)
                    .ok_or_else(|| WeekplanError::UnknownTask(id.to_string()))?;
                CompletedTask {
                    id: task.id.clone(),
                    occurrence_id: None,
                    date: None,
                    start_minutes: None,
                    duration_minutes: task.duration_minutes,
                    name: task.name.clone(),
                    color: task.color.clone(),
                    notes: task.notes.clone(),
                    project_id: task.project_id.clone(),
                    completed_at: now,
                }
            }
        };

        debug!(task = %id, "Completed task");
        self.completed_tasks.push(record);
        Ok(())
    }

    /// Complete the task owning an occurrence, sweeping up every
    /// occurrence of it in the same week.
    pub fn complete_occurrence(&mut self, occurrence_id: &str, now: DateTime<Utc>) -> WeekplanResult<()> {
        let occurrence = self
            .occurrence(occurrence_id)
            .cloned()
            .ok_or_else(|| WeekplanError::UnknownOccurrence(occurrence_id.to_string()))?;

        let week = DateRange::full_week(occurrence.date);
        self.complete_task(&occurrence.id, Some(&week), now)
    }

    /// Drop a completion record, returning the task to the pool if it no
    /// longer has a template there.
    pub fn uncomplete_task(&mut self, id: &ItemId) -> WeekplanResult<()> {
        let record = self.take_completed(id)?;
        if self.task(id).is_none() {
            self.tasks.push(record.to_task());
        }
        Ok(())
    }

    /// Move a completed task straight back onto the calendar.
    pub fn restore_completed(
        &mut self,
        id: &ItemId,
        date: NaiveDate,
        start_minutes: u32,
    ) -> WeekplanResult<String> {
        validate_start(start_minutes)?;
        let record = self.take_completed(id)?;
        Ok(self.push_occurrence(&record.to_task(), date, start_minutes, record.duration_minutes))
    }

    fn take_completed(&mut self, id: &ItemId) -> WeekplanResult<CompletedTask> {
        let index = self
            .completed_tasks
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| WeekplanError::UnknownTask(id.to_string()))?;
        Ok(self.completed_tasks.remove(index))
    }

    /// Permanently remove a completed task everywhere.
    pub fn delete_completed(&mut self, id: &ItemId) -> WeekplanResult<()> {
        if self.completed(id).is_none() {
            return Err(WeekplanError::UnknownTask(id.to_string()));
        }
        self.delete_task(id)
    }

    /// Permanently remove every completed task everywhere.
    pub fn clear_completed(&mut self) {
        let completed: Vec<ItemId> = self.completed_tasks.drain(..).map(|c| c.id).collect();
        self.tasks.retain(|t| !completed.contains(&t.id));
        self.scheduled_tasks.retain(|s| !completed.contains(&s.id));
    }
}
