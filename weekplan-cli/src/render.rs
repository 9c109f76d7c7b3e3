//! TUI rendering traits for weekplan types.
//!
//! Extension traits that add colored terminal rendering to weekplan-core
//! types using owo_colors. Item colors are the document's own hex colors.

use chrono::{Local, NaiveDate};
use owo_colors::OwoColorize;

use weekplan_core::schedule::{
    DayItem, Interval, NowAndNext, Placement, format_duration, format_start_time, layout_day,
};
use weekplan_core::{CalendarDocument, CompletedTask, DateRange, Project, Task};

use crate::autosave::SyncStatus;
use crate::session::Origin;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

/// Parse `#RRGGBB`.
fn hex_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// A colored block marker for an item, plain when the color won't parse.
fn swatch(color: &str) -> String {
    match hex_rgb(color) {
        Some((r, g, b)) => "▌".truecolor(r, g, b).to_string(),
        None => "▌".to_string(),
    }
}

/// Trailing part of an ID, enough to type back on the command line.
pub fn short_id(id: &str) -> &str {
    let start = id.len().saturating_sub(8);
    id.get(start..).unwrap_or(id)
}

impl Render for DayItem {
    fn render(&self) -> String {
        let time = format!("{:>8}", format_start_time(self.start_minutes()));
        let duration = format_duration(self.duration_minutes());

        match self {
            DayItem::Task(task) => format!(
                "{} {} {} {} {}",
                time.dimmed(),
                swatch(&task.color),
                task.name,
                duration.dimmed(),
                format!("[{}]", short_id(&task.occurrence_id)).dimmed()
            ),
            DayItem::Meeting(meeting) => {
                let repeat = if meeting.is_recurring() { " ↻" } else { "" };
                format!(
                    "{} {} {}{} {} {}",
                    time.dimmed(),
                    swatch(&meeting.color),
                    meeting.name.bold(),
                    repeat,
                    duration.dimmed(),
                    format!("[{}]", short_id(meeting.meeting_id.as_str())).dimmed()
                )
            }
        }
    }
}

impl Render for Task {
    fn render(&self) -> String {
        format!(
            "{} {} {} {}",
            swatch(&self.color),
            self.name,
            format_duration(self.duration_minutes).dimmed(),
            format!("[{}]", short_id(self.id.as_str())).dimmed()
        )
    }
}

impl Render for CompletedTask {
    fn render(&self) -> String {
        let when = self
            .completed_at
            .with_timezone(&Local)
            .format("%a %b %-d")
            .to_string();
        format!(
            "{} {} {} {}",
            "✓".green(),
            self.name.strikethrough(),
            when.dimmed(),
            format!("[{}]", short_id(self.id.as_str())).dimmed()
        )
    }
}

impl Render for Project {
    fn render(&self) -> String {
        let archived = if self.archived { " (archived)" } else { "" };
        format!(
            "{} {}{} {}",
            swatch(&self.color),
            self.name.bold(),
            archived.dimmed(),
            format!("[{}]", short_id(self.id.as_str())).dimmed()
        )
    }
}

impl Render for SyncStatus {
    fn render(&self) -> String {
        match self {
            SyncStatus::Idle => "Nothing to save".dimmed().to_string(),
            SyncStatus::Pending | SyncStatus::Saving => "Saving...".dimmed().to_string(),
            SyncStatus::Saved { has_changes: true, .. } => "Saved".green().to_string(),
            SyncStatus::Saved { has_changes: false, .. } => "Up to date".dimmed().to_string(),
            SyncStatus::Offline { error, .. } => {
                format!("{} ({}); changes kept locally", "Offline".yellow(), error)
            }
            SyncStatus::Superseded { .. } => "Reloaded newer server copy".yellow().to_string(),
        }
    }
}

impl Render for Origin {
    fn render(&self) -> String {
        match self {
            Origin::Server => String::new(),
            Origin::Cache => "Offline: showing cached calendar".yellow().to_string(),
            Origin::Fresh => "Offline: nothing cached, starting empty".yellow().to_string(),
        }
    }
}

/// Format a date as a human-readable label (e.g. "Today", "Tomorrow", "Wed Feb 25")
fn format_date_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}

/// Indent overlapping items by column so side-by-side items read as such.
fn render_placement(placement: &Placement<DayItem>) -> String {
    let indent = "  ".repeat(placement.column);
    let columns = if placement.total_columns > 1 {
        format!(" {}/{}", placement.column + 1, placement.total_columns)
            .dimmed()
            .to_string()
    } else {
        String::new()
    };
    format!("  {}{}{}", indent, placement.item.render(), columns)
}

/// Day-by-day agenda for `range`.
pub fn render_week(document: &CalendarDocument, range: &DateRange, today: NaiveDate) -> String {
    let mut lines = Vec::new();

    for date in range.days() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format_date_label(date, today).bold().to_string());

        let placements = layout_day(document.day_items(date));
        if placements.is_empty() {
            lines.push(format!("  {}", "Nothing scheduled".dimmed()));
        }
        lines.extend(placements.iter().map(render_placement));
    }

    lines.join("\n")
}

/// The unscheduled pool, grouped under projects where tasks have one.
pub fn render_pool(document: &CalendarDocument) -> String {
    let pool = document.unscheduled_tasks();
    if pool.is_empty() {
        return "No unscheduled tasks".dimmed().to_string();
    }

    let projects = document.projects_sorted(false);
    let listed = |task: &Task| {
        task.project_id
            .as_ref()
            .is_some_and(|id| projects.iter().any(|p| &p.id == id))
    };

    let mut lines = Vec::new();
    for task in pool.iter().filter(|t| !listed(**t)) {
        lines.push(format!("  {}", task.render()));
    }

    for project in &projects {
        let tasks: Vec<_> = pool
            .iter()
            .filter(|t| t.project_id.as_ref() == Some(&project.id))
            .collect();
        if tasks.is_empty() {
            continue;
        }
        lines.push(project.render());
        if project.collapsed {
            lines.push(format!("  {}", format!("({} tasks)", tasks.len()).dimmed()));
            continue;
        }
        lines.extend(tasks.iter().map(|t| format!("  {}", t.render())));
    }

    lines.join("\n")
}

/// What is on now and what comes next.
pub fn render_now_and_next(status: &NowAndNext) -> String {
    let mut lines = Vec::new();

    if status.current.is_empty() {
        lines.push(format!("{} {}", "Now:".bold(), "Free".dimmed()));
    } else {
        lines.push("Now:".bold().to_string());
        lines.extend(status.current.iter().map(|item| format!("  {}", item.render())));
    }

    match &status.next {
        Some(item) => {
            let label = format_date_label(item.date(), Local::now().date_naive());
            lines.push(format!("{} {}", "Next:".bold(), label.dimmed()));
            lines.push(format!("  {}", item.render()));
        }
        None => lines.push(format!("{} {}", "Next:".bold(), "Nothing else this week".dimmed())),
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_rgb() {
        assert_eq!(hex_rgb("#3B82F6"), Some((0x3b, 0x82, 0xf6)));
        assert_eq!(hex_rgb("3B82F6"), None);
        assert_eq!(hex_rgb("#fff"), None);
        assert_eq!(hex_rgb("#zzzzzz"), None);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("task-1700000000000-1a2b3c4d"), "1a2b3c4d");
        assert_eq!(short_id("t1"), "t1");
    }

    #[test]
    fn test_date_label() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(format_date_label(today, today), "Today");
        assert_eq!(format_date_label(today.succ_opt().unwrap(), today), "Tomorrow");
        assert_eq!(
            format_date_label(NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(), today),
            "Fri Jan 12"
        );
    }

    #[test]
    fn test_week_lists_every_day() {
        let doc = CalendarDocument::empty(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        let range = DateRange::work_week(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        let out = render_week(&doc, &range, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!(out.matches("Nothing scheduled").count(), 5);
    }
}
