use anyhow::Result;
use chrono::{Local, Utc};
use clap::Subcommand;
use owo_colors::OwoColorize;

use weekplan_core::schedule::{NewTask, TaskEdit, format_start_time};
use weekplan_core::{DateRange, ItemId};

use super::{
    date_or_today, finish, open_session, parse_date, parse_minutes, parse_time, resolve_occurrence,
    resolve_project, resolve_task,
};
use weekplan_cli::config::CliConfig;
use weekplan_cli::render::short_id;

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Add a task to the unscheduled pool, or straight onto the calendar
    Add {
        name: String,

        /// Duration (e.g. "30", "45m", "1h 30m")
        #[arg(short, long, default_value = "30m")]
        duration: String,

        #[arg(long, default_value = "")]
        notes: String,

        /// Project name or ID
        #[arg(short, long)]
        project: Option<String>,

        /// Schedule on this date (YYYY-MM-DD, today, tomorrow, or a weekday)
        #[arg(long, requires = "at")]
        on: Option<String>,

        /// Schedule at this time (e.g. "9:15", "2:30pm")
        #[arg(long)]
        at: Option<String>,
    },
    /// Edit a task and its scheduled copies
    Edit {
        task: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        duration: Option<String>,

        /// Hex color, e.g. "#10B981"
        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        #[arg(short, long, conflicts_with = "no_project")]
        project: Option<String>,

        /// Remove the task from its project
        #[arg(long)]
        no_project: bool,
    },
    /// Delete a task everywhere
    Rm { task: String },
    /// Put a pool task on the calendar
    Schedule {
        task: String,
        date: String,
        time: String,
    },
    /// Move one scheduled occurrence
    Move {
        occurrence: String,
        date: String,
        time: String,
    },
    /// Schedule another occurrence of the same task
    Dup {
        occurrence: String,
        date: String,
        time: String,
    },
    /// Change one occurrence's duration
    Resize { occurrence: String, duration: String },
    /// Take one occurrence off the calendar
    Unschedule { occurrence: String },
    /// Complete a task (or the task owning an occurrence ID)
    Done {
        task: String,

        /// Sweep occurrences in the week containing this date
        #[arg(long, conflicts_with = "all")]
        week: Option<String>,

        /// Sweep every occurrence, whatever the week
        #[arg(long)]
        all: bool,
    },
    /// Return a completed task to the pool
    Undo { task: String },
    /// Put a completed task straight back onto the calendar
    Restore {
        task: String,
        date: String,
        time: String,
    },
    /// Permanently delete completed tasks
    Purge {
        /// One completed task; omit with --all to clear every one
        task: Option<String>,

        #[arg(long, conflicts_with = "task")]
        all: bool,
    },
}

pub async fn run(config: &CliConfig, calendar: Option<&str>, command: TaskCommand) -> Result<()> {
    let mut session = open_session(config, calendar).await?;
    let today = Local::now().date_naive();

    match command {
        TaskCommand::Add {
            name,
            duration,
            notes,
            project,
            on,
            at,
        } => {
            let project_id = project
                .map(|p| resolve_project(session.document(), &p))
                .transpose()?
                .map(ItemId::new);
            let draft = NewTask {
                name,
                duration_minutes: parse_minutes(&duration)?,
                notes,
                project_id,
            };

            match at {
                Some(at) => {
                    let date = date_or_today(on.as_deref(), today)?;
                    let start = parse_time(&at)?;
                    let (_, occurrence_id) = session
                        .update(|doc, prefs| doc.schedule_adhoc(draft, date, start, &mut prefs.colors))?;
                    println!(
                        "Scheduled {} at {} {}",
                        date.format("%a %b %-d"),
                        format_start_time(start),
                        format!("[{}]", short_id(&occurrence_id)).dimmed()
                    );
                }
                None => {
                    let id = session.update(|doc, prefs| doc.add_task(draft, &mut prefs.colors))?;
                    println!("Added to pool {}", format!("[{}]", short_id(id.as_str())).dimmed());
                }
            }
        }
        TaskCommand::Edit {
            task,
            name,
            duration,
            color,
            notes,
            project,
            no_project,
        } => {
            let id = ItemId::new(resolve_task(session.document(), &task)?);
            let project_id = if no_project {
                Some(None)
            } else {
                project
                    .map(|p| resolve_project(session.document(), &p))
                    .transpose()?
                    .map(|p| Some(ItemId::new(p)))
            };
            let edit = TaskEdit {
                name,
                duration_minutes: duration.as_deref().map(parse_minutes).transpose()?,
                color,
                notes,
                project_id,
            };
            session.update(|doc, _| doc.edit_task(&id, edit))?;
            println!("Updated task");
        }
        TaskCommand::Rm { task } => {
            let id = ItemId::new(resolve_task(session.document(), &task)?);
            session.update(|doc, _| doc.delete_task(&id))?;
            println!("Deleted task");
        }
        TaskCommand::Schedule { task, date, time } => {
            let id = ItemId::new(resolve_task(session.document(), &task)?);
            let date = parse_date(&date, today)?;
            let start = parse_time(&time)?;
            let occurrence_id = session.update(|doc, _| doc.schedule_task(&id, date, start))?;
            println!(
                "Scheduled {} at {} {}",
                date.format("%a %b %-d"),
                format_start_time(start),
                format!("[{}]", short_id(&occurrence_id)).dimmed()
            );
        }
        TaskCommand::Move { occurrence, date, time } => {
            let occurrence_id = resolve_occurrence(session.document(), &occurrence)?;
            let date = parse_date(&date, today)?;
            let start = parse_time(&time)?;
            session.update(|doc, _| doc.move_occurrence(&occurrence_id, date, start))?;
            println!("Moved to {} at {}", date.format("%a %b %-d"), format_start_time(start));
        }
        TaskCommand::Dup { occurrence, date, time } => {
            let occurrence_id = resolve_occurrence(session.document(), &occurrence)?;
            let date = parse_date(&date, today)?;
            let start = parse_time(&time)?;
            let copy = session.update(|doc, _| doc.duplicate_occurrence(&occurrence_id, date, start))?;
            println!(
                "Also scheduled {} at {} {}",
                date.format("%a %b %-d"),
                format_start_time(start),
                format!("[{}]", short_id(&copy)).dimmed()
            );
        }
        TaskCommand::Resize { occurrence, duration } => {
            let occurrence_id = resolve_occurrence(session.document(), &occurrence)?;
            let minutes = parse_minutes(&duration)?;
            session.update(|doc, _| doc.resize_occurrence(&occurrence_id, minutes))?;
            println!("Resized");
        }
        TaskCommand::Unschedule { occurrence } => {
            let occurrence_id = resolve_occurrence(session.document(), &occurrence)?;
            session.update(|doc, _| doc.unschedule_occurrence(&occurrence_id))?;
            println!("Back in the pool");
        }
        TaskCommand::Done { task, week, all } => {
            let now = Utc::now();
            if session.document().occurrence(&task).is_some() {
                session.update(|doc, _| doc.complete_occurrence(&task, now))?;
            } else {
                let id = ItemId::new(resolve_task(session.document(), &task)?);
                let scope = if all {
                    None
                } else {
                    Some(DateRange::full_week(date_or_today(week.as_deref(), today)?))
                };
                session.update(|doc, _| doc.complete_task(&id, scope.as_ref(), now))?;
            }
            println!("{} Done", "✓".green());
        }
        TaskCommand::Undo { task } => {
            let id = ItemId::new(resolve_task(session.document(), &task)?);
            session.update(|doc, _| doc.uncomplete_task(&id))?;
            println!("Back in the pool");
        }
        TaskCommand::Restore { task, date, time } => {
            let id = ItemId::new(resolve_task(session.document(), &task)?);
            let date = parse_date(&date, today)?;
            let start = parse_time(&time)?;
            session.update(|doc, _| doc.restore_completed(&id, date, start))?;
            println!("Restored to {} at {}", date.format("%a %b %-d"), format_start_time(start));
        }
        TaskCommand::Purge { task, all } => match (task, all) {
            (Some(task), _) => {
                let id = ItemId::new(resolve_task(session.document(), &task)?);
                session.update(|doc, _| doc.delete_completed(&id))?;
                println!("Deleted completed task");
            }
            (None, true) => {
                let count = session.document().completed_tasks.len();
                session.update(|doc, _| {
                    doc.clear_completed();
                    Ok(())
                })?;
                println!("Deleted {} completed tasks", count);
            }
            (None, false) => anyhow::bail!("Name a completed task, or pass --all"),
        },
    }

    finish(session).await
}
