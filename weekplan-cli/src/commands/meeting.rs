use anyhow::{Context, Result};
use chrono::Local;
use clap::Subcommand;
use owo_colors::OwoColorize;

use weekplan_core::schedule::{MeetingEdit, MeetingPlacement, NewMeeting, format_start_time};
use weekplan_core::{CalendarDocument, ItemId};

use super::{finish, open_session, parse_date, parse_minutes, parse_time, parse_weekday, resolve_meeting};
use weekplan_cli::config::CliConfig;
use weekplan_cli::render::short_id;

#[derive(Subcommand)]
pub enum MeetingCommand {
    /// Add a one-off meeting, or a weekly series with --every
    Add {
        name: String,

        /// Start time (e.g. "10:00", "2:30pm")
        #[arg(long)]
        at: String,

        /// Date of a one-off meeting
        #[arg(long, required_unless_present = "every", conflicts_with = "every")]
        on: Option<String>,

        /// Weekday a weekly series repeats on (mon..fri)
        #[arg(long)]
        every: Option<String>,

        #[arg(short, long, default_value = "1h")]
        duration: String,

        /// Hex color, e.g. "#374151"
        #[arg(long)]
        color: Option<String>,

        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Edit a meeting (every week, for a series)
    Edit {
        meeting: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        at: Option<String>,

        #[arg(short, long)]
        duration: Option<String>,

        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },
    /// Move a meeting; a series moves to the new date's weekday
    Move {
        meeting: String,
        date: String,
        time: String,
    },
    /// Change a meeting's duration
    Resize { meeting: String, duration: String },
    /// Skip one date of a weekly series
    Cancel { meeting: String, date: String },
    /// Bring back a skipped date of a weekly series
    Restore { meeting: String, date: String },
    /// Delete a meeting, or a whole weekly series
    Rm { meeting: String },
}

fn series_of(document: &CalendarDocument, id: &ItemId) -> Result<String> {
    document
        .meeting(id)
        .and_then(|m| m.series_id())
        .map(str::to_string)
        .context("Only recurring meetings have dates to cancel or restore")
}

pub async fn run(config: &CliConfig, calendar: Option<&str>, command: MeetingCommand) -> Result<()> {
    let mut session = open_session(config, calendar).await?;
    let today = Local::now().date_naive();

    match command {
        MeetingCommand::Add {
            name,
            at,
            on,
            every,
            duration,
            color,
            notes,
        } => {
            let placement = match (every, on) {
                (Some(every), _) => MeetingPlacement::Weekly(parse_weekday(&every)?),
                (None, Some(on)) => MeetingPlacement::OneOff(parse_date(&on, today)?),
                (None, None) => anyhow::bail!("Pass --on <date> or --every <weekday>"),
            };
            let start_minutes = parse_time(&at)?;
            let draft = NewMeeting {
                name,
                placement,
                start_minutes,
                duration_minutes: parse_minutes(&duration)?,
                color,
                notes,
            };
            let id = session.update(|doc, _| doc.add_meeting(draft))?;
            println!(
                "Added meeting at {} {}",
                format_start_time(start_minutes),
                format!("[{}]", short_id(id.as_str())).dimmed()
            );
        }
        MeetingCommand::Edit {
            meeting,
            name,
            at,
            duration,
            color,
            notes,
        } => {
            let id = ItemId::new(resolve_meeting(session.document(), &meeting)?);
            let edit = MeetingEdit {
                name,
                start_minutes: at.as_deref().map(parse_time).transpose()?,
                duration_minutes: duration.as_deref().map(parse_minutes).transpose()?,
                color,
                notes,
            };
            session.update(|doc, _| doc.edit_meeting(&id, edit))?;
            println!("Updated meeting");
        }
        MeetingCommand::Move { meeting, date, time } => {
            let id = ItemId::new(resolve_meeting(session.document(), &meeting)?);
            let date = parse_date(&date, today)?;
            let start = parse_time(&time)?;
            session.update(|doc, _| doc.move_meeting(&id, date, start))?;
            println!("Moved to {} at {}", date.format("%a %b %-d"), format_start_time(start));
        }
        MeetingCommand::Resize { meeting, duration } => {
            let id = ItemId::new(resolve_meeting(session.document(), &meeting)?);
            let minutes = parse_minutes(&duration)?;
            session.update(|doc, _| doc.resize_meeting(&id, minutes))?;
            println!("Resized");
        }
        MeetingCommand::Cancel { meeting, date } => {
            let id = ItemId::new(resolve_meeting(session.document(), &meeting)?);
            let series_id = series_of(session.document(), &id)?;
            let date = parse_date(&date, today)?;
            session.update(|doc, _| doc.cancel_occurrence(&series_id, date))?;
            println!("Cancelled {}", date.format("%a %b %-d"));
        }
        MeetingCommand::Restore { meeting, date } => {
            let id = ItemId::new(resolve_meeting(session.document(), &meeting)?);
            let series_id = series_of(session.document(), &id)?;
            let date = parse_date(&date, today)?;
            let restored = session.update(|doc, _| Ok(doc.restore_occurrence(&series_id, date)))?;
            if restored {
                println!("Restored {}", date.format("%a %b %-d"));
            } else {
                println!("{}", "That date wasn't cancelled".dimmed());
            }
        }
        MeetingCommand::Rm { meeting } => {
            let id = ItemId::new(resolve_meeting(session.document(), &meeting)?);
            session.update(|doc, _| doc.delete_meeting(&id))?;
            println!("Deleted meeting");
        }
    }

    finish(session).await
}
