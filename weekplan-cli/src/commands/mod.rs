pub mod calendar;
pub mod meeting;
pub mod prefs;
pub mod project;
pub mod task;
pub mod view;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Weekday};
use owo_colors::OwoColorize;

use weekplan_core::CalendarDocument;
use weekplan_core::date_range::{monday_of, offset_days};

use weekplan_cli::cache::LocalCache;
use weekplan_cli::client::Client;
use weekplan_cli::config::CliConfig;
use weekplan_cli::render::Render;
use weekplan_cli::session::{Origin, Session};

/// Open the selected calendar, warning when working from the cache.
pub async fn open_session(config: &CliConfig, calendar: Option<&str>) -> Result<Session> {
    let calendar_id = config.calendar(calendar)?;
    let client = Client::new(&config.server_url)?;
    let cache = LocalCache::new(config.cache_dir()?);

    let session = Session::open(Arc::new(client), cache, &calendar_id, config.autosave()?).await?;
    if session.origin() != Origin::Server {
        eprintln!("{}", session.origin().render());
    }
    Ok(session)
}

/// Save what the command changed and report how it went.
pub async fn finish(mut session: Session) -> Result<()> {
    let status = session.sync().await?;
    for notice in session.take_notices() {
        eprintln!("{}", notice.yellow());
    }
    eprintln!("{}", status.render());
    session.close().await;
    Ok(())
}

/// Parse a date: `today`, `tomorrow`, a weekday name (this week), or
/// YYYY-MM-DD.
pub fn parse_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let lower = input.trim().to_lowercase();
    match lower.as_str() {
        "today" => return Ok(today),
        "tomorrow" => return Ok(offset_days(today, 1)),
        _ => {}
    }

    if let Ok(weekday) = lower.parse::<Weekday>() {
        let days = weekday.num_days_from_monday() as i64;
        return Ok(offset_days(monday_of(today), days));
    }

    NaiveDate::parse_from_str(&lower, "%Y-%m-%d")
        .with_context(|| format!("Invalid date {:?}; use YYYY-MM-DD, today, tomorrow or a weekday", input))
}

/// Parse a time of day into minutes since midnight: `9`, `9:15`, `14:30`,
/// `9am`, `2:30pm`.
pub fn parse_time(input: &str) -> Result<u32> {
    let lower = input.trim().to_lowercase();
    let (clock, meridiem) = if let Some(rest) = lower.strip_suffix("am") {
        (rest.trim(), Some(false))
    } else if let Some(rest) = lower.strip_suffix("pm") {
        (rest.trim(), Some(true))
    } else {
        (lower.as_str(), None)
    };

    let invalid = || anyhow::anyhow!("Invalid time {:?}; use e.g. 9:15, 14:30 or 2:30pm", input);

    let (hour, minute) = match clock.split_once(':') {
        Some((h, m)) => (h.parse::<u32>().map_err(|_| invalid())?, m.parse::<u32>().map_err(|_| invalid())?),
        None => (clock.parse::<u32>().map_err(|_| invalid())?, 0),
    };
    if minute >= 60 {
        return Err(invalid());
    }

    let hour = match meridiem {
        Some(pm) if (1..=12).contains(&hour) => (hour % 12) + if pm { 12 } else { 0 },
        Some(_) => return Err(invalid()),
        None if hour < 24 => hour,
        None => return Err(invalid()),
    };

    Ok(hour * 60 + minute)
}

/// Parse a duration in whole minutes: `45` or a humantime string like
/// `1h 30m`.
pub fn parse_minutes(input: &str) -> Result<u32> {
    if let Ok(minutes) = input.trim().parse::<u32>() {
        return Ok(minutes);
    }
    let duration = humantime::parse_duration(input)
        .with_context(|| format!("Invalid duration {:?}; use e.g. 45, 45m or 1h 30m", input))?;
    u32::try_from(duration.as_secs() / 60).context("Duration too long")
}

/// Parse a Monday-to-Friday weekday into its index (0 = Monday).
pub fn parse_weekday(input: &str) -> Result<u8> {
    let weekday = input
        .trim()
        .parse::<Weekday>()
        .map_err(|_| anyhow::anyhow!("Invalid weekday {:?}", input))?;
    let index = weekday.num_days_from_monday();
    if index > 4 {
        anyhow::bail!("Meetings repeat on weekdays only, not {}", weekday);
    }
    Ok(index as u8)
}

fn matching<'a>(
    candidates: impl Iterator<Item = (&'a str, &'a str)>,
    pred: impl Fn(&str, &str) -> bool,
) -> Vec<&'a str> {
    let mut found: Vec<&str> = candidates
        .filter(|(id, name)| pred(*id, *name))
        .map(|(id, _)| id)
        .collect();
    found.dedup();
    found
}

/// Find one item by exact ID, then by ID suffix, then by case-insensitive
/// name. Anything matching more than one item is an error.
fn resolve<'a>(
    kind: &str,
    query: &str,
    candidates: impl Iterator<Item = (&'a str, &'a str)> + Clone,
) -> Result<String> {
    if let Some((id, _)) = candidates.clone().find(|(id, _)| *id == query) {
        return Ok(id.to_string());
    }

    let lower = query.to_lowercase();
    let passes = [
        matching(candidates.clone(), |id, _| id.ends_with(query)),
        matching(candidates, |_, name| name.to_lowercase() == lower),
    ];

    for found in passes {
        match found.as_slice() {
            [] => continue,
            [id] => return Ok(id.to_string()),
            _ => anyhow::bail!("{:?} matches more than one {}; use its ID", query, kind),
        }
    }

    anyhow::bail!("No {} matches {:?}", kind, query)
}

/// A task known anywhere in the document: pool, calendar or completed.
pub fn resolve_task(document: &CalendarDocument, query: &str) -> Result<String> {
    let pool = document.tasks.iter().map(|t| (t.id.as_str(), t.name.as_str()));
    let scheduled = document
        .scheduled_tasks
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()));
    let completed = document
        .completed_tasks
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()));

    let mut all: Vec<(&str, &str)> = pool.chain(scheduled).chain(completed).collect();
    all.sort();
    all.dedup();
    resolve("task", query, all.into_iter())
}

/// A scheduled occurrence, by occurrence ID or task name.
pub fn resolve_occurrence(document: &CalendarDocument, query: &str) -> Result<String> {
    let candidates = document
        .scheduled_tasks
        .iter()
        .map(|s| (s.occurrence_id.as_str(), s.name.as_str()));
    resolve("scheduled task", query, candidates)
}

pub fn resolve_meeting(document: &CalendarDocument, query: &str) -> Result<String> {
    let candidates = document
        .meetings
        .iter()
        .map(|m| (m.id.as_str(), m.name.as_str()));
    resolve("meeting", query, candidates)
}

pub fn resolve_project(document: &CalendarDocument, query: &str) -> Result<String> {
    let candidates = document
        .projects
        .iter()
        .map(|p| (p.id.as_str(), p.name.as_str()));
    resolve("project", query, candidates)
}

/// Today's date for date arguments, unless one was given.
pub fn date_or_today(input: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
    match input {
        Some(input) => parse_date(input, today),
        None => Ok(today),
    }
}
