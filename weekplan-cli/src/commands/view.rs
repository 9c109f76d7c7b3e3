use std::collections::HashSet;
use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDate, Timelike};
use owo_colors::OwoColorize;

use weekplan_core::DateRange;
use weekplan_core::date_range::{monday_of, offset_days};
use weekplan_core::schedule::Interval;

use super::{open_session, parse_date};
use weekplan_cli::config::CliConfig;
use weekplan_cli::render::{Render, render_now_and_next, render_pool, render_week};

const WATCH_INTERVAL: Duration = Duration::from_secs(60);

/// The range shown by `weekplan week`: the work week `offset` weeks from
/// this one, unless explicit bounds are given.
pub fn week_range(from: Option<&str>, to: Option<&str>, offset: i64, today: NaiveDate) -> Result<DateRange> {
    let from = match from {
        Some(from) => parse_date(from, today)?,
        None => offset_days(monday_of(today), offset * 7),
    };
    let to = match to {
        Some(to) => parse_date(to, today)?,
        None => DateRange::work_week(from).to,
    };
    if to < from {
        anyhow::bail!("Range end {} is before its start {}", to, from);
    }
    Ok(DateRange::new(from, to))
}

pub async fn week(config: &CliConfig, calendar: Option<&str>, range: DateRange) -> Result<()> {
    let session = open_session(config, calendar).await?;
    println!("{}", render_week(session.document(), &range, Local::now().date_naive()));
    session.close().await;
    Ok(())
}

pub async fn pool(config: &CliConfig, calendar: Option<&str>) -> Result<()> {
    let session = open_session(config, calendar).await?;
    println!("{}", render_pool(session.document()));
    session.close().await;
    Ok(())
}

pub async fn completed(config: &CliConfig, calendar: Option<&str>) -> Result<()> {
    let session = open_session(config, calendar).await?;

    let mut completed: Vec<_> = session.document().completed_tasks.iter().collect();
    completed.sort_by_key(|c| std::cmp::Reverse(c.completed_at));

    if completed.is_empty() {
        println!("{}", "Nothing completed yet".dimmed());
    }
    for record in completed {
        println!("{}", record.render());
    }

    session.close().await;
    Ok(())
}

/// What's on now and next. With `watch`, keep checking once a minute and
/// announce each item as it starts, ringing the terminal bell if the chime
/// is on.
pub async fn status(config: &CliConfig, calendar: Option<&str>, watch: bool) -> Result<()> {
    if !watch {
        let session = open_session(config, calendar).await?;
        let status = session.document().now_and_next(Local::now().naive_local());
        println!("{}", render_now_and_next(&status));
        session.close().await;
        return Ok(());
    }

    let mut announced = HashSet::new();
    let mut ticker = tokio::time::interval(WATCH_INTERVAL);

    loop {
        ticker.tick().await;

        let session = open_session(config, calendar).await?;
        let now = Local::now().naive_local();
        let minute = now.hour() * 60 + now.minute();
        let status = session.document().now_and_next(now);

        for item in &status.current {
            let key = (item.date(), item.start_minutes(), item.name().to_string());
            if item.start_minutes() == minute && announced.insert(key) {
                if session.preferences().chime_enabled {
                    print!("\x07");
                }
                println!("{} {}", "Starting:".bold(), item.render());
            }
        }
        std::io::stdout().flush()?;
        session.close().await;
    }
}
