use anyhow::Result;
use owo_colors::OwoColorize;

use weekplan_cli::client::Client;
use weekplan_cli::config::CliConfig;

/// Create a calendar on the server, making it the default if none is set.
pub async fn new(config: &mut CliConfig) -> Result<()> {
    let client = Client::new(&config.server_url)?;
    let id = client.create(None).await?;

    println!("Created calendar {}", id.bold());
    if config.set_default_calendar_if_unset(&id) {
        config.save()?;
        println!("{}", "Set as your default calendar".dimmed());
    }
    Ok(())
}

pub async fn list(config: &CliConfig) -> Result<()> {
    let client = Client::new(&config.server_url)?;
    let calendars = client.list().await?;

    if calendars.is_empty() {
        println!("{}", "No calendars found".dimmed());
        return Ok(());
    }

    for id in calendars {
        if config.default_calendar.as_deref() == Some(id.as_str()) {
            println!("{} {}", id, "(default)".dimmed());
        } else {
            println!("{}", id);
        }
    }
    Ok(())
}

/// Check that the server is reachable.
pub async fn ping(config: &CliConfig) -> Result<()> {
    let client = Client::new(&config.server_url)?;
    let health = client.health().await?;
    println!(
        "{} {} {}",
        "✓".green(),
        config.server_url,
        format!("({} v{})", health.status, health.version).dimmed()
    );
    Ok(())
}
