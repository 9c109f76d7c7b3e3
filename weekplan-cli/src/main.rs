mod commands;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use weekplan_cli::config::CliConfig;

use crate::commands::meeting::MeetingCommand;
use crate::commands::prefs::Toggle;
use crate::commands::project::ProjectCommand;
use crate::commands::task::TaskCommand;

#[derive(Parser)]
#[command(name = "weekplan")]
#[command(about = "Plan your week: tasks, meetings and projects, synced to a weekplan server")]
struct Cli {
    /// Calendar ID (defaults to `default_calendar` in the config)
    #[arg(short, long, global = true)]
    calendar: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new calendar on the server
    New,
    /// List calendars stored on the server
    List,
    /// Check the server is reachable
    Ping,
    /// Show the week's tasks and meetings
    Week {
        /// First day to show (YYYY-MM-DD, today, or a weekday)
        #[arg(long)]
        from: Option<String>,

        /// Last day to show
        #[arg(long)]
        to: Option<String>,

        /// Weeks from this one, e.g. 1 for next week, -1 for last
        #[arg(short, long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i64,
    },
    /// Show unscheduled tasks
    Pool,
    /// Show completed tasks
    Completed,
    /// What's on now and what's next
    Status {
        /// Keep running and announce items as they start
        #[arg(short, long)]
        watch: bool,
    },
    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Manage meetings
    #[command(subcommand)]
    Meeting(MeetingCommand),
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Show or set the start-of-item chime
    Chime {
        #[arg(value_enum)]
        toggle: Option<Toggle>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = CliConfig::load()?;
    let calendar = cli.calendar.as_deref();

    match cli.command {
        Commands::New => commands::calendar::new(&mut config).await,
        Commands::List => commands::calendar::list(&config).await,
        Commands::Ping => commands::calendar::ping(&config).await,
        Commands::Week { from, to, offset } => {
            let range = commands::view::week_range(
                from.as_deref(),
                to.as_deref(),
                offset,
                Local::now().date_naive(),
            )?;
            commands::view::week(&config, calendar, range).await
        }
        Commands::Pool => commands::view::pool(&config, calendar).await,
        Commands::Completed => commands::view::completed(&config, calendar).await,
        Commands::Status { watch } => commands::view::status(&config, calendar, watch).await,
        Commands::Task(command) => commands::task::run(&config, calendar, command).await,
        Commands::Meeting(command) => commands::meeting::run(&config, calendar, command).await,
        Commands::Project(command) => commands::project::run(&config, calendar, command).await,
        Commands::Chime { toggle } => commands::prefs::chime(&config, toggle),
    }
}
