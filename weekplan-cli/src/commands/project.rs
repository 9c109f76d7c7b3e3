use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use owo_colors::OwoColorize;

use weekplan_core::ItemId;
use weekplan_core::schedule::{NewProject, ProjectEdit};

use super::{finish, open_session, resolve_project};
use weekplan_cli::config::CliConfig;
use weekplan_cli::render::{Render, short_id};

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// List projects in display order
    List {
        /// Include archived projects
        #[arg(short, long)]
        all: bool,
    },
    Add {
        name: String,

        /// Hex color; defaults to the next palette color
        #[arg(long)]
        color: Option<String>,

        #[arg(long, default_value = "")]
        notes: String,
    },
    Edit {
        project: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Position in the project list
        #[arg(long)]
        order: Option<i64>,

        /// Show its tasks folded in the pool
        #[arg(long)]
        collapse: Option<bool>,
    },
    /// Hide a project from the pool
    Archive { project: String },
    Unarchive { project: String },
    /// Delete a project; its tasks are kept
    Rm { project: String },
}

pub async fn run(config: &CliConfig, calendar: Option<&str>, command: ProjectCommand) -> Result<()> {
    let mut session = open_session(config, calendar).await?;
    let now = Utc::now();

    let (id, edit, done) = match command {
        ProjectCommand::List { all } => {
            let projects = session.document().projects_sorted(all);
            if projects.is_empty() {
                println!("{}", "No projects".dimmed());
            }
            for project in projects {
                println!("{}", project.render());
            }
            session.close().await;
            return Ok(());
        }
        ProjectCommand::Add { name, color, notes } => {
            let draft = NewProject { name, color, notes };
            let id = session.update(|doc, _| doc.add_project(draft, now))?;
            println!("Added project {}", format!("[{}]", short_id(id.as_str())).dimmed());
            return finish(session).await;
        }
        ProjectCommand::Rm { project } => {
            let id = ItemId::new(resolve_project(session.document(), &project)?);
            session.update(|doc, _| doc.delete_project(&id))?;
            println!("Deleted project");
            return finish(session).await;
        }
        ProjectCommand::Edit {
            project,
            name,
            color,
            notes,
            order,
            collapse,
        } => {
            let edit = ProjectEdit {
                name,
                color,
                notes,
                collapsed: collapse,
                sort_order: order,
                archived: None,
            };
            (project, edit, "Updated project")
        }
        ProjectCommand::Archive { project } => {
            let edit = ProjectEdit {
                archived: Some(true),
                ..Default::default()
            };
            (project, edit, "Archived project")
        }
        ProjectCommand::Unarchive { project } => {
            let edit = ProjectEdit {
                archived: Some(false),
                ..Default::default()
            };
            (project, edit, "Unarchived project")
        }
    };

    let id = ItemId::new(resolve_project(session.document(), &id)?);
    session.update(|doc, _| doc.edit_project(&id, edit, now))?;
    println!("{}", done);
    finish(session).await
}
