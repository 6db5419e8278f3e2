//! `tracker project create|list`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracker::projects::{CreateProject, ProjectService};

use super::session::Session;
use crate::{Cli, ProjectCommands};

pub async fn cmd_project(cli: &Cli, project_dir: PathBuf, command: ProjectCommands) -> Result<()> {
    let session = Session::open(cli, project_dir).await?;

    match command {
        ProjectCommands::Create { key, name, private } => {
            let service = ProjectService::new(Arc::new(session.db.clone()), session.activity.clone());
            let project = service
                .create_project(
                    &session.actor,
                    CreateProject {
                        site_id: session.site_id,
                        name,
                        key,
                        is_private: private,
                    },
                )
                .await?;
            println!(
                "Created project {} ({}) with id {}",
                console::style(&project.key).bold(),
                project.name,
                project.id
            );
        }
        ProjectCommands::List => {
            let site_id = session.site_id;
            let projects = session.db.call(move |db| db.list_projects(site_id)).await?;
            if projects.is_empty() {
                println!("No projects in site {}", site_id);
            }
            for project in projects {
                let privacy = if project.is_private { " (private)" } else { "" };
                println!(
                    "{:<10} {}{}",
                    console::style(&project.key).bold(),
                    project.name,
                    console::style(privacy).dim()
                );
            }
        }
    }

    session.finish().await;
    Ok(())
}
