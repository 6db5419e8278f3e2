//! `tracker activity`.

use std::path::PathBuf;

use anyhow::Result;
use tracker::activity::ActivityFilter;

use super::session::Session;
use crate::Cli;

pub async fn cmd_activity(
    cli: &Cli,
    project_dir: PathBuf,
    project_key: Option<&str>,
    actor_id: Option<i64>,
    limit: usize,
) -> Result<()> {
    let session = Session::open(cli, project_dir).await?;

    let events = match project_key {
        Some(key) => {
            let project = session.project(key).await?;
            let filter = ActivityFilter {
                project_id: Some(project.id),
                actor_id,
            };
            session.db.recent_activity(filter, limit).await?
        }
        None => {
            let site_id = session.site_id;
            session
                .db
                .call(move |db| db.recent_site_activity(site_id, actor_id, limit))
                .await?
        }
    };

    if events.is_empty() {
        println!("No activity yet");
    }
    for event in events {
        println!(
            "{}  {:<18} actor {:<4} {}",
            console::style(event.timestamp.format("%Y-%m-%d %H:%M:%S")).dim(),
            event.kind.as_str(),
            event.actor_id,
            event.summary
        );
    }

    session.finish().await;
    Ok(())
}
