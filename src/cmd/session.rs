//! Per-invocation setup shared by the data commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracker::access::MembershipLookup;
use tracker::activity::ActivityRecorder;
use tracker::board::BoardOrderingEngine;
use tracker::config::TrackerConfig;
use tracker::store::{DbHandle, TrackerDb};
use tracker::telemetry::{self, TelemetryGuard};
use tracker_common::{Actor, Project, SiteId};

use crate::Cli;

pub struct Session {
    pub config: TrackerConfig,
    pub db: DbHandle,
    pub actor: Actor,
    pub site_id: SiteId,
    pub activity: ActivityRecorder,
    _telemetry: TelemetryGuard,
}

impl Session {
    /// Load config, start logging, open the database and resolve the acting
    /// site member.
    pub async fn open(cli: &Cli, project_dir: PathBuf) -> Result<Self> {
        let config = TrackerConfig::with_cli_args(project_dir, cli.db.clone(), cli.actor)?;
        let telemetry = telemetry::init(&config.toml.logging, config.log_file(), cli.verbose);
        for warning in config.validate() {
            tracing::warn!("{}", warning);
        }

        let identity = config.identity()?;
        let mut actor = identity.current_actor().await?.context(
            "No identity configured. Set [identity] actor_id in .tracker/tracker.toml or pass --actor",
        )?;
        let site_id = identity.site_id();
        let site_role = identity
            .site_membership_role(site_id, actor.id)
            .await?
            .with_context(|| format!("Actor {} is not a member of site {}", actor.id, site_id))?;
        actor.site_role = Some(site_role);

        let db_path = config.database_path();
        tracing::debug!(path = %db_path.display(), "opening database");
        let db = DbHandle::new(TrackerDb::new(&db_path)?);
        let activity = if config.toml.activity.enabled {
            ActivityRecorder::spawn(Arc::new(db.clone()))
        } else {
            ActivityRecorder::disabled()
        };

        Ok(Self {
            config,
            db,
            actor,
            site_id,
            activity,
            _telemetry: telemetry,
        })
    }

    pub async fn project(&self, key: &str) -> Result<Project> {
        let site_id = self.site_id;
        let lookup = key.trim().to_string();
        self.db
            .call(move |db| db.find_project(site_id, &lookup))
            .await?
            .with_context(|| format!("No project with key '{}' in site {}", key, site_id))
    }

    /// Open the board of project `key` in a fresh engine.
    pub async fn engine(&self, key: &str) -> Result<BoardOrderingEngine> {
        let project = self.project(key).await?;
        let board = self.db.load_board(project.id).await?;
        let store = Arc::new(self.db.clone());
        Ok(BoardOrderingEngine::new(board, store.clone(), store).with_activity(self.activity.clone()))
    }

    /// Wait for queued activity events to be stored.
    pub async fn finish(self) {
        self.activity.flush().await;
    }
}
