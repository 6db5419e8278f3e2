//! `tracker init`.

use std::path::Path;

use anyhow::{Context, Result};
use tracker::config::{CONFIG_FILE, DEFAULT_DATABASE, TRACKER_DIR, TrackerToml};
use tracker::store::TrackerDb;
use tracker_common::{ActorId, Role, SiteId};

pub fn cmd_init(
    project_dir: &Path,
    actor_id: Option<ActorId>,
    site_role: Option<Role>,
    site_id: SiteId,
) -> Result<()> {
    let tracker_dir = project_dir.join(TRACKER_DIR);
    std::fs::create_dir_all(&tracker_dir)
        .with_context(|| format!("Failed to create {}", tracker_dir.display()))?;

    let config_path = tracker_dir.join(CONFIG_FILE);
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        let mut toml = TrackerToml::default();
        toml.identity.actor_id = actor_id;
        toml.identity.site_role = site_role;
        toml.identity.site_id = site_id;
        toml.save(&config_path)?;
        println!("Wrote {}", config_path.display());
    }

    let config = tracker::config::TrackerConfig::new(project_dir.to_path_buf())?;
    let db_path = config.database_path();
    TrackerDb::new(&db_path)?;
    if db_path == config.tracker_dir.join(DEFAULT_DATABASE) {
        println!("Initialized tracker in {}", tracker_dir.display());
    } else {
        println!("Initialized tracker database at {}", db_path.display());
    }
    Ok(())
}
