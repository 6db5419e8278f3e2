//! Configuration read from `.tracker/tracker.toml`.
//!
//! Settings are layered: file, then environment (`TRACKER_DB`,
//! `TRACKER_ACTOR`), then CLI flags.
//!
//! ```toml
//! [storage]
//! database = ".tracker/tracker.db"
//!
//! [activity]
//! enabled = true
//!
//! [logging]
//! level = "info"
//! format = "pretty"      # or "json"
//! file = ".tracker/logs/tracker.log"
//!
//! [identity]
//! actor_id = 1
//! external_user_id = "alice"
//! site_id = 1
//! site_role = "admin"
//!
//! [identity.project_roles]
//! 7 = "pm"
//! ```
//!
//! `[identity]` stands in for the external auth service when the tracker is
//! driven from the command line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracker_common::{Actor, ActorId, Role, SiteId};

use crate::access::MembershipLookup;

pub const TRACKER_DIR: &str = ".tracker";
pub const CONFIG_FILE: &str = "tracker.toml";
pub const DEFAULT_DATABASE: &str = "tracker.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    /// SQLite file. Relative paths resolve against the project directory.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySection {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ActivitySection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format '{}'. Valid values: pretty, json", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Default filter directive; `TRACKER_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Also write logs to this file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySection {
    /// Unset means nobody is signed in.
    #[serde(default)]
    pub actor_id: Option<ActorId>,
    #[serde(default)]
    pub external_user_id: Option<String>,
    #[serde(default = "default_site_id")]
    pub site_id: SiteId,
    /// Whether the actor belongs to `site_id` at all.
    #[serde(default = "default_true")]
    pub member: bool,
    #[serde(default)]
    pub site_role: Option<Role>,
    /// Project id to role. TOML keys are strings, so ids are parsed on use.
    #[serde(default)]
    pub project_roles: BTreeMap<String, Role>,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            actor_id: None,
            external_user_id: None,
            site_id: default_site_id(),
            member: true,
            site_role: None,
            project_roles: BTreeMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_site_id() -> SiteId {
    1
}

/// The complete tracker.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerToml {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub activity: ActivitySection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub identity: IdentitySection,
}

impl TrackerToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse tracker.toml")
    }

    /// Load `tracker.toml` from `tracker_dir`, or defaults if it is missing.
    pub fn load_or_default(tracker_dir: &Path) -> Result<Self> {
        let config_path = tracker_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize tracker.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.logging.level) {
            warnings.push(format!(
                "Invalid logging level '{}': {}",
                self.logging.level, e
            ));
        }
        for key in self.identity.project_roles.keys() {
            if key.parse::<i64>().is_err() {
                warnings.push(format!(
                    "Ignoring project role for '{}': project ids must be integers",
                    key
                ));
            }
        }
        if self.identity.actor_id.is_none() && !self.identity.project_roles.is_empty() {
            warnings.push("Project roles are set but identity.actor_id is missing".to_string());
        }

        warnings
    }
}

/// Identity from `[identity]`, used as the membership lookup for the CLI.
#[derive(Debug, Clone)]
pub struct ConfigIdentity {
    section: IdentitySection,
    acting: Option<ActorId>,
}

impl ConfigIdentity {
    pub fn new(section: IdentitySection) -> Self {
        let acting = section.actor_id;
        Self { section, acting }
    }

    /// Act as `actor_id` instead of the configured identity. Roles and site
    /// membership stay with the configured actor.
    pub fn acting_as(mut self, actor_id: Option<ActorId>) -> Self {
        self.acting = actor_id;
        self
    }

    pub fn site_id(&self) -> SiteId {
        self.section.site_id
    }

    fn actor(&self) -> Option<Actor> {
        let id = self.acting?;
        if self.section.actor_id != Some(id) {
            return Some(Actor::new(id, format!("actor-{}", id)));
        }
        let external = self
            .section
            .external_user_id
            .clone()
            .unwrap_or_else(|| format!("actor-{}", id));
        let mut actor = Actor::new(id, external);
        actor.site_role = self.section.site_role;
        for (key, role) in &self.section.project_roles {
            if let Ok(project_id) = key.parse::<i64>() {
                actor = actor.with_project_role(project_id, *role);
            }
        }
        Some(actor)
    }
}

#[async_trait]
impl MembershipLookup for ConfigIdentity {
    async fn current_actor(&self) -> Result<Option<Actor>> {
        Ok(self.actor())
    }

    async fn site_membership_role(&self, site_id: SiteId, actor_id: ActorId) -> Result<Option<Role>> {
        let is_member = self.section.member
            && site_id == self.section.site_id
            && self.section.actor_id == Some(actor_id);
        Ok(is_member.then(|| self.section.site_role.unwrap_or(Role::Member)))
    }
}

/// Configuration resolved for one invocation.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub project_dir: PathBuf,
    pub tracker_dir: PathBuf,
    pub toml: TrackerToml,
    /// CLI override for the database path.
    pub cli_database: Option<PathBuf>,
    /// CLI override for the acting identity.
    pub cli_actor: Option<ActorId>,
}

impl TrackerConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let tracker_dir = project_dir.join(TRACKER_DIR);
        let toml = TrackerToml::load_or_default(&tracker_dir)?;
        Ok(Self {
            project_dir,
            tracker_dir,
            toml,
            cli_database: None,
            cli_actor: None,
        })
    }

    pub fn with_cli_args(
        project_dir: PathBuf,
        database: Option<PathBuf>,
        actor: Option<ActorId>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.cli_database = database;
        config.cli_actor = actor;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.tracker_dir.join(CONFIG_FILE)
    }

    /// Database path (CLI → `TRACKER_DB` → file → `.tracker/tracker.db`).
    pub fn database_path(&self) -> PathBuf {
        let chosen = self
            .cli_database
            .clone()
            .or_else(|| env_override("TRACKER_DB").map(PathBuf::from))
            .or_else(|| self.toml.storage.database.clone());
        match chosen {
            Some(path) => self.resolve(path),
            None => self.tracker_dir.join(DEFAULT_DATABASE),
        }
    }

    /// Log file path, if file logging is configured.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.toml.logging.file.clone().map(|path| self.resolve(path))
    }

    /// Acting actor id (CLI → `TRACKER_ACTOR` → file).
    pub fn actor_id(&self) -> Result<Option<ActorId>> {
        if let Some(id) = self.cli_actor {
            return Ok(Some(id));
        }
        if let Some(raw) = env_override("TRACKER_ACTOR") {
            let id = raw
                .parse()
                .with_context(|| format!("TRACKER_ACTOR must be an integer, got '{}'", raw))?;
            return Ok(Some(id));
        }
        Ok(self.toml.identity.actor_id)
    }

    /// Membership lookup for the resolved actor.
    pub fn identity(&self) -> Result<ConfigIdentity> {
        Ok(ConfigIdentity::new(self.toml.identity.clone()).acting_as(self.actor_id()?))
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.project_dir.join(path)
        }
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
