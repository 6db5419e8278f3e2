//! Project creation and settings.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use tracker_common::{
    ActivityEventDraft, ActivityType, Actor, ActorId, Project, ProjectKey, SiteId,
};

use crate::access::PermissionEvaluator;
use crate::activity::ActivityRecorder;
use crate::errors::{ProjectError, ValidationError};

/// A validated project ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub site_id: SiteId,
    pub name: String,
    pub key: ProjectKey,
    pub is_private: bool,
}

/// Raw project creation input.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub site_id: SiteId,
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub is_private: Option<bool>,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn key_exists(&self, site_id: SiteId, key: &ProjectKey) -> anyhow::Result<bool>;

    /// Store the project and seed its default columns. Returns the project
    /// with its assigned id.
    async fn create_project(
        &self,
        project: &NewProject,
        created_by: ActorId,
    ) -> anyhow::Result<Project>;

    async fn update_project(&self, project: &Project) -> anyhow::Result<()>;
}

/// Check a raw key: surrounding whitespace is ignored, everything else must
/// already be a valid key.
pub fn validate_project_key(raw: &str) -> Result<ProjectKey, ValidationError> {
    Ok(ProjectKey::parse(raw.trim())?)
}

pub struct ProjectService {
    store: Arc<dyn ProjectStore>,
    activity: ActivityRecorder,
    evaluator: PermissionEvaluator,
}

impl ProjectService {
    pub fn new(store: Arc<dyn ProjectStore>, activity: ActivityRecorder) -> Self {
        Self {
            store,
            activity,
            evaluator: PermissionEvaluator::new(),
        }
    }

    pub async fn create_project(
        &self,
        actor: &Actor,
        input: CreateProject,
    ) -> Result<Project, ProjectError> {
        if !self.evaluator.can_create_project(actor, input.site_id) {
            return Err(ProjectError::PermissionDenied {
                action: "create project",
            });
        }
        let name = clean_name(&input.name)?;
        let key = validate_project_key(&input.key)?;

        let exists = self
            .store
            .key_exists(input.site_id, &key)
            .await
            .map_err(|source| persistence("create_project", source))?;
        if exists {
            return Err(ValidationError::DuplicateProjectKey {
                key: key.to_string(),
                site_id: input.site_id,
            }
            .into());
        }

        let new = NewProject {
            site_id: input.site_id,
            name,
            key,
            is_private: input.is_private,
        };
        let project = self
            .store
            .create_project(&new, actor.id)
            .await
            .map_err(|source| persistence("create_project", source))?;

        info!(project_id = project.id, key = %project.key, "project created");
        self.activity.record(
            ActivityEventDraft::new(actor.id, ActivityType::ProjectCreated, project.id)
                .summary(format!("created project {} ({})", project.name, project.key)),
        );
        Ok(project)
    }

    pub async fn update_project(
        &self,
        actor: &Actor,
        project: &Project,
        patch: ProjectPatch,
    ) -> Result<Project, ProjectError> {
        if !self.evaluator.can_manage_project(actor, project) {
            return Err(ProjectError::PermissionDenied {
                action: "update project",
            });
        }
        let mut updated = project.clone();
        if let Some(name) = patch.name {
            updated.name = clean_name(&name)?;
        }
        if let Some(is_private) = patch.is_private {
            updated.is_private = is_private;
        }
        if updated == *project {
            return Ok(updated);
        }

        self.store
            .update_project(&updated)
            .await
            .map_err(|source| persistence("update_project", source))?;

        info!(project_id = updated.id, "project updated");
        self.activity.record(
            ActivityEventDraft::new(actor.id, ActivityType::ProjectUpdated, updated.id)
                .summary(format!("updated project {}", updated.name)),
        );
        Ok(updated)
    }
}

fn clean_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyProjectName);
    }
    Ok(name.to_string())
}

fn persistence(operation: &'static str, source: anyhow::Error) -> ProjectError {
    ProjectError::PersistenceFailure { operation, source }
}
