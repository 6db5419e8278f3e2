//! Effective role resolution.
//!
//! An actor may hold a site role, a recorded role per project, and the
//! implicit authority of having created a project. Exactly one of those
//! sources decides the effective role, checked in this order:
//!
//! 1. site role `Admin` (site admins are omnipotent on their site)
//! 2. creator of the project in context (`Pm`)
//! 3. recorded role for the project in context
//! 4. site role, when a site or project is in context
//! 5. `Member` as the floor for any authenticated actor
//!
//! Roles from different sources are never merged.

use serde::Serialize;
use tracker_common::{Actor, Project, Role, SiteId};

/// What the caller is acting on. Both parts are optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleContext<'a> {
    pub project: Option<&'a Project>,
    pub site: Option<SiteId>,
}

impl<'a> RoleContext<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn project(project: &'a Project) -> Self {
        Self {
            project: Some(project),
            site: None,
        }
    }

    pub fn site(site_id: SiteId) -> Self {
        Self {
            project: None,
            site: Some(site_id),
        }
    }

    fn site_id(&self) -> Option<SiteId> {
        self.site.or_else(|| self.project.map(|p| p.site_id))
    }
}

/// Which rule produced the effective role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    SiteAdmin,
    ProjectCreator,
    ProjectAssignment,
    SiteAssignment,
    DefaultFloor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub role: Role,
    pub source: RoleSource,
}

impl Resolution {
    /// The resolved role, or `None` when the actor had no assignment and the
    /// `Member` floor was applied.
    pub fn explicit_role(&self) -> Option<Role> {
        match self.source {
            RoleSource::DefaultFloor => None,
            _ => Some(self.role),
        }
    }
}

pub fn resolve(actor: &Actor, context: RoleContext<'_>) -> Resolution {
    if actor.is_site_admin() {
        return Resolution {
            role: Role::Admin,
            source: RoleSource::SiteAdmin,
        };
    }

    if let Some(project) = context.project {
        if project.created_by == actor.id {
            return Resolution {
                role: Role::Pm,
                source: RoleSource::ProjectCreator,
            };
        }
        if let Some(role) = actor.project_role(project.id) {
            return Resolution {
                role,
                source: RoleSource::ProjectAssignment,
            };
        }
    }

    if context.site_id().is_some()
        && let Some(role) = actor.site_role
    {
        return Resolution {
            role,
            source: RoleSource::SiteAssignment,
        };
    }

    Resolution {
        role: Role::Member,
        source: RoleSource::DefaultFloor,
    }
}

pub fn effective_role(actor: &Actor, context: RoleContext<'_>) -> Role {
    resolve(actor, context).role
}
