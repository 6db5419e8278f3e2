use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ActorId, ProjectId};

/// Authority level assigned to an actor for a site or a project.
///
/// Variants are declared lowest first so that the derived ordering gives
/// `Admin > Pm > Member`. The ordering is only used to break ties; the
/// capabilities of each role come from the role catalog and are not
/// strictly nested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Pm,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Pm => "pm",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "member" => Ok(Self::Member),
            "pm" => Ok(Self::Pm),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// An authenticated identity together with its role assignments.
///
/// `site_role` is assigned when the site membership is created and
/// `project_roles` entries come from project invitations. A missing entry
/// means "no explicit role", not "no access".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub external_user_id: String,
    #[serde(default)]
    pub site_role: Option<Role>,
    #[serde(default)]
    pub project_roles: BTreeMap<ProjectId, Role>,
}

impl Actor {
    pub fn new(id: ActorId, external_user_id: impl Into<String>) -> Self {
        Self {
            id,
            external_user_id: external_user_id.into(),
            site_role: None,
            project_roles: BTreeMap::new(),
        }
    }

    pub fn with_site_role(mut self, role: Role) -> Self {
        self.site_role = Some(role);
        self
    }

    pub fn with_project_role(mut self, project_id: ProjectId, role: Role) -> Self {
        self.project_roles.insert(project_id, role);
        self
    }

    pub fn project_role(&self, project_id: ProjectId) -> Option<Role> {
        self.project_roles.get(&project_id).copied()
    }

    pub fn is_site_admin(&self) -> bool {
        self.site_role == Some(Role::Admin)
    }
}
