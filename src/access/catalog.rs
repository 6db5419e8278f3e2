//! Static table of what each role is allowed to do.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracker_common::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageSystem,
    AccessAllProjects,
    ManageUsers,
    CreateProject,
    InviteUsers,
    ManageProjectSettings,
    ManageIssues,
    CreateIssue,
    Comment,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Self::ManageSystem,
        Self::AccessAllProjects,
        Self::ManageUsers,
        Self::CreateProject,
        Self::InviteUsers,
        Self::ManageProjectSettings,
        Self::ManageIssues,
        Self::CreateIssue,
        Self::Comment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManageSystem => "manage_system",
            Self::AccessAllProjects => "access_all_projects",
            Self::ManageUsers => "manage_users",
            Self::CreateProject => "create_project",
            Self::InviteUsers => "invite_users",
            Self::ManageProjectSettings => "manage_project_settings",
            Self::ManageIssues => "manage_issues",
            Self::CreateIssue => "create_issue",
            Self::Comment => "comment",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Invalid capability: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CapabilitySet {
    pub manage_system: bool,
    pub access_all_projects: bool,
    pub manage_users: bool,
    pub create_project: bool,
    pub invite_users: bool,
    pub manage_project_settings: bool,
    pub manage_issues: bool,
    pub create_issue: bool,
    pub comment: bool,
}

impl CapabilitySet {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ManageSystem => self.manage_system,
            Capability::AccessAllProjects => self.access_all_projects,
            Capability::ManageUsers => self.manage_users,
            Capability::CreateProject => self.create_project,
            Capability::InviteUsers => self.invite_users,
            Capability::ManageProjectSettings => self.manage_project_settings,
            Capability::ManageIssues => self.manage_issues,
            Capability::CreateIssue => self.create_issue,
            Capability::Comment => self.comment,
        }
    }
}

const ADMIN: CapabilitySet = CapabilitySet {
    manage_system: true,
    access_all_projects: true,
    manage_users: true,
    create_project: true,
    invite_users: true,
    manage_project_settings: true,
    manage_issues: true,
    create_issue: true,
    comment: true,
};

const PM: CapabilitySet = CapabilitySet {
    manage_system: false,
    access_all_projects: false,
    manage_users: false,
    create_project: true,
    invite_users: true,
    manage_project_settings: true,
    manage_issues: true,
    create_issue: true,
    comment: true,
};

const MEMBER: CapabilitySet = CapabilitySet {
    manage_system: false,
    access_all_projects: false,
    manage_users: false,
    create_project: false,
    invite_users: false,
    manage_project_settings: false,
    manage_issues: false,
    create_issue: true,
    comment: true,
};

pub fn capabilities_of(role: Role) -> CapabilitySet {
    match role {
        Role::Admin => ADMIN,
        Role::Pm => PM,
        Role::Member => MEMBER,
    }
}
