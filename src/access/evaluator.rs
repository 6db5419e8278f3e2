use tracker_common::{Actor, ActorId, Issue, Project, Role, SiteId};

use super::catalog::{Capability, capabilities_of};
use super::resolver::{RoleContext, effective_role};

/// Answers "may this actor do X here". Denial is a `false`, never an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionEvaluator;

impl PermissionEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn can_perform(
        &self,
        actor: &Actor,
        capability: Capability,
        context: RoleContext<'_>,
    ) -> bool {
        capabilities_of(effective_role(actor, context)).allows(capability)
    }

    /// Broader than a table lookup: a site PM may manage any project even
    /// when a lower project role is recorded for them.
    pub fn can_manage_project(&self, actor: &Actor, project: &Project) -> bool {
        actor.is_site_admin()
            || project.created_by == actor.id
            || matches!(
                effective_role(actor, RoleContext::project(project)),
                Role::Pm | Role::Admin
            )
            || actor.site_role == Some(Role::Pm)
    }

    pub fn can_manage_issues(&self, actor: &Actor, project: &Project) -> bool {
        self.can_perform(actor, Capability::ManageIssues, RoleContext::project(project))
    }

    pub fn can_create_issue(&self, actor: &Actor, project: &Project) -> bool {
        self.can_perform(actor, Capability::CreateIssue, RoleContext::project(project))
    }

    pub fn can_create_project(&self, actor: &Actor, site_id: SiteId) -> bool {
        self.can_perform(actor, Capability::CreateProject, RoleContext::site(site_id))
    }

    /// Moving an issue to another column needs PM authority on the project,
    /// unless the actor is the issue's assignee.
    pub fn can_move_issue_between_columns(
        &self,
        actor: &Actor,
        project: &Project,
        assignee_id: Option<ActorId>,
    ) -> bool {
        actor.is_site_admin()
            || matches!(
                effective_role(actor, RoleContext::project(project)),
                Role::Pm | Role::Admin
            )
            || assignee_id == Some(actor.id)
    }

    /// Editing issue fields: issue managers, or the reporter/assignee of the
    /// issue while they still hold `CreateIssue` on the project.
    pub fn can_edit_issue(&self, actor: &Actor, project: &Project, issue: &Issue) -> bool {
        if self.can_manage_issues(actor, project) {
            return true;
        }
        let owns = issue.reporter_id == actor.id || issue.assignee_id == Some(actor.id);
        owns && self.can_create_issue(actor, project)
    }
}
