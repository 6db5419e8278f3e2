//! Remote persistence collaborators and the commands the engine replays
//! against them.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracker_common::{Column, ColumnId, Issue, IssueId, ProjectId};

/// Payload of a remote issue move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMove {
    pub issue_id: IssueId,
    pub dest_column_id: ColumnId,
    pub order: i32,
}

#[async_trait]
pub trait ColumnStore: Send + Sync {
    /// Persist a new column under the id the engine assigned.
    async fn create_column(&self, column: &Column) -> Result<()>;

    async fn rename_column(&self, project_id: ProjectId, column_id: ColumnId, title: &str)
    -> Result<()>;

    async fn delete_column(&self, project_id: ProjectId, column_id: ColumnId) -> Result<()>;

    /// `column_ids` is the full column ordering of the project.
    async fn reorder_columns(&self, project_id: ProjectId, column_ids: &[ColumnId]) -> Result<()>;
}

#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Persist a new issue and return the id the store assigned to it.
    async fn create_issue(&self, issue: &Issue) -> Result<IssueId>;

    async fn update_issue(&self, issue: &Issue) -> Result<()>;

    async fn delete_issue(&self, issue_id: IssueId) -> Result<()>;

    async fn move_issue(&self, mv: &IssueMove) -> Result<()>;
}

/// One remote side effect produced by a board transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PersistCommand {
    CreateColumn {
        column: Column,
    },
    RenameColumn {
        project_id: ProjectId,
        column_id: ColumnId,
        title: String,
    },
    DeleteColumn {
        project_id: ProjectId,
        column_id: ColumnId,
    },
    ReorderColumns {
        project_id: ProjectId,
        column_ids: Vec<ColumnId>,
    },
    CreateIssue {
        issue: Issue,
    },
    UpdateIssue {
        issue: Issue,
    },
    DeleteIssue {
        issue_id: IssueId,
    },
    MoveIssue(IssueMove),
}

impl PersistCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateColumn { .. } => "create_column",
            Self::RenameColumn { .. } => "rename_column",
            Self::DeleteColumn { .. } => "delete_column",
            Self::ReorderColumns { .. } => "reorder_columns",
            Self::CreateIssue { .. } => "create_issue",
            Self::UpdateIssue { .. } => "update_issue",
            Self::DeleteIssue { .. } => "delete_issue",
            Self::MoveIssue(_) => "move_issue",
        }
    }
}

/// What a successful remote call reported back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Done,
    IssueCreated(IssueId),
}

pub async fn dispatch(
    command: &PersistCommand,
    columns: &dyn ColumnStore,
    issues: &dyn IssueStore,
) -> Result<CommandOutcome> {
    match command {
        PersistCommand::CreateColumn { column } => columns.create_column(column).await?,
        PersistCommand::RenameColumn {
            project_id,
            column_id,
            title,
        } => columns.rename_column(*project_id, *column_id, title).await?,
        PersistCommand::DeleteColumn {
            project_id,
            column_id,
        } => columns.delete_column(*project_id, *column_id).await?,
        PersistCommand::ReorderColumns {
            project_id,
            column_ids,
        } => columns.reorder_columns(*project_id, column_ids).await?,
        PersistCommand::CreateIssue { issue } => {
            let id = issues.create_issue(issue).await?;
            return Ok(CommandOutcome::IssueCreated(id));
        }
        PersistCommand::UpdateIssue { issue } => issues.update_issue(issue).await?,
        PersistCommand::DeleteIssue { issue_id } => issues.delete_issue(*issue_id).await?,
        PersistCommand::MoveIssue(mv) => issues.move_issue(mv).await?,
    }
    Ok(CommandOutcome::Done)
}
