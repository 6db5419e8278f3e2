use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ActorId, CommentId, IssueId, ProjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    ProjectCreated,
    ProjectUpdated,
    ColumnCreated,
    ColumnRenamed,
    ColumnDeleted,
    ColumnsReordered,
    IssueCreated,
    IssueUpdated,
    IssueReordered,
    IssueMoved,
    IssueDeleted,
    CommentAdded,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "project_created",
            Self::ProjectUpdated => "project_updated",
            Self::ColumnCreated => "column_created",
            Self::ColumnRenamed => "column_renamed",
            Self::ColumnDeleted => "column_deleted",
            Self::ColumnsReordered => "columns_reordered",
            Self::IssueCreated => "issue_created",
            Self::IssueUpdated => "issue_updated",
            Self::IssueReordered => "issue_reordered",
            Self::IssueMoved => "issue_moved",
            Self::IssueDeleted => "issue_deleted",
            Self::CommentAdded => "comment_added",
        }
    }

    fn default_summary(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "created the project",
            Self::ProjectUpdated => "updated the project",
            Self::ColumnCreated => "added a column",
            Self::ColumnRenamed => "renamed a column",
            Self::ColumnDeleted => "removed a column",
            Self::ColumnsReordered => "reordered the columns",
            Self::IssueCreated => "created an issue",
            Self::IssueUpdated => "updated an issue",
            Self::IssueReordered => "reordered an issue",
            Self::IssueMoved => "moved an issue",
            Self::IssueDeleted => "deleted an issue",
            Self::CommentAdded => "commented on an issue",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project_created" => Ok(Self::ProjectCreated),
            "project_updated" => Ok(Self::ProjectUpdated),
            "column_created" => Ok(Self::ColumnCreated),
            "column_renamed" => Ok(Self::ColumnRenamed),
            "column_deleted" => Ok(Self::ColumnDeleted),
            "columns_reordered" => Ok(Self::ColumnsReordered),
            "issue_created" => Ok(Self::IssueCreated),
            "issue_updated" => Ok(Self::IssueUpdated),
            "issue_reordered" => Ok(Self::IssueReordered),
            "issue_moved" => Ok(Self::IssueMoved),
            "issue_deleted" => Ok(Self::IssueDeleted),
            "comment_added" => Ok(Self::CommentAdded),
            _ => Err(format!("Invalid activity type: {}", s)),
        }
    }
}

/// What a caller knows about an activity before it is normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEventDraft {
    pub actor_id: ActorId,
    pub kind: ActivityType,
    pub project_id: ProjectId,
    pub issue_id: Option<IssueId>,
    pub comment_id: Option<CommentId>,
    pub summary: Option<String>,
}

impl ActivityEventDraft {
    pub fn new(actor_id: ActorId, kind: ActivityType, project_id: ProjectId) -> Self {
        Self {
            actor_id,
            kind,
            project_id,
            issue_id: None,
            comment_id: None,
            summary: None,
        }
    }

    pub fn issue(mut self, issue_id: IssueId) -> Self {
        self.issue_id = Some(issue_id);
        self
    }

    pub fn comment(mut self, comment_id: CommentId) -> Self {
        self.comment_id = Some(comment_id);
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Assign an id and timestamp and fill in a summary when none was given.
    pub fn normalize(self, at: DateTime<Utc>) -> ActivityEvent {
        let summary = self
            .summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.kind.default_summary().to_string());
        ActivityEvent {
            id: Uuid::new_v4(),
            actor_id: self.actor_id,
            kind: self.kind,
            project_id: self.project_id,
            issue_id: self.issue_id,
            comment_id: self.comment_id,
            summary,
            timestamp: at,
        }
    }
}

/// An immutable, append-only record of something that happened on a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub actor_id: ActorId,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub project_id: ProjectId,
    pub issue_id: Option<IssueId>,
    pub comment_id: Option<CommentId>,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}
