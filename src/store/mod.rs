//! SQLite-backed collaborators.
//!
//! [`DbHandle`] implements every store trait the core consumes, so one
//! database file backs the board engine, the project service and the
//! activity recorder.

pub mod db;

pub use db::{DbHandle, TrackerDb};

use async_trait::async_trait;
use tracker_common::{
    ActivityEvent, ActorId, Column, ColumnId, Issue, IssueId, Project, ProjectId, ProjectKey,
    SiteId,
};

use crate::activity::{ActivityFilter, ActivitySink};
use crate::board::{BoardModel, ColumnStore, IssueMove, IssueStore};
use crate::projects::{NewProject, ProjectStore};

impl DbHandle {
    pub async fn load_board(&self, project_id: ProjectId) -> anyhow::Result<BoardModel> {
        self.call(move |db| db.load_board(project_id)).await
    }

    pub async fn recent_activity(
        &self,
        filter: ActivityFilter,
        limit: usize,
    ) -> anyhow::Result<Vec<ActivityEvent>> {
        self.call(move |db| db.recent_activity(&filter, limit)).await
    }
}

#[async_trait]
impl ColumnStore for DbHandle {
    async fn create_column(&self, column: &Column) -> anyhow::Result<()> {
        let column = column.clone();
        self.call(move |db| db.create_column(&column)).await
    }

    async fn rename_column(
        &self,
        project_id: ProjectId,
        column_id: ColumnId,
        title: &str,
    ) -> anyhow::Result<()> {
        let title = title.to_string();
        self.call(move |db| db.rename_column(project_id, column_id, &title))
            .await
    }

    async fn delete_column(&self, project_id: ProjectId, column_id: ColumnId) -> anyhow::Result<()> {
        self.call(move |db| db.delete_column(project_id, column_id))
            .await
    }

    async fn reorder_columns(
        &self,
        project_id: ProjectId,
        column_ids: &[ColumnId],
    ) -> anyhow::Result<()> {
        let column_ids = column_ids.to_vec();
        self.call(move |db| db.reorder_columns(project_id, &column_ids))
            .await
    }
}

#[async_trait]
impl IssueStore for DbHandle {
    async fn create_issue(&self, issue: &Issue) -> anyhow::Result<IssueId> {
        let issue = issue.clone();
        self.call(move |db| db.create_issue(&issue)).await
    }

    async fn update_issue(&self, issue: &Issue) -> anyhow::Result<()> {
        let issue = issue.clone();
        self.call(move |db| db.update_issue(&issue)).await
    }

    async fn delete_issue(&self, issue_id: IssueId) -> anyhow::Result<()> {
        self.call(move |db| db.delete_issue(issue_id)).await
    }

    async fn move_issue(&self, mv: &IssueMove) -> anyhow::Result<()> {
        let mv = mv.clone();
        self.call(move |db| db.move_issue(&mv)).await
    }
}

#[async_trait]
impl ProjectStore for DbHandle {
    async fn key_exists(&self, site_id: SiteId, key: &ProjectKey) -> anyhow::Result<bool> {
        let key = key.clone();
        self.call(move |db| db.key_exists(site_id, &key)).await
    }

    async fn create_project(
        &self,
        project: &NewProject,
        created_by: ActorId,
    ) -> anyhow::Result<Project> {
        let project = project.clone();
        self.call(move |db| db.create_project(&project, created_by))
            .await
    }

    async fn update_project(&self, project: &Project) -> anyhow::Result<()> {
        let project = project.clone();
        self.call(move |db| db.update_project(&project)).await
    }
}

#[async_trait]
impl ActivitySink for DbHandle {
    async fn append(&self, event: ActivityEvent) -> anyhow::Result<()> {
        self.call(move |db| db.append_activity(&event)).await
    }
}
