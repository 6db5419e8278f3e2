use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracker_common::{
    ActivityEvent, ActivityType, ActorId, Column, ColumnId, Issue, IssueId, IssueStatus, Project,
    ProjectId, ProjectKey, SiteId,
};
use uuid::Uuid;

use crate::activity::ActivityFilter;
use crate::board::{BoardModel, IssueMove};
use crate::projects::NewProject;

/// Async-safe handle to the tracker database.
///
/// All access runs on tokio's blocking pool so SQLite I/O never stalls the
/// async workers.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<TrackerDb>>,
}

impl DbHandle {
    pub fn new(db: TrackerDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&TrackerDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct TrackerDb {
    conn: Connection,
}

impl TrackerDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    site_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    key TEXT NOT NULL,
                    is_private INTEGER NOT NULL DEFAULT 0,
                    created_by INTEGER NOT NULL,
                    last_column_id INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE(site_id, key)
                );

                CREATE TABLE IF NOT EXISTS columns (
                    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    id INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    PRIMARY KEY (project_id, id)
                );

                CREATE TABLE IF NOT EXISTS issues (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL,
                    column_id INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    status TEXT NOT NULL,
                    start_date TEXT,
                    end_date TEXT,
                    assignee_id INTEGER,
                    reporter_id INTEGER NOT NULL,
                    position INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    FOREIGN KEY (project_id, column_id) REFERENCES columns(project_id, id)
                        ON DELETE CASCADE
                );

                CREATE TABLE IF NOT EXISTS activity (
                    id TEXT PRIMARY KEY,
                    actor_id INTEGER NOT NULL,
                    type TEXT NOT NULL,
                    project_id INTEGER NOT NULL,
                    issue_id INTEGER,
                    comment_id INTEGER,
                    summary TEXT NOT NULL,
                    timestamp TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_issues_column ON issues(project_id, column_id);
                CREATE INDEX IF NOT EXISTS idx_activity_project ON activity(project_id, timestamp);
                CREATE INDEX IF NOT EXISTS idx_activity_actor ON activity(actor_id, timestamp);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Projects ──────────────────────────────────────────────────────

    /// Insert a project together with its default columns.
    pub fn create_project(&self, project: &NewProject, created_by: ActorId) -> Result<Project> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "INSERT INTO projects (site_id, name, key, is_private, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                project.site_id,
                project.name,
                project.key.as_str(),
                project.is_private,
                created_by
            ],
        )
        .context("Failed to insert project")?;
        let id = tx.last_insert_rowid();
        for column in Column::defaults_for(id) {
            tx.execute(
                "INSERT INTO columns (project_id, id, title, position) VALUES (?1, ?2, ?3, ?4)",
                params![id, column.id, column.title, column.order],
            )
            .context("Failed to seed default column")?;
        }
        tx.commit().context("Failed to commit project")?;
        self.get_project(id)?
            .context("Project not found after insert")
    }

    pub fn key_exists(&self, site_id: SiteId, key: &ProjectKey) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM projects WHERE site_id = ?1 AND key = ?2",
                params![site_id, key.as_str()],
                |row| row.get(0),
            )
            .context("Failed to check project key")
    }

    pub fn update_project(&self, project: &Project) -> Result<()> {
        let count = self
            .conn
            .execute(
                "UPDATE projects SET name = ?1, is_private = ?2 WHERE id = ?3",
                params![project.name, project.is_private, project.id],
            )
            .context("Failed to update project")?;
        if count == 0 {
            bail!("Project {} not found", project.id);
        }
        Ok(())
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        self.conn
            .query_row(
                "SELECT id, site_id, name, key, is_private, created_by FROM projects WHERE id = ?1",
                params![id],
                ProjectRow::read,
            )
            .optional()
            .context("Failed to query project")?
            .map(ProjectRow::into_project)
            .transpose()
    }

    pub fn find_project(&self, site_id: SiteId, key: &str) -> Result<Option<Project>> {
        self.conn
            .query_row(
                "SELECT id, site_id, name, key, is_private, created_by
                 FROM projects WHERE site_id = ?1 AND key = ?2",
                params![site_id, key],
                ProjectRow::read,
            )
            .optional()
            .context("Failed to query project by key")?
            .map(ProjectRow::into_project)
            .transpose()
    }

    pub fn list_projects(&self, site_id: SiteId) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, site_id, name, key, is_private, created_by
                 FROM projects WHERE site_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare list_projects")?;
        let rows = stmt
            .query_map(params![site_id], ProjectRow::read)
            .context("Failed to query projects")?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(row.context("Failed to read project row")?.into_project()?);
        }
        Ok(projects)
    }

    // ── Columns ───────────────────────────────────────────────────────

    /// Insert a custom column at the end and raise the project's column id
    /// high-water mark.
    pub fn create_column(&self, column: &Column) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let position: i32 = tx
            .query_row(
                "SELECT COUNT(*) FROM columns WHERE project_id = ?1",
                params![column.project_id],
                |row| row.get(0),
            )
            .context("Failed to count columns")?;
        tx.execute(
            "INSERT INTO columns (project_id, id, title, position) VALUES (?1, ?2, ?3, ?4)",
            params![column.project_id, column.id, column.title, position],
        )
        .context("Failed to insert column")?;
        tx.execute(
            "UPDATE projects SET last_column_id = MAX(last_column_id, ?1) WHERE id = ?2",
            params![column.id, column.project_id],
        )
        .context("Failed to record column id")?;
        tx.commit().context("Failed to commit column insert")?;
        Ok(())
    }

    /// Rename a column and move its issues to the derived status.
    pub fn rename_column(&self, project_id: ProjectId, column_id: ColumnId, title: &str) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let count = tx
            .execute(
                "UPDATE columns SET title = ?1 WHERE project_id = ?2 AND id = ?3",
                params![title, project_id, column_id],
            )
            .context("Failed to rename column")?;
        if count == 0 {
            bail!("Column {} not found in project {}", column_id, project_id);
        }
        tx.execute(
            "UPDATE issues SET status = ?1, updated_at = datetime('now')
             WHERE project_id = ?2 AND column_id = ?3",
            params![title.to_uppercase(), project_id, column_id],
        )
        .context("Failed to update issue statuses")?;
        tx.commit().context("Failed to commit column rename")?;
        Ok(())
    }

    pub fn delete_column(&self, project_id: ProjectId, column_id: ColumnId) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let position: Option<i32> = tx
            .query_row(
                "SELECT position FROM columns WHERE project_id = ?1 AND id = ?2",
                params![project_id, column_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up column")?;
        let Some(position) = position else {
            bail!("Column {} not found in project {}", column_id, project_id);
        };
        let issues: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM issues WHERE project_id = ?1 AND column_id = ?2",
                params![project_id, column_id],
                |row| row.get(0),
            )
            .context("Failed to count column issues")?;
        if issues > 0 {
            bail!("Column {} still holds {} issue(s)", column_id, issues);
        }
        tx.execute(
            "DELETE FROM columns WHERE project_id = ?1 AND id = ?2",
            params![project_id, column_id],
        )
        .context("Failed to delete column")?;
        tx.execute(
            "UPDATE columns SET position = position - 1 WHERE project_id = ?1 AND position > ?2",
            params![project_id, position],
        )
        .context("Failed to close column gap")?;
        tx.commit().context("Failed to commit column delete")?;
        Ok(())
    }

    /// Store the full column order of a project. `column_ids` must name every
    /// column of the project exactly once.
    pub fn reorder_columns(&self, project_id: ProjectId, column_ids: &[ColumnId]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let existing: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM columns WHERE project_id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .context("Failed to count columns")?;
        if existing != column_ids.len() as i64 {
            bail!(
                "Column order names {} columns but project {} has {}",
                column_ids.len(),
                project_id,
                existing
            );
        }
        for (position, id) in column_ids.iter().enumerate() {
            let count = tx
                .execute(
                    "UPDATE columns SET position = ?1 WHERE project_id = ?2 AND id = ?3",
                    params![position as i32, project_id, id],
                )
                .context("Failed to update column position")?;
            if count == 0 {
                bail!("Column {} not found in project {}", id, project_id);
            }
        }
        tx.commit().context("Failed to commit column order")?;
        Ok(())
    }

    pub fn list_columns(&self, project_id: ProjectId) -> Result<Vec<Column>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, project_id, title, position FROM columns
                 WHERE project_id = ?1 ORDER BY position, id",
            )
            .context("Failed to prepare list_columns")?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(Column {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    title: row.get(2)?,
                    order: row.get(3)?,
                })
            })
            .context("Failed to query columns")?;
        let mut columns = Vec::new();
        for row in rows {
            columns.push(row.context("Failed to read column row")?);
        }
        Ok(columns)
    }

    fn get_column(&self, project_id: ProjectId, column_id: ColumnId) -> Result<Option<Column>> {
        self.conn
            .query_row(
                "SELECT id, project_id, title, position FROM columns WHERE project_id = ?1 AND id = ?2",
                params![project_id, column_id],
                |row| {
                    Ok(Column {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                        title: row.get(2)?,
                        order: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("Failed to query column")
    }

    // ── Issues ────────────────────────────────────────────────────────

    /// Append an issue to the end of its column. Returns the assigned id.
    pub fn create_issue(&self, issue: &Issue) -> Result<IssueId> {
        let column = self
            .get_column(issue.project_id, issue.column_id)?
            .with_context(|| format!("Column {} not found", issue.column_id))?;
        let max_pos: i32 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(position), -1) FROM issues WHERE project_id = ?1 AND column_id = ?2",
                params![issue.project_id, issue.column_id],
                |row| row.get(0),
            )
            .context("Failed to get max position")?;

        self.conn
            .execute(
                "INSERT INTO issues
                 (project_id, column_id, title, status, start_date, end_date, assignee_id, reporter_id, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    issue.project_id,
                    issue.column_id,
                    issue.title,
                    column.status().as_str(),
                    issue.start_date.map(|d| d.to_string()),
                    issue.end_date.map(|d| d.to_string()),
                    issue.assignee_id,
                    issue.reporter_id,
                    max_pos + 1
                ],
            )
            .context("Failed to insert issue")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Update the editable fields of an issue. Placement is left alone.
    pub fn update_issue(&self, issue: &Issue) -> Result<()> {
        let count = self
            .conn
            .execute(
                "UPDATE issues SET title = ?1, start_date = ?2, end_date = ?3, assignee_id = ?4,
                 updated_at = datetime('now') WHERE id = ?5",
                params![
                    issue.title,
                    issue.start_date.map(|d| d.to_string()),
                    issue.end_date.map(|d| d.to_string()),
                    issue.assignee_id,
                    issue.id
                ],
            )
            .context("Failed to update issue")?;
        if count == 0 {
            bail!("Issue {} not found", issue.id);
        }
        Ok(())
    }

    pub fn delete_issue(&self, id: IssueId) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let place: Option<(ProjectId, ColumnId, i32)> = tx
            .query_row(
                "SELECT project_id, column_id, position FROM issues WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("Failed to look up issue")?;
        let Some((project_id, column_id, position)) = place else {
            bail!("Issue {} not found", id);
        };
        tx.execute("DELETE FROM issues WHERE id = ?1", params![id])
            .context("Failed to delete issue")?;
        tx.execute(
            "UPDATE issues SET position = position - 1
             WHERE project_id = ?1 AND column_id = ?2 AND position > ?3",
            params![project_id, column_id, position],
        )
        .context("Failed to close issue gap")?;
        tx.commit().context("Failed to commit issue delete")?;
        Ok(())
    }

    /// Move an issue to `mv.order` in `mv.dest_column_id`, shifting siblings
    /// in both columns so positions stay contiguous.
    pub fn move_issue(&self, mv: &IssueMove) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let place: Option<(ProjectId, ColumnId, i32)> = tx
            .query_row(
                "SELECT project_id, column_id, position FROM issues WHERE id = ?1",
                params![mv.issue_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("Failed to look up issue")?;
        let Some((project_id, source_column, position)) = place else {
            bail!("Issue {} not found", mv.issue_id);
        };
        let dest = self
            .get_column(project_id, mv.dest_column_id)?
            .with_context(|| format!("Column {} not found", mv.dest_column_id))?;

        tx.execute(
            "UPDATE issues SET position = position - 1
             WHERE project_id = ?1 AND column_id = ?2 AND position > ?3",
            params![project_id, source_column, position],
        )
        .context("Failed to close source gap")?;
        tx.execute(
            "UPDATE issues SET position = position + 1
             WHERE project_id = ?1 AND column_id = ?2 AND position >= ?3 AND id != ?4",
            params![project_id, mv.dest_column_id, mv.order, mv.issue_id],
        )
        .context("Failed to open destination slot")?;
        tx.execute(
            "UPDATE issues SET column_id = ?1, position = ?2, status = ?3, updated_at = datetime('now')
             WHERE id = ?4",
            params![mv.dest_column_id, mv.order, dest.status().as_str(), mv.issue_id],
        )
        .context("Failed to move issue")?;
        tx.commit().context("Failed to commit issue move")?;
        Ok(())
    }

    pub fn list_issues(&self, project_id: ProjectId) -> Result<Vec<Issue>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, column_id, project_id, title, status, start_date, end_date,
                        assignee_id, reporter_id, position
                 FROM issues WHERE project_id = ?1 ORDER BY column_id, position",
            )
            .context("Failed to prepare list_issues")?;
        let rows = stmt
            .query_map(params![project_id], IssueRow::read)
            .context("Failed to query issues")?;
        let mut issues = Vec::new();
        for row in rows {
            issues.push(row.context("Failed to read issue row")?.into_issue()?);
        }
        Ok(issues)
    }

    /// Load the full board of a project, for opening or reloading it.
    pub fn load_board(&self, project_id: ProjectId) -> Result<BoardModel> {
        let project = self
            .get_project(project_id)?
            .with_context(|| format!("Project {} not found", project_id))?;
        let last_column_id: ColumnId = self
            .conn
            .query_row(
                "SELECT last_column_id FROM projects WHERE id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .context("Failed to read column id high-water mark")?;
        let columns = self.list_columns(project_id)?;
        let issues = self.list_issues(project_id)?;
        let board =
            BoardModel::load(project, columns, issues).context("Stored board is inconsistent")?;
        Ok(board.with_last_column_id(last_column_id))
    }

    // ── Activity ──────────────────────────────────────────────────────

    pub fn append_activity(&self, event: &ActivityEvent) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO activity (id, actor_id, type, project_id, issue_id, comment_id, summary, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    event.id.to_string(),
                    event.actor_id,
                    event.kind.as_str(),
                    event.project_id,
                    event.issue_id,
                    event.comment_id,
                    event.summary,
                    event.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
                ],
            )
            .context("Failed to insert activity event")?;
        Ok(())
    }

    /// Most recent events first.
    pub fn recent_activity(&self, filter: &ActivityFilter, limit: usize) -> Result<Vec<ActivityEvent>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, actor_id, type, project_id, issue_id, comment_id, summary, timestamp
                 FROM activity
                 WHERE (?1 IS NULL OR project_id = ?1) AND (?2 IS NULL OR actor_id = ?2)
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?3",
            )
            .context("Failed to prepare recent_activity")?;
        let rows = stmt
            .query_map(
                params![filter.project_id, filter.actor_id, limit as i64],
                ActivityRow::read,
            )
            .context("Failed to query activity")?;
        collect_activity(rows)
    }

    /// Most recent events across every project of a site, optionally by one actor.
    pub fn recent_site_activity(
        &self,
        site_id: SiteId,
        actor_id: Option<ActorId>,
        limit: usize,
    ) -> Result<Vec<ActivityEvent>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT a.id, a.actor_id, a.type, a.project_id, a.issue_id, a.comment_id, a.summary, a.timestamp
                 FROM activity a JOIN projects p ON p.id = a.project_id
                 WHERE p.site_id = ?1 AND (?2 IS NULL OR a.actor_id = ?2)
                 ORDER BY a.timestamp DESC, a.rowid DESC LIMIT ?3",
            )
            .context("Failed to prepare recent_site_activity")?;
        let rows = stmt
            .query_map(params![site_id, actor_id, limit as i64], ActivityRow::read)
            .context("Failed to query site activity")?;
        collect_activity(rows)
    }
}

fn collect_activity(
    rows: impl Iterator<Item = rusqlite::Result<ActivityRow>>,
) -> Result<Vec<ActivityEvent>> {
    let mut events = Vec::new();
    for row in rows {
        events.push(row.context("Failed to read activity row")?.into_event()?);
    }
    Ok(events)
}

// ── Row types ─────────────────────────────────────────────────────────

/// Raw project row; the key is re-validated on the way out.
struct ProjectRow {
    id: ProjectId,
    site_id: SiteId,
    name: String,
    key: String,
    is_private: bool,
    created_by: ActorId,
}

impl ProjectRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            site_id: row.get(1)?,
            name: row.get(2)?,
            key: row.get(3)?,
            is_private: row.get(4)?,
            created_by: row.get(5)?,
        })
    }

    fn into_project(self) -> Result<Project> {
        let key = ProjectKey::parse(&self.key).context("Failed to parse project key")?;
        Ok(Project {
            id: self.id,
            site_id: self.site_id,
            name: self.name,
            key,
            is_private: self.is_private,
            created_by: self.created_by,
        })
    }
}

/// Intermediate row struct for reading issues before parsing dates.
struct IssueRow {
    id: IssueId,
    column_id: ColumnId,
    project_id: ProjectId,
    title: String,
    status: String,
    start_date: Option<String>,
    end_date: Option<String>,
    assignee_id: Option<ActorId>,
    reporter_id: ActorId,
    position: i32,
}

impl IssueRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            column_id: row.get(1)?,
            project_id: row.get(2)?,
            title: row.get(3)?,
            status: row.get(4)?,
            start_date: row.get(5)?,
            end_date: row.get(6)?,
            assignee_id: row.get(7)?,
            reporter_id: row.get(8)?,
            position: row.get(9)?,
        })
    }

    fn into_issue(self) -> Result<Issue> {
        Ok(Issue {
            id: self.id,
            column_id: self.column_id,
            project_id: self.project_id,
            title: self.title,
            status: IssueStatus::from(self.status),
            start_date: parse_date(self.start_date).context("Failed to parse start_date")?,
            end_date: parse_date(self.end_date).context("Failed to parse end_date")?,
            assignee_id: self.assignee_id,
            reporter_id: self.reporter_id,
            order: self.position,
        })
    }
}

fn parse_date(raw: Option<String>) -> Result<Option<NaiveDate>> {
    raw.map(|s| NaiveDate::from_str(&s).map_err(anyhow::Error::from))
        .transpose()
}

struct ActivityRow {
    id: String,
    actor_id: ActorId,
    kind: String,
    project_id: ProjectId,
    issue_id: Option<IssueId>,
    comment_id: Option<i64>,
    summary: String,
    timestamp: String,
}

impl ActivityRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            actor_id: row.get(1)?,
            kind: row.get(2)?,
            project_id: row.get(3)?,
            issue_id: row.get(4)?,
            comment_id: row.get(5)?,
            summary: row.get(6)?,
            timestamp: row.get(7)?,
        })
    }

    fn into_event(self) -> Result<ActivityEvent> {
        let kind = ActivityType::from_str(&self.kind)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse activity type")?;
        Ok(ActivityEvent {
            id: Uuid::parse_str(&self.id).context("Failed to parse activity id")?,
            actor_id: self.actor_id,
            kind,
            project_id: self.project_id,
            issue_id: self.issue_id,
            comment_id: self.comment_id,
            summary: self.summary,
            timestamp: DateTime::parse_from_rfc3339(&self.timestamp)
                .context("Failed to parse activity timestamp")?
                .with_timezone(&Utc),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tracker_common::{ActivityEventDraft, DEFAULT_COLUMNS, is_default_column};

    use super::*;

    fn new_project(db: &TrackerDb, key: &str) -> Result<Project> {
        db.create_project(
            &NewProject {
                site_id: 1,
                name: format!("Project {}", key),
                key: ProjectKey::parse(key)?,
                is_private: false,
            },
            10,
        )
    }

    fn new_issue(db: &TrackerDb, project: &Project, column_id: ColumnId, title: &str) -> Result<IssueId> {
        db.create_issue(&Issue {
            id: -1,
            column_id,
            project_id: project.id,
            title: title.into(),
            status: IssueStatus::Todo,
            start_date: None,
            end_date: None,
            assignee_id: None,
            reporter_id: 10,
            order: 0,
        })
    }

    fn positions(db: &TrackerDb, project: &Project, column_id: ColumnId) -> Result<Vec<(IssueId, i32)>> {
        Ok(db
            .list_issues(project.id)?
            .into_iter()
            .filter(|i| i.column_id == column_id)
            .map(|i| (i.id, i.order))
            .collect())
    }

    #[test]
    fn test_create_project_seeds_default_columns() -> Result<()> {
        let db = TrackerDb::new_in_memory()?;
        let project = new_project(&db, "WEB")?;
        assert_eq!(project.created_by, 10);

        let columns = db.list_columns(project.id)?;
        assert_eq!(columns.len(), DEFAULT_COLUMNS.len());
        assert!(columns.iter().all(|c| is_default_column(c.id)));
        assert_eq!(columns[0].title, "To Do");

        assert!(db.key_exists(1, &project.key)?);
        assert!(!db.key_exists(2, &project.key)?);
        assert!(new_project(&db, "WEB").is_err(), "key is unique per site");
        Ok(())
    }

    #[test]
    fn test_find_and_update_project() -> Result<()> {
        let db = TrackerDb::new_in_memory()?;
        let mut project = new_project(&db, "OPS")?;
        project.name = "Operations".into();
        project.is_private = true;
        db.update_project(&project)?;

        let found = db.find_project(1, "OPS")?.expect("project should exist");
        assert_eq!(found, project);
        assert!(db.find_project(2, "OPS")?.is_none());
        assert_eq!(db.list_projects(1)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_create_issue_appends_to_column() -> Result<()> {
        let db = TrackerDb::new_in_memory()?;
        let project = new_project(&db, "WEB")?;
        let a = new_issue(&db, &project, 1, "a")?;
        let b = new_issue(&db, &project, 1, "b")?;
        let c = new_issue(&db, &project, 3, "c")?;
        assert_eq!(positions(&db, &project, 1)?, vec![(a, 0), (b, 1)]);

        let issues = db.list_issues(project.id)?;
        let done = issues.iter().find(|i| i.id == c).expect("issue c");
        assert_eq!(done.status, IssueStatus::Done);
        Ok(())
    }

    #[test]
    fn test_move_issue_shifts_both_columns() -> Result<()> {
        let db = TrackerDb::new_in_memory()?;
        let project = new_project(&db, "WEB")?;
        let a = new_issue(&db, &project, 1, "a")?;
        let b = new_issue(&db, &project, 1, "b")?;
        let c = new_issue(&db, &project, 1, "c")?;
        let d = new_issue(&db, &project, 3, "d")?;

        db.move_issue(&IssueMove {
            issue_id: b,
            dest_column_id: 3,
            order: 0,
        })?;
        assert_eq!(positions(&db, &project, 1)?, vec![(a, 0), (c, 1)]);
        assert_eq!(positions(&db, &project, 3)?, vec![(b, 0), (d, 1)]);

        // Within one column.
        db.move_issue(&IssueMove {
            issue_id: a,
            dest_column_id: 1,
            order: 1,
        })?;
        assert_eq!(positions(&db, &project, 1)?, vec![(c, 0), (a, 1)]);

        let board = db.load_board(project.id)?;
        board.check_invariants()?;
        assert_eq!(board.issue(b).map(|i| i.status.clone()), Some(IssueStatus::Done));
        Ok(())
    }

    #[test]
    fn test_delete_issue_closes_gap() -> Result<()> {
        let db = TrackerDb::new_in_memory()?;
        let project = new_project(&db, "WEB")?;
        let a = new_issue(&db, &project, 2, "a")?;
        let b = new_issue(&db, &project, 2, "b")?;
        let c = new_issue(&db, &project, 2, "c")?;
        db.delete_issue(b)?;
        assert_eq!(positions(&db, &project, 2)?, vec![(a, 0), (c, 1)]);
        assert!(db.delete_issue(b).is_err());
        Ok(())
    }

    #[test]
    fn test_custom_column_lifecycle() -> Result<()> {
        let db = TrackerDb::new_in_memory()?;
        let project = new_project(&db, "WEB")?;
        for (id, title) in [(100, "QA"), (101, "Blocked")] {
            db.create_column(&Column {
                id,
                project_id: project.id,
                title: title.into(),
                order: 0,
            })?;
        }
        db.reorder_columns(project.id, &[1, 2, 3, 101, 100])?;
        let ids: Vec<ColumnId> = db.list_columns(project.id)?.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 101, 100]);
        assert!(db.reorder_columns(project.id, &[1, 2, 3]).is_err());

        let issue = new_issue(&db, &project, 100, "x")?;
        db.rename_column(project.id, 100, "Review")?;
        let renamed = db.list_issues(project.id)?;
        assert_eq!(renamed[0].status, IssueStatus::Custom("REVIEW".into()));

        assert!(db.delete_column(project.id, 100).is_err(), "column not empty");
        db.delete_issue(issue)?;
        db.delete_column(project.id, 101)?;
        let columns = db.list_columns(project.id)?;
        assert_eq!(columns.len(), 4);
        assert_eq!(columns[3].id, 100);
        assert_eq!(columns[3].order, 3);

        // The deleted column's id survives a reload as the high-water mark.
        let board = db.load_board(project.id)?;
        assert_eq!(board.last_column_id(), 101);
        assert_eq!(crate::board::transition::next_custom_column_id(&board), 102);
        Ok(())
    }

    #[test]
    fn test_activity_filters_and_ordering() -> Result<()> {
        let db = TrackerDb::new_in_memory()?;
        let web = new_project(&db, "WEB")?;
        let ops = new_project(&db, "OPS")?;
        let base = Utc::now();
        for (offset, actor, project) in [(0, 1, web.id), (1, 2, web.id), (2, 1, ops.id)] {
            let event = ActivityEventDraft::new(actor, ActivityType::IssueCreated, project)
                .normalize(base + chrono::Duration::seconds(offset));
            db.append_activity(&event)?;
        }

        let recent = db.recent_activity(&ActivityFilter::default(), 2)?;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].project_id, ops.id);

        let web_only = db.recent_activity(&ActivityFilter::project(web.id), 10)?;
        assert_eq!(web_only.len(), 2);
        assert_eq!(web_only[0].actor_id, 2);

        let by_actor = db.recent_activity(&ActivityFilter::actor(1), 10)?;
        assert_eq!(by_actor.len(), 2);

        assert_eq!(db.recent_site_activity(1, None, 10)?.len(), 3);
        assert!(db.recent_site_activity(9, None, 10)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_site_activity_by_actor_stays_on_site() -> Result<()> {
        let db = TrackerDb::new_in_memory()?;
        let home = new_project(&db, "HOME")?;
        let away = db.create_project(
            &NewProject {
                site_id: 2,
                name: "Elsewhere".into(),
                key: ProjectKey::parse("AWAY")?,
                is_private: false,
            },
            10,
        )?;
        let base = Utc::now();
        for (offset, project) in [(0, home.id), (1, away.id), (2, away.id)] {
            let event = ActivityEventDraft::new(1, ActivityType::IssueMoved, project)
                .normalize(base + chrono::Duration::seconds(offset));
            db.append_activity(&event)?;
        }
        let other = ActivityEventDraft::new(2, ActivityType::IssueMoved, home.id).normalize(base);
        db.append_activity(&other)?;

        let mine = db.recent_site_activity(1, Some(1), 10)?;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].project_id, home.id);
        assert_eq!(db.recent_site_activity(2, Some(1), 10)?.len(), 2);
        assert_eq!(db.recent_site_activity(1, None, 10)?.len(), 2);
        Ok(())
    }
}
