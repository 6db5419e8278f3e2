//! In-memory board of the currently open project.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracker_common::{
    CUSTOM_COLUMN_ID_THRESHOLD, Column, ColumnId, DEFAULT_COLUMNS, Issue, IssueId, Project,
};

use crate::errors::BoardError;

/// A region of the board that an operation may change. Rollback restores
/// whole partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Partition {
    /// The ordered column list.
    Layout,
    /// The ordered issue list of one column.
    ColumnIssues(ColumnId),
}

/// Pre-operation copy of the partitions an operation touched.
#[derive(Debug, Clone)]
pub struct PartitionSnapshot {
    columns: Option<(Vec<Column>, ColumnId)>,
    issue_lists: Vec<(ColumnId, Option<Vec<Issue>>)>,
}

/// Columns and per-column ordered issues for exactly one project.
///
/// Invariants, checked by [`BoardModel::check_invariants`]:
/// - column `order` is `0..n-1` ascending, default columns first in their
///   fixed order
/// - issue `order` is `0..m-1` within each column
/// - every issue sits in exactly one column list, and every column has a list
/// - an issue's `status` matches its column's status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardModel {
    project: Project,
    columns: Vec<Column>,
    issues_by_column: BTreeMap<ColumnId, Vec<Issue>>,
    /// Highest custom column id ever issued for the project. Never lowered
    /// by a delete, so ids are not reused.
    last_column_id: ColumnId,
    generation: u64,
}

impl BoardModel {
    /// An empty board holding only the default columns.
    pub fn new(project: Project) -> Self {
        let columns = Column::defaults_for(project.id);
        let issues_by_column = columns.iter().map(|c| (c.id, Vec::new())).collect();
        Self {
            project,
            columns,
            issues_by_column,
            last_column_id: CUSTOM_COLUMN_ID_THRESHOLD - 1,
            generation: 0,
        }
    }

    /// Build a board from flat store rows. Columns and issues are sorted by
    /// their stored order and renumbered to close gaps.
    pub fn load(
        project: Project,
        mut columns: Vec<Column>,
        issues: Vec<Issue>,
    ) -> Result<Self, BoardError> {
        columns.sort_by_key(|c| (c.order, c.id));
        renumber_columns(&mut columns);

        let mut issues_by_column: BTreeMap<ColumnId, Vec<Issue>> =
            columns.iter().map(|c| (c.id, Vec::new())).collect();
        for issue in issues {
            match issues_by_column.get_mut(&issue.column_id) {
                Some(list) => list.push(issue),
                None => {
                    return Err(BoardError::InvariantViolation(format!(
                        "issue {} references unknown column {}",
                        issue.id, issue.column_id
                    )));
                }
            }
        }
        for list in issues_by_column.values_mut() {
            list.sort_by_key(|i| (i.order, i.id));
            renumber_issues(list);
        }

        let board = Self {
            project,
            last_column_id: highest_custom_column_id(&columns),
            columns,
            issues_by_column,
            generation: 0,
        };
        board.check_invariants()?;
        Ok(board)
    }

    /// Replace all columns and issues wholesale (reload flows). The
    /// generation advances so that results of calls issued against the old
    /// contents are discarded when they resolve.
    pub fn replace_all(
        &mut self,
        columns: Vec<Column>,
        issues_by_column: BTreeMap<ColumnId, Vec<Issue>>,
    ) -> Result<u64, BoardError> {
        let candidate = Self {
            project: self.project.clone(),
            last_column_id: self.last_column_id.max(highest_custom_column_id(&columns)),
            columns,
            issues_by_column,
            generation: self.generation + 1,
        };
        candidate.check_invariants()?;
        *self = candidate;
        Ok(self.generation)
    }

    /// Raise the column id high-water mark, e.g. to the value the store kept.
    pub fn with_last_column_id(mut self, id: ColumnId) -> Self {
        self.last_column_id = self.last_column_id.max(id);
        self
    }

    pub fn last_column_id(&self) -> ColumnId {
        self.last_column_id
    }

    pub(crate) fn note_column_id(&mut self, id: ColumnId) {
        self.last_column_id = self.last_column_id.max(id);
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn default_column_count(&self) -> usize {
        self.columns.iter().filter(|c| c.is_default()).count()
    }

    /// Issues of a column in board order. Unknown columns yield an empty slice.
    pub fn issues(&self, column_id: ColumnId) -> &[Issue] {
        self.issues_by_column
            .get(&column_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn issues_by_column(&self) -> &BTreeMap<ColumnId, Vec<Issue>> {
        &self.issues_by_column
    }

    pub fn issue(&self, id: IssueId) -> Option<&Issue> {
        self.issues_by_column
            .values()
            .flat_map(|list| list.iter())
            .find(|i| i.id == id)
    }

    /// Column and index of an issue.
    pub fn locate_issue(&self, id: IssueId) -> Option<(ColumnId, usize)> {
        self.issues_by_column.iter().find_map(|(column_id, list)| {
            list.iter()
                .position(|i| i.id == id)
                .map(|index| (*column_id, index))
        })
    }

    pub fn issue_count(&self) -> usize {
        self.issues_by_column.values().map(Vec::len).sum()
    }

    /// Swap a provisional issue id for the id the store assigned.
    pub(crate) fn rekey_issue(&mut self, from: IssueId, to: IssueId) -> Option<Issue> {
        let issue = self
            .issues_by_column
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .find(|i| i.id == from)?;
        issue.id = to;
        Some(issue.clone())
    }

    pub(crate) fn columns_mut(&mut self) -> &mut Vec<Column> {
        &mut self.columns
    }

    pub(crate) fn issues_mut(&mut self, column_id: ColumnId) -> Option<&mut Vec<Issue>> {
        self.issues_by_column.get_mut(&column_id)
    }

    pub(crate) fn insert_issue_list(&mut self, column_id: ColumnId, issues: Vec<Issue>) {
        self.issues_by_column.insert(column_id, issues);
    }

    pub(crate) fn remove_issue_list(&mut self, column_id: ColumnId) -> Option<Vec<Issue>> {
        self.issues_by_column.remove(&column_id)
    }

    pub fn capture(&self, partitions: &[Partition]) -> PartitionSnapshot {
        let mut snapshot = PartitionSnapshot {
            columns: None,
            issue_lists: Vec::new(),
        };
        for partition in partitions {
            match partition {
                Partition::Layout => {
                    snapshot.columns = Some((self.columns.clone(), self.last_column_id))
                }
                Partition::ColumnIssues(id) => snapshot
                    .issue_lists
                    .push((*id, self.issues_by_column.get(id).cloned())),
            }
        }
        snapshot
    }

    pub fn restore(&mut self, snapshot: PartitionSnapshot) {
        if let Some((columns, last_column_id)) = snapshot.columns {
            self.columns = columns;
            self.last_column_id = last_column_id;
        }
        for (column_id, list) in snapshot.issue_lists {
            match list {
                Some(list) => {
                    self.issues_by_column.insert(column_id, list);
                }
                None => {
                    self.issues_by_column.remove(&column_id);
                }
            }
        }
    }

    pub fn check_invariants(&self) -> Result<(), BoardError> {
        let violation = |msg: String| Err(BoardError::InvariantViolation(msg));

        let mut seen_columns = HashSet::new();
        for (index, column) in self.columns.iter().enumerate() {
            if column.order != index as i32 {
                return violation(format!(
                    "column {} has order {} at position {}",
                    column.id, column.order, index
                ));
            }
            if column.project_id != self.project.id {
                return violation(format!(
                    "column {} belongs to project {}",
                    column.id, column.project_id
                ));
            }
            if !seen_columns.insert(column.id) {
                return violation(format!("column {} appears twice", column.id));
            }
        }

        let defaults: Vec<ColumnId> = DEFAULT_COLUMNS.iter().map(|d| d.id).collect();
        let leading: Vec<ColumnId> = self
            .columns
            .iter()
            .take(defaults.len())
            .map(|c| c.id)
            .collect();
        if leading != defaults {
            return violation(format!(
                "board must start with default columns {:?}, found {:?}",
                defaults, leading
            ));
        }
        if self.columns[defaults.len()..].iter().any(|c| c.is_default()) {
            return violation("default column found among custom columns".to_string());
        }

        if self.issues_by_column.len() != self.columns.len()
            || self
                .issues_by_column
                .keys()
                .any(|id| !seen_columns.contains(id))
        {
            return violation("issue lists do not match the column list".to_string());
        }

        let mut seen_issues = HashSet::new();
        for column in &self.columns {
            let status = column.status();
            for (index, issue) in self.issues(column.id).iter().enumerate() {
                if issue.order != index as i32 {
                    return violation(format!(
                        "issue {} has order {} at position {} of column {}",
                        issue.id, issue.order, index, column.id
                    ));
                }
                if issue.column_id != column.id || issue.project_id != self.project.id {
                    return violation(format!(
                        "issue {} is filed under column {} but claims column {}",
                        issue.id, column.id, issue.column_id
                    ));
                }
                if issue.status != status {
                    return violation(format!(
                        "issue {} has status {} in column {} ({})",
                        issue.id, issue.status, column.id, status
                    ));
                }
                if !seen_issues.insert(issue.id) {
                    return violation(format!("issue {} appears twice", issue.id));
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn renumber_columns(columns: &mut [Column]) {
    for (index, column) in columns.iter_mut().enumerate() {
        column.order = index as i32;
    }
}

pub(crate) fn renumber_issues(issues: &mut [Issue]) {
    for (index, issue) in issues.iter_mut().enumerate() {
        issue.order = index as i32;
    }
}

fn highest_custom_column_id(columns: &[Column]) -> ColumnId {
    columns
        .iter()
        .filter(|c| !c.is_default())
        .map(|c| c.id)
        .max()
        .unwrap_or(CUSTOM_COLUMN_ID_THRESHOLD - 1)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use tracker_common::{IssueStatus, ProjectKey};

    use super::*;

    pub fn project(id: i64, created_by: i64) -> Project {
        Project {
            id,
            site_id: 1,
            name: "Core".into(),
            key: ProjectKey::parse("CORE").unwrap(),
            is_private: false,
            created_by,
        }
    }

    pub fn issue(id: IssueId, column: &Column, order: i32) -> Issue {
        Issue {
            id,
            column_id: column.id,
            project_id: column.project_id,
            title: format!("Issue {}", id),
            status: column.status(),
            start_date: None,
            end_date: None,
            assignee_id: None,
            reporter_id: 1,
            order,
        }
    }

    /// Project 7 with custom columns 100 "QA" and 101 "Blocked", issues
    /// 40, 42, 44 in To Do and 50 in Done.
    pub fn sample_board() -> BoardModel {
        let project = project(7, 99);
        let mut columns = Column::defaults_for(7);
        columns.push(Column {
            id: 100,
            project_id: 7,
            title: "QA".into(),
            order: 3,
        });
        columns.push(Column {
            id: 101,
            project_id: 7,
            title: "Blocked".into(),
            order: 4,
        });
        let todo = columns[0].clone();
        let done = columns[2].clone();
        let issues = vec![
            issue(40, &todo, 0),
            issue(42, &todo, 1),
            issue(44, &todo, 2),
            issue(50, &done, 0),
        ];
        let board = BoardModel::load(project, columns, issues).unwrap();
        assert_eq!(board.issue(50).unwrap().status, IssueStatus::Done);
        board
    }
}
