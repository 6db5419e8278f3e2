//! Pure board transitions.
//!
//! Each function validates a request against the current board and returns
//! the next board together with the single remote command that replays the
//! change. Nothing here performs I/O or checks permissions, so the ordering
//! rules can be exercised without a store or a UI.

use chrono::NaiveDate;
use serde::Deserialize;
use tracker_common::{
    ActivityType, ActorId, Column, ColumnId, DEFAULT_COLUMNS, Issue, IssueId, IssueStatus,
    is_default_column,
};

use super::model::{BoardModel, Partition, renumber_columns, renumber_issues};
use super::persistence::{IssueMove, PersistCommand};
use crate::errors::{BoardError, ValidationError};

/// Activity to record once the transition commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityNote {
    pub kind: ActivityType,
    pub issue_id: Option<IssueId>,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub board: BoardModel,
    pub command: PersistCommand,
    /// Partitions of the board this transition changes.
    pub partitions: Vec<Partition>,
    pub activity: ActivityNote,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewIssue {
    pub title: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub assignee_id: Option<ActorId>,
}

/// Field updates for an issue. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct IssuePatch {
    pub title: Option<String>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
    pub assignee_id: Option<Option<ActorId>>,
}

pub fn move_column(
    board: &BoardModel,
    source_index: usize,
    dest_index: usize,
) -> Result<Transition, BoardError> {
    let count = board.columns().len();
    if source_index >= count || dest_index >= count {
        return Err(BoardError::InvariantViolation(format!(
            "column move {} -> {} is out of range for {} columns",
            source_index, dest_index, count
        )));
    }
    if source_index < board.default_column_count() || dest_index < board.default_column_count() {
        return Err(ValidationError::DefaultColumnOrder {
            from: source_index,
            to: dest_index,
        }
        .into());
    }

    let mut next = board.clone();
    let columns = next.columns_mut();
    let column = columns.remove(source_index);
    let title = column.title.clone();
    columns.insert(dest_index, column);
    renumber_columns(columns);

    let column_ids = next.columns().iter().map(|c| c.id).collect();
    Ok(Transition {
        command: PersistCommand::ReorderColumns {
            project_id: board.project().id,
            column_ids,
        },
        partitions: vec![Partition::Layout],
        activity: ActivityNote {
            kind: ActivityType::ColumnsReordered,
            issue_id: None,
            summary: format!("moved column '{}' to position {}", title, dest_index),
        },
        board: next,
    })
}

pub fn move_issue(
    board: &BoardModel,
    issue_id: IssueId,
    source_column_id: ColumnId,
    dest_column_id: ColumnId,
    dest_index: usize,
) -> Result<Transition, BoardError> {
    let source = require_column(board, source_column_id)?;
    let dest = require_column(board, dest_column_id)?;
    let source_index = match board.issues(source_column_id).iter().position(|i| i.id == issue_id) {
        Some(index) => index,
        None if board.issue(issue_id).is_some() => {
            return Err(BoardError::InvariantViolation(format!(
                "issue {} is not in column {}",
                issue_id, source_column_id
            )));
        }
        None => return Err(not_found("issue", issue_id)),
    };

    let same_column = source_column_id == dest_column_id;
    let max_index = if same_column {
        board.issues(source_column_id).len() - 1
    } else {
        board.issues(dest_column_id).len()
    };
    if dest_index > max_index {
        return Err(BoardError::InvariantViolation(format!(
            "index {} is out of range for column {} (max {})",
            dest_index, dest_column_id, max_index
        )));
    }

    let mut next = board.clone();
    let source_list = issues_mut(&mut next, source_column_id)?;
    let mut issue = source_list.remove(source_index);
    renumber_issues(source_list);
    if !same_column {
        issue.column_id = dest_column_id;
        issue.status = dest.status();
    }
    let title = issue.title.clone();
    let dest_list = issues_mut(&mut next, dest_column_id)?;
    dest_list.insert(dest_index, issue);
    renumber_issues(dest_list);

    let (kind, summary, partitions) = if same_column {
        (
            ActivityType::IssueReordered,
            format!("reordered '{}' in '{}'", title, source.title),
            vec![Partition::ColumnIssues(source_column_id)],
        )
    } else {
        (
            ActivityType::IssueMoved,
            format!("moved '{}' from '{}' to '{}'", title, source.title, dest.title),
            vec![
                Partition::ColumnIssues(source_column_id),
                Partition::ColumnIssues(dest_column_id),
            ],
        )
    };

    Ok(Transition {
        board: next,
        command: PersistCommand::MoveIssue(IssueMove {
            issue_id,
            dest_column_id,
            order: dest_index as i32,
        }),
        partitions,
        activity: ActivityNote {
            kind,
            issue_id: Some(issue_id),
            summary,
        },
    })
}

/// Append a new issue at the end of a column. Siblings keep their order.
pub fn create_issue(
    board: &BoardModel,
    column_id: ColumnId,
    new: NewIssue,
    reporter_id: ActorId,
    provisional_id: IssueId,
) -> Result<Transition, BoardError> {
    let column = require_column(board, column_id)?;
    let title = clean_title(&new.title)?;
    check_dates(new.start_date, new.end_date)?;

    let issue = Issue {
        id: provisional_id,
        column_id,
        project_id: board.project().id,
        title: title.clone(),
        status: column.status(),
        start_date: new.start_date,
        end_date: new.end_date,
        assignee_id: new.assignee_id,
        reporter_id,
        order: board.issues(column_id).len() as i32,
    };

    let mut next = board.clone();
    issues_mut(&mut next, column_id)?.push(issue.clone());

    Ok(Transition {
        board: next,
        command: PersistCommand::CreateIssue { issue },
        partitions: vec![Partition::ColumnIssues(column_id)],
        activity: ActivityNote {
            kind: ActivityType::IssueCreated,
            issue_id: None,
            summary: format!("created '{}' in '{}'", title, column.title),
        },
    })
}

pub fn update_issue(
    board: &BoardModel,
    issue_id: IssueId,
    patch: IssuePatch,
) -> Result<Transition, BoardError> {
    let (column_id, index) = board
        .locate_issue(issue_id)
        .ok_or_else(|| not_found("issue", issue_id))?;

    let mut next = board.clone();
    let issue = &mut issues_mut(&mut next, column_id)?[index];
    if let Some(title) = patch.title {
        issue.title = clean_title(&title)?;
    }
    if let Some(start) = patch.start_date {
        issue.start_date = start;
    }
    if let Some(end) = patch.end_date {
        issue.end_date = end;
    }
    if let Some(assignee) = patch.assignee_id {
        issue.assignee_id = assignee;
    }
    check_dates(issue.start_date, issue.end_date)?;
    let updated = issue.clone();

    Ok(Transition {
        board: next,
        activity: ActivityNote {
            kind: ActivityType::IssueUpdated,
            issue_id: Some(issue_id),
            summary: format!("updated '{}'", updated.title),
        },
        command: PersistCommand::UpdateIssue { issue: updated },
        partitions: vec![Partition::ColumnIssues(column_id)],
    })
}

pub fn delete_issue(board: &BoardModel, issue_id: IssueId) -> Result<Transition, BoardError> {
    let (column_id, index) = board
        .locate_issue(issue_id)
        .ok_or_else(|| not_found("issue", issue_id))?;

    let mut next = board.clone();
    let list = issues_mut(&mut next, column_id)?;
    let removed = list.remove(index);
    renumber_issues(list);

    Ok(Transition {
        board: next,
        command: PersistCommand::DeleteIssue { issue_id },
        partitions: vec![Partition::ColumnIssues(column_id)],
        activity: ActivityNote {
            kind: ActivityType::IssueDeleted,
            issue_id: Some(issue_id),
            summary: format!("deleted '{}'", removed.title),
        },
    })
}

/// Add a custom column at the end of the board with the next free custom id.
pub fn create_column(board: &BoardModel, title: &str) -> Result<Transition, BoardError> {
    let title = clean_title(title)?;
    check_column_title(board, &title, None)?;

    let id = next_custom_column_id(board);
    let column = Column {
        id,
        project_id: board.project().id,
        title: title.clone(),
        order: board.columns().len() as i32,
    };

    let mut next = board.clone();
    next.columns_mut().push(column.clone());
    next.insert_issue_list(id, Vec::new());
    next.note_column_id(id);

    Ok(Transition {
        board: next,
        command: PersistCommand::CreateColumn { column },
        partitions: vec![Partition::Layout, Partition::ColumnIssues(id)],
        activity: ActivityNote {
            kind: ActivityType::ColumnCreated,
            issue_id: None,
            summary: format!("added column '{}'", title),
        },
    })
}

/// Rename a custom column. Issues in it take the new derived status.
pub fn rename_column(
    board: &BoardModel,
    column_id: ColumnId,
    title: &str,
) -> Result<Transition, BoardError> {
    protect_default_column(column_id)?;
    let old_title = require_column(board, column_id)?.title.clone();
    let title = clean_title(title)?;
    check_column_title(board, &title, Some(column_id))?;

    let mut next = board.clone();
    let column = next
        .columns_mut()
        .iter_mut()
        .find(|c| c.id == column_id)
        .ok_or_else(|| not_found("column", column_id))?;
    column.title = title.clone();
    let status = column.status();
    for issue in issues_mut(&mut next, column_id)? {
        issue.status = status.clone();
    }

    Ok(Transition {
        board: next,
        command: PersistCommand::RenameColumn {
            project_id: board.project().id,
            column_id,
            title: title.clone(),
        },
        partitions: vec![Partition::Layout, Partition::ColumnIssues(column_id)],
        activity: ActivityNote {
            kind: ActivityType::ColumnRenamed,
            issue_id: None,
            summary: format!("renamed column '{}' to '{}'", old_title, title),
        },
    })
}

/// Remove an empty custom column and close the gap in column order.
pub fn delete_column(board: &BoardModel, column_id: ColumnId) -> Result<Transition, BoardError> {
    protect_default_column(column_id)?;
    let title = require_column(board, column_id)?.title.clone();
    let count = board.issues(column_id).len();
    if count > 0 {
        return Err(ValidationError::ColumnNotEmpty { column_id, count }.into());
    }

    let mut next = board.clone();
    let columns = next.columns_mut();
    columns.retain(|c| c.id != column_id);
    renumber_columns(columns);
    next.remove_issue_list(column_id);

    Ok(Transition {
        board: next,
        command: PersistCommand::DeleteColumn {
            project_id: board.project().id,
            column_id,
        },
        partitions: vec![Partition::Layout, Partition::ColumnIssues(column_id)],
        activity: ActivityNote {
            kind: ActivityType::ColumnDeleted,
            issue_id: None,
            summary: format!("removed column '{}'", title),
        },
    })
}

/// Id the next custom column on `board` will get. Ids of deleted columns
/// are not handed out again.
pub fn next_custom_column_id(board: &BoardModel) -> ColumnId {
    board.last_column_id() + 1
}

/// Default columns can never be renamed or deleted, whatever the caller's role.
pub fn protect_default_column(column_id: ColumnId) -> Result<(), BoardError> {
    if is_default_column(column_id) {
        return Err(ValidationError::DefaultColumnProtected { column_id }.into());
    }
    Ok(())
}

/// Titles are compared by the uppercase key a column's status is built from.
fn check_column_title(
    board: &BoardModel,
    title: &str,
    except: Option<ColumnId>,
) -> Result<(), BoardError> {
    let key = title.to_uppercase();
    let reserved = DEFAULT_COLUMNS
        .iter()
        .any(|d| d.title.to_uppercase() == key)
        || IssueStatus::is_canonical_name(&key);
    if reserved {
        return Err(ValidationError::ReservedColumnTitle {
            title: title.to_string(),
        }
        .into());
    }
    let duplicate = board
        .columns()
        .iter()
        .filter(|c| !c.is_default() && Some(c.id) != except)
        .any(|c| c.title.to_uppercase() == key);
    if duplicate {
        return Err(ValidationError::DuplicateColumnTitle {
            title: title.to_string(),
        }
        .into());
    }
    Ok(())
}

fn clean_title(title: &str) -> Result<String, BoardError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle.into());
    }
    Ok(title.to_string())
}

fn check_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), BoardError> {
    if let (Some(start), Some(end)) = (start, end)
        && start > end
    {
        return Err(ValidationError::InvalidDateRange { start, end }.into());
    }
    Ok(())
}

fn require_column(board: &BoardModel, column_id: ColumnId) -> Result<&Column, BoardError> {
    board
        .column(column_id)
        .ok_or_else(|| not_found("column", column_id))
}

fn issues_mut(board: &mut BoardModel, column_id: ColumnId) -> Result<&mut Vec<Issue>, BoardError> {
    board
        .issues_mut(column_id)
        .ok_or_else(|| not_found("column", column_id))
}

fn not_found(entity: &'static str, id: i64) -> BoardError {
    BoardError::NotFound { entity, id }
}
