use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{ActorId, ColumnId, IssueId, ProjectId};

/// Column ids below this value are reserved for the default columns.
pub const CUSTOM_COLUMN_ID_THRESHOLD: ColumnId = 100;

/// Workflow status of an issue, derived from the column it sits in.
///
/// The three default columns map to the canonical statuses; a custom column
/// maps to its title uppercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueStatus {
    Todo,
    InProgress,
    Done,
    Custom(String),
}

impl IssueStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
            Self::Custom(s) => s,
        }
    }

    pub fn is_canonical_name(name: &str) -> bool {
        matches!(name, "TODO" | "IN_PROGRESS" | "DONE")
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for IssueStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "TODO" => Self::Todo,
            "IN_PROGRESS" => Self::InProgress,
            "DONE" => Self::Done,
            _ => Self::Custom(s),
        }
    }
}

impl From<IssueStatus> for String {
    fn from(status: IssueStatus) -> Self {
        match status {
            IssueStatus::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

/// One of the three columns every project board starts with.
#[derive(Debug)]
pub struct DefaultColumn {
    pub id: ColumnId,
    pub title: &'static str,
    pub status: IssueStatus,
}

/// Default columns in their fixed board order.
pub static DEFAULT_COLUMNS: [DefaultColumn; 3] = [
    DefaultColumn {
        id: 1,
        title: "To Do",
        status: IssueStatus::Todo,
    },
    DefaultColumn {
        id: 2,
        title: "In Progress",
        status: IssueStatus::InProgress,
    },
    DefaultColumn {
        id: 3,
        title: "Done",
        status: IssueStatus::Done,
    },
];

pub fn default_column(id: ColumnId) -> Option<&'static DefaultColumn> {
    DEFAULT_COLUMNS.iter().find(|c| c.id == id)
}

pub fn is_default_column(id: ColumnId) -> bool {
    id < CUSTOM_COLUMN_ID_THRESHOLD
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub project_id: ProjectId,
    pub title: String,
    pub order: i32,
}

impl Column {
    /// Build the default columns for a freshly created project.
    pub fn defaults_for(project_id: ProjectId) -> Vec<Column> {
        DEFAULT_COLUMNS
            .iter()
            .enumerate()
            .map(|(order, d)| Column {
                id: d.id,
                project_id,
                title: d.title.to_string(),
                order: order as i32,
            })
            .collect()
    }

    pub fn is_default(&self) -> bool {
        is_default_column(self.id)
    }

    /// The status every issue in this column must carry.
    pub fn status(&self) -> IssueStatus {
        match default_column(self.id) {
            Some(d) => d.status.clone(),
            None => IssueStatus::Custom(self.title.to_uppercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub column_id: ColumnId,
    pub project_id: ProjectId,
    pub title: String,
    pub status: IssueStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub assignee_id: Option<ActorId>,
    pub reporter_id: ActorId,
    pub order: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_columns_sit_below_custom_threshold() {
        for d in &DEFAULT_COLUMNS {
            assert!(is_default_column(d.id));
        }
        assert!(!is_default_column(CUSTOM_COLUMN_ID_THRESHOLD));
    }

    #[test]
    fn defaults_for_numbers_columns_from_zero() {
        let cols = Column::defaults_for(7);
        let orders: Vec<i32> = cols.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert!(cols.iter().all(|c| c.project_id == 7 && c.is_default()));
        assert_eq!(cols[1].status(), IssueStatus::InProgress);
    }

    #[test]
    fn custom_column_status_is_uppercased_title() {
        let col = Column {
            id: CUSTOM_COLUMN_ID_THRESHOLD,
            project_id: 1,
            title: "Code Review".into(),
            order: 3,
        };
        assert_eq!(col.status(), IssueStatus::Custom("CODE REVIEW".into()));
    }

    #[test]
    fn status_round_trips_through_string() {
        let json = serde_json::to_string(&IssueStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        let custom: IssueStatus = serde_json::from_str("\"QA\"").unwrap();
        assert_eq!(custom, IssueStatus::Custom("QA".into()));
    }
}
