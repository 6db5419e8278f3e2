//! Typed error hierarchy for the tracker core.
//!
//! Three enums cover the mutation paths:
//! - `ValidationError` - input rejected before any optimistic change is made
//! - `BoardError` - failures of board ordering operations
//! - `ProjectError` - failures of project creation and settings updates

use chrono::NaiveDate;
use thiserror::Error;
use tracker_common::{ColumnId, ProjectKeyError, SiteId};

/// Input that can never be applied. Raised before the board is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("Project name must not be empty")]
    EmptyProjectName,

    #[error("Column title '{title}' is reserved")]
    ReservedColumnTitle { title: String },

    #[error("A column titled '{title}' already exists")]
    DuplicateColumnTitle { title: String },

    #[error("Column {column_id} is a default column and cannot be modified")]
    DefaultColumnProtected { column_id: ColumnId },

    #[error("Default columns keep their fixed positions (move {from} -> {to} rejected)")]
    DefaultColumnOrder { from: usize, to: usize },

    #[error("Column {column_id} still holds {count} issue(s)")]
    ColumnNotEmpty { column_id: ColumnId, count: usize },

    #[error("Start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid project key: {0}")]
    InvalidProjectKey(#[from] ProjectKeyError),

    #[error("Project key '{key}' is already used in site {site_id}")]
    DuplicateProjectKey { key: String, site_id: SiteId },
}

/// Errors from the board ordering engine.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Permission denied: {action}")]
    PermissionDenied { action: &'static str },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The remote call failed after the optimistic apply; the board has
    /// already been restored to its pre-operation snapshot.
    #[error("Failed to persist {operation}: {source}")]
    PersistenceFailure {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Board invariant violated: {0}")]
    InvariantViolation(String),

    #[error("{entity} {id} not found on the board")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Board was reloaded before the operation could run")]
    Superseded,

    #[error("Board lock poisoned")]
    LockPoisoned,
}

impl BoardError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Errors from the project service.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Permission denied: {action}")]
    PermissionDenied { action: &'static str },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to persist {operation}: {source}")]
    PersistenceFailure {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}
