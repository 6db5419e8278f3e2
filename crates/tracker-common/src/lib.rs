//! Shared domain types for the tracker.
//!
//! Everything here is plain data: actors and their role assignments,
//! projects, board columns and issues, and activity events. The access and
//! board engines in the `tracker` crate operate on these types.

pub mod activity;
pub mod board;
pub mod project;
pub mod role;

pub use activity::{ActivityEvent, ActivityEventDraft, ActivityType};
pub use board::{
    CUSTOM_COLUMN_ID_THRESHOLD, Column, DEFAULT_COLUMNS, DefaultColumn, Issue, IssueStatus,
    default_column, is_default_column,
};
pub use project::{Project, ProjectKey, ProjectKeyError};
pub use role::{Actor, Role};

pub type ActorId = i64;
pub type SiteId = i64;
pub type ProjectId = i64;
pub type ColumnId = i64;
pub type IssueId = i64;
pub type CommentId = i64;
