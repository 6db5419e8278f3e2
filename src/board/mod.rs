//! Board ordering and reconciliation.
//!
//! | Module        | Responsibility                                          |
//! |---------------|---------------------------------------------------------|
//! | `model`       | `BoardModel` and its ordering invariants                |
//! | `transition`  | Pure plans: next board plus one persistence command     |
//! | `locks`       | Per-entity in-flight locks                              |
//! | `persistence` | Column and issue store traits, command dispatch         |
//! | `engine`      | `BoardOrderingEngine`: apply, then commit or roll back  |

pub mod engine;
pub mod locks;
pub mod model;
pub mod persistence;
pub mod transition;

pub use engine::{BoardEvent, BoardOrderingEngine, Settled};
pub use locks::LockKey;
pub use model::{BoardModel, Partition};
pub use persistence::{ColumnStore, IssueMove, IssueStore, PersistCommand};
pub use transition::{IssuePatch, NewIssue};
