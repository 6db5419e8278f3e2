//! CLI command implementations.
//!
//! | Module     | Commands handled                 |
//! |------------|----------------------------------|
//! | `init`     | `Init`                           |
//! | `project`  | `Project`                        |
//! | `board`    | `Board`, `Column`, `Issue`       |
//! | `activity` | `Activity`                       |
//! | `session`  | shared config / db / actor setup |

pub mod activity;
pub mod board;
pub mod init;
pub mod project;
pub mod session;

pub use activity::cmd_activity;
pub use board::{cmd_board, cmd_column, cmd_issue};
pub use init::cmd_init;
pub use project::cmd_project;
