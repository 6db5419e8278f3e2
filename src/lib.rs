//! Collaborative project tracker core.
//!
//! Two subsystems carry the design weight:
//! - [`access`] decides which role an actor holds in a project or site and
//!   what that role may do.
//! - [`board`] keeps column and issue ordering gap-free across optimistic
//!   local edits, committing or rolling back as persistence calls resolve.
//!
//! Everything else (projects, activity, SQLite store, config, logging) is
//! plumbing around those two.

pub mod access;
pub mod activity;
pub mod board;
pub mod config;
pub mod errors;
pub mod projects;
pub mod store;
pub mod telemetry;

pub use tracker_common as common;
