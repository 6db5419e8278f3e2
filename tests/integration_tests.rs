//! Integration tests for the tracker CLI
//!
//! Each test runs the binary against a fresh `.tracker/` directory.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a tracker Command isolated from the caller's environment
fn tracker(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("tracker");
    cmd.current_dir(dir.path())
        .env_remove("TRACKER_DB")
        .env_remove("TRACKER_ACTOR")
        .env_remove("TRACKER_LOG");
    cmd
}

/// Helper to initialize a tracker acting as site admin 1
fn init_admin() -> TempDir {
    let dir = TempDir::new().unwrap();
    tracker(&dir)
        .args(["init", "--actor-id", "1", "--site-role", "admin"])
        .assert()
        .success();
    dir
}

/// Helper to initialize a tracker with project CORE
fn init_with_project() -> TempDir {
    let dir = init_admin();
    tracker(&dir)
        .args(["project", "create", "CORE", "Core platform"])
        .assert()
        .success();
    dir
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_tracker_help() {
        cargo_bin_cmd!("tracker").arg("--help").assert().success();
    }

    #[test]
    fn test_tracker_version() {
        cargo_bin_cmd!("tracker").arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_config_and_database() {
        let dir = TempDir::new().unwrap();
        tracker(&dir)
            .args(["init", "--actor-id", "1", "--site-role", "admin"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Wrote"))
            .stdout(predicate::str::contains("Initialized tracker in"));

        assert!(dir.path().join(".tracker/tracker.db").exists());
        let config = fs::read_to_string(dir.path().join(".tracker/tracker.toml")).unwrap();
        assert!(config.contains("actor_id = 1"));
        assert!(config.contains("site_role = \"admin\""));
    }

    #[test]
    fn test_init_keeps_existing_config() {
        let dir = init_admin();
        tracker(&dir)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Config already exists"));
    }

    #[test]
    fn test_commands_require_identity() {
        let dir = TempDir::new().unwrap();
        tracker(&dir).arg("init").assert().success();
        tracker(&dir)
            .args(["project", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No identity configured"));
    }

    #[test]
    fn test_unknown_actor_is_not_a_site_member() {
        let dir = init_admin();
        tracker(&dir)
            .args(["--actor", "2", "project", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not a member of site 1"));
    }
}

// =============================================================================
// Projects
// =============================================================================

mod projects {
    use super::*;

    #[test]
    fn test_create_and_list_projects() {
        let dir = init_admin();
        tracker(&dir)
            .args(["project", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No projects in site 1"));

        tracker(&dir)
            .args(["project", "create", "CORE", "Core platform"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created project CORE (Core platform)"));

        tracker(&dir)
            .args(["project", "create", "OPS", "Operations", "--private"])
            .assert()
            .success();

        tracker(&dir)
            .args(["project", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("CORE"))
            .stdout(predicate::str::contains("Operations (private)"));
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let dir = init_with_project();
        tracker(&dir)
            .args(["project", "create", "CORE", "Again"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already used in site 1"));
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let dir = init_admin();
        tracker(&dir)
            .args(["project", "create", "x", "Tiny"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid project key"));
    }

    #[test]
    fn test_member_cannot_create_project() {
        let dir = TempDir::new().unwrap();
        tracker(&dir)
            .args(["init", "--actor-id", "5", "--site-role", "member"])
            .assert()
            .success();
        tracker(&dir)
            .args(["project", "create", "CORE", "Core platform"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Permission denied"));
    }
}

// =============================================================================
// Board
// =============================================================================

mod board {
    use super::*;

    #[test]
    fn test_new_project_shows_default_columns() {
        let dir = init_with_project();
        tracker(&dir)
            .args(["board", "show", "CORE"])
            .assert()
            .success()
            .stdout(predicate::str::contains("To Do [1] (0)"))
            .stdout(predicate::str::contains("In Progress [2] (0)"))
            .stdout(predicate::str::contains("Done [3] (0)"));
    }

    #[test]
    fn test_custom_column_lifecycle() {
        let dir = init_with_project();
        tracker(&dir)
            .args(["column", "add", "CORE", "QA"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Added column QA (id 100)"));

        tracker(&dir)
            .args(["column", "rename", "CORE", "100", "Review"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Renamed column 100 to Review"));

        tracker(&dir)
            .args(["column", "add", "CORE", "Blocked"])
            .assert()
            .success();

        tracker(&dir)
            .args(["column", "move", "CORE", "4", "3"])
            .assert()
            .success()
            .stdout(predicate::str::contains(" 3. Blocked (id 101)"))
            .stdout(predicate::str::contains(" 4. Review (id 100)"));

        tracker(&dir)
            .args(["column", "delete", "CORE", "100"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Deleted column 100"));
    }

    #[test]
    fn test_default_columns_cannot_be_renamed() {
        let dir = init_with_project();
        tracker(&dir)
            .args(["column", "rename", "CORE", "2", "Doing"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("default column"));
    }

    #[test]
    fn test_issue_moves_take_target_status() {
        let dir = init_with_project();
        tracker(&dir)
            .args(["issue", "add", "CORE", "1", "Write docs", "--assignee", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created issue #1 in To Do (TODO)"));
        tracker(&dir)
            .args(["issue", "add", "CORE", "1", "Fix login"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created issue #2"));

        tracker(&dir)
            .args(["issue", "move", "CORE", "1", "3", "0"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Moved issue #1 to Done at position 0"));

        tracker(&dir)
            .args(["board", "show", "CORE"])
            .assert()
            .success()
            .stdout(predicate::str::contains("To Do [1] (1)"))
            .stdout(predicate::str::contains("Done [3] (1)"))
            .stdout(predicate::str::contains("Write docs @1"));

        let output = tracker(&dir)
            .args(["board", "show", "CORE", "--json"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let board: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let done = &board["issues_by_column"]["3"][0];
        assert_eq!(done["status"], "DONE");
        assert_eq!(done["order"], 0);
    }

    #[test]
    fn test_issue_with_inverted_dates_is_rejected() {
        let dir = init_with_project();
        tracker(&dir)
            .args([
                "issue", "add", "CORE", "1", "Backwards", "--start", "2026-03-10", "--end",
                "2026-03-01",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("is after end date"));
    }

    #[test]
    fn test_delete_issue() {
        let dir = init_with_project();
        tracker(&dir)
            .args(["issue", "add", "CORE", "2", "Short lived"])
            .assert()
            .success();
        tracker(&dir)
            .args(["issue", "delete", "CORE", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Deleted issue #1"));
        tracker(&dir)
            .args(["board", "show", "CORE"])
            .assert()
            .success()
            .stdout(predicate::str::contains("In Progress [2] (0)"));
    }
}

// =============================================================================
// Activity
// =============================================================================

mod activity {
    use super::*;

    #[test]
    fn test_activity_lists_committed_changes_newest_first() {
        let dir = init_with_project();
        tracker(&dir)
            .args(["issue", "add", "CORE", "1", "Write docs"])
            .assert()
            .success();

        let output = tracker(&dir)
            .args(["activity", "--project", "CORE"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        let created = stdout.find("issue_created").expect("issue event");
        let project = stdout.find("project_created").expect("project event");
        assert!(created < project, "newest first:\n{}", stdout);
    }

    #[test]
    fn test_activity_filters_by_actor() {
        let dir = init_with_project();
        tracker(&dir)
            .args(["activity", "--by", "42"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No activity yet"));
    }

    #[test]
    fn test_activity_can_be_disabled() {
        let dir = init_admin();
        let config_path = dir.path().join(".tracker/tracker.toml");
        let config = fs::read_to_string(&config_path).unwrap();
        assert!(config.contains("[activity]\nenabled = true"));
        fs::write(
            &config_path,
            config.replace("[activity]\nenabled = true", "[activity]\nenabled = false"),
        )
        .unwrap();

        tracker(&dir)
            .args(["project", "create", "CORE", "Core platform"])
            .assert()
            .success();
        tracker(&dir)
            .arg("activity")
            .assert()
            .success()
            .stdout(predicate::str::contains("No activity yet"));
    }
}
