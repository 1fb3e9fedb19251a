//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary with `TASKTALLY_HOME` pointed at a temp
//! directory and verify outputs.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_tasktally"))
        .args(args)
        .env("TASKTALLY_HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

/// Run with `--json`, expect success, and parse stdout.
fn run_json(home: &Path, args: &[&str]) -> Value {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let (stdout, stderr, code) = run_cli(home, &full);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_task_add_and_list() {
    let home = TempDir::new().unwrap();
    let task = run_json(home.path(), &["task", "add", "Write report", "--points", "5"]);
    assert_eq!(task["name"], "Write report");
    assert_eq!(task["points"], 5);
    assert_eq!(task["status"], "active");

    run_json(home.path(), &["task", "add", "Stretch"]);

    let tasks = run_json(home.path(), &["task", "list"]);
    let names: Vec<&str> = tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Write report", "Stretch"]);

    let by_name = run_json(home.path(), &["task", "list", "--sort", "name"]);
    assert_eq!(by_name[0]["name"], "Stretch");
}

#[test]
fn test_task_add_rejects_invalid_input() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["task", "add", "  "]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"), "{stderr}");

    let (_, stderr, code) = run_cli(home.path(), &["task", "add", "x", "--points=-3"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"), "{stderr}");

    let tasks = run_json(home.path(), &["task", "list"]);
    assert!(tasks.as_array().unwrap().is_empty());
}

#[test]
fn test_task_notes_points_and_delete() {
    let home = TempDir::new().unwrap();
    let task = run_json(home.path(), &["task", "add", "Garden", "--notes", "weeds"]);
    let id = task["id"].as_i64().unwrap().to_string();

    let updated = run_json(home.path(), &["task", "notes", &id, "water"]);
    assert_eq!(updated["notes"], "water");
    let cleared = run_json(home.path(), &["task", "notes", &id]);
    assert!(cleared["notes"].is_null());

    let updated = run_json(home.path(), &["task", "points", &id, "12"]);
    assert_eq!(updated["points"], 12);

    let (_, _, code) = run_cli(home.path(), &["task", "points", &id, "-1"]);
    assert_eq!(code, 1);

    run_json(home.path(), &["task", "delete", &id]);
    let (_, stderr, code) = run_cli(home.path(), &["task", "get", &id]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not found"), "{stderr}");

    let deleted = run_json(home.path(), &["task", "get", &id, "--include-deleted"]);
    assert_eq!(deleted["status"], "deleted");

    let (_, _, code) = run_cli(home.path(), &["task", "delete", &id]);
    assert_eq!(code, 1);
}

#[test]
fn test_complete_and_history() {
    let home = TempDir::new().unwrap();
    let task = run_json(home.path(), &["task", "add", "Run", "--points", "3"]);
    let id = task["id"].as_i64().unwrap().to_string();

    let done = run_json(home.path(), &["complete", &id]);
    assert_eq!(done["points"], 3);
    run_json(home.path(), &["complete", &id]);

    run_json(home.path(), &["task", "points", &id, "10"]);
    run_json(home.path(), &["task", "delete", &id]);

    let log = run_json(home.path(), &["history", "list"]);
    let log = log.as_array().unwrap();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|c| c["points"] == 3));
    assert!(log.iter().all(|c| c["task_name"] == "Run (deleted)"));

    let summary = run_json(home.path(), &["history", "summary"]);
    assert_eq!(summary["total_completions"], 2);
    assert_eq!(summary["total_points"], 6);

    let first = log[0]["id"].as_i64().unwrap().to_string();
    run_json(home.path(), &["history", "delete", &first]);
    run_json(home.path(), &["history", "delete", &first]);

    let cleared = run_json(home.path(), &["history", "clear"]);
    assert_eq!(cleared["removed"], 1);
    assert!(run_json(home.path(), &["history", "list"])
        .as_array()
        .unwrap()
        .is_empty());
}

#[test]
fn test_complete_missing_task_fails() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["complete", "999"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("task not found: 999"), "{stderr}");
}

#[test]
fn test_deleted_task_policy_from_config() {
    let home = TempDir::new().unwrap();
    let task = run_json(home.path(), &["task", "add", "Old"]);
    let id = task["id"].as_i64().unwrap().to_string();
    run_json(home.path(), &["task", "delete", &id]);

    let (_, _, code) = run_cli(
        home.path(),
        &["config", "set", "completions.allow_deleted_tasks", "false"],
    );
    assert_eq!(code, 0);

    let (_, _, code) = run_cli(home.path(), &["complete", &id]);
    assert_eq!(code, 1);
}

#[test]
fn test_config_get_set_reset() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "display.task_sort"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "points");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "display.task_sort", "name"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "display.task_sort"]);
    assert_eq!(stdout.trim(), "name");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "display.task_sort", "shoe_size"]);
    assert_eq!(code, 1);
    let (_, _, code) = run_cli(home.path(), &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);

    let (_, _, code) = run_cli(home.path(), &["config", "reset"]);
    assert_eq!(code, 0);
    let config = run_json(home.path(), &["config", "list"]);
    assert_eq!(config["display"]["task_sort"], "points");
    assert_eq!(config["operations"]["timeout_ms"], 10000);
}

#[test]
fn test_db_info() {
    let home = TempDir::new().unwrap();
    let info = run_json(home.path(), &["db", "info"]);
    assert_eq!(info["schema_version"], 3);
    assert!(info["path"].as_str().unwrap().ends_with("tasktally.db"));
}
