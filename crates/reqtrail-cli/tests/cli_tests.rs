//! End-to-end tests for the reqtrail binary
//!
//! These tests validate:
//! - Database initialization
//! - Recording program invocations with `exec`
//! - Listing and showing entries, including JSON output
//! - Error handling for missing databases and entries

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn reqtrail(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("reqtrail").unwrap();
    cmd.env_remove("REQTRAIL_DATABASE")
        .env("NO_COLOR", "1")
        .arg("--database")
        .arg(db);
    cmd
}

fn database(dir: &TempDir) -> PathBuf {
    dir.path().join("audit.db")
}

fn show_json(db: &Path, id: i64) -> serde_json::Value {
    let output = reqtrail(db)
        .args(["show", &id.to_string(), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_init_creates_database() {
    let dir = TempDir::new().unwrap();
    let db = database(&dir);

    reqtrail(&db)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created audit database"));
    assert!(db.exists());

    reqtrail(&db)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already initialized"));
}

#[test]
fn test_list_without_database() {
    let dir = TempDir::new().unwrap();

    reqtrail(&database(&dir))
        .arg("list")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("reqtrail init"));
}

#[test]
fn test_list_empty_database() {
    let dir = TempDir::new().unwrap();
    let db = database(&dir);
    reqtrail(&db).arg("init").assert().success();

    reqtrail(&db)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No audit entries found"));
}

#[cfg(unix)]
#[test]
fn test_exec_records_successful_run() {
    let dir = TempDir::new().unwrap();
    let db = database(&dir);

    reqtrail(&db)
        .args(["exec", "--no-env", "--", "echo", "hello", "-n"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello"));

    reqtrail(&db)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("#1").and(predicate::str::contains("CLI")))
        .stdout(predicate::str::contains("echo"));

    let report = show_json(&db, 1);
    assert_eq!(report["entry"]["request_method"], "CLI");
    assert_eq!(report["entry"]["url"], "echo");
    assert_eq!(report["entry"]["route"], "echo");
    assert!(report["entry"]["duration"].as_f64().unwrap() >= 0.0);
    assert!(report["errors"].as_array().unwrap().is_empty());

    let data = report["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["name"], "Params");
    assert_eq!(data[0]["type"], "params");
    assert_eq!(data[0]["data"], serde_json::json!(["hello", "-n"]));
}

#[cfg(unix)]
#[test]
fn test_exec_captures_environment() {
    let dir = TempDir::new().unwrap();
    let db = database(&dir);

    reqtrail(&db)
        .env("REQTRAIL_TEST_MARKER", "present")
        .args(["exec", "true"])
        .assert()
        .success();

    let report = show_json(&db, 1);
    let env = report["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["type"] == "env")
        .unwrap();
    assert_eq!(env["name"], "$_SERVER");
    assert_eq!(env["data"]["REQTRAIL_TEST_MARKER"], "present");
}

#[cfg(unix)]
#[test]
fn test_exec_propagates_exit_code_and_records_error() {
    let dir = TempDir::new().unwrap();
    let db = database(&dir);

    reqtrail(&db)
        .args(["exec", "--no-env", "--", "sh", "-c", "exit 3"])
        .assert()
        .code(3);

    let report = show_json(&db, 1);
    let errors = report["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], 3);
    assert!(errors[0]["message"].as_str().unwrap().contains("sh exited"));
}

#[test]
fn test_exec_missing_program() {
    let dir = TempDir::new().unwrap();
    let db = database(&dir);

    reqtrail(&db)
        .args(["exec", "--no-env", "reqtrail-test-no-such-program"])
        .assert()
        .code(127)
        .stderr(predicate::str::contains("Failed to start"));

    let report = show_json(&db, 1);
    assert_eq!(report["errors"][0]["code"], 127);
}

#[cfg(unix)]
#[test]
fn test_exec_runs_when_database_is_unusable() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("plain-file");
    std::fs::write(&blocker, b"").unwrap();

    reqtrail(&blocker.join("audit.db"))
        .args(["exec", "--no-env", "--", "sh", "-c", "echo still-ran; exit 4"])
        .assert()
        .code(4)
        .stdout(predicate::str::contains("still-ran"));
}

#[cfg(unix)]
#[test]
fn test_show_text_output() {
    let dir = TempDir::new().unwrap();
    let db = database(&dir);
    reqtrail(&db)
        .args(["exec", "--no-env", "--", "sh", "-c", "exit 2"])
        .assert()
        .code(2);

    reqtrail(&db)
        .args(["show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#1 CLI sh"))
        .stdout(predicate::str::contains("Params"))
        .stdout(predicate::str::contains("Errors"))
        .stdout(predicate::str::contains("[2]"));
}

#[test]
fn test_show_missing_entry() {
    let dir = TempDir::new().unwrap();
    let db = database(&dir);
    reqtrail(&db).arg("init").assert().success();

    reqtrail(&db)
        .args(["show", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Audit entry 42 not found"));
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("reqtrail")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("show"));
}
