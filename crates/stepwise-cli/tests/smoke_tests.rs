//! Smoke tests for the stepwise CLI

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn stepwise() -> Command {
    let mut cmd = Command::cargo_bin("stepwise").expect("stepwise binary should exist");
    cmd.env_remove("STEPIK_LOGIN")
        .env_remove("STEPIK_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    stepwise()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_lists_subcommands() {
    stepwise()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_run_requires_query() {
    stepwise().arg("run").assert().failure().code(2);
}

#[test]
fn test_config_shows_derived_urls() {
    stepwise()
        .args(["config", "--base-url", "https://staging.stepik.test"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://staging.stepik.test/catalog"))
        .stdout(predicate::str::contains("search_route"));
}

// ============================================================================
// Run Tests
// ============================================================================

#[test]
fn test_missing_credentials_exit_2() {
    stepwise()
        .args(["run", "--query", "python", "--simulate", "healthy"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("STEPIK_LOGIN"));
}

#[test]
fn test_blank_query_exit_2() {
    stepwise()
        .args(["run", "--query", "  ", "--simulate", "healthy"])
        .env("STEPIK_LOGIN", "student@example.com")
        .env("STEPIK_PASSWORD", "hunter2")
        .assert()
        .code(2);
}

#[test]
fn test_simulated_run_writes_report() {
    let temp = TempDir::new().unwrap();
    let report = temp.path().join("report.json");

    stepwise()
        .args(["-q", "--color", "never", "run", "--query", "python"])
        .args(["--simulate", "healthy", "--report"])
        .arg(&report)
        .env("STEPIK_LOGIN", "student@example.com")
        .env("STEPIK_PASSWORD", "hunter2")
        .assert()
        .success();

    let written = fs::read_to_string(&report).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(json["final_state"], "course-opened");
    assert_eq!(json["query"], "python");
}

#[test]
fn test_simulated_failure_prints_report_and_exit_1() {
    let temp = TempDir::new().unwrap();

    stepwise()
        .args(["-q", "--color", "never", "run", "--query", "python"])
        .args(["--simulate", "no-free-results", "--screenshot-dir"])
        .arg(temp.path())
        .env("STEPIK_LOGIN", "student@example.com")
        .env("STEPIK_PASSWORD", "hunter2")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"final_state\": \"failed\""))
        .stdout(predicate::str::contains("no result cards"));

    let shots: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
    assert_eq!(shots.len(), 1);
}

#[test]
fn test_password_never_logged() {
    stepwise()
        .args(["-vv", "--color", "never", "run", "--query", "python", "--simulate", "healthy"])
        .env("STEPIK_LOGIN", "student@example.com")
        .env("STEPIK_PASSWORD", "s3cret-pass")
        .assert()
        .success()
        .stderr(predicate::str::contains("s3cret-pass").not());
}
