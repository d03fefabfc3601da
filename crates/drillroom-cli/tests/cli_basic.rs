//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary with HOME pointed at a temp dir so config
//! and database land somewhere disposable.

use std::path::Path;
use std::process::{Command, Stdio};

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_drillroom-cli"))
        .args(args)
        .env("HOME", home)
        .env_remove("DRILLROOM_ENV")
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_catalog_list_json() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["catalog", "list", "--json"]);
    assert_eq!(code, 0, "catalog list failed");

    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let drills = parsed["drills"].as_array().unwrap();
    assert!(drills.iter().any(|d| d["id"] == "shuttle-sprints"));
    assert_eq!(parsed["workouts"][0]["id"], "starter");
}

#[test]
fn test_config_set_and_get() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(
        home.path(),
        &["config", "set", "engine.start_policy", "stop_previous"],
    );
    assert_eq!(code, 0, "config set failed");

    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "engine.start_policy"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "stop_previous");
}

#[test]
fn test_config_rejects_zero_granularity() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(
        home.path(),
        &["config", "set", "engine.tick_granularity_secs", "0"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_run_drill_to_completion() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli(
        home.path(),
        &[
            "run",
            "--drill",
            "shuttle-sprints",
            "--granularity",
            "30",
            "--speed",
            "1000",
            "--no-input",
        ],
    );
    assert_eq!(code, 0, "run failed: {stderr}");

    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines[0]["type"], "SessionStarted");
    assert!(lines
        .iter()
        .any(|l| l["type"] == "StepCompleted" && l["record"]["step_id"] == "shuttle-sprints"));
    let last = lines.last().unwrap();
    assert_eq!(last["status"], "complete");
    assert_eq!(last["elapsed_secs"], 60);

    let (stdout, _, code) = run_cli(home.path(), &["history"]);
    assert_eq!(code, 0);
    let history: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["total_elapsed_secs"], 60);
}

#[test]
fn test_dry_run_writes_nothing() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(
        home.path(),
        &[
            "run",
            "--drill",
            "shuttle-sprints",
            "--granularity",
            "60",
            "--speed",
            "1000",
            "--no-input",
            "--dry-run",
        ],
    );
    assert_eq!(code, 0, "dry run failed: {stderr}");

    let (stdout, _, code) = run_cli(home.path(), &["stats", "all"]);
    assert_eq!(code, 0);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total_sessions"], 0);
}

#[test]
fn test_run_unknown_drill_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["run", "--drill", "nope", "--no-input"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Unknown drill 'nope'"));
}
