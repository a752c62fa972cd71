//! End-to-end CLI tests: selection, plan generation, skip, navigation and
//! comparison extension against a temp SQLite store.
//!
//! Each test runs `ep` as a subprocess in an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn ep_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ep"));
    cmd.current_dir(dir);
    cmd.env("EVALPATH_LOG", "error");
    cmd.env("XDG_CONFIG_HOME", dir.join("config"));
    cmd.env("XDG_DATA_HOME", dir.join("data"));
    cmd.env_remove("FORMAT");
    cmd.env_remove("EVALPATH_DB");
    cmd.args([
        "--db",
        dir.join("records.db").to_str().expect("utf8 path"),
        "--dataset",
        dir.join("dataset.json").to_str().expect("utf8 path"),
    ]);
    cmd
}

fn write_dataset(dir: &Path) {
    let dataset = serde_json::json!({
        "items": [
            {"id": "tokio", "weight": 40.0},
            {"id": "serde", "weight": 30.0},
            {"id": "rand", "weight": 8.0},
            {"id": "clap", "weight": 4.0}
        ],
        "dependencies": {
            "org/app": [
                {"id": "libc", "weight": 9.0},
                {"id": "log", "weight": 3.0}
            ]
        }
    });
    std::fs::write(dir.join("dataset.json"), dataset.to_string()).expect("write dataset");
}

fn setup() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    write_dataset(dir.path());
    dir
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = ep_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("ep should not crash");
    assert!(
        output.status.success(),
        "ep {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

fn status_of<'a>(state: &'a Value, id: &str) -> &'a str {
    state["navigationItems"]
        .as_array()
        .expect("items array")
        .iter()
        .find(|item| item["id"] == id)
        .and_then(|item| item["status"].as_str())
        .unwrap_or_else(|| panic!("no item {id}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn fresh_user_sees_single_selection_screen() {
    let dir = setup();
    let state = run_json(dir.path(), &["state", "--user", "ana"]);
    assert_eq!(state["currentScreen"], "selection");
    assert_eq!(state["navigationItems"].as_array().expect("array").len(), 1);
    assert!(state.get("plan").is_none());
}

#[test]
fn selection_generates_plan_and_advances() {
    let dir = setup();
    let state = run_json(
        dir.path(),
        &[
            "complete",
            "selection",
            "--user",
            "ana",
            "--data",
            r#"{"selectedItems": ["rand", "tokio", "serde"]}"#,
        ],
    );
    assert_eq!(state["currentScreen"], "instructions");
    let plan = &state["plan"];
    assert_eq!(plan["selectedItems"][0]["id"], "tokio");
    let comparisons = plan["comparisons"].as_array().expect("comparisons");
    assert_eq!(comparisons.len(), 2);
    for pair in comparisons {
        assert!(pair["multiplier"].as_f64().expect("multiplier") >= 1.0);
    }
    assert_eq!(status_of(&state, "selection"), "completed");
    assert_eq!(status_of(&state, "comparison_1"), "pending");

    let reread = run_json(dir.path(), &["state", "--user", "ana"]);
    assert_eq!(reread["currentScreen"], "instructions");
}

#[test]
fn skip_then_navigate_back() {
    let dir = setup();
    run_json(dir.path(), &["complete", "selection", "--user", "bo"]);
    let state = run_json(dir.path(), &["skip", "instructions", "--user", "bo"]);
    assert_eq!(status_of(&state, "instructions"), "skipped");

    let state = run_json(dir.path(), &["navigate", "instructions", "--user", "bo"]);
    assert_eq!(state["focusedScreen"], "instructions");
    assert_ne!(state["currentScreen"], "instructions");
}

#[test]
fn jumping_ahead_is_rejected_with_code() {
    let dir = setup();
    run_json(dir.path(), &["complete", "selection", "--user", "cy"]);
    ep_cmd(dir.path())
        .args(["complete", "comparison_2", "--user", "cy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2002"));

    ep_cmd(dir.path())
        .args(["navigate", "nowhere", "--user", "cy", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error_code\": \"E2003\""));
}

#[test]
fn json_errors_are_reported_once_as_valid_json() {
    let dir = setup();
    let output = ep_cmd(dir.path())
        .args(["navigate", "nowhere", "--user", "cy", "--json"])
        .output()
        .expect("ep should not crash");
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).expect("stderr is one JSON document");
    assert_eq!(err["error"]["error_code"], "E2003");
}

#[test]
fn text_errors_are_printed_once() {
    let dir = setup();
    let output = ep_cmd(dir.path())
        .args(["more", "--user", "dee"])
        .output()
        .expect("ep should not crash");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("no evaluation plan").count(), 1, "{stderr}");
}

#[test]
fn invalid_generator_config_fails_with_config_code() {
    let dir = setup();
    std::fs::create_dir_all(dir.path().join(".evalpath")).expect("mkdir");
    std::fs::write(
        dir.path().join(".evalpath/config.toml"),
        "[generator]\nadjacency_offset = -1.0\n",
    )
    .expect("write config");
    ep_cmd(dir.path())
        .args(["state", "--user", "ana"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"))
        .stderr(predicate::str::contains("adjacency_offset"));
}

#[test]
fn malformed_config_fails_with_config_code() {
    let dir = setup();
    std::fs::create_dir_all(dir.path().join(".evalpath")).expect("mkdir");
    std::fs::write(dir.path().join(".evalpath/config.toml"), "[generator\n").expect("write config");
    ep_cmd(dir.path())
        .args(["state", "--user", "ana"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn more_without_plan_is_not_found() {
    let dir = setup();
    ep_cmd(dir.path())
        .args(["more", "--user", "dee"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"));
}

#[test]
fn more_appends_comparisons() {
    let dir = setup();
    let before = run_json(dir.path(), &["complete", "selection", "--user", "eve"]);
    let before = before["plan"]["comparisons"].as_array().expect("array").clone();
    assert!(!before.is_empty() && before.len() <= 3);

    let after = run_json(dir.path(), &["more", "--user", "eve", "--count", "2"]);
    let after = after["plan"]["comparisons"].as_array().expect("array").clone();
    assert!(after.len() >= before.len());
    assert_eq!(&after[..before.len()], &before[..]);
}

#[test]
fn level3_flow_is_isolated() {
    let dir = setup();
    let state = run_json(
        dir.path(),
        &["complete", "dependency_selection", "--user", "ana", "--target", "org/app"],
    );
    let comparisons = state["plan"]["comparisons"].as_array().expect("array");
    assert_eq!(comparisons.len(), 1);
    assert_eq!(comparisons[0]["itemA"], "libc");

    let level2 = run_json(dir.path(), &["state", "--user", "ana"]);
    assert_eq!(level2["currentScreen"], "selection");
}

#[test]
fn text_output_lists_rows() {
    let dir = setup();
    ep_cmd(dir.path())
        .args(["--format", "text", "state", "--user", "fay"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("current\tselection\n"));
}

#[test]
fn pairs_command_is_reproducible_with_seed() {
    let dir = setup();
    std::fs::write(
        dir.path().join("items.json"),
        r#"[{"id": "a", "weight": 1}, {"id": "b", "weight": 6}, {"id": "c", "weight": 3}]"#,
    )
    .expect("write items");
    let items = dir.path().join("items.json");
    let items = items.to_str().expect("utf8 path");

    let first = run_json(dir.path(), &["pairs", "--items", items, "--seed", "11"]);
    let second = run_json(dir.path(), &["pairs", "--items", items, "--seed", "11"]);
    assert_eq!(first, second);
    let pairs = first.as_array().expect("array");
    assert_eq!(pairs.len(), 2);
    for pair in pairs {
        assert_ne!(pair["itemA"], "a");
    }
}

#[test]
fn completions_generate_script() {
    let dir = setup();
    ep_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ep"));
}
