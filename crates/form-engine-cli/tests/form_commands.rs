// crates/form-engine-cli/tests/form_commands.rs
// ============================================================================
// Module: CLI Form Command Tests
// Description: Integration tests for validate, screens, replay, and config.
// Purpose: Ensure the binary reports forms and replays scripts as JSON lines.
// Dependencies: form-engine-cli binary, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Runs the `form-engine` binary against definitions and scripts written to
//! temporary directories. Every run passes an explicit `--config` so the
//! working directory never leaks into the result.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn form_engine_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_form-engine"))
}

fn source_target_form() -> Value {
    json!({
        "form_id": "fieldlist-updates",
        "children": [{
            "node": "group",
            "name": "fl",
            "appearance": "field_list",
            "children": [
                { "node": "field", "name": "Before", "kind": "text" },
                { "node": "field", "name": "Source1", "kind": "text" },
                {
                    "node": "field", "name": "Target1", "kind": "text",
                    "bind": { "relevant": "../Source1 != ''" }
                },
                { "node": "field", "name": "After", "kind": "text" }
            ]
        }, {
            "node": "field", "name": "closing", "kind": "note", "label": "Thanks"
        }]
    })
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write input");
    path
}

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    write_file(dir, name, &serde_json::to_string(value).expect("serialize input"))
}

fn run(dir: &Path, config: &str, args: &[&str]) -> Output {
    let config_path = write_file(dir, "form-engine.toml", config);
    Command::new(form_engine_bin())
        .arg("--config")
        .arg(&config_path)
        .args(args)
        .output()
        .expect("run form-engine")
}

fn json_lines(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

// ============================================================================
// SECTION: Validate And Screens
// ============================================================================

/// Tests a valid form reports its field and screen counts.
#[test]
fn validate_reports_shape() {
    let dir = TempDir::new().expect("temp dir");
    let form = write_json(dir.path(), "form.json", &source_target_form());
    let output = run(dir.path(), "", &["validate", "--form", form.to_str().expect("utf-8")]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Form fieldlist-updates valid: 5 fields, 2 screens"), "{stdout}");
}

/// Tests compile failures exit non-zero with the error on stderr.
#[test]
fn validate_fails_closed_on_cycles() {
    let dir = TempDir::new().expect("temp dir");
    let form = write_json(
        dir.path(),
        "form.json",
        &json!({
            "form_id": "cycle",
            "children": [
                { "node": "field", "name": "a", "kind": "integer", "bind": { "calculate": "../b" } },
                { "node": "field", "name": "b", "kind": "integer", "bind": { "calculate": "../a" } }
            ]
        }),
    );
    let output = run(dir.path(), "", &["validate", "--form", form.to_str().expect("utf-8")]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cyclic dependency"), "{stderr}");
}

/// Tests screens are listed in definition order with their fields.
#[test]
fn screens_are_listed() {
    let dir = TempDir::new().expect("temp dir");
    let form = write_json(dir.path(), "form.json", &source_target_form());
    let output = run(dir.path(), "", &["screens", "--form", form.to_str().expect("utf-8")]);

    assert!(output.status.success());
    let screens = json_lines(&output);
    assert_eq!(screens.len(), 2);
    assert_eq!(screens[0]["kind"], "field_list");
    assert_eq!(screens[0]["path"], "/data/fl");
    assert_eq!(
        screens[0]["fields"],
        json!(["/data/fl/Before", "/data/fl/Source1", "/data/fl/Target1", "/data/fl/After"])
    );
    assert_eq!(screens[1]["kind"], "single_field");
    assert_eq!(screens[1]["id"], 1);
}

// ============================================================================
// SECTION: Replay
// ============================================================================

/// Tests a replay prints one record per step with sequence diffs.
#[test]
fn replay_prints_recalc_records() {
    let dir = TempDir::new().expect("temp dir");
    let form = write_json(dir.path(), "form.json", &source_target_form());
    let script = write_json(
        dir.path(),
        "script.json",
        &json!([
            { "op": "focus", "path": "/data/fl/After" },
            { "op": "set", "path": "/data/fl/Source1", "value": "A" },
            { "op": "inspect", "path": "/data/fl/Target1" },
            { "op": "clear", "path": "/data/fl/Source1" },
            { "op": "open_screen", "screen": 9 }
        ]),
    );
    let output = run(
        dir.path(),
        "",
        &[
            "replay",
            "--form",
            form.to_str().expect("utf-8"),
            "--script",
            script.to_str().expect("utf-8"),
        ],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let records = json_lines(&output);
    assert_eq!(records.len(), 6);
    assert_eq!(records[0]["kind"], "opened");
    assert_eq!(
        records[0]["visible_sequence"]["fields"],
        json!(["/data/fl/Before", "/data/fl/Source1", "/data/fl/After"])
    );
    assert_eq!(records[1]["kind"], "focus");
    assert_eq!(records[1]["focus"], "/data/fl/After");

    let inserted = &records[2]["result"]["visible_sequence_diff"]["inserted"];
    assert_eq!(inserted, &json!([{ "path": "/data/fl/Target1", "position": 2 }]));
    assert_eq!(records[2]["result"]["focus"]["state"], "retained");

    assert_eq!(records[3]["kind"], "field");
    assert_eq!(records[3]["field"]["relevant"], true);

    assert_eq!(records[4]["result"]["visible_sequence_diff"]["removed"], json!(["/data/fl/Target1"]));
    assert_eq!(records[5]["kind"], "refused");
    assert!(records[5]["error"].as_str().expect("error text").contains("unknown screen"));
}

/// Tests the file sink receives bracketed recalculation events.
#[test]
fn replay_logs_events_to_file_sink() {
    let dir = TempDir::new().expect("temp dir");
    let form = write_json(dir.path(), "form.json", &source_target_form());
    let script = write_json(
        dir.path(),
        "script.json",
        &json!([{ "op": "set", "path": "/data/fl/Source1", "value": "A" }]),
    );
    let log = dir.path().join("events.jsonl");
    let config = format!(
        "[logging]\nsink = \"file\"\npath = {}\n",
        toml_string(log.to_str().expect("utf-8"))
    );
    let output = run(
        dir.path(),
        &config,
        &[
            "replay",
            "--form",
            form.to_str().expect("utf-8"),
            "--script",
            script.to_str().expect("utf-8"),
        ],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let events: Vec<Value> = fs::read_to_string(&log)
        .expect("read log")
        .lines()
        .map(|line| serde_json::from_str(line).expect("event line"))
        .collect();
    let tags: Vec<&str> = events.iter().filter_map(|event| event["event"].as_str()).collect();
    assert_eq!(tags, vec!["pass_started", "pass_settled", "pass_started", "pass_settled"]);
    assert_eq!(events[2]["trigger"]["kind"], "edit");
}

/// Tests malformed scripts are rejected before the session opens.
#[test]
fn replay_rejects_unknown_ops() {
    let dir = TempDir::new().expect("temp dir");
    let form = write_json(dir.path(), "form.json", &source_target_form());
    let script = write_json(dir.path(), "script.json", &json!([{ "op": "submit" }]));
    let output = run(
        dir.path(),
        "",
        &[
            "replay",
            "--form",
            form.to_str().expect("utf-8"),
            "--script",
            script.to_str().expect("utf-8"),
        ],
    );

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("edit script"), "{stderr}");
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Tests invalid configuration fails closed before any command runs.
#[test]
fn invalid_config_fails_closed() {
    let dir = TempDir::new().expect("temp dir");
    let output = run(dir.path(), "[logging]\nsink = \"file\"\n", &["config", "validate"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load config"), "{stderr}");
}

/// Tests a valid configuration is accepted.
#[test]
fn valid_config_accepted() {
    let dir = TempDir::new().expect("temp dir");
    let output = run(dir.path(), "[limits]\nmax_nodes = 50\n", &["config", "validate"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Config valid."));
}

/// Renders a TOML basic string literal.
fn toml_string(raw: &str) -> String {
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}
