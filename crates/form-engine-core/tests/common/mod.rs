// crates/form-engine-core/tests/common/mod.rs
// ============================================================================
// Module: Test Support
// Description: Shared assertions and form fixtures for engine tests.
// ============================================================================
//! ## Overview
//! Result helpers plus small form definitions shared across integration
//! tests. Fixtures are written as JSON so the serde surface is exercised too.

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
    dead_code,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::error::Error;
use std::fmt;

use form_engine_core::EngineConfig;
use form_engine_core::FieldPath;
use form_engine_core::FormDef;
use form_engine_core::FormSession;
use form_engine_core::RecordingObserver;
use serde_json::json;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across engine integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Lightweight error type for test assertions.
#[derive(Debug)]
struct TestError {
    /// Human-readable failure message.
    message: String,
}

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl Error for TestError {}

/// Returns an error when a test condition fails.
///
/// # Errors
/// Returns a `TestError` when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(Box::new(TestError {
            message: message.into(),
        }))
    }
}

/// Parses a field path literal.
pub fn path(raw: &str) -> FieldPath {
    raw.parse().expect("valid field path")
}

/// Renders a sequence of paths for comparisons and messages.
pub fn rendered(paths: &[FieldPath]) -> Vec<String> {
    paths.iter().map(ToString::to_string).collect()
}

// ========================================================================
// Session Helpers
// ========================================================================

/// Builds a definition from JSON.
///
/// # Errors
/// Returns deserialization failures.
pub fn form(value: serde_json::Value) -> TestResult<FormDef> {
    Ok(serde_json::from_value(value)?)
}

/// Compiles a definition and opens a recording session.
///
/// # Errors
/// Returns compilation failures.
pub fn open(definition: &FormDef) -> TestResult<FormSession<RecordingObserver>> {
    let config = EngineConfig::default();
    let compiled = definition.compile(&config)?;
    Ok(FormSession::new(compiled, config, RecordingObserver::new()))
}

// ========================================================================
// Fixtures
// ========================================================================

/// Field list where `Target1` is relevant only while `Source1` is answered.
pub fn source_target_form() -> TestResult<FormDef> {
    form(json!({
        "form_id": "fieldlist-updates",
        "title": "Field list updates",
        "children": [{
            "node": "group",
            "name": "fl",
            "appearance": "field_list",
            "children": [
                { "node": "field", "name": "Before", "kind": "text", "label": "Before" },
                { "node": "field", "name": "Source1", "kind": "text", "label": "Source 1" },
                {
                    "node": "field",
                    "name": "Target1",
                    "kind": "text",
                    "label": "Target 1",
                    "bind": { "relevant": "../Source1 != ''" }
                },
                { "node": "field", "name": "After", "kind": "text", "label": "After" }
            ]
        }]
    }))
}

/// Field list whose note label and hint interpolate a text answer.
pub fn greeting_form() -> TestResult<FormDef> {
    form(json!({
        "form_id": "greeting",
        "children": [{
            "node": "group",
            "name": "intro",
            "appearance": "field_list",
            "children": [
                { "node": "field", "name": "name", "kind": "text", "label": "What is your name?" },
                {
                    "node": "field",
                    "name": "greeting",
                    "kind": "note",
                    "label": "Hello, {/data/intro/name}, how are you today?",
                    "hint": "Signed in as {../name}"
                }
            ]
        }]
    }))
}

/// Three-level cascading select inside one field list.
pub fn cascade_form() -> TestResult<FormDef> {
    let level2 = [("A1", "A"), ("A2", "A"), ("B1", "B"), ("C1", "C"), ("C2", "C")];
    let level3 = [("A1A", "A1"), ("A1B", "A1"), ("A2A", "A2"), ("B1A", "B1"), ("C1A", "C1"), ("C2A", "C2")];
    let level2_choices: Vec<serde_json::Value> = level2
        .iter()
        .map(|(value, parent)| json!({ "value": value, "label": value, "attributes": { "level1": parent } }))
        .collect();
    let level3_choices: Vec<serde_json::Value> = level3
        .iter()
        .map(|(value, parent)| json!({ "value": value, "label": value, "attributes": { "level2": parent } }))
        .collect();
    form(json!({
        "form_id": "cascading-select",
        "children": [{
            "node": "group",
            "name": "cascade",
            "appearance": "field_list",
            "children": [
                {
                    "node": "field",
                    "name": "level1",
                    "kind": "select_one",
                    "label": "Level 1",
                    "choices": [
                        { "value": "A", "label": "A" },
                        { "value": "B", "label": "B" },
                        { "value": "C", "label": "C" }
                    ]
                },
                {
                    "node": "field",
                    "name": "level2",
                    "kind": "select_one",
                    "label": "Level 2",
                    "bind": { "choice_filter": "level1 = /data/cascade/level1" },
                    "choices": level2_choices
                },
                {
                    "node": "field",
                    "name": "level3",
                    "kind": "select_one",
                    "label": "Level 3",
                    "bind": { "choice_filter": "level2 = ../level2" },
                    "choices": level3_choices
                }
            ]
        }]
    }))
}

/// Field list of sixteen text fields where `f1` depends on `f0`.
pub fn sixteen_field_form() -> TestResult<FormDef> {
    let fields: Vec<serde_json::Value> = (0 .. 16)
        .map(|index| {
            let mut field = json!({
                "node": "field",
                "name": format!("f{index}"),
                "kind": "text",
                "label": format!("Field {index}")
            });
            if index == 1 {
                field["bind"] = json!({ "relevant": "../f0 != ''" });
            }
            field
        })
        .collect();
    form(json!({
        "form_id": "sixteen",
        "children": [{
            "node": "group",
            "name": "many",
            "appearance": "field_list",
            "children": fields
        }]
    }))
}
