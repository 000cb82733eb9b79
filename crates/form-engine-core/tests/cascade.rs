// crates/form-engine-core/tests/cascade.rs
// ============================================================================
// Module: Cascading Select Tests
// Description: Choice filtering and stale selection repair across levels.
// Purpose: Ensure dependent select lists never keep invalid answers.
// Dependencies: form-engine-core, serde_json
// ============================================================================
//! ## Overview
//! Walks a three-level cascading select through parent changes and clears.

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

mod common;

use common::TestResult;
use common::cascade_form;
use common::ensure;
use common::open;
use common::path;
use form_engine_core::Diagnostic;
use form_engine_core::EditRejection;
use form_engine_core::FormSession;
use form_engine_core::RecordingObserver;
use form_engine_core::Value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the offered choice values of a field.
fn offered(session: &FormSession<RecordingObserver>, raw: &str) -> TestResult<Vec<String>> {
    let view = session.field(&path(raw)).ok_or("field missing")?;
    Ok(view.choices.into_iter().map(|choice| choice.value).collect())
}

/// Returns the stored value of a field.
fn value(session: &FormSession<RecordingObserver>, raw: &str) -> TestResult<Value> {
    Ok(session.field(&path(raw)).ok_or("field missing")?.value)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests dependent levels start with nothing offered.
#[test]
fn dependent_levels_start_empty() -> TestResult {
    let session = open(&cascade_form()?)?;
    ensure(offered(&session, "/data/cascade/level1")? == vec!["A", "B", "C"], "level 1 unfiltered")?;
    ensure(offered(&session, "/data/cascade/level2")?.is_empty(), "level 2 empty")?;
    ensure(offered(&session, "/data/cascade/level3")?.is_empty(), "level 3 empty")
}

/// Tests level 2 offers exactly the options of the level-1 answer and
/// replaces them when level 1 changes.
#[test]
fn level_two_follows_level_one() -> TestResult {
    let mut session = open(&cascade_form()?)?;
    session.on_field_changed(&path("/data/cascade/level1"), Value::text("C"));
    ensure(offered(&session, "/data/cascade/level2")? == vec!["C1", "C2"], "C options")?;

    session.on_field_changed(&path("/data/cascade/level1"), Value::text("A"));
    ensure(offered(&session, "/data/cascade/level2")? == vec!["A1", "A2"], "A options")
}

/// Tests changing level 1 repairs stale level-2 and level-3 answers in one
/// pass.
#[test]
fn parent_change_repairs_every_level() -> TestResult {
    let mut session = open(&cascade_form()?)?;
    session.on_field_changed(&path("/data/cascade/level1"), Value::text("C"));
    session.on_field_changed(&path("/data/cascade/level2"), Value::text("C1"));
    ensure(offered(&session, "/data/cascade/level3")? == vec!["C1A"], "C1 options")?;
    session.on_field_changed(&path("/data/cascade/level3"), Value::text("C1A"));

    let result = session.on_field_changed(&path("/data/cascade/level1"), Value::text("A"));
    ensure(value(&session, "/data/cascade/level2")? == Value::Empty, "level 2 cleared")?;
    ensure(value(&session, "/data/cascade/level3")? == Value::Empty, "level 3 cleared")?;
    ensure(offered(&session, "/data/cascade/level3")?.is_empty(), "level 3 offers nothing")?;
    let repaired: Vec<String> = result
        .diagnostics
        .iter()
        .filter_map(|diagnostic| match diagnostic {
            Diagnostic::SelectionRepaired {
                path,
                removed,
            } => Some(format!("{path}:{}", removed.join(","))),
            _ => None,
        })
        .collect();
    ensure(
        repaired == vec!["/data/cascade/level2:C1", "/data/cascade/level3:C1A"],
        format!("repairs: {repaired:?}"),
    )
}

/// Tests clearing level 1 invalidates every dependent level.
#[test]
fn clearing_the_parent_cascades_down() -> TestResult {
    let mut session = open(&cascade_form()?)?;
    session.on_field_changed(&path("/data/cascade/level1"), Value::text("A"));
    session.on_field_changed(&path("/data/cascade/level2"), Value::text("A1"));
    session.on_field_changed(&path("/data/cascade/level3"), Value::text("A1B"));

    session.on_clear_answer(&path("/data/cascade/level1"));
    for level in ["level2", "level3"] {
        let raw = format!("/data/cascade/{level}");
        ensure(value(&session, &raw)? == Value::Empty, format!("{level} cleared"))?;
        ensure(offered(&session, &raw)?.is_empty(), format!("{level} offers nothing"))?;
    }
    Ok(())
}

/// Tests answers outside the offered list are rejected without changes.
#[test]
fn choices_not_offered_are_rejected() -> TestResult {
    let mut session = open(&cascade_form()?)?;
    session.on_field_changed(&path("/data/cascade/level1"), Value::text("A"));
    let level2 = path("/data/cascade/level2");
    let result = session.on_field_changed(&level2, Value::text("B1"));
    ensure(
        result.diagnostics
            == vec![Diagnostic::EditRejected {
                path: level2.clone(),
                reason: EditRejection::ChoiceNotOffered,
            }],
        format!("diagnostics: {:?}", result.diagnostics),
    )?;
    ensure(value(&session, "/data/cascade/level2")? == Value::Empty, "tree untouched")?;
    let undeclared = session.on_field_changed(&level2, Value::text("A1 A2"));
    ensure(
        matches!(
            undeclared.diagnostics.as_slice(),
            [Diagnostic::EditRejected {
                reason: EditRejection::InvalidValue,
                ..
            }]
        ),
        "select-one takes a single value",
    )
}
