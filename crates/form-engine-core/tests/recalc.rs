// crates/form-engine-core/tests/recalc.rs
// ============================================================================
// Module: Recalculation Tests
// Description: Calculations, flags, constraints, repeats, and edit rejection.
// Purpose: Ensure settle passes apply every binding slot correctly.
// Dependencies: form-engine-core, serde_json
// ============================================================================
//! ## Overview
//! Exercises the slot application rules of the recalculation engine and the
//! edit validation performed before a pass starts.

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
use common::ensure;
use common::form;
use common::open;
use common::path;
use form_engine_core::BindingSlot;
use form_engine_core::Diagnostic;
use form_engine_core::EditRejection;
use form_engine_core::Value;
use serde_json::json;

// ============================================================================
// SECTION: Calculations
// ============================================================================

/// Tests calculations chain in rank order and coerce to the field kind.
#[test]
fn calculations_chain_and_coerce() -> TestResult {
    let definition = form(json!({
        "form_id": "calc",
        "children": [
            { "node": "field", "name": "total", "kind": "integer", "bind": { "calculate": "round(../subtotal * 1.5)" } },
            { "node": "field", "name": "subtotal", "kind": "decimal", "bind": { "calculate": "../price * ../qty" } },
            { "node": "field", "name": "price", "kind": "decimal", "default": "2.5" },
            { "node": "field", "name": "qty", "kind": "integer" }
        ]
    }))?;
    let mut session = open(&definition)?;
    ensure(session.field(&path("/data/subtotal")).ok_or("missing")?.value == Value::Empty, "NaN stored as empty")?;

    let result = session.on_field_changed(&path("/data/qty"), Value::text("3"));
    ensure(session.field(&path("/data/subtotal")).ok_or("missing")?.value == Value::Number(7.5), "subtotal")?;
    ensure(session.field(&path("/data/total")).ok_or("missing")?.value == Value::Number(11.0), "total")?;
    let order: Vec<String> =
        result.evaluations.iter().map(|record| format!("{}#{}", record.path, record.slot)).collect();
    ensure(
        order == vec!["/data/subtotal#calculate", "/data/total#calculate"],
        format!("evaluation order: {order:?}"),
    )
}

/// Tests calculated fields reject edits.
#[test]
fn calculated_fields_reject_edits() -> TestResult {
    let definition = form(json!({
        "form_id": "calc",
        "children": [
            { "node": "field", "name": "a", "kind": "integer" },
            { "node": "field", "name": "b", "kind": "integer", "bind": { "calculate": "../a * 2" } }
        ]
    }))?;
    let mut session = open(&definition)?;
    let b = path("/data/b");
    let result = session.on_field_changed(&b, Value::Number(4.0));
    ensure(
        result.diagnostics
            == vec![Diagnostic::EditRejected {
                path: b.clone(),
                reason: EditRejection::Calculated,
            }],
        format!("diagnostics: {:?}", result.diagnostics),
    )?;
    ensure(session.field(&b).ok_or("missing")?.readonly, "calculated fields report read-only")
}

// ============================================================================
// SECTION: Flags And Constraints
// ============================================================================

/// Tests required, readonly, and constraint bindings.
#[test]
fn flags_and_constraints_follow_answers() -> TestResult {
    let definition = form(json!({
        "form_id": "flags",
        "children": [
            { "node": "field", "name": "age", "kind": "integer", "bind": { "constraint": ". >= 0 and . < 150" } },
            { "node": "field", "name": "guardian", "kind": "text", "bind": { "required": "../age < 18" } },
            { "node": "field", "name": "locked", "kind": "text", "bind": { "readonly": "../age >= 65" } }
        ]
    }))?;
    let mut session = open(&definition)?;
    let age = path("/data/age");
    ensure(session.field(&age).ok_or("missing")?.valid, "empty answers are valid")?;

    session.on_field_changed(&age, Value::Number(200.0));
    ensure(!session.field(&age).ok_or("missing")?.valid, "constraint violated")?;

    session.on_field_changed(&age, Value::Number(12.0));
    ensure(session.field(&age).ok_or("missing")?.valid, "constraint satisfied")?;
    ensure(session.field(&path("/data/guardian")).ok_or("missing")?.required, "guardian required")?;

    session.on_field_changed(&age, Value::Number(70.0));
    let locked = path("/data/locked");
    ensure(session.field(&locked).ok_or("missing")?.readonly, "locked read-only")?;
    let result = session.on_field_changed(&locked, Value::text("x"));
    ensure(
        matches!(
            result.diagnostics.as_slice(),
            [Diagnostic::EditRejected {
                reason: EditRejection::ReadOnly,
                ..
            }]
        ),
        "read-only edit rejected",
    )
}

/// Tests a constraint reading only another field re-runs when its own
/// field is answered or cleared.
#[test]
fn constraints_follow_their_own_answer() -> TestResult {
    let definition = form(json!({
        "form_id": "constraints",
        "children": [
            { "node": "field", "name": "limit", "kind": "integer", "default": "0" },
            { "node": "field", "name": "x", "kind": "text", "bind": { "constraint": "/data/limit > 5" } }
        ]
    }))?;
    let mut session = open(&definition)?;
    let x = path("/data/x");
    ensure(session.field(&x).ok_or("missing")?.valid, "unanswered field is valid")?;

    let result = session.on_field_changed(&x, Value::text("hello"));
    ensure(!session.field(&x).ok_or("missing")?.valid, "answer violates the constraint")?;
    let order: Vec<String> =
        result.evaluations.iter().map(|record| format!("{}#{}", record.path, record.slot)).collect();
    ensure(order == vec!["/data/x#constraint"], format!("evaluations: {order:?}"))?;

    session.on_field_changed(&path("/data/limit"), Value::Number(10.0));
    ensure(session.field(&x).ok_or("missing")?.valid, "other field satisfies the constraint")?;

    session.on_field_changed(&path("/data/limit"), Value::Number(1.0));
    ensure(!session.field(&x).ok_or("missing")?.valid, "violated again")?;
    session.on_clear_answer(&x);
    ensure(session.field(&x).ok_or("missing")?.valid, "cleared answer is valid")
}

/// Tests a field emptied by a relevance flip becomes valid again.
#[test]
fn relevance_clearing_restores_validity() -> TestResult {
    let definition = form(json!({
        "form_id": "constraints",
        "children": [
            { "node": "field", "name": "toggle", "kind": "integer" },
            {
                "node": "group", "name": "g", "relevant": "../toggle = 1",
                "children": [
                    { "node": "field", "name": "code", "kind": "text", "bind": { "constraint": "/data/toggle > 5" } }
                ]
            }
        ]
    }))?;
    let mut session = open(&definition)?;
    let code = path("/data/g/code");
    session.on_field_changed(&path("/data/toggle"), Value::Number(1.0));
    session.on_field_changed(&code, Value::text("abc"));
    ensure(!session.field(&code).ok_or("missing")?.valid, "answer violates the constraint")?;

    session.on_field_changed(&path("/data/toggle"), Value::Number(0.0));
    let view = session.field(&code).ok_or("missing")?;
    ensure(view.value == Value::Empty && !view.relevant, "cleared and hidden")?;
    ensure(view.valid, "cleared field is valid")
}

// ============================================================================
// SECTION: Edit Rejection
// ============================================================================

/// Tests edits that cannot apply leave the tree untouched.
#[test]
fn invalid_edits_are_rejected() -> TestResult {
    let definition = form(json!({
        "form_id": "reject",
        "children": [
            { "node": "field", "name": "n", "kind": "integer" },
            {
                "node": "group", "name": "g", "relevant": "../n > 0",
                "children": [{ "node": "field", "name": "inner", "kind": "text" }]
            }
        ]
    }))?;
    let mut session = open(&definition)?;
    let cases = [
        ("/data/nope", Value::text("x"), EditRejection::UnknownPath),
        ("/data/g", Value::text("x"), EditRejection::NotAField),
        ("/data/n", Value::text("abc"), EditRejection::InvalidValue),
        ("/data/n", Value::Number(1.5), EditRejection::InvalidValue),
        ("/data/g/inner", Value::text("x"), EditRejection::NotRelevant),
    ];
    for (raw, value, expected) in cases {
        let result = session.on_field_changed(&path(raw), value);
        ensure(
            result.diagnostics
                == vec![Diagnostic::EditRejected {
                    path: path(raw),
                    reason: expected,
                }],
            format!("{raw}: {:?}", result.diagnostics),
        )?;
        ensure(result.updated_fields.is_empty(), format!("{raw}: no updates"))?;
    }
    ensure(session.field(&path("/data/n")).ok_or("missing")?.value == Value::Empty, "n untouched")
}

// ============================================================================
// SECTION: Group Relevance
// ============================================================================

/// Tests an irrelevant group clears its subtree and hides it from reads.
#[test]
fn irrelevant_groups_clear_their_subtree() -> TestResult {
    let definition = form(json!({
        "form_id": "groups",
        "children": [
            { "node": "field", "name": "consent", "kind": "select_one", "choices": [
                { "value": "yes", "label": "Yes" }, { "value": "no", "label": "No" }
            ] },
            {
                "node": "group", "name": "details", "relevant": "selected(../consent, 'yes')",
                "children": [
                    { "node": "field", "name": "email", "kind": "text" },
                    { "node": "field", "name": "echo", "kind": "text", "bind": { "calculate": "../email" } }
                ]
            },
            { "node": "field", "name": "summary", "kind": "text", "bind": { "calculate": "concat('email=', /data/details/email)" } }
        ]
    }))?;
    let mut session = open(&definition)?;
    let consent = path("/data/consent");
    let email = path("/data/details/email");
    session.on_field_changed(&consent, Value::text("yes"));
    session.on_field_changed(&email, Value::text("a@b.c"));
    ensure(
        session.field(&path("/data/details/echo")).ok_or("missing")?.value == Value::text("a@b.c"),
        "echo calculated",
    )?;
    ensure(
        session.field(&path("/data/summary")).ok_or("missing")?.value == Value::text("email=a@b.c"),
        "summary calculated",
    )?;

    let result = session.on_field_changed(&consent, Value::text("no"));
    let view = session.field(&email).ok_or("missing")?;
    ensure(view.value == Value::Empty && !view.relevant, "email cleared and hidden")?;
    ensure(
        session.field(&path("/data/summary")).ok_or("missing")?.value == Value::text("email="),
        "readers see the cleared subtree",
    )?;
    let updated: Vec<String> = result.updated_fields.iter().map(|update| update.path.to_string()).collect();
    ensure(
        updated
            == vec!["/data/consent", "/data/details/email", "/data/details/echo", "/data/summary"],
        format!("updated: {updated:?}"),
    )
}

// ============================================================================
// SECTION: Repeats
// ============================================================================

/// Tests references through a repeat bind to the node's own instance.
#[test]
fn repeat_references_stay_in_their_instance() -> TestResult {
    let definition = form(json!({
        "form_id": "repeat",
        "children": [
            {
                "node": "group", "name": "person", "repeat": { "count": 3 },
                "children": [
                    { "node": "field", "name": "age", "kind": "integer" },
                    { "node": "field", "name": "adult", "kind": "text", "bind": { "calculate": "if(/data/person/age >= 18, 'yes', 'no')" } }
                ]
            },
            { "node": "field", "name": "first_age", "kind": "integer", "bind": { "calculate": "/data/person/age" } },
            { "node": "field", "name": "second_age", "kind": "integer", "bind": { "calculate": "/data/person[2]/age" } }
        ]
    }))?;
    let mut session = open(&definition)?;
    session.on_field_changed(&path("/data/person[2]/age"), Value::Number(30.0));
    session.on_field_changed(&path("/data/person/age"), Value::Number(5.0));
    let adult = |raw: &str| session.field(&path(raw)).map(|view| view.value);
    ensure(adult("/data/person/adult") == Some(Value::text("no")), "instance 1")?;
    ensure(adult("/data/person[2]/adult") == Some(Value::text("yes")), "instance 2")?;
    ensure(adult("/data/person[3]/adult") == Some(Value::text("no")), "instance 3")?;
    ensure(adult("/data/first_age") == Some(Value::Number(5.0)), "unindexed outside reference uses instance 1")?;
    ensure(adult("/data/second_age") == Some(Value::Number(30.0)), "indexed reference")
}

// ============================================================================
// SECTION: Evaluation Failures
// ============================================================================

/// Tests evaluation errors keep previous state and surface as diagnostics.
#[test]
fn evaluation_errors_are_diagnostics() -> TestResult {
    let definition = form(json!({
        "form_id": "failures",
        "children": [
            { "node": "field", "name": "a", "kind": "text" },
            { "node": "field", "name": "b", "kind": "text", "bind": { "calculate": "frobnicate(../a)" } }
        ]
    }))?;
    let mut session = open(&definition)?;
    ensure(session.initial_diagnostics().len() == 1, "initial pass reports the failure")?;
    let result = session.on_field_changed(&path("/data/a"), Value::text("x"));
    ensure(
        matches!(
            result.diagnostics.as_slice(),
            [Diagnostic::Evaluation {
                slot: BindingSlot::Calculate,
                error,
                ..
            }] if error.contains("frobnicate")
        ),
        format!("diagnostics: {:?}", result.diagnostics),
    )?;
    ensure(session.field(&path("/data/b")).ok_or("missing")?.value == Value::Empty, "previous value kept")
}
