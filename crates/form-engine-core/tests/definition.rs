// crates/form-engine-core/tests/definition.rs
// ============================================================================
// Module: Form Definition Tests
// Description: Structural validation, compile failures, and digests.
// Purpose: Ensure malformed definitions fail closed at load time.
// Dependencies: form-engine-core, serde_json
// ============================================================================
//! ## Overview
//! Exercises `FormDef` validation and compilation errors plus the canonical
//! definition digest.

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
use common::source_target_form;
use form_engine_core::BindingSlot;
use form_engine_core::EngineConfig;
use form_engine_core::EngineLimits;
use form_engine_core::FormDef;
use form_engine_core::FormDefinitionError;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Wraps top-level nodes in a form.
fn with_children(children: serde_json::Value) -> TestResult<FormDef> {
    form(json!({ "form_id": "test", "children": children }))
}

/// Compiles with default configuration and returns the error.
fn compile_error(definition: &FormDef) -> TestResult<FormDefinitionError> {
    match definition.compile(&EngineConfig::default()) {
        Ok(_) => Err("expected compilation to fail".into()),
        Err(error) => Ok(error),
    }
}

// ============================================================================
// SECTION: Structural Validation
// ============================================================================

/// Tests a form without nodes is rejected.
#[test]
fn empty_form_rejected() -> TestResult {
    let error = compile_error(&with_children(json!([]))?)?;
    ensure(error == FormDefinitionError::EmptyForm, format!("error: {error}"))
}

/// Tests sibling names must be unique and well formed.
#[test]
fn names_are_checked() -> TestResult {
    let duplicate = with_children(json!([
        { "node": "field", "name": "a", "kind": "text" },
        { "node": "field", "name": "a", "kind": "integer" }
    ]))?;
    let error = compile_error(&duplicate)?;
    ensure(
        error
            == FormDefinitionError::DuplicateName {
                parent: "/data".to_string(),
                name: "a".to_string(),
            },
        format!("error: {error}"),
    )?;
    let invalid = with_children(json!([{ "node": "field", "name": "1st", "kind": "text" }]))?;
    ensure(
        compile_error(&invalid)? == FormDefinitionError::InvalidName("1st".to_string()),
        "leading digit rejected",
    )
}

/// Tests choice declarations are checked.
#[test]
fn choices_are_checked() -> TestResult {
    let on_text = with_children(json!([{
        "node": "field", "name": "a", "kind": "text",
        "choices": [{ "value": "x", "label": "X" }]
    }]))?;
    ensure(
        matches!(compile_error(&on_text)?, FormDefinitionError::ChoicesOnNonSelect(_)),
        "choices on text rejected",
    )?;
    let none = with_children(json!([{ "node": "field", "name": "a", "kind": "select_one" }]))?;
    ensure(matches!(compile_error(&none)?, FormDefinitionError::EmptyChoices(_)), "empty choices")?;
    let duplicate = with_children(json!([{
        "node": "field", "name": "a", "kind": "select_multiple",
        "choices": [{ "value": "x", "label": "X" }, { "value": "x", "label": "Y" }]
    }]))?;
    ensure(
        matches!(compile_error(&duplicate)?, FormDefinitionError::DuplicateChoice { .. }),
        "duplicate choice",
    )?;
    let spaced = with_children(json!([{
        "node": "field", "name": "a", "kind": "select_one",
        "choices": [{ "value": "x y", "label": "X" }]
    }]))?;
    ensure(
        matches!(compile_error(&spaced)?, FormDefinitionError::InvalidChoice { .. }),
        "whitespace in choice value",
    )
}

/// Tests defaults must fit the field kind and offered choices.
#[test]
fn defaults_are_checked() -> TestResult {
    let integer = with_children(json!([{
        "node": "field", "name": "a", "kind": "integer", "default": "1.5"
    }]))?;
    ensure(
        matches!(compile_error(&integer)?, FormDefinitionError::InvalidDefault { .. }),
        "fractional integer default",
    )?;
    let choice = with_children(json!([{
        "node": "field", "name": "a", "kind": "select_one", "default": "z",
        "choices": [{ "value": "x", "label": "X" }]
    }]))?;
    ensure(
        matches!(compile_error(&choice)?, FormDefinitionError::InvalidDefault { .. }),
        "undeclared default choice",
    )?;
    let valid = with_children(json!([{
        "node": "field", "name": "a", "kind": "date", "default": "2024-02-29"
    }]))?;
    valid.validate()?;
    Ok(())
}

/// Tests repeat counts and node totals respect limits.
#[test]
fn limits_are_enforced() -> TestResult {
    let zero = with_children(json!([{
        "node": "group", "name": "r", "repeat": { "count": 0 },
        "children": [{ "node": "field", "name": "a", "kind": "text" }]
    }]))?;
    ensure(
        matches!(compile_error(&zero)?, FormDefinitionError::InvalidRepeatCount { count: 0, .. }),
        "zero repeat rejected",
    )?;
    let wide = with_children(json!([{
        "node": "group", "name": "r", "repeat": { "count": 50 },
        "children": [
            { "node": "field", "name": "a", "kind": "text" },
            { "node": "field", "name": "b", "kind": "text" }
        ]
    }]))?;
    let limits = EngineLimits {
        max_nodes: 100,
        ..EngineLimits::default()
    };
    let error = wide.validate_with(&limits);
    ensure(
        error
            == Err(FormDefinitionError::TooManyNodes {
                max: 100,
                actual: 151,
            }),
        format!("result: {error:?}"),
    )
}

// ============================================================================
// SECTION: Expression Failures
// ============================================================================

/// Tests parse failures name the node and slot.
#[test]
fn expression_errors_are_located() -> TestResult {
    let definition = with_children(json!([{
        "node": "field", "name": "a", "kind": "text", "bind": { "relevant": "1 +" }
    }]))?;
    let error = compile_error(&definition)?;
    ensure(
        matches!(
            &error,
            FormDefinitionError::Expression { path, slot: BindingSlot::Relevance, .. } if path == "/data/a"
        ),
        format!("error: {error}"),
    )
}

/// Tests references must resolve to existing nodes.
#[test]
fn unresolved_references_are_rejected() -> TestResult {
    let definition = with_children(json!([{
        "node": "field", "name": "a", "kind": "integer", "bind": { "calculate": "/data/missing + 1" }
    }]))?;
    let error = compile_error(&definition)?;
    ensure(
        error
            == FormDefinitionError::UnresolvedReference {
                path: "/data/a".to_string(),
                slot: BindingSlot::Calculate,
                reference: "/data/missing".to_string(),
            },
        format!("error: {error}"),
    )
}

/// Tests cyclic calculations report the chain.
#[test]
fn cycles_report_their_chain() -> TestResult {
    let definition = with_children(json!([
        { "node": "field", "name": "a", "kind": "integer", "bind": { "calculate": "../b + 1" } },
        { "node": "field", "name": "b", "kind": "integer", "bind": { "calculate": "../a + 1" } }
    ]))?;
    let error = compile_error(&definition)?;
    ensure(
        error
            == FormDefinitionError::CyclicDependency {
                chain: vec![
                    "/data/a#calculate".to_string(),
                    "/data/b#calculate".to_string(),
                    "/data/a#calculate".to_string(),
                ],
            },
        format!("error: {error}"),
    )?;
    ensure(
        error.to_string()
            == "cyclic dependency: /data/a#calculate -> /data/b#calculate -> /data/a#calculate",
        "chain rendering",
    )
}

/// Tests a calculation reading its own field is a cycle.
#[test]
fn self_reading_calculation_is_a_cycle() -> TestResult {
    let definition = with_children(json!([
        { "node": "field", "name": "a", "kind": "integer", "bind": { "calculate": ". + 1" } }
    ]))?;
    ensure(
        matches!(compile_error(&definition)?, FormDefinitionError::CyclicDependency { .. }),
        "self cycle detected",
    )
}

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Tests the digest ignores JSON key order and tracks content.
#[test]
fn canonical_hash_is_stable() -> TestResult {
    let first = source_target_form()?;
    let reordered: FormDef = serde_json::from_str(&serde_json::to_string(&first)?)?;
    ensure(first.canonical_hash()? == reordered.canonical_hash()?, "round trip keeps digest")?;
    let compiled = first.compile(&EngineConfig::default())?;
    ensure(compiled.digest() == &first.canonical_hash()?, "compiled form carries digest")?;

    let mut changed = first.clone();
    changed.title = "Other".to_string();
    ensure(changed.canonical_hash()? != first.canonical_hash()?, "title changes digest")?;
    ensure(first.canonical_hash()?.value.len() == 64, "sha-256 hex digest")
}
