// crates/form-engine-core/src/runtime/cascade.rs
// ============================================================================
// Module: Cascading Select Resolver
// Description: Per-choice filter evaluation and stale selection repair.
// Purpose: Keep dependent select lists and their answers consistent.
// Dependencies: crate::{core, runtime::compile}, form-logic
// ============================================================================

//! ## Overview
//! A choice filter runs once per declared choice with that choice in scope.
//! Choices whose filter result is truthy are offered, in declaration order.
//! Selections no longer offered are dropped; a select-one answer that lost
//! its value is cleared. Repairs re-enter propagation as value changes, so
//! multi-level cascades settle in a single pass.

// ============================================================================
// SECTION: Imports
// ============================================================================

use form_logic::EvalError;
use form_logic::Value;

use crate::core::ChoiceDef;
use crate::core::DataTree;
use crate::core::FieldKind;
use crate::runtime::compile::Binding;

// ============================================================================
// SECTION: Filtering
// ============================================================================

/// Evaluates a choice filter against every declared choice of its target.
///
/// # Errors
/// Returns the first [`EvalError`] raised by the filter.
pub fn filter_choices(binding: &Binding, tree: &DataTree) -> Result<Vec<ChoiceDef>, EvalError> {
    let mut offered = Vec::new();
    for choice in &tree.node(binding.target).declared_choices {
        if binding.evaluate(tree, Some(choice))?.to_boolean() {
            offered.push(choice.clone());
        }
    }
    Ok(offered)
}

// ============================================================================
// SECTION: Selection Repair
// ============================================================================

/// Repaired answer plus the values that were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRepair {
    /// Answer after repair.
    pub value: Value,
    /// Dropped values in their original order.
    pub removed: Vec<String>,
}

/// Drops selected values that are not offered.
///
/// Returns `None` when the answer needs no repair.
#[must_use]
pub fn repair_selection(kind: FieldKind, value: &Value, offered: &[ChoiceDef]) -> Option<SelectionRepair> {
    if !kind.is_select() || value.is_empty() {
        return None;
    }
    let (kept, removed): (Vec<String>, Vec<String>) = value
        .selection_values()
        .into_iter()
        .partition(|item| offered.iter().any(|choice| choice.value == *item));
    if removed.is_empty() {
        return None;
    }
    let value = if kind == FieldKind::SelectOne || kept.is_empty() {
        Value::Empty
    } else {
        Value::Selection(kept)
    };
    Some(SelectionRepair {
        value,
        removed,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn choice(value: &str) -> ChoiceDef {
        ChoiceDef {
            value: value.to_string(),
            label: value.to_uppercase(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn multi_select_keeps_offered_values() {
        let offered = [choice("a"), choice("c")];
        let repair = repair_selection(
            FieldKind::SelectMultiple,
            &Value::selection(["a", "b", "c"]),
            &offered,
        );
        assert_eq!(
            repair,
            Some(SelectionRepair {
                value: Value::selection(["a", "c"]),
                removed: vec!["b".to_string()],
            })
        );
    }

    #[test]
    fn select_one_is_cleared() {
        let repair = repair_selection(FieldKind::SelectOne, &Value::selection(["b"]), &[choice("a")]);
        assert_eq!(repair.map(|repair| repair.value), Some(Value::Empty));
    }

    #[test]
    fn offered_answers_need_no_repair() {
        let offered = [choice("a")];
        assert_eq!(repair_selection(FieldKind::SelectOne, &Value::selection(["a"]), &offered), None);
        assert_eq!(repair_selection(FieldKind::SelectOne, &Value::Empty, &offered), None);
    }
}
