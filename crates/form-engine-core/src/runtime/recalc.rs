// crates/form-engine-core/src/runtime/recalc.rs
// ============================================================================
// Module: Recalculation Pass
// Description: Rank-ordered work queue that settles bindings to fixpoint.
// Purpose: Apply binding outputs to the tree and propagate changes.
// Dependencies: crate::{core, interfaces, runtime}, form-logic, serde, thiserror
// ============================================================================

//! ## Overview
//! A settle pass pops bindings in topological rank order, evaluates each one
//! against the current tree, applies the output when it differs, and enqueues
//! readers of every node whose readable value changed. Each binding runs at
//! most once per pass, so a pass always terminates.
//!
//! Evaluation errors are non-fatal: the previous derived state is kept and a
//! [`Diagnostic::Evaluation`] is recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::collections::BinaryHeap;

use form_logic::EvalError;
use form_logic::Value;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::BindingId;
use crate::core::BindingSlot;
use crate::core::FieldPath;
use crate::core::NodeId;
use crate::interfaces::RecalcEvent;
use crate::interfaces::RecalcObserver;
use crate::runtime::cascade::filter_choices;
use crate::runtime::cascade::repair_selection;
use crate::runtime::compile::CompiledForm;

// ============================================================================
// SECTION: Diagnostics
// ============================================================================

/// Reason an edit was rejected without touching the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum EditRejection {
    /// No node has this path.
    #[error("unknown field path")]
    UnknownPath,
    /// Path names a group.
    #[error("path names a group")]
    NotAField,
    /// Field is read-only or display-only.
    #[error("field is read-only")]
    ReadOnly,
    /// Field value is owned by a calculation.
    #[error("field is calculated")]
    Calculated,
    /// Field is not effectively relevant.
    #[error("field is not relevant")]
    NotRelevant,
    /// Value does not coerce to the field kind.
    #[error("value does not fit the field kind")]
    InvalidValue,
    /// Selection contains a value that is not currently offered.
    #[error("choice is not currently offered")]
    ChoiceNotOffered,
}

/// Non-fatal record attached to a recalculation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Binding evaluation failed; previous state kept.
    Evaluation {
        /// Bound node.
        path: FieldPath,
        /// Binding slot.
        slot: BindingSlot,
        /// Rendered evaluation error.
        error: String,
    },
    /// Stale selections were dropped after a choice filter changed.
    SelectionRepaired {
        /// Select field.
        path: FieldPath,
        /// Dropped values.
        removed: Vec<String>,
    },
    /// Edit was rejected.
    EditRejected {
        /// Target path.
        path: FieldPath,
        /// Rejection reason.
        reason: EditRejection,
    },
}

/// One binding evaluation performed during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Bound node.
    pub path: FieldPath,
    /// Binding slot.
    pub slot: BindingSlot,
    /// True when the output changed derived state.
    pub changed: bool,
}

// ============================================================================
// SECTION: Settle Pass
// ============================================================================

/// Outcome of a completed pass.
#[derive(Debug, Default)]
pub(crate) struct PassOutcome {
    /// Nodes whose value or derived state changed, in document order.
    pub changed: BTreeSet<NodeId>,
    /// Diagnostics in emission order.
    pub diagnostics: Vec<Diagnostic>,
    /// Evaluations in execution order.
    pub evaluations: Vec<EvaluationRecord>,
}

/// One settle pass over a compiled form.
pub(crate) struct SettlePass<'a> {
    /// Form whose tree is updated in place.
    form: &'a mut CompiledForm,
    /// Event sink.
    observer: &'a dyn RecalcObserver,
    /// Emit per-binding events.
    record_evaluations: bool,
    /// Pending bindings keyed by rank.
    queue: BinaryHeap<Reverse<(usize, BindingId)>>,
    /// Bindings currently queued.
    queued: Vec<bool>,
    /// Bindings already evaluated this pass.
    evaluated: Vec<bool>,
    /// Accumulated outcome.
    outcome: PassOutcome,
}

impl<'a> SettlePass<'a> {
    /// Starts an empty pass.
    pub fn new(
        form: &'a mut CompiledForm,
        observer: &'a dyn RecalcObserver,
        record_evaluations: bool,
    ) -> Self {
        let count = form.bindings().len();
        Self {
            form,
            observer,
            record_evaluations,
            queue: BinaryHeap::new(),
            queued: vec![false; count],
            evaluated: vec![false; count],
            outcome: PassOutcome::default(),
        }
    }

    /// Queues every binding; used for the initial full evaluation.
    pub fn enqueue_all(&mut self) {
        let order = self.form.graph().order().to_vec();
        for id in order {
            self.enqueue(id);
        }
    }

    /// Records an edited node and queues its readers.
    pub fn node_changed(&mut self, node: NodeId) {
        self.outcome.changed.insert(node);
        let readers = self.form.graph().readers(node).to_vec();
        for id in readers {
            self.enqueue(id);
        }
    }

    /// Runs the pass to fixpoint.
    pub fn run(mut self) -> PassOutcome {
        while let Some(Reverse((_, id))) = self.queue.pop() {
            self.queued[id.index()] = false;
            if self.evaluated[id.index()] {
                continue;
            }
            self.evaluated[id.index()] = true;
            let changed = self.apply(id);
            let binding = self.form.binding(id);
            let path = self.form.tree().node(binding.target).path.clone();
            let slot = binding.slot;
            if self.record_evaluations {
                self.observer.record(&RecalcEvent::BindingEvaluated {
                    path: path.clone(),
                    slot,
                    rank: self.form.graph().rank(id),
                    changed,
                });
            }
            self.outcome.evaluations.push(EvaluationRecord {
                path,
                slot,
                changed,
            });
        }
        self.outcome
    }

    /// Queues a binding unless it is queued or already evaluated.
    fn enqueue(&mut self, id: BindingId) {
        let index = id.index();
        if self.queued[index] || self.evaluated[index] {
            return;
        }
        self.queued[index] = true;
        self.queue.push(Reverse((self.form.graph().rank(id), id)));
    }

    /// Evaluates and applies one binding; returns true when state changed.
    fn apply(&mut self, id: BindingId) -> bool {
        let binding = self.form.binding(id);
        let (target, slot) = (binding.target, binding.slot);
        match slot {
            BindingSlot::Relevance => self.apply_relevance(id, target),
            BindingSlot::Calculate => self.apply_calculate(id, target),
            BindingSlot::ChoiceFilter => self.apply_choice_filter(id, target),
            BindingSlot::Label | BindingSlot::Hint => self.apply_text(id, target),
            BindingSlot::Required | BindingSlot::Readonly => self.apply_flag(id, target),
            BindingSlot::Constraint => self.apply_constraint(id, target),
        }
    }

    /// Evaluates a binding, recording a diagnostic on failure.
    fn evaluate(&mut self, id: BindingId) -> Option<Value> {
        let result = self.form.binding(id).evaluate(self.form.tree(), None);
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.evaluation_failed(id, &error);
                None
            }
        }
    }

    /// Records a failed evaluation.
    fn evaluation_failed(&mut self, id: BindingId, error: &EvalError) {
        let binding = self.form.binding(id);
        let path = self.form.tree().node(binding.target).path.clone();
        let slot = binding.slot;
        self.observer.record(&RecalcEvent::EvaluationFailed {
            path: path.clone(),
            slot,
            error: error.to_string(),
        });
        self.outcome.diagnostics.push(Diagnostic::Evaluation {
            path,
            slot,
            error: error.to_string(),
        });
    }

    /// Applies a relevance result.
    fn apply_relevance(&mut self, id: BindingId, target: NodeId) -> bool {
        let Some(value) = self.evaluate(id) else {
            return false;
        };
        let relevant = value.to_boolean();
        if self.form.tree().node(target).relevant == relevant {
            return false;
        }
        self.form.tree_mut().node_mut(target).relevant = relevant;
        let subtree = self.form.tree().subtree(target);
        for node in subtree {
            if !relevant {
                let entry = self.form.tree_mut().node_mut(node);
                if entry.is_field() {
                    entry.value = Value::Empty;
                }
            }
            self.node_changed(node);
            let targeting = self.form.graph().targeting(node).to_vec();
            for binding in targeting {
                if binding != id {
                    self.enqueue(binding);
                }
            }
        }
        true
    }

    /// Applies a calculate result to an effectively relevant target.
    fn apply_calculate(&mut self, id: BindingId, target: NodeId) -> bool {
        if !self.form.tree().is_effectively_relevant(target) {
            return false;
        }
        let Some(value) = self.evaluate(id) else {
            return false;
        };
        let node = self.form.tree().node(target);
        let coerced = node
            .field_kind()
            .and_then(|kind| kind.coerce(&value))
            .unwrap_or_default();
        if same_value(&node.value, &coerced) {
            return false;
        }
        self.form.tree_mut().node_mut(target).value = coerced;
        self.node_changed(target);
        true
    }

    /// Applies a label or hint result.
    fn apply_text(&mut self, id: BindingId, target: NodeId) -> bool {
        let Some(value) = self.evaluate(id) else {
            return false;
        };
        let text = value.to_text();
        let is_hint = self.form.binding(id).slot == BindingSlot::Hint;
        let node = self.form.tree_mut().node_mut(target);
        let slot = if is_hint { &mut node.hint } else { &mut node.label };
        if *slot == text {
            return false;
        }
        *slot = text;
        self.outcome.changed.insert(target);
        true
    }

    /// Applies a required or readonly result.
    fn apply_flag(&mut self, id: BindingId, target: NodeId) -> bool {
        let Some(value) = self.evaluate(id) else {
            return false;
        };
        let flag = value.to_boolean();
        let is_required = self.form.binding(id).slot == BindingSlot::Required;
        let node = self.form.tree_mut().node_mut(target);
        let slot = if is_required { &mut node.required } else { &mut node.readonly };
        if *slot == flag {
            return false;
        }
        *slot = flag;
        self.outcome.changed.insert(target);
        true
    }

    /// Applies a constraint result; empty answers are always valid.
    fn apply_constraint(&mut self, id: BindingId, target: NodeId) -> bool {
        let Some(value) = self.evaluate(id) else {
            return false;
        };
        let node = self.form.tree_mut().node_mut(target);
        let valid = node.value.is_empty() || value.to_boolean();
        if node.valid == valid {
            return false;
        }
        node.valid = valid;
        self.outcome.changed.insert(target);
        true
    }

    /// Applies a choice filter and repairs stale selections.
    fn apply_choice_filter(&mut self, id: BindingId, target: NodeId) -> bool {
        let result = filter_choices(self.form.binding(id), self.form.tree());
        let offered = match result {
            Ok(offered) => offered,
            Err(error) => {
                self.evaluation_failed(id, &error);
                return false;
            }
        };
        let mut changed = false;
        let node = self.form.tree().node(target);
        let repair = node
            .field_kind()
            .and_then(|kind| repair_selection(kind, &node.value, &offered));
        if node.choices != offered {
            self.form.tree_mut().node_mut(target).choices = offered;
            self.outcome.changed.insert(target);
            changed = true;
        }
        if let Some(repair) = repair {
            let path = self.form.tree().node(target).path.clone();
            self.form.tree_mut().node_mut(target).value = repair.value;
            self.observer.record(&RecalcEvent::SelectionRepaired {
                path: path.clone(),
                removed: repair.removed.clone(),
            });
            self.outcome.diagnostics.push(Diagnostic::SelectionRepaired {
                path,
                removed: repair.removed,
            });
            self.node_changed(target);
            changed = true;
        }
        changed
    }
}

/// Value equality where NaN equals NaN, so unchanged NaN results settle.
fn same_value(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(left), Value::Number(right)) if left.is_nan() && right.is_nan() => true,
        _ => lhs == rhs,
    }
}
