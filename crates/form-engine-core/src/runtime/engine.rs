// crates/form-engine-core/src/runtime/engine.rs
// ============================================================================
// Module: Form Session Engine
// Description: Edit entry points, visible sequence tracking, and focus.
// Purpose: Expose one form instance to a rendering layer.
// Dependencies: crate::{core, interfaces, runtime}, form-logic, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`FormSession`] owns one instantiated tree. Every edit funnels through a
//! single commit path: validate the edit, store it, settle the dependency
//! graph, then diff the current screen's visible sequence and reconcile focus.
//! Sessions are single-threaded; `&mut self` serializes passes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use form_logic::Value;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ChoiceDef;
use crate::core::EngineLimits;
use crate::core::FieldKind;
use crate::core::FieldPath;
use crate::core::NodeId;
use crate::core::ScreenId;
use crate::core::TreeNode;
use crate::interfaces::PassTrigger;
use crate::interfaces::RecalcEvent;
use crate::interfaces::RecalcObserver;
use crate::runtime::compile::CompiledForm;
use crate::runtime::grouping::FocusOutcome;
use crate::runtime::grouping::Screen;
use crate::runtime::grouping::SequenceDiff;
use crate::runtime::grouping::VisibleFieldSequence;
use crate::runtime::grouping::compute_visible_sequence;
use crate::runtime::recalc::Diagnostic;
use crate::runtime::recalc::EditRejection;
use crate::runtime::recalc::EvaluationRecord;
use crate::runtime::recalc::PassOutcome;
use crate::runtime::recalc::SettlePass;

// ============================================================================
// SECTION: Engine Configuration
// ============================================================================

/// Configuration for compilation and sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Definition and expression limits.
    pub limits: EngineLimits,
    /// Emit a `BindingEvaluated` event for every evaluation.
    pub record_evaluations: bool,
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Renderer-facing snapshot of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldView {
    /// Field path.
    pub path: FieldPath,
    /// Field kind.
    pub kind: FieldKind,
    /// Current answer.
    pub value: Value,
    /// Effective relevance.
    pub relevant: bool,
    /// Rendered label.
    pub label: String,
    /// Rendered hint.
    pub hint: String,
    /// Offered choices.
    pub choices: Vec<ChoiceDef>,
    /// Required flag.
    pub required: bool,
    /// True when the user cannot edit the field.
    pub readonly: bool,
    /// Constraint outcome.
    pub valid: bool,
    /// Widget appearance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
}

/// Field whose value or derived state changed during a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    /// Field path.
    pub path: FieldPath,
    /// Current answer.
    pub value: Value,
    /// Effective relevance.
    pub relevant: bool,
    /// Rendered label.
    pub label: String,
    /// Rendered hint.
    pub hint: String,
    /// Offered choices.
    pub choices: Vec<ChoiceDef>,
    /// Required flag.
    pub required: bool,
    /// True when the user cannot edit the field.
    pub readonly: bool,
    /// Constraint outcome.
    pub valid: bool,
}

/// Outcome of one edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalcResult {
    /// Changed fields in document order.
    pub updated_fields: Vec<FieldUpdate>,
    /// Visible sequence of the current screen after the pass.
    pub visible_sequence: VisibleFieldSequence,
    /// Edit script from the previous visible sequence.
    pub visible_sequence_diff: SequenceDiff,
    /// Focus reconciliation.
    pub focus: FocusOutcome,
    /// Non-fatal diagnostics.
    pub diagnostics: Vec<Diagnostic>,
    /// Bindings evaluated during the pass.
    pub evaluations: Vec<EvaluationRecord>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by session navigation calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Screen handle out of range.
    #[error("unknown screen: {0}")]
    UnknownScreen(ScreenId),
    /// Path does not name a field.
    #[error("unknown field: {0}")]
    UnknownField(FieldPath),
    /// Field is not in the current visible sequence.
    #[error("field is not visible on the current screen: {0}")]
    FieldNotVisible(FieldPath),
}

// ============================================================================
// SECTION: Form Session
// ============================================================================

/// One live form instance.
pub struct FormSession<O> {
    /// Compiled form owning the tree.
    form: CompiledForm,
    /// Engine configuration.
    config: EngineConfig,
    /// Event sink.
    observer: O,
    /// Current screen.
    screen: Option<ScreenId>,
    /// Focused field.
    focus: Option<FieldPath>,
    /// Diagnostics from the initial pass.
    initial_diagnostics: Vec<Diagnostic>,
}

impl<O: RecalcObserver> FormSession<O> {
    /// Instantiates a session, evaluates every binding in rank order, and
    /// opens the first screen.
    pub fn new(form: CompiledForm, config: EngineConfig, observer: O) -> Self {
        let screen = form.screens().first().map(|screen| screen.id);
        let mut session = Self {
            form,
            config,
            observer,
            screen,
            focus: None,
            initial_diagnostics: Vec::new(),
        };
        session.observer.record(&RecalcEvent::PassStarted {
            form_id: session.form.form_id().clone(),
            digest: session.form.digest().value.clone(),
            trigger: PassTrigger::Initial,
        });
        let mut pass =
            SettlePass::new(&mut session.form, &session.observer, session.config.record_evaluations);
        pass.enqueue_all();
        let outcome = pass.run();
        session.observer.record(&RecalcEvent::PassSettled {
            evaluations: outcome.evaluations.len(),
            updated: outcome.changed.len(),
            diagnostics: outcome.diagnostics.len(),
        });
        session.initial_diagnostics = outcome.diagnostics;
        session
    }

    /// Commits a new answer and settles the form.
    pub fn on_field_changed(&mut self, path: &FieldPath, value: Value) -> RecalcResult {
        let trigger = PassTrigger::Edit {
            path: path.clone(),
        };
        self.commit(path, &value, trigger)
    }

    /// Clears an answer and settles the form.
    pub fn on_clear_answer(&mut self, path: &FieldPath) -> RecalcResult {
        let trigger = PassTrigger::Clear {
            path: path.clone(),
        };
        self.commit(path, &Value::Empty, trigger)
    }

    /// Returns the visible sequence of the current screen.
    #[must_use]
    pub fn initial_visible_sequence(&self) -> VisibleFieldSequence {
        self.current_sequence()
    }

    /// Returns the screens in definition order.
    #[must_use]
    pub fn screens(&self) -> &[Screen] {
        self.form.screens()
    }

    /// Returns the current screen handle.
    #[must_use]
    pub const fn current_screen(&self) -> Option<ScreenId> {
        self.screen
    }

    /// Jumps to a screen and drops focus.
    ///
    /// # Errors
    /// Returns [`SessionError::UnknownScreen`] for an out-of-range handle.
    pub fn open_screen(&mut self, screen: ScreenId) -> Result<VisibleFieldSequence, SessionError> {
        if screen.index() >= self.form.screens().len() {
            return Err(SessionError::UnknownScreen(screen));
        }
        self.screen = Some(screen);
        self.focus = None;
        Ok(self.current_sequence())
    }

    /// Focuses a field visible on the current screen.
    ///
    /// # Errors
    /// Returns [`SessionError`] when the field is unknown or not visible.
    pub fn set_focus(&mut self, path: &FieldPath) -> Result<(), SessionError> {
        let is_field = self.form.tree().lookup(path).is_some_and(|id| self.form.tree().node(id).is_field());
        if !is_field {
            return Err(SessionError::UnknownField(path.clone()));
        }
        if !self.current_sequence().contains(path) {
            return Err(SessionError::FieldNotVisible(path.clone()));
        }
        self.focus = Some(path.clone());
        Ok(())
    }

    /// Drops focus.
    pub fn clear_focus(&mut self) {
        self.focus = None;
    }

    /// Returns the focused field.
    #[must_use]
    pub const fn focus(&self) -> Option<&FieldPath> {
        self.focus.as_ref()
    }

    /// Returns the widget descriptor of a field.
    #[must_use]
    pub fn field(&self, path: &FieldPath) -> Option<FieldView> {
        let tree = self.form.tree();
        let id = tree.lookup(path)?;
        let node = tree.node(id);
        let kind = node.field_kind()?;
        Some(FieldView {
            path: node.path.clone(),
            kind,
            value: node.value.clone(),
            relevant: tree.is_effectively_relevant(id),
            label: node.label.clone(),
            hint: node.hint.clone(),
            choices: node.choices.clone(),
            required: node.required,
            readonly: is_locked(node),
            valid: node.valid,
            appearance: node.appearance.clone(),
        })
    }

    /// Returns the compiled form and its live tree.
    #[must_use]
    pub const fn form(&self) -> &CompiledForm {
        &self.form
    }

    /// Returns diagnostics recorded by the initial pass.
    #[must_use]
    pub fn initial_diagnostics(&self) -> &[Diagnostic] {
        &self.initial_diagnostics
    }

    /// Returns the observer.
    #[must_use]
    pub const fn observer(&self) -> &O {
        &self.observer
    }

    /// Single commit path shared by edits and clears.
    fn commit(&mut self, path: &FieldPath, value: &Value, trigger: PassTrigger) -> RecalcResult {
        self.observer.record(&RecalcEvent::PassStarted {
            form_id: self.form.form_id().clone(),
            digest: self.form.digest().value.clone(),
            trigger,
        });
        let previous = self.current_sequence();
        let outcome = match self.check_edit(path, value) {
            Err(reason) => {
                self.observer.record(&RecalcEvent::EditRejected {
                    path: path.clone(),
                    reason,
                });
                PassOutcome {
                    diagnostics: vec![Diagnostic::EditRejected {
                        path: path.clone(),
                        reason,
                    }],
                    ..PassOutcome::default()
                }
            }
            Ok((id, coerced)) => {
                if self.form.tree().node(id).value == coerced {
                    PassOutcome::default()
                } else {
                    self.form.tree_mut().node_mut(id).value = coerced;
                    let mut pass =
                        SettlePass::new(&mut self.form, &self.observer, self.config.record_evaluations);
                    pass.node_changed(id);
                    pass.run()
                }
            }
        };
        let next = self.current_sequence();
        let visible_sequence_diff = SequenceDiff::between(&previous.fields, &next.fields);
        let focus = self.reconcile_focus(&next);
        let updated_fields: Vec<FieldUpdate> =
            outcome.changed.iter().copied().filter_map(|id| self.field_update(id)).collect();
        self.observer.record(&RecalcEvent::PassSettled {
            evaluations: outcome.evaluations.len(),
            updated: updated_fields.len(),
            diagnostics: outcome.diagnostics.len(),
        });
        RecalcResult {
            updated_fields,
            visible_sequence: next,
            visible_sequence_diff,
            focus,
            diagnostics: outcome.diagnostics,
            evaluations: outcome.evaluations,
        }
    }

    /// Validates an edit and returns the target and coerced value.
    fn check_edit(&self, path: &FieldPath, value: &Value) -> Result<(NodeId, Value), EditRejection> {
        let tree = self.form.tree();
        let id = tree.lookup(path).ok_or(EditRejection::UnknownPath)?;
        let node = tree.node(id);
        let kind = node.field_kind().ok_or(EditRejection::NotAField)?;
        if node.calculated {
            return Err(EditRejection::Calculated);
        }
        if node.readonly || kind.is_display_only() {
            return Err(EditRejection::ReadOnly);
        }
        if !tree.is_effectively_relevant(id) {
            return Err(EditRejection::NotRelevant);
        }
        let coerced = kind.coerce(value).ok_or(EditRejection::InvalidValue)?;
        if kind.is_select() && !coerced.selection_values().iter().all(|item| node.offers(item)) {
            return Err(EditRejection::ChoiceNotOffered);
        }
        Ok((id, coerced))
    }

    /// Returns the visible sequence of the current screen.
    fn current_sequence(&self) -> VisibleFieldSequence {
        self.screen
            .and_then(|id| self.form.screens().get(id.index()))
            .map_or_else(VisibleFieldSequence::default, |screen| {
                compute_visible_sequence(self.form.tree(), screen)
            })
    }

    /// Keeps focus on a still-visible field, else drops it.
    fn reconcile_focus(&mut self, next: &VisibleFieldSequence) -> FocusOutcome {
        let Some(path) = self.focus.take() else {
            return FocusOutcome::None;
        };
        if next.contains(&path) {
            self.focus = Some(path.clone());
            FocusOutcome::Retained {
                path,
            }
        } else {
            FocusOutcome::Cleared {
                path,
            }
        }
    }

    /// Builds an update record for a changed field.
    fn field_update(&self, id: NodeId) -> Option<FieldUpdate> {
        let tree = self.form.tree();
        let node = tree.node(id);
        node.field_kind()?;
        Some(FieldUpdate {
            path: node.path.clone(),
            value: node.value.clone(),
            relevant: tree.is_effectively_relevant(id),
            label: node.label.clone(),
            hint: node.hint.clone(),
            choices: node.choices.clone(),
            required: node.required,
            readonly: is_locked(node),
            valid: node.valid,
        })
    }
}

/// Returns true when the user cannot edit a node.
fn is_locked(node: &TreeNode) -> bool {
    node.readonly || node.calculated || node.field_kind().is_some_and(FieldKind::is_display_only)
}
