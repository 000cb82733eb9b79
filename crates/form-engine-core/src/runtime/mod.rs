// crates/form-engine-core/src/runtime/mod.rs
// ============================================================================
// Module: Form Engine Runtime
// Description: Compilation, dependency graph, recalculation, and sessions.
// Purpose: Keep a form instance consistent as answers change.
// Dependencies: crate::{core, interfaces}, form-logic
// ============================================================================

//! ## Overview
//! Runtime modules compile definitions, order bindings, settle passes,
//! resolve cascading selects, derive screens, and expose the session API.
//! Every edit goes through the same commit path in [`engine`].

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod cascade;
pub mod compile;
pub mod engine;
pub mod graph;
pub mod grouping;
pub mod recalc;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cascade::SelectionRepair;
pub use cascade::filter_choices;
pub use cascade::repair_selection;
pub use compile::Binding;
pub use compile::CompiledForm;
pub use compile::EvalScope;
pub use compile::NodeRef;
pub use engine::EngineConfig;
pub use engine::FieldUpdate;
pub use engine::FieldView;
pub use engine::FormSession;
pub use engine::RecalcResult;
pub use engine::SessionError;
pub use graph::DependencyGraph;
pub use grouping::FocusOutcome;
pub use grouping::Insertion;
pub use grouping::Screen;
pub use grouping::ScreenKind;
pub use grouping::SequenceDiff;
pub use grouping::VisibleFieldSequence;
pub use grouping::compute_visible_sequence;
pub use grouping::derive_screens;
pub use recalc::Diagnostic;
pub use recalc::EditRejection;
pub use recalc::EvaluationRecord;
