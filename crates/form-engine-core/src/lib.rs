// crates/form-engine-core/src/lib.rs
// ============================================================================
// Module: Form Engine Core Library
// Description: Public API surface for the form engine core.
// Purpose: Expose definition types, the session API, and observer interfaces.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The form engine keeps a hierarchical data tree and its dependent
//! expressions (relevance, calculations, labels, choice filters) consistent
//! as answers change. It consumes an already-structured [`FormDef`], compiles
//! it once, and drives one [`FormSession`] per form instance. Rendering,
//! storage, and document parsing stay outside.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use form_logic::Value;
pub use interfaces::JsonLinesObserver;
pub use interfaces::NoopObserver;
pub use interfaces::PassTrigger;
pub use interfaces::RecalcEvent;
pub use interfaces::RecalcObserver;
pub use interfaces::RecordingObserver;
pub use runtime::CompiledForm;
pub use runtime::Diagnostic;
pub use runtime::EditRejection;
pub use runtime::EngineConfig;
pub use runtime::EvaluationRecord;
pub use runtime::FieldUpdate;
pub use runtime::FieldView;
pub use runtime::FocusOutcome;
pub use runtime::FormSession;
pub use runtime::Insertion;
pub use runtime::RecalcResult;
pub use runtime::Screen;
pub use runtime::ScreenKind;
pub use runtime::SequenceDiff;
pub use runtime::SessionError;
pub use runtime::VisibleFieldSequence;
