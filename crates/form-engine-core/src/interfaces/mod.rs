// crates/form-engine-core/src/interfaces/mod.rs
// ============================================================================
// Module: Form Engine Interfaces
// Description: Observer seam for recalculation events and built-in sinks.
// Purpose: Let embedders log or inspect passes without a logging framework.
// Dependencies: crate::{core, runtime}, serde, serde_json
// ============================================================================

//! ## Overview
//! Sessions report structured [`RecalcEvent`]s to a [`RecalcObserver`].
//! Observers must never influence evaluation; sink failures are absorbed and
//! counted rather than surfaced to the session.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;

use crate::core::BindingSlot;
use crate::core::FieldPath;
use crate::core::FormId;
use crate::runtime::recalc::EditRejection;

// ============================================================================
// SECTION: Events
// ============================================================================

/// What started a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PassTrigger {
    /// Session construction.
    Initial,
    /// Answer edit.
    Edit {
        /// Edited field.
        path: FieldPath,
    },
    /// Answer clear.
    Clear {
        /// Cleared field.
        path: FieldPath,
    },
}

/// Structured recalculation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecalcEvent {
    /// Pass started.
    PassStarted {
        /// Form identifier.
        form_id: FormId,
        /// Hex definition digest.
        digest: String,
        /// Pass trigger.
        trigger: PassTrigger,
    },
    /// Binding evaluated; emitted only when evaluation recording is on.
    BindingEvaluated {
        /// Bound node.
        path: FieldPath,
        /// Binding slot.
        slot: BindingSlot,
        /// Topological rank.
        rank: usize,
        /// True when derived state changed.
        changed: bool,
    },
    /// Binding evaluation failed.
    EvaluationFailed {
        /// Bound node.
        path: FieldPath,
        /// Binding slot.
        slot: BindingSlot,
        /// Rendered error.
        error: String,
    },
    /// Stale selections dropped.
    SelectionRepaired {
        /// Select field.
        path: FieldPath,
        /// Dropped values.
        removed: Vec<String>,
    },
    /// Edit rejected.
    EditRejected {
        /// Target path.
        path: FieldPath,
        /// Rejection reason.
        reason: EditRejection,
    },
    /// Pass settled.
    PassSettled {
        /// Binding evaluations performed.
        evaluations: usize,
        /// Nodes reported as updated.
        updated: usize,
        /// Diagnostics recorded.
        diagnostics: usize,
    },
}

// ============================================================================
// SECTION: Observer
// ============================================================================

/// Receiver of recalculation events.
pub trait RecalcObserver {
    /// Records one event.
    fn record(&self, event: &RecalcEvent);
}

impl<T: RecalcObserver + ?Sized> RecalcObserver for &T {
    fn record(&self, event: &RecalcEvent) {
        (**self).record(event);
    }
}

impl<T: RecalcObserver + ?Sized> RecalcObserver for Arc<T> {
    fn record(&self, event: &RecalcEvent) {
        (**self).record(event);
    }
}

impl<T: RecalcObserver + ?Sized> RecalcObserver for Box<T> {
    fn record(&self, event: &RecalcEvent) {
        (**self).record(event);
    }
}

/// Observer that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RecalcObserver for NoopObserver {
    fn record(&self, _event: &RecalcEvent) {}
}

// ============================================================================
// SECTION: JSON Lines Sink
// ============================================================================

/// Observer writing one JSON record per line.
pub struct JsonLinesObserver<W: Write + Send> {
    /// Output writer.
    writer: Mutex<W>,
    /// Records that could not be written.
    failures: AtomicU64,
}

impl<W: Write + Send> JsonLinesObserver<W> {
    /// Creates a sink over `writer`.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            failures: AtomicU64::new(0),
        }
    }

    /// Returns the number of records that failed to write.
    #[must_use]
    pub fn write_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Returns the writer, or `None` when its mutex was poisoned.
    pub fn into_inner(self) -> Option<W> {
        self.writer.into_inner().ok()
    }

    /// Writes one record followed by a newline.
    fn write_record(&self, event: &RecalcEvent) -> Result<(), String> {
        let mut guard = self.writer.lock().map_err(|_| "log writer mutex poisoned".to_string())?;
        serde_json::to_writer(&mut *guard, event).map_err(|err| err.to_string())?;
        guard.write_all(b"\n").map_err(|err| err.to_string())?;
        guard.flush().map_err(|err| err.to_string())?;
        drop(guard);
        Ok(())
    }
}

impl<W: Write + Send> RecalcObserver for JsonLinesObserver<W> {
    fn record(&self, event: &RecalcEvent) {
        if self.write_record(event).is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ============================================================================
// SECTION: Recording Sink
// ============================================================================

/// Observer keeping events in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    /// Recorded events in order.
    events: Mutex<Vec<RecalcEvent>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<RecalcEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl RecalcObserver for RecordingObserver {
    fn record(&self, event: &RecalcEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
