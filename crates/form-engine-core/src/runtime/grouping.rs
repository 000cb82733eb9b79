// crates/form-engine-core/src/runtime/grouping.rs
// ============================================================================
// Module: Field-List Resolver
// Description: Screen derivation, visible sequences, and sequence diffs.
// Purpose: Tell the renderer which widgets a screen shows and how they moved.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! Screens are fixed at compile time: a field-list group becomes one screen
//! holding every widget-bearing descendant; plain groups and repeat instances
//! are walked through; any other widget field is a screen of its own.
//!
//! Visible sequences are recomputed after every pass. Because every sequence
//! of one screen is a subsequence of the screen's field list, a membership
//! diff is already minimal: common fields keep their relative order, so only
//! fields entering or leaving the sequence are listed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::DataTree;
use crate::core::FieldPath;
use crate::core::GroupAppearance;
use crate::core::NodeId;
use crate::core::NodeKind;
use crate::core::ScreenId;

// ============================================================================
// SECTION: Screens
// ============================================================================

/// How a screen was formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenKind {
    /// Field-list group showing several widgets.
    FieldList,
    /// One standalone widget field.
    SingleField,
}

/// Unit of presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    /// Screen handle.
    pub id: ScreenId,
    /// Path of the group or field forming the screen.
    pub path: FieldPath,
    /// Screen kind.
    pub kind: ScreenKind,
    /// Widget fields in definition order.
    #[serde(skip)]
    pub fields: Vec<NodeId>,
}

/// Derives the screens of a tree in definition order.
#[must_use]
pub fn derive_screens(tree: &DataTree) -> Vec<Screen> {
    let mut screens = Vec::new();
    walk(tree, tree.root(), &mut screens);
    screens
}

/// Collects screens below `parent`.
fn walk(tree: &DataTree, parent: NodeId, screens: &mut Vec<Screen>) {
    for child in tree.node(parent).children.iter().copied() {
        let node = tree.node(child);
        match node.kind {
            NodeKind::Group {
                appearance: GroupAppearance::FieldList,
                ..
            } => {
                let fields: Vec<NodeId> =
                    tree.subtree(child).into_iter().filter(|id| has_widget(tree, *id)).collect();
                if !fields.is_empty() {
                    push_screen(screens, node.path.clone(), ScreenKind::FieldList, fields);
                }
            }
            NodeKind::Group {
                appearance: GroupAppearance::Plain,
                ..
            } => walk(tree, child, screens),
            NodeKind::Field {
                ..
            } => {
                if has_widget(tree, child) {
                    push_screen(screens, node.path.clone(), ScreenKind::SingleField, vec![child]);
                }
            }
        }
    }
}

/// Appends a screen with the next handle.
fn push_screen(screens: &mut Vec<Screen>, path: FieldPath, kind: ScreenKind, fields: Vec<NodeId>) {
    screens.push(Screen {
        id: ScreenId::new(screens.len()),
        path,
        kind,
        fields,
    });
}

/// Returns true for fields that render a widget.
fn has_widget(tree: &DataTree, id: NodeId) -> bool {
    tree.node(id).field_kind().is_some_and(|kind| kind.has_widget())
}

// ============================================================================
// SECTION: Visible Sequences
// ============================================================================

/// Ordered visible fields of one screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleFieldSequence {
    /// Screen handle; `None` when the form has no screens.
    pub screen: Option<ScreenId>,
    /// Visible field paths in definition order.
    pub fields: Vec<FieldPath>,
}

impl VisibleFieldSequence {
    /// Returns true when `path` is visible.
    #[must_use]
    pub fn contains(&self, path: &FieldPath) -> bool {
        self.fields.contains(path)
    }
}

/// Filters a screen's fields by effective relevance.
#[must_use]
pub fn compute_visible_sequence(tree: &DataTree, screen: &Screen) -> VisibleFieldSequence {
    VisibleFieldSequence {
        screen: Some(screen.id),
        fields: screen
            .fields
            .iter()
            .copied()
            .filter(|id| tree.is_effectively_relevant(*id))
            .map(|id| tree.node(id).path.clone())
            .collect(),
    }
}

// ============================================================================
// SECTION: Sequence Diff
// ============================================================================

/// Field inserted into a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insertion {
    /// Inserted field.
    pub path: FieldPath,
    /// Position in the new sequence.
    pub position: usize,
}

/// Edit script turning one visible sequence into the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDiff {
    /// Removed fields in previous order.
    pub removed: Vec<FieldPath>,
    /// Inserted fields in ascending new position.
    pub inserted: Vec<Insertion>,
}

impl SequenceDiff {
    /// Computes the diff between two sequences of the same screen.
    #[must_use]
    pub fn between(previous: &[FieldPath], next: &[FieldPath]) -> Self {
        let before: BTreeSet<&FieldPath> = previous.iter().collect();
        let after: BTreeSet<&FieldPath> = next.iter().collect();
        Self {
            removed: previous.iter().filter(|path| !after.contains(path)).cloned().collect(),
            inserted: next
                .iter()
                .enumerate()
                .filter(|(_, path)| !before.contains(path))
                .map(|(position, path)| Insertion {
                    path: path.clone(),
                    position,
                })
                .collect(),
        }
    }

    /// Returns true when the sequences were identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.inserted.is_empty()
    }

    /// Applies the script to the previous sequence.
    #[must_use]
    pub fn apply(&self, previous: &[FieldPath]) -> Vec<FieldPath> {
        let mut out: Vec<FieldPath> =
            previous.iter().filter(|path| !self.removed.contains(path)).cloned().collect();
        for insertion in &self.inserted {
            let position = insertion.position.min(out.len());
            out.insert(position, insertion.path.clone());
        }
        out
    }
}

// ============================================================================
// SECTION: Focus
// ============================================================================

/// Focus state after a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FocusOutcome {
    /// No field was focused.
    #[default]
    None,
    /// Focused field is still visible.
    Retained {
        /// Focused field.
        path: FieldPath,
    },
    /// Focused field left the sequence; focus was dropped.
    Cleared {
        /// Previously focused field.
        path: FieldPath,
    },
}
