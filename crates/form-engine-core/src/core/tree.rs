// crates/form-engine-core/src/core/tree.rs
// ============================================================================
// Module: Data Tree
// Description: Arena-backed instance tree holding values and derived state.
// Purpose: Store answers, relevance, flags, and rendered text per node.
// Dependencies: crate::core::{definition, identifiers}, form-logic
// ============================================================================

//! ## Overview
//! The [`DataTree`] owns every node of one form instance in an arena, in
//! document (preorder) order, so that iterating the arena visits nodes in
//! definition order. Parent links are handles, never references.
//!
//! Invariants:
//! - Effective relevance is the conjunction of a node's own flag and the
//!   flags of all its ancestors.
//! - Reads of nodes that are not effectively relevant yield [`Value::Empty`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use form_logic::Value;
use serde::Deserialize;
use serde::Serialize;

use crate::core::definition::ChoiceDef;
use crate::core::definition::FieldKind;
use crate::core::definition::GroupAppearance;
use crate::core::identifiers::FieldPath;
use crate::core::identifiers::NodeId;

// ============================================================================
// SECTION: Node Types
// ============================================================================

/// Structural role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeKind {
    /// Group node (the document root included).
    Group {
        /// Presentation.
        appearance: GroupAppearance,
        /// True for an instance of a repeat group.
        repeat: bool,
    },
    /// Answerable field.
    Field {
        /// Input type.
        kind: FieldKind,
    },
}

/// One node of the data tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Absolute path.
    pub path: FieldPath,
    /// Parent handle; `None` for the root.
    pub parent: Option<NodeId>,
    /// Children in document order.
    pub children: Vec<NodeId>,
    /// Structural role.
    pub kind: NodeKind,
    /// Current answer; always [`Value::Empty`] for groups.
    pub value: Value,
    /// Own relevance flag.
    pub relevant: bool,
    /// Required flag.
    pub required: bool,
    /// Read-only flag from a `readonly` binding.
    pub readonly: bool,
    /// Constraint outcome.
    pub valid: bool,
    /// True when a `calculate` binding owns the value.
    pub calculated: bool,
    /// Rendered label.
    pub label: String,
    /// Rendered hint.
    pub hint: String,
    /// Widget appearance passed through to the renderer.
    pub appearance: Option<String>,
    /// Choices declared on a select field.
    pub declared_choices: Vec<ChoiceDef>,
    /// Currently offered choices.
    pub choices: Vec<ChoiceDef>,
}

impl TreeNode {
    /// Returns the field kind, or `None` for groups.
    #[must_use]
    pub const fn field_kind(&self) -> Option<FieldKind> {
        match self.kind {
            NodeKind::Field {
                kind,
            } => Some(kind),
            NodeKind::Group {
                ..
            } => None,
        }
    }

    /// Returns true for field nodes.
    #[must_use]
    pub const fn is_field(&self) -> bool {
        matches!(self.kind, NodeKind::Field { .. })
    }

    /// Returns true when a choice value is currently offered.
    #[must_use]
    pub fn offers(&self, value: &str) -> bool {
        self.choices.iter().any(|choice| choice.value == value)
    }
}

// ============================================================================
// SECTION: Data Tree
// ============================================================================

/// Arena of tree nodes for one form instance.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTree {
    /// Nodes in preorder.
    nodes: Vec<TreeNode>,
    /// Path index.
    by_path: BTreeMap<FieldPath, NodeId>,
}

impl DataTree {
    /// Creates a tree holding only the document root group.
    #[must_use]
    pub(crate) fn with_root(name: &str) -> Self {
        let path = FieldPath::root(name);
        let root = TreeNode {
            path: path.clone(),
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Group {
                appearance: GroupAppearance::Plain,
                repeat: false,
            },
            value: Value::Empty,
            relevant: true,
            required: false,
            readonly: false,
            valid: true,
            calculated: false,
            label: String::new(),
            hint: String::new(),
            appearance: None,
            declared_choices: Vec::new(),
            choices: Vec::new(),
        };
        let mut by_path = BTreeMap::new();
        by_path.insert(path, NodeId::new(0));
        Self {
            nodes: vec![root],
            by_path,
        }
    }

    /// Appends a child of `parent` named `name` with instance `index`.
    ///
    /// Children must be appended in preorder so that arena order matches
    /// document order.
    pub(crate) fn push_child(
        &mut self,
        parent: NodeId,
        name: &str,
        index: u32,
        kind: NodeKind,
    ) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        let path = self.nodes[parent.index()].path.child(name, index);
        self.nodes[parent.index()].children.push(id);
        self.by_path.insert(path.clone(), id);
        self.nodes.push(TreeNode {
            path,
            parent: Some(parent),
            children: Vec::new(),
            kind,
            value: Value::Empty,
            relevant: true,
            required: false,
            readonly: false,
            valid: true,
            calculated: false,
            label: String::new(),
            hint: String::new(),
            appearance: None,
            declared_choices: Vec::new(),
            choices: Vec::new(),
        });
        id
    }

    /// Returns the root handle.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when the tree holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns a node by handle.
    ///
    /// Handles are only minted by this tree, so indexing cannot fail for
    /// handles obtained from it.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.index()]
    }

    /// Returns a mutable node by handle.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.index()]
    }

    /// Iterates node handles in document order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0 .. self.nodes.len()).map(NodeId::new)
    }

    /// Resolves a path to a node handle.
    #[must_use]
    pub fn lookup(&self, path: &FieldPath) -> Option<NodeId> {
        self.by_path.get(path).copied()
    }

    /// Returns true when the node and all its ancestors are relevant.
    #[must_use]
    pub fn is_effectively_relevant(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            if !node.relevant {
                return false;
            }
            current = node.parent;
        }
        true
    }

    /// Returns the value as seen by expressions.
    #[must_use]
    pub fn read_value(&self, id: NodeId) -> Value {
        if self.is_effectively_relevant(id) {
            self.node(id).value.clone()
        } else {
            Value::Empty
        }
    }

    /// Returns `id` and all its descendants in document order.
    #[must_use]
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.node(next).children.iter().rev().copied());
        }
        out
    }

    /// Returns the child named `name` with instance `index`.
    #[must_use]
    pub fn child(&self, parent: NodeId, name: &str, index: u32) -> Option<NodeId> {
        self.node(parent).children.iter().copied().find(|child| {
            self.node(*child)
                .path
                .segments()
                .last()
                .is_some_and(|segment| segment.name == name && segment.index == index)
        })
    }
}
