// crates/form-engine-core/src/runtime/compile.rs
// ============================================================================
// Module: Form Compilation
// Description: Tree instantiation, expression parsing, and reference resolution.
// Purpose: Turn a validated form definition into an immutable compiled form.
// Dependencies: crate::{core, runtime}, form-logic
// ============================================================================

//! ## Overview
//! Compilation instantiates the data tree (repeat instances included),
//! parses every bind expression and label/hint template, resolves syntactic
//! paths to node handles, and builds the dependency graph and screen list.
//! Every failure is fatal and reported as [`FormDefinitionError`].
//!
//! Reference resolution rules:
//! - Absolute paths start at the document root; the first step must name it.
//! - Relative paths start at the bound node and climb one parent per `..`.
//! - A step through a repeat without an index selects the bound node's own
//!   instance when it lies inside one, else instance 1.
//! - Inside choice filters, bare names address attributes of the choice being
//!   tested.

// ============================================================================
// SECTION: Imports
// ============================================================================

use form_logic::EvalError;
use form_logic::Expr;
use form_logic::ParseError;
use form_logic::ParseLimits;
use form_logic::PathAnchor;
use form_logic::PathRef;
use form_logic::PathStep;
use form_logic::ReferenceEval;
use form_logic::Value;
use form_logic::parse_expression_with_limits;
use form_logic::parse_template;

use crate::core::BindingId;
use crate::core::BindingSlot;
use crate::core::ChoiceDef;
use crate::core::DataTree;
use crate::core::FieldDef;
use crate::core::FormDef;
use crate::core::FormDefinitionError;
use crate::core::FormId;
use crate::core::HashDigest;
use crate::core::NodeDef;
use crate::core::NodeId;
use crate::core::NodeKind;
use crate::runtime::engine::EngineConfig;
use crate::runtime::graph::DependencyGraph;
use crate::runtime::grouping::Screen;
use crate::runtime::grouping::derive_screens;

// ============================================================================
// SECTION: Resolved References
// ============================================================================

/// Reference resolved at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    /// Tree node.
    Node(NodeId),
    /// Attribute of the choice under test in a choice filter.
    Attribute(String),
}

/// Evaluation scope for compiled expressions.
#[derive(Debug, Clone, Copy)]
pub struct EvalScope<'a> {
    /// Tree read by node references.
    pub tree: &'a DataTree,
    /// Choice under test, set only while evaluating a choice filter.
    pub choice: Option<&'a ChoiceDef>,
}

impl ReferenceEval for NodeRef {
    type Context<'a> = EvalScope<'a>;

    fn resolve(&self, scope: &Self::Context<'_>) -> Value {
        match self {
            Self::Node(id) => scope.tree.read_value(*id),
            Self::Attribute(name) => {
                scope.choice.map_or(Value::Empty, |choice| choice_attribute(choice, name))
            }
        }
    }
}

/// Looks up a choice attribute; `name`/`value` and `label` fall back to the
/// choice itself.
fn choice_attribute(choice: &ChoiceDef, name: &str) -> Value {
    if let Some(value) = choice.attributes.get(name) {
        return Value::text(value.as_str());
    }
    match name {
        "name" | "value" => Value::text(choice.value.as_str()),
        "label" => Value::text(choice.label.as_str()),
        _ => Value::Empty,
    }
}

// ============================================================================
// SECTION: Bindings
// ============================================================================

/// Compiled expression attached to one slot of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Binding handle; also its document order.
    pub id: BindingId,
    /// Bound node.
    pub target: NodeId,
    /// Expression slot.
    pub slot: BindingSlot,
    /// Resolved expression.
    pub expr: Expr<NodeRef>,
    /// Distinct nodes read, in arena order; constraints include their target.
    pub reads: Vec<NodeId>,
}

impl Binding {
    /// Evaluates the binding against the current tree.
    ///
    /// # Errors
    /// Returns [`EvalError`] when evaluation fails.
    pub fn evaluate(&self, tree: &DataTree, choice: Option<&ChoiceDef>) -> Result<Value, EvalError> {
        self.expr.evaluate(&EvalScope {
            tree,
            choice,
        })
    }
}

// ============================================================================
// SECTION: Compiled Form
// ============================================================================

/// Immutable compiled form; the starting point of every session.
#[derive(Debug, Clone)]
pub struct CompiledForm {
    /// Form identifier.
    form_id: FormId,
    /// Human-readable title.
    title: String,
    /// Canonical definition digest.
    digest: HashDigest,
    /// Freshly instantiated tree.
    tree: DataTree,
    /// Bindings in document order.
    bindings: Vec<Binding>,
    /// Dependency graph over the bindings.
    graph: DependencyGraph,
    /// Screens in definition order.
    screens: Vec<Screen>,
}

impl CompiledForm {
    /// Returns the form identifier.
    #[must_use]
    pub const fn form_id(&self) -> &FormId {
        &self.form_id
    }

    /// Returns the form title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the canonical definition digest.
    #[must_use]
    pub const fn digest(&self) -> &HashDigest {
        &self.digest
    }

    /// Returns the instantiated tree.
    #[must_use]
    pub const fn tree(&self) -> &DataTree {
        &self.tree
    }

    /// Returns the tree for in-place updates.
    pub(crate) const fn tree_mut(&mut self) -> &mut DataTree {
        &mut self.tree
    }

    /// Returns all bindings in document order.
    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Returns one binding by handle.
    #[must_use]
    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.index()]
    }

    /// Returns the dependency graph.
    #[must_use]
    pub const fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Returns the screens in definition order.
    #[must_use]
    pub fn screens(&self) -> &[Screen] {
        &self.screens
    }
}

impl FormDef {
    /// Validates and compiles the definition.
    ///
    /// # Errors
    /// Returns [`FormDefinitionError`] when validation fails, an expression
    /// does not parse or resolve, or bindings form a cycle.
    pub fn compile(&self, config: &EngineConfig) -> Result<CompiledForm, FormDefinitionError> {
        self.validate_with(&config.limits)?;
        let digest = self.canonical_hash()?;
        let mut tree = DataTree::with_root(&self.root);
        let mut sites = Vec::new();
        let root = tree.root();
        instantiate(&mut tree, root, &self.children, &mut sites);

        let mut compiler = Compiler {
            limits: config.limits.parse_limits(),
            tree,
            bindings: Vec::new(),
        };
        for (target, declaration) in sites {
            match declaration {
                NodeDef::Field(field) => compiler.compile_field(target, field)?,
                NodeDef::Group(group) => {
                    if let Some(source) = &group.relevant {
                        compiler.compile_expression(target, BindingSlot::Relevance, source)?;
                    }
                }
            }
        }

        let Compiler {
            tree,
            bindings,
            ..
        } = compiler;
        let graph = DependencyGraph::build(&tree, &bindings)?;
        let screens = derive_screens(&tree);
        Ok(CompiledForm {
            form_id: self.form_id.clone(),
            title: self.title.clone(),
            digest,
            tree,
            bindings,
            graph,
            screens,
        })
    }
}

// ============================================================================
// SECTION: Instantiation
// ============================================================================

/// Appends nodes for `children` under `parent` in preorder, recording the
/// declaration behind every node.
fn instantiate<'a>(
    tree: &mut DataTree,
    parent: NodeId,
    children: &'a [NodeDef],
    sites: &mut Vec<(NodeId, &'a NodeDef)>,
) {
    for child in children {
        match child {
            NodeDef::Field(field) => {
                let id = tree.push_child(
                    parent,
                    &field.name,
                    1,
                    NodeKind::Field {
                        kind: field.kind,
                    },
                );
                let node = tree.node_mut(id);
                node.appearance.clone_from(&field.appearance);
                node.declared_choices.clone_from(&field.choices);
                node.choices.clone_from(&field.choices);
                node.calculated = field.bind.calculate.is_some();
                node.value = field
                    .default
                    .as_deref()
                    .and_then(|raw| field.kind.coerce(&Value::text(raw)))
                    .unwrap_or_default();
                sites.push((id, child));
            }
            NodeDef::Group(group) => {
                let count = group.repeat.map_or(1, |repeat| repeat.count);
                for index in 1 ..= count {
                    let id = tree.push_child(
                        parent,
                        &group.name,
                        index,
                        NodeKind::Group {
                            appearance: group.appearance,
                            repeat: group.repeat.is_some(),
                        },
                    );
                    tree.node_mut(id).label = group.label.clone().unwrap_or_default();
                    sites.push((id, child));
                    instantiate(tree, id, &group.children, sites);
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Expression Compilation
// ============================================================================

/// Accumulates bindings while compiling.
struct Compiler {
    /// Parser limits.
    limits: ParseLimits,
    /// Tree under construction.
    tree: DataTree,
    /// Bindings compiled so far.
    bindings: Vec<Binding>,
}

impl Compiler {
    /// Compiles every slot declared on a field.
    fn compile_field(&mut self, target: NodeId, field: &FieldDef) -> Result<(), FormDefinitionError> {
        let bind = &field.bind;
        if let Some(source) = &bind.relevant {
            self.compile_expression(target, BindingSlot::Relevance, source)?;
        }
        if let Some(source) = &bind.calculate {
            self.compile_expression(target, BindingSlot::Calculate, source)?;
        }
        if let Some(source) = &field.label {
            self.compile_template(target, BindingSlot::Label, source)?;
        }
        if let Some(source) = &field.hint {
            self.compile_template(target, BindingSlot::Hint, source)?;
        }
        if let Some(source) = &bind.choice_filter {
            self.compile_expression(target, BindingSlot::ChoiceFilter, source)?;
        }
        if let Some(source) = &bind.constraint {
            self.compile_expression(target, BindingSlot::Constraint, source)?;
        }
        if let Some(source) = &bind.required {
            self.compile_expression(target, BindingSlot::Required, source)?;
        }
        if let Some(source) = &bind.readonly {
            self.compile_expression(target, BindingSlot::Readonly, source)?;
        }
        Ok(())
    }

    /// Parses and binds an expression slot.
    fn compile_expression(
        &mut self,
        target: NodeId,
        slot: BindingSlot,
        source: &str,
    ) -> Result<(), FormDefinitionError> {
        let parsed = parse_expression_with_limits(source, self.limits)
            .map_err(|error| self.expression_error(target, slot, error))?;
        self.push_binding(target, slot, &parsed)
    }

    /// Parses a label or hint template; static text is stored directly.
    fn compile_template(
        &mut self,
        target: NodeId,
        slot: BindingSlot,
        source: &str,
    ) -> Result<(), FormDefinitionError> {
        let template = parse_template(source, self.limits)
            .map_err(|error| self.expression_error(target, slot, error))?;
        if let Some(text) = template.static_text() {
            let node = self.tree.node_mut(target);
            if slot == BindingSlot::Hint {
                node.hint = text;
            } else {
                node.label = text;
            }
            return Ok(());
        }
        self.push_binding(target, slot, &template.into_expr())
    }

    /// Resolves references and records a binding.
    fn push_binding(
        &mut self,
        target: NodeId,
        slot: BindingSlot,
        parsed: &Expr<PathRef>,
    ) -> Result<(), FormDefinitionError> {
        let tree = &self.tree;
        let expr = parsed
            .try_map_references(&mut |reference| resolve_reference(tree, target, slot, reference))?;
        let mut reads: Vec<NodeId> = expr
            .references()
            .into_iter()
            .filter_map(|reference| match reference {
                NodeRef::Node(id) => Some(*id),
                NodeRef::Attribute(_) => None,
            })
            .collect();
        if slot == BindingSlot::Constraint {
            // Validity also depends on whether the target is answered.
            reads.push(target);
        }
        reads.sort_unstable();
        reads.dedup();
        self.bindings.push(Binding {
            id: BindingId::new(self.bindings.len()),
            target,
            slot,
            expr,
            reads,
        });
        Ok(())
    }

    /// Wraps a parse error with its location.
    fn expression_error(&self, target: NodeId, slot: BindingSlot, error: ParseError) -> FormDefinitionError {
        FormDefinitionError::Expression {
            path: self.tree.node(target).path.to_string(),
            slot,
            error,
        }
    }
}

// ============================================================================
// SECTION: Reference Resolution
// ============================================================================

/// Resolves one syntactic reference relative to `target`.
fn resolve_reference(
    tree: &DataTree,
    target: NodeId,
    slot: BindingSlot,
    reference: &PathRef,
) -> Result<NodeRef, FormDefinitionError> {
    if slot == BindingSlot::ChoiceFilter
        && let Some(name) = reference.bare_name()
    {
        return Ok(NodeRef::Attribute(name.to_string()));
    }
    resolve_path(tree, target, reference).map(NodeRef::Node).ok_or_else(|| {
        FormDefinitionError::UnresolvedReference {
            path: tree.node(target).path.to_string(),
            slot,
            reference: reference.to_string(),
        }
    })
}

/// Walks a path from its anchor.
fn resolve_path(tree: &DataTree, target: NodeId, reference: &PathRef) -> Option<NodeId> {
    let (mut current, steps) = match reference.anchor {
        PathAnchor::Absolute => {
            let (first, rest) = reference.steps.split_first()?;
            let root = tree.root();
            if first.name != tree.node(root).path.name() || first.index.unwrap_or(1) != 1 {
                return None;
            }
            (root, rest)
        }
        PathAnchor::Relative {
            up,
        } => {
            let mut current = target;
            for _ in 0 .. up {
                current = tree.node(current).parent?;
            }
            (current, reference.steps.as_slice())
        }
    };
    for step in steps {
        current = resolve_step(tree, current, step, target)?;
    }
    Some(current)
}

/// Resolves one named step below `parent`.
fn resolve_step(tree: &DataTree, parent: NodeId, step: &PathStep, target: NodeId) -> Option<NodeId> {
    if let Some(index) = step.index {
        return tree.child(parent, &step.name, index);
    }
    let target_path = &tree.node(target).path;
    let mut first = None;
    for child in tree.node(parent).children.iter().copied() {
        let path = &tree.node(child).path;
        if path.name() != step.name {
            continue;
        }
        if path.contains(target_path) {
            return Some(child);
        }
        first.get_or_insert(child);
    }
    first
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn choice_attributes_fall_back_to_value_and_label() {
        let choice = ChoiceDef {
            value: "a1".to_string(),
            label: "A one".to_string(),
            attributes: BTreeMap::from([("level1".to_string(), "a".to_string())]),
        };
        assert_eq!(choice_attribute(&choice, "level1"), Value::text("a"));
        assert_eq!(choice_attribute(&choice, "name"), Value::text("a1"));
        assert_eq!(choice_attribute(&choice, "label"), Value::text("A one"));
        assert_eq!(choice_attribute(&choice, "missing"), Value::Empty);
    }
}
