// crates/form-engine-core/src/runtime/graph.rs
// ============================================================================
// Module: Dependency Graph
// Description: Static read/write analysis, topological ranking, cycle checks.
// Purpose: Order binding evaluation and index dependents per node.
// Dependencies: crate::{core, runtime::compile}
// ============================================================================

//! ## Overview
//! The graph is built once per compiled form. Each binding reads the nodes
//! its expression references and writes according to its slot:
//! - `relevance` writes the whole subtree of its target;
//! - `calculate` and `choice_filter` write their target;
//! - every other slot writes nothing readable.
//!
//! An edge `B1 -> B2` exists when a write of `B1` is read by `B2`, and from a
//! relevance binding to every other binding targeting its subtree. Ranks come
//! from Kahn's algorithm with ties broken by document order; leftovers mean a
//! cycle, reported with its chain.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::BindingId;
use crate::core::BindingSlot;
use crate::core::DataTree;
use crate::core::FormDefinitionError;
use crate::core::NodeId;
use crate::runtime::compile::Binding;

// ============================================================================
// SECTION: Dependency Graph
// ============================================================================

/// Static dependency graph over compiled bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Bindings reading each node.
    readers: Vec<Vec<BindingId>>,
    /// Bindings targeting each node.
    targeting: Vec<Vec<BindingId>>,
    /// Topological rank per binding.
    rank: Vec<usize>,
    /// Bindings in rank order.
    order: Vec<BindingId>,
}

impl DependencyGraph {
    /// Builds the graph and rejects cycles.
    ///
    /// # Errors
    /// Returns [`FormDefinitionError::CyclicDependency`] when bindings depend
    /// on each other in a cycle.
    pub fn build(tree: &DataTree, bindings: &[Binding]) -> Result<Self, FormDefinitionError> {
        let mut readers = vec![Vec::new(); tree.len()];
        let mut targeting = vec![Vec::new(); tree.len()];
        for binding in bindings {
            targeting[binding.target.index()].push(binding.id);
            for node in &binding.reads {
                readers[node.index()].push(binding.id);
            }
        }

        let mut edges: Vec<BTreeSet<BindingId>> = vec![BTreeSet::new(); bindings.len()];
        for binding in bindings {
            let out = &mut edges[binding.id.index()];
            for node in writes(tree, binding) {
                out.extend(readers[node.index()].iter().copied());
                if binding.slot == BindingSlot::Relevance {
                    out.extend(targeting[node.index()].iter().copied());
                }
            }
            // A relevance binding may read inside its own subtree; it is
            // evaluated once per pass, so the self-edge is not a cycle.
            if binding.slot == BindingSlot::Relevance {
                out.remove(&binding.id);
            }
        }
        let dependents: Vec<Vec<BindingId>> =
            edges.into_iter().map(|set| set.into_iter().collect()).collect();

        let order = topological_order(&dependents).map_err(|cycle| {
            FormDefinitionError::CyclicDependency {
                chain: cycle
                    .iter()
                    .map(|id| {
                        let binding = &bindings[id.index()];
                        format!("{}#{}", tree.node(binding.target).path, binding.slot)
                    })
                    .collect(),
            }
        })?;
        let mut rank = vec![0; bindings.len()];
        for (position, id) in order.iter().enumerate() {
            rank[id.index()] = position;
        }
        Ok(Self {
            readers,
            targeting,
            rank,
            order,
        })
    }

    /// Returns the bindings reading `node`.
    #[must_use]
    pub fn readers(&self, node: NodeId) -> &[BindingId] {
        &self.readers[node.index()]
    }

    /// Returns the bindings targeting `node`.
    #[must_use]
    pub fn targeting(&self, node: NodeId) -> &[BindingId] {
        &self.targeting[node.index()]
    }

    /// Returns the topological rank of a binding.
    #[must_use]
    pub fn rank(&self, binding: BindingId) -> usize {
        self.rank[binding.index()]
    }

    /// Returns every binding in rank order.
    #[must_use]
    pub fn order(&self) -> &[BindingId] {
        &self.order
    }
}

/// Returns the nodes a binding writes.
fn writes(tree: &DataTree, binding: &Binding) -> Vec<NodeId> {
    match binding.slot {
        BindingSlot::Relevance => tree.subtree(binding.target),
        BindingSlot::Calculate | BindingSlot::ChoiceFilter => vec![binding.target],
        BindingSlot::Label
        | BindingSlot::Hint
        | BindingSlot::Constraint
        | BindingSlot::Required
        | BindingSlot::Readonly => Vec::new(),
    }
}

// ============================================================================
// SECTION: Ordering
// ============================================================================

/// Kahn's algorithm; the ready set pops the lowest binding first so ties
/// keep document order.
///
/// Returns the offending cycle, first entry repeated last, when the graph is
/// not acyclic.
fn topological_order(dependents: &[Vec<BindingId>]) -> Result<Vec<BindingId>, Vec<BindingId>> {
    let mut indegree = vec![0usize; dependents.len()];
    for targets in dependents {
        for target in targets {
            indegree[target.index()] += 1;
        }
    }
    let mut ready: BTreeSet<BindingId> = indegree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| BindingId::new(index))
        .collect();
    let mut order = Vec::with_capacity(dependents.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for target in &dependents[next.index()] {
            let degree = &mut indegree[target.index()];
            *degree -= 1;
            if *degree == 0 {
                ready.insert(*target);
            }
        }
    }
    if order.len() == dependents.len() {
        return Ok(order);
    }
    let remaining: Vec<bool> = indegree.iter().map(|degree| *degree > 0).collect();
    Err(find_cycle(dependents, &remaining))
}

/// DFS colour state.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited.
    White,
    /// On the current DFS stack.
    Gray,
    /// Fully explored.
    Black,
}

/// Iterative DFS frame.
struct Frame {
    /// Binding being explored.
    node: BindingId,
    /// Next neighbour position.
    next: usize,
}

/// Finds one cycle among the bindings left over by Kahn's algorithm.
fn find_cycle(dependents: &[Vec<BindingId>], remaining: &[bool]) -> Vec<BindingId> {
    let mut color = vec![Color::White; dependents.len()];
    let mut stack: Vec<BindingId> = Vec::new();
    for start in (0 .. dependents.len()).filter(|index| remaining[*index]).map(BindingId::new) {
        if color[start.index()] != Color::White {
            continue;
        }
        let mut frames = vec![Frame {
            node: start,
            next: 0,
        }];
        stack.push(start);
        color[start.index()] = Color::Gray;
        while let Some(frame) = frames.last_mut() {
            let neighbours = &dependents[frame.node.index()];
            let Some(next) = neighbours.get(frame.next).copied() else {
                color[frame.node.index()] = Color::Black;
                stack.pop();
                frames.pop();
                continue;
            };
            frame.next += 1;
            if !remaining[next.index()] {
                continue;
            }
            match color[next.index()] {
                Color::White => {
                    color[next.index()] = Color::Gray;
                    stack.push(next);
                    frames.push(Frame {
                        node: next,
                        next: 0,
                    });
                }
                Color::Gray => {
                    let begin = stack.iter().position(|id| *id == next).unwrap_or(0);
                    let mut cycle = stack[begin ..].to_vec();
                    cycle.push(next);
                    return cycle;
                }
                Color::Black => {}
            }
        }
    }
    stack
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[usize]) -> Vec<BindingId> {
        raw.iter().copied().map(BindingId::new).collect()
    }

    #[test]
    fn ties_break_in_document_order() {
        let dependents = vec![ids(&[2]), ids(&[]), ids(&[]), ids(&[0])];
        let order = topological_order(&dependents);
        assert_eq!(order, Ok(ids(&[1, 3, 0, 2])));
    }

    #[test]
    fn cycle_chain_repeats_the_entry() {
        let dependents = vec![ids(&[1]), ids(&[2]), ids(&[1])];
        let cycle = topological_order(&dependents);
        assert_eq!(cycle, Err(ids(&[1, 2, 1])));
    }
}
