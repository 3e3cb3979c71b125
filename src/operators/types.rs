//! Operator kinds, edit sites and structural constraints.

use crate::dag::{Graph, GraphError, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Single-parent structural or content edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    /// Perturbs numeric parameters of one node; no structural change.
    ParameterPerturbation,
    /// Inserts a new node as a parent of an existing one.
    AddNode,
    /// Connects two unconnected nodes without creating a cycle.
    AddEdge,
    /// Deletes a non-root node, rewiring a single child to its parents.
    DropNode,
    /// Removes an edge.
    DropEdge,
}

impl MutationKind {
    pub const ALL: [MutationKind; 5] = [
        MutationKind::ParameterPerturbation,
        MutationKind::AddNode,
        MutationKind::AddEdge,
        MutationKind::DropNode,
        MutationKind::DropEdge,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MutationKind::ParameterPerturbation => "parameter-perturbation",
            MutationKind::AddNode => "add-node",
            MutationKind::AddEdge => "add-edge",
            MutationKind::DropNode => "drop-node",
            MutationKind::DropEdge => "drop-edge",
        }
    }
}

/// Two-parent subtree exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrossoverKind {
    /// Swaps subtrees rooted at random nodes of random layers.
    Subtree,
    /// Swaps the subtrees just above a shared (equivalent) substructure.
    OnePoint,
}

impl CrossoverKind {
    pub const ALL: [CrossoverKind; 2] = [CrossoverKind::Subtree, CrossoverKind::OnePoint];

    pub fn name(&self) -> &'static str {
        match self {
            CrossoverKind::Subtree => "replace-subtree",
            CrossoverKind::OnePoint => "one-point",
        }
    }
}

/// Any variation operator the agent can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    Mutation(MutationKind),
    Crossover(CrossoverKind),
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 7] = [
        OperatorKind::Mutation(MutationKind::ParameterPerturbation),
        OperatorKind::Mutation(MutationKind::AddNode),
        OperatorKind::Mutation(MutationKind::AddEdge),
        OperatorKind::Mutation(MutationKind::DropNode),
        OperatorKind::Mutation(MutationKind::DropEdge),
        OperatorKind::Crossover(CrossoverKind::Subtree),
        OperatorKind::Crossover(CrossoverKind::OnePoint),
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::Mutation(kind) => kind.name(),
            OperatorKind::Crossover(kind) => kind.name(),
        }
    }

    pub fn is_crossover(&self) -> bool {
        matches!(self, OperatorKind::Crossover(_))
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an operator applies its edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    Node(NodeId),
    /// An existing edge.
    Edge { parent: NodeId, child: NodeId },
    /// A pair of nodes that may become an edge.
    Pair { parent: NodeId, child: NodeId },
}

/// A structural bound a candidate broke.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("graph has a cycle")]
    Cycle,
    #[error("graph is empty")]
    Empty,
    #[error("depth {depth} exceeds {max}")]
    Depth { depth: usize, max: usize },
    #[error("node {node} has {arity} parents, at most {max} allowed")]
    Arity { node: NodeId, arity: usize, max: usize },
    #[error("{size} nodes exceed {max}")]
    Size { size: usize, max: usize },
}

/// Failure of a single variation attempt. Never fatal for a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("constraint violated: {0}")]
    ConstraintViolation(#[from] Violation),
    #[error("no eligible site for {0}")]
    NoEligibleSite(&'static str),
    #[error("node factory has no candidate content")]
    NoCandidate,
    #[error("{kind} made no valid change in {attempts} attempts")]
    AttemptsExhausted { kind: &'static str, attempts: usize },
}

/// Bounds every candidate graph must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConstraints {
    /// Maximum depth in nodes.
    pub max_depth: usize,
    /// Maximum number of parents per node.
    pub max_arity: usize,
    /// Maximum node count.
    pub max_size: usize,
}

impl Default for GraphConstraints {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_arity: 4,
            max_size: 50,
        }
    }
}

impl GraphConstraints {
    /// Returns the first bound `graph` breaks.
    pub fn check(&self, graph: &Graph) -> Result<(), Violation> {
        if graph.is_empty() {
            return Err(Violation::Empty);
        }
        if graph.has_cycle() {
            return Err(Violation::Cycle);
        }
        if graph.length() > self.max_size {
            return Err(Violation::Size {
                size: graph.length(),
                max: self.max_size,
            });
        }
        let depth = graph.depth();
        if depth > self.max_depth {
            return Err(Violation::Depth {
                depth,
                max: self.max_depth,
            });
        }
        if let Some(node) = graph.nodes().iter().find(|n| n.nodes_from().len() > self.max_arity) {
            return Err(Violation::Arity {
                node: node.uid(),
                arity: node.nodes_from().len(),
                max: self.max_arity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::NodeSpec;

    #[test]
    fn test_operator_names_unique() {
        let mut names: Vec<&str> = OperatorKind::ALL.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), OperatorKind::ALL.len());
        assert_eq!(OperatorKind::Crossover(CrossoverKind::Subtree).to_string(), "replace-subtree");
    }

    #[test]
    fn test_constraints() {
        let c = GraphConstraints {
            max_depth: 2,
            max_arity: 1,
            max_size: 3,
        };
        assert_eq!(c.check(&Graph::new()), Err(Violation::Empty));

        let ok = Graph::from_specs(vec![NodeSpec::new("a", vec![]), NodeSpec::new("b", vec![0])]).unwrap();
        assert!(c.check(&ok).is_ok());

        let deep = Graph::from_specs(vec![
            NodeSpec::new("a", vec![]),
            NodeSpec::new("b", vec![0]),
            NodeSpec::new("c", vec![1]),
        ])
        .unwrap();
        assert_eq!(c.check(&deep), Err(Violation::Depth { depth: 3, max: 2 }));

        let wide = Graph::from_specs(vec![
            NodeSpec::new("a", vec![]),
            NodeSpec::new("b", vec![]),
            NodeSpec::new("c", vec![0, 1]),
        ])
        .unwrap();
        assert!(matches!(c.check(&wide), Err(Violation::Arity { arity: 2, .. })));

        let cyclic = Graph::from_specs(vec![NodeSpec::new("a", vec![1]), NodeSpec::new("b", vec![0])]).unwrap();
        assert_eq!(c.check(&cyclic), Err(Violation::Cycle));
    }
}
