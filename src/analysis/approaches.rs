//! Perturbation approaches applied to single nodes or edges.

use crate::dag::{Graph, NodeId, ReconnectType};
use crate::fitness::{Evaluate, Fitness};
use crate::operators::NodeFactory;
use crate::random::create_rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Part of a graph under analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entity {
    Node(NodeId),
    Edge { parent: NodeId, child: NodeId },
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Node(id) => write!(f, "{id}"),
            Entity::Edge { parent, child } => write!(f, "{parent}->{child}"),
        }
    }
}

/// One evaluated variant of the analyzed graph.
#[derive(Debug, Clone)]
pub struct Perturbation {
    /// Name of the approach that produced it.
    pub approach: &'static str,
    pub entity: Entity,
    /// What was done, e.g. `delete` or the replacement's description.
    pub variant: String,
    pub graph: Graph,
    pub fitness: Fitness,
}

impl Perturbation {
    /// Per-metric gain over `original` in minimization form: positive
    /// means the perturbed graph is better. Failed or incomparable
    /// evaluations score `-inf` everywhere.
    pub fn improvement(&self, original: &Fitness) -> Vec<f64> {
        if !self.fitness.is_valid() || !original.is_valid() || !self.fitness.is_comparable(original) {
            return vec![f64::NEG_INFINITY; original.len()];
        }
        original
            .values()
            .iter()
            .zip(self.fitness.values())
            .map(|(o, p)| o - p)
            .collect()
    }
}

/// A way of perturbing a graph around one entity.
///
/// Implementors only describe the perturbed graphs; [`analyze`] scores
/// them. Approaches that do not apply to an entity return no variants.
///
/// [`analyze`]: AnalyzeApproach::analyze
pub trait AnalyzeApproach: Send + Sync {
    fn name(&self) -> &'static str;

    /// Labelled perturbed copies of `graph`.
    fn perturb(&self, graph: &Graph, entity: Entity) -> Vec<(String, Graph)>;

    /// Evaluates every acyclic, non-empty perturbation.
    fn analyze(&self, graph: &Graph, entity: Entity, evaluator: &dyn Evaluate) -> Vec<Perturbation> {
        self.perturb(graph, entity)
            .into_iter()
            .filter(|(_, g)| !g.is_empty() && !g.has_cycle())
            .map(|(variant, g)| Perturbation {
                approach: self.name(),
                entity,
                fitness: evaluator.evaluate(&g),
                variant,
                graph: g,
            })
            .collect()
    }
}

/// Removes a non-root node, handing its parents to a single child.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeDeletion;

impl AnalyzeApproach for NodeDeletion {
    fn name(&self) -> &'static str {
        "node-deletion"
    }

    fn perturb(&self, graph: &Graph, entity: Entity) -> Vec<(String, Graph)> {
        let Entity::Node(id) = entity else {
            return Vec::new();
        };
        if !graph.contains(id) || graph.node_children(id).is_empty() {
            return Vec::new();
        }
        let mut g = graph.clone();
        match g.delete_node(id, ReconnectType::Single) {
            Ok(()) => vec![("delete".to_string(), g)],
            Err(_) => Vec::new(),
        }
    }
}

/// Swaps a node's content for alternatives from a [`NodeFactory`].
#[derive(Debug, Clone)]
pub struct NodeReplacement<F> {
    factory: F,
    candidates: usize,
    seed: u64,
}

impl<F: NodeFactory> NodeReplacement<F> {
    /// Tries up to `candidates` distinct replacements per node. Draws are
    /// seeded per node, so results do not depend on scheduling.
    pub fn new(factory: F, candidates: usize, seed: u64) -> Self {
        Self {
            factory,
            candidates: candidates.max(1),
            seed,
        }
    }
}

impl<F: NodeFactory> AnalyzeApproach for NodeReplacement<F> {
    fn name(&self) -> &'static str {
        "node-replacement"
    }

    fn perturb(&self, graph: &Graph, entity: Entity) -> Vec<(String, Graph)> {
        let Entity::Node(id) = entity else {
            return Vec::new();
        };
        let Some(node) = graph.node(id) else {
            return Vec::new();
        };
        let mut rng = create_rng(self.seed ^ id.0);
        let mut labels: Vec<String> = Vec::new();
        let mut out = Vec::new();
        for _ in 0..self.candidates * 3 {
            if out.len() >= self.candidates {
                break;
            }
            let Some(content) = self.factory.exchange_node(node.content(), &mut rng) else {
                break;
            };
            let label = content.description();
            if labels.contains(&label) {
                continue;
            }
            let mut g = graph.clone();
            if g.update_node(id, content).is_ok() {
                labels.push(label.clone());
                out.push((label, g));
            }
        }
        out
    }
}

/// Removes an edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDeletion;

impl AnalyzeApproach for EdgeDeletion {
    fn name(&self) -> &'static str {
        "edge-deletion"
    }

    fn perturb(&self, graph: &Graph, entity: Entity) -> Vec<(String, Graph)> {
        let Entity::Edge { parent, child } = entity else {
            return Vec::new();
        };
        let mut g = graph.clone();
        if g.disconnect_nodes(parent, child) {
            vec![("delete".to_string(), g)]
        } else {
            Vec::new()
        }
    }
}

/// Moves the parent end of an edge to other nodes.
#[derive(Debug, Clone, Copy)]
pub struct EdgeReplacement {
    candidates: usize,
    seed: u64,
}

impl EdgeReplacement {
    pub fn new(candidates: usize, seed: u64) -> Self {
        Self {
            candidates: candidates.max(1),
            seed,
        }
    }
}

impl AnalyzeApproach for EdgeReplacement {
    fn name(&self) -> &'static str {
        "edge-replacement"
    }

    fn perturb(&self, graph: &Graph, entity: Entity) -> Vec<(String, Graph)> {
        let Entity::Edge { parent, child } = entity else {
            return Vec::new();
        };
        let Some(child_node) = graph.node(child) else {
            return Vec::new();
        };
        if !child_node.nodes_from().contains(&parent) {
            return Vec::new();
        }
        // new parents must not already feed the child nor descend from it
        let eligible: Vec<NodeId> = graph
            .node_ids()
            .into_iter()
            .filter(|&p| {
                p != child
                    && !child_node.nodes_from().contains(&p)
                    && !graph.is_ancestor(child, p)
            })
            .collect();

        let mut rng = create_rng(self.seed ^ parent.0.rotate_left(32) ^ child.0);
        eligible
            .choose_multiple(&mut rng, self.candidates)
            .filter_map(|&p| {
                let mut g = graph.clone();
                g.disconnect_nodes(parent, child);
                g.connect_nodes(p, child).ok()?;
                Some((format!("{p}->{child}"), g))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::DefaultNodeFactory;

    /// x -> a -> b -> c
    fn chain() -> (Graph, Vec<NodeId>) {
        let mut g = Graph::new();
        let mut ids = vec![g.add_node("x")];
        for name in ["a", "b", "c"] {
            let prev = *ids.last().unwrap();
            ids.push(g.add_node_with_parents(name, &[prev]).unwrap());
        }
        (g, ids)
    }

    #[test]
    fn test_entity_display() {
        assert_eq!(Entity::Node(NodeId(3)).to_string(), "#3");
        let edge = Entity::Edge {
            parent: NodeId(1),
            child: NodeId(2),
        };
        assert_eq!(edge.to_string(), "#1->#2");
    }

    #[test]
    fn test_node_deletion_skips_roots() {
        let (g, ids) = chain();
        assert!(NodeDeletion.perturb(&g, Entity::Node(ids[3])).is_empty());
        let out = NodeDeletion.perturb(&g, Entity::Node(ids[1]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1.descriptive_id(), "((/n_x;)/n_b;)/n_c");
    }

    #[test]
    fn test_node_replacement_variants_distinct() {
        let (g, ids) = chain();
        let approach = NodeReplacement::new(DefaultNodeFactory::new(["x"], ["a", "b", "c", "d"]), 3, 1);
        let out = approach.perturb(&g, Entity::Node(ids[2]));
        assert!(!out.is_empty() && out.len() <= 3);
        let mut labels: Vec<&str> = out.iter().map(|(l, _)| l.as_str()).collect();
        labels.dedup();
        assert_eq!(labels.len(), out.len());
        assert!(out.iter().all(|(l, _)| l != "n_b"));
        assert!(out.iter().all(|(_, g)| g.length() == 4));
    }

    #[test]
    fn test_edge_deletion() {
        let (g, ids) = chain();
        let edge = Entity::Edge {
            parent: ids[1],
            child: ids[2],
        };
        let out = EdgeDeletion.perturb(&g, edge);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1.root_nodes().len(), 2);
        let missing = Entity::Edge {
            parent: ids[0],
            child: ids[3],
        };
        assert!(EdgeDeletion.perturb(&g, missing).is_empty());
    }

    #[test]
    fn test_edge_replacement_stays_acyclic() {
        let (g, ids) = chain();
        let edge = Entity::Edge {
            parent: ids[1],
            child: ids[2],
        };
        let out = EdgeReplacement::new(5, 0).perturb(&g, edge);
        // only x can feed b without a cycle
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, format!("{}->{}", ids[0], ids[2]));
        assert!(!out[0].1.has_cycle());
    }

    #[test]
    fn test_improvement_sign() {
        let p = Perturbation {
            approach: "test",
            entity: Entity::Node(NodeId(0)),
            variant: String::new(),
            graph: Graph::new(),
            fitness: Fitness::single(1.0, -1.0),
        };
        assert_eq!(p.improvement(&Fitness::single(3.0, -1.0)), vec![2.0]);
        let failed = Perturbation {
            fitness: Fitness::invalid(&[-1.0], f64::INFINITY),
            ..p
        };
        assert_eq!(failed.improvement(&Fitness::single(3.0, -1.0)), vec![f64::NEG_INFINITY]);
    }
}
