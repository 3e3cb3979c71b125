//! Subtree-exchange crossover.

use super::types::{CrossoverKind, GraphConstraints, MutationError};
use crate::dag::{equivalent_subtree, nodes_from_layer, Graph, GraphError, NodeId};
use rand::seq::IndexedRandom;
use rand::Rng;

/// Swaps the subtree rooted at `n1` in `g1` with the one rooted at `n2` in
/// `g2`.
///
/// Each side is only replaced if its resulting depth stays within
/// `max_depth`; otherwise that graph is left untouched. Returns which side
/// changed.
pub fn replace_subtrees(
    g1: &mut Graph,
    g2: &mut Graph,
    n1: NodeId,
    n2: NodeId,
    max_depth: usize,
) -> Result<(bool, bool), GraphError> {
    let mut new1 = g1.clone();
    new1.update_subtree(n1, g2, n2)?;
    let mut new2 = g2.clone();
    new2.update_subtree(n2, g1, n1)?;

    let apply1 = new1.depth() <= max_depth;
    let apply2 = new2.depth() <= max_depth;
    if apply1 {
        *g1 = new1;
    }
    if apply2 {
        *g2 = new2;
    }
    Ok((apply1, apply2))
}

/// Produces two offspring from two parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossoverEngine {
    pub constraints: GraphConstraints,
    pub max_attempts: usize,
}

impl CrossoverEngine {
    pub fn new(constraints: GraphConstraints, max_attempts: usize) -> Self {
        Self {
            constraints,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns `(child_a, child_b)`. An offspring that breaks the
    /// constraints falls back to a copy of its parent; the call fails when
    /// no attempt changes either graph.
    pub fn crossover<R: Rng>(
        &self,
        kind: CrossoverKind,
        a: &Graph,
        b: &Graph,
        rng: &mut R,
    ) -> Result<(Graph, Graph), MutationError> {
        let one_point_pairs = match kind {
            CrossoverKind::OnePoint => {
                let pairs: Vec<(NodeId, NodeId)> = equivalent_subtree(a, b, true)
                    .into_iter()
                    .filter(|&(na, nb)| {
                        !a.node_children(na).is_empty() && !b.node_children(nb).is_empty()
                    })
                    .collect();
                if pairs.is_empty() {
                    return Err(MutationError::NoEligibleSite(kind.name()));
                }
                pairs
            }
            CrossoverKind::Subtree => Vec::new(),
        };

        for _ in 0..self.max_attempts {
            let point = match kind {
                CrossoverKind::Subtree => random_layer_node(a, rng).zip(random_layer_node(b, rng)),
                CrossoverKind::OnePoint => one_point_pairs.choose(rng).and_then(|&(na, nb)| {
                    let ca = *a.node_children(na).choose(rng)?;
                    let cb = *b.node_children(nb).choose(rng)?;
                    Some((ca, cb))
                }),
            };
            let Some((na, nb)) = point else {
                return Err(MutationError::NoEligibleSite(kind.name()));
            };

            let (mut child_a, mut child_b) = (a.clone(), b.clone());
            replace_subtrees(&mut child_a, &mut child_b, na, nb, self.constraints.max_depth)?;
            if self.constraints.check(&child_a).is_err() {
                child_a = a.clone();
            }
            if self.constraints.check(&child_b).is_err() {
                child_b = b.clone();
            }
            if child_a != *a || child_b != *b {
                return Ok((child_a, child_b));
            }
        }
        Err(MutationError::AttemptsExhausted {
            kind: kind.name(),
            attempts: self.max_attempts,
        })
    }
}

/// A random node from a random layer (0 = roots).
fn random_layer_node<R: Rng>(graph: &Graph, rng: &mut R) -> Option<NodeId> {
    let depth = graph.depth();
    if depth == 0 {
        return None;
    }
    let layer = rng.random_range(0..depth);
    nodes_from_layer(graph, layer).choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::create_rng;

    fn chain(names: &[&str]) -> Graph {
        let mut g = Graph::new();
        let mut prev = g.add_node(names[0]);
        for name in &names[1..] {
            prev = g.add_node_with_parents(*name, &[prev]).unwrap();
        }
        g
    }

    #[test]
    fn test_replace_subtrees_respects_max_depth() {
        let mut g1 = chain(&["x", "add", "scale"]);
        let mut g2 = chain(&["p", "q"]);
        let original = g1.clone();
        let n1 = nodes_from_layer(&g1, g1.depth() - 1)[0];
        let n2 = nodes_from_layer(&g2, 0)[0];

        let changed = replace_subtrees(&mut g1, &mut g2, n1, n2, 3).unwrap();
        assert_eq!(changed, (false, true));
        assert_eq!(g1, original);
        assert!(g1.depth() <= 3);
        assert_eq!(g2.descriptive_id(), "/n_x");
    }

    #[test]
    fn test_replace_subtrees_swaps_both() {
        let mut g1 = chain(&["x", "add", "out"]);
        let mut g2 = chain(&["y", "mul", "out"]);
        let n1 = g1.node_ids()[1];
        let n2 = g2.node_ids()[1];
        assert_eq!(replace_subtrees(&mut g1, &mut g2, n1, n2, 5).unwrap(), (true, true));
        assert_eq!(g1.descriptive_id(), "((/n_y;)/n_mul;)/n_out");
        assert_eq!(g2.descriptive_id(), "((/n_x;)/n_add;)/n_out");
    }

    #[test]
    fn test_one_point_swaps_above_common_part() {
        let a = chain(&["x", "add", "scale"]);
        let b = chain(&["x", "mul", "out"]);
        let engine = CrossoverEngine::new(GraphConstraints::default(), 5);
        let mut rng = create_rng(3);
        let (ca, cb) = engine.crossover(CrossoverKind::OnePoint, &a, &b, &mut rng).unwrap();
        assert_eq!(ca.descriptive_id(), "((/n_x;)/n_mul;)/n_scale");
        assert_eq!(cb.descriptive_id(), "((/n_x;)/n_add;)/n_out");
    }

    #[test]
    fn test_one_point_without_common_part() {
        let a = chain(&["x", "add"]);
        let b = chain(&["y", "mul"]);
        let engine = CrossoverEngine::new(GraphConstraints::default(), 5);
        let mut rng = create_rng(3);
        assert_eq!(
            engine.crossover(CrossoverKind::OnePoint, &a, &b, &mut rng),
            Err(MutationError::NoEligibleSite("one-point"))
        );
    }

    #[test]
    fn test_subtree_crossover_offspring_are_valid() {
        let a = chain(&["x", "add", "scale", "out"]);
        let b = chain(&["y", "mul", "relu"]);
        let constraints = GraphConstraints::default();
        let engine = CrossoverEngine::new(constraints, 10);
        let mut rng = create_rng(17);
        for _ in 0..20 {
            if let Ok((ca, cb)) = engine.crossover(CrossoverKind::Subtree, &a, &b, &mut rng) {
                assert!(constraints.check(&ca).is_ok());
                assert!(constraints.check(&cb).is_ok());
                assert!(ca != a || cb != b);
            }
        }
    }
}
