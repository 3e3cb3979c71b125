//! Initial population construction.

use crate::dag::{Graph, NodeId};
use crate::operators::{GraphConstraints, MutationEngine, MutationKind, NodeFactory};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;

/// Builds up to `pop_size` distinct valid graphs.
///
/// Supplied graphs are deduplicated and checked against `constraints`;
/// the pool is then topped up with mutated variants of them. Without any
/// usable supplied graph, random graphs of at most `start_depth` levels
/// are drawn from the factory instead.
pub struct InitialPopulationBuilder<'a, F: NodeFactory> {
    factory: &'a F,
    constraints: GraphConstraints,
    start_depth: usize,
    max_attempts: usize,
}

impl<'a, F: NodeFactory> InitialPopulationBuilder<'a, F> {
    pub fn new(factory: &'a F, constraints: GraphConstraints, start_depth: usize, max_attempts: usize) -> Self {
        Self {
            factory,
            constraints,
            start_depth: start_depth.clamp(1, constraints.max_depth.max(1)),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn build<R: Rng>(&self, initial: &[Graph], pop_size: usize, rng: &mut R) -> Vec<Graph> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut pool: Vec<Graph> = Vec::new();

        for graph in initial {
            if pool.len() >= pop_size {
                break;
            }
            if let Err(violation) = self.constraints.check(graph) {
                log::warn!("initial graph {} skipped: {violation}", graph.descriptive_id());
                continue;
            }
            if seen.insert(graph.descriptive_id().to_string()) {
                pool.push(graph.clone());
            }
        }

        let budget = pop_size * self.max_attempts;
        if pool.is_empty() {
            for _ in 0..budget {
                if pool.len() >= pop_size {
                    break;
                }
                let Some(graph) = random_graph(self.factory, &self.constraints, self.start_depth, rng) else {
                    continue;
                };
                if self.constraints.check(&graph).is_ok() && seen.insert(graph.descriptive_id().to_string()) {
                    pool.push(graph);
                }
            }
            return pool;
        }

        let engine = MutationEngine::new(self.constraints, self.max_attempts);
        let n_seeds = pool.len();
        for _ in 0..budget {
            if pool.len() >= pop_size {
                break;
            }
            let base = &pool[rng.random_range(0..n_seeds)];
            let Some(&kind) = MutationKind::ALL.choose(rng) else {
                break;
            };
            match engine.mutate(base, kind, self.factory, rng) {
                Ok(graph) => {
                    if seen.insert(graph.descriptive_id().to_string()) {
                        pool.push(graph);
                    }
                }
                Err(err) => log::trace!("initial variant skipped: {err}"),
            }
        }
        pool
    }
}

/// Grows a random graph downwards from a single root.
///
/// Nodes above the last level get between one and `max_arity` parents,
/// each of which stops growing with probability one half. Growth also
/// stops at `max_size` nodes.
pub fn random_graph<F: NodeFactory, R: Rng>(
    factory: &F,
    constraints: &GraphConstraints,
    max_depth: usize,
    rng: &mut R,
) -> Option<Graph> {
    let mut graph = Graph::new();
    let root_is_primary = max_depth <= 1;
    let root = graph.add_node(factory.get_node(root_is_primary, rng)?);
    if root_is_primary {
        return Some(graph);
    }

    // (node, level of the node with the root at 1)
    let mut stack: Vec<(NodeId, usize)> = vec![(root, 1)];
    while let Some((child, level)) = stack.pop() {
        let n_parents = rng.random_range(1..=constraints.max_arity.max(1));
        for _ in 0..n_parents {
            if graph.length() >= constraints.max_size {
                return Some(graph);
            }
            let is_primary = level + 1 >= max_depth || rng.random_bool(0.5);
            let Some(content) = factory.get_node(is_primary, rng) else {
                continue;
            };
            let parent = graph.add_node(content);
            // a fresh node has no ancestors, so no cycle can form
            if graph.connect_nodes(parent, child).is_err() {
                continue;
            }
            if !is_primary {
                stack.push((parent, level + 1));
            }
        }
    }
    Some(graph)
}
