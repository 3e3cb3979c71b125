//! Mutation operators and the bounded-retry engine applying them.

use super::factory::NodeFactory;
use super::types::{GraphConstraints, MutationError, MutationKind, Site};
use crate::dag::{Graph, GraphError, NodeId, ReconnectType};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;

/// Capability set of an operator: where it may act and what it produces.
pub trait Proposal {
    /// Every site the operator could act on in `graph`.
    fn sites(&self, graph: &Graph) -> Vec<Site>;

    /// Applies the edit to a copy of `graph`.
    fn propose<F: NodeFactory, R: Rng>(
        &self,
        graph: &Graph,
        site: Site,
        factory: &F,
        rng: &mut R,
    ) -> Result<Graph, MutationError>;
}

impl Proposal for MutationKind {
    fn sites(&self, graph: &Graph) -> Vec<Site> {
        match self {
            MutationKind::ParameterPerturbation => graph
                .nodes()
                .iter()
                .filter(|n| !n.content().params.is_empty())
                .map(|n| Site::Node(n.uid()))
                .collect(),
            MutationKind::AddNode => graph.node_ids().into_iter().map(Site::Node).collect(),
            MutationKind::AddEdge => {
                let nodes = graph.nodes();
                // parent -> child closes a cycle iff child is an ancestor of parent
                let ancestors: Vec<HashSet<NodeId>> = nodes
                    .iter()
                    .map(|n| graph.ancestors(n.uid()).into_iter().collect())
                    .collect();
                let mut sites = Vec::new();
                for node in nodes {
                    let child = node.uid();
                    for (candidate, candidate_ancestors) in nodes.iter().zip(&ancestors) {
                        let parent = candidate.uid();
                        if parent == child
                            || node.nodes_from().contains(&parent)
                            || candidate_ancestors.contains(&child)
                        {
                            continue;
                        }
                        sites.push(Site::Pair { parent, child });
                    }
                }
                sites
            }
            MutationKind::DropNode => {
                let roots = graph.root_nodes();
                graph
                    .node_ids()
                    .into_iter()
                    .filter(|id| !roots.contains(id))
                    .map(Site::Node)
                    .collect()
            }
            MutationKind::DropEdge => graph
                .get_edges()
                .into_iter()
                .map(|(parent, child)| Site::Edge { parent, child })
                .collect(),
        }
    }

    fn propose<F: NodeFactory, R: Rng>(
        &self,
        graph: &Graph,
        site: Site,
        factory: &F,
        rng: &mut R,
    ) -> Result<Graph, MutationError> {
        let mut candidate = graph.clone();
        match (self, site) {
            (MutationKind::ParameterPerturbation, Site::Node(id)) => {
                let current = graph.node(id).ok_or(GraphError::NodeNotFound(id))?;
                let content = factory
                    .perturb_params(current.content(), rng)
                    .ok_or(MutationError::NoCandidate)?;
                candidate.set_node_content(id, content)?;
            }
            (MutationKind::AddNode, Site::Node(id)) => {
                let parents = graph
                    .node(id)
                    .map(|n| n.nodes_from().to_vec())
                    .unwrap_or_default();
                if !parents.is_empty() && rng.random_bool(0.5) {
                    // splice a new node between `id` and one of its parents
                    let parent = *parents.choose(rng).ok_or(MutationError::NoCandidate)?;
                    let content = factory.get_node(false, rng).ok_or(MutationError::NoCandidate)?;
                    let inserted = candidate.add_node_with_parents(content, &[parent])?;
                    candidate.disconnect_nodes(parent, id);
                    candidate.connect_nodes(inserted, id)?;
                } else {
                    let content = factory.get_node(true, rng).ok_or(MutationError::NoCandidate)?;
                    let inserted = candidate.add_node(content);
                    candidate.connect_nodes(inserted, id)?;
                }
            }
            (MutationKind::AddEdge, Site::Pair { parent, child }) => {
                candidate.connect_nodes(parent, child)?;
            }
            (MutationKind::DropNode, Site::Node(id)) => {
                candidate.delete_node(id, ReconnectType::Single)?;
            }
            (MutationKind::DropEdge, Site::Edge { parent, child }) => {
                candidate.disconnect_nodes(parent, child);
            }
            (kind, _) => return Err(MutationError::NoEligibleSite(kind.name())),
        }
        Ok(candidate)
    }
}

/// Applies mutations with constraint validation and bounded retries.
///
/// Each attempt picks a uniformly random eligible site. An attempt fails
/// when the edit errors, breaks a [`GraphConstraints`] bound, or leaves
/// the structure unchanged; after `max_attempts` failures the mutation is
/// given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationEngine {
    pub constraints: GraphConstraints,
    pub max_attempts: usize,
}

impl MutationEngine {
    pub fn new(constraints: GraphConstraints, max_attempts: usize) -> Self {
        Self {
            constraints,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns a mutated copy of `graph`.
    pub fn mutate<F: NodeFactory, R: Rng>(
        &self,
        graph: &Graph,
        kind: MutationKind,
        factory: &F,
        rng: &mut R,
    ) -> Result<Graph, MutationError> {
        let sites = kind.sites(graph);
        if sites.is_empty() {
            return Err(MutationError::NoEligibleSite(kind.name()));
        }
        for _ in 0..self.max_attempts {
            let Some(&site) = sites.choose(rng) else {
                break;
            };
            let candidate = match kind.propose(graph, site, factory, rng) {
                Ok(candidate) => candidate,
                Err(err) => {
                    log::trace!("{} at {site:?} rejected: {err}", kind.name());
                    continue;
                }
            };
            if let Err(violation) = self.constraints.check(&candidate) {
                log::trace!("{} at {site:?} rejected: {violation}", kind.name());
                continue;
            }
            if candidate.descriptive_id() == graph.descriptive_id() {
                continue;
            }
            return Ok(candidate);
        }
        Err(MutationError::AttemptsExhausted {
            kind: kind.name(),
            attempts: self.max_attempts,
        })
    }
}
