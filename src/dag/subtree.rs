//! Structurally equivalent subtrees between two graphs.
//!
//! Used by one-point crossover to find exchange points that keep both
//! parents' shapes compatible.

use super::graph::Graph;
use super::node::NodeId;
use std::collections::HashMap;

/// Pairs `(node_in_a, node_in_b)` whose induced subtrees (the node plus
/// its whole ancestry) are isomorphic under node content.
///
/// Subtree signatures are the per-node descriptive ids, memoized once per
/// graph. With `with_primary_nodes = false`, pairs of primary nodes are
/// left out so that only internal subtrees are exchanged.
///
/// # Examples
///
/// ```
/// use u_graphevo::dag::{equivalent_subtree, Graph};
///
/// let mut a = Graph::new();
/// let x = a.add_node("x");
/// let y = a.add_node_with_parents("y", &[x]).unwrap();
/// a.add_node_with_parents("out", &[y]).unwrap();
///
/// let mut b = Graph::new();
/// let bx = b.add_node("x");
/// let by = b.add_node_with_parents("y", &[bx]).unwrap();
///
/// assert_eq!(equivalent_subtree(&a, &b, false), vec![(y, by)]);
/// assert_eq!(equivalent_subtree(&a, &b, true).len(), 2);
/// ```
pub fn equivalent_subtree(a: &Graph, b: &Graph, with_primary_nodes: bool) -> Vec<(NodeId, NodeId)> {
    let ids_a = a.node_descriptive_ids();
    let ids_b = b.node_descriptive_ids();

    let mut by_signature: HashMap<&str, Vec<NodeId>> = HashMap::new();
    for node in b.nodes() {
        if !with_primary_nodes && node.is_primary() {
            continue;
        }
        if let Some(sig) = ids_b.get(&node.uid()) {
            by_signature.entry(sig.as_str()).or_default().push(node.uid());
        }
    }

    let mut pairs = Vec::new();
    for node in a.nodes() {
        if !with_primary_nodes && node.is_primary() {
            continue;
        }
        let Some(sig) = ids_a.get(&node.uid()) else {
            continue;
        };
        if let Some(matches) = by_signature.get(sig.as_str()) {
            pairs.extend(matches.iter().map(|&m| (node.uid(), m)));
        }
    }
    pairs
}
