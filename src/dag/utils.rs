//! Graph traversal helpers.

use super::graph::{Graph, GraphError};
use super::node::NodeId;
use std::collections::HashSet;

/// Returns `true` if following parents from some node revisits it.
///
/// Iterative depth-first search with explicit `visited` / `on_stack`
/// marks, so deep graphs cannot overflow the call stack. O(V + E).
///
/// # Examples
///
/// ```
/// use u_graphevo::dag::{graph_has_cycle, Graph, NodeSpec};
///
/// let cyclic = Graph::from_specs(vec![
///     NodeSpec::new("a", vec![1]),
///     NodeSpec::new("b", vec![0]),
/// ]).unwrap();
/// assert!(graph_has_cycle(&cyclic));
/// ```
pub fn graph_has_cycle(graph: &Graph) -> bool {
    let index = graph.index_map();
    let nodes = graph.nodes();
    let n = nodes.len();
    let mut visited = vec![false; n];
    let mut on_stack = vec![false; n];
    // (node index, position of the next parent to explore)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        on_stack[start] = true;
        stack.push((start, 0));

        while let Some(top) = stack.last_mut() {
            let (cur, pos) = *top;
            let parents = nodes[cur].nodes_from();
            if pos == parents.len() {
                on_stack[cur] = false;
                stack.pop();
                continue;
            }
            top.1 += 1;
            let Some(&pi) = index.get(&parents[pos]) else {
                continue;
            };
            if on_stack[pi] {
                return true;
            }
            if !visited[pi] {
                visited[pi] = true;
                on_stack[pi] = true;
                stack.push((pi, 0));
            }
        }
    }
    false
}

/// Length of the longest chain from `id` down to a primary node, counted
/// in nodes. `None` if the node is missing or its ancestry is cyclic.
pub fn node_depth(graph: &Graph, id: NodeId) -> Option<usize> {
    let node = graph.node(id)?;
    let mut depth = 1;
    let mut layer: Vec<NodeId> = node.nodes_from().to_vec();
    while !layer.is_empty() {
        depth += 1;
        // a chain longer than the node count must revisit a node
        if depth > graph.length() {
            return None;
        }
        let mut next: Vec<NodeId> = Vec::new();
        for parent in &layer {
            if let Some(p) = graph.node(*parent) {
                for gp in p.nodes_from() {
                    if !next.contains(gp) {
                        next.push(*gp);
                    }
                }
            }
        }
        layer = next;
    }
    Some(depth)
}

/// Number of child hops from `id` to a root, following first children.
/// `None` on a cyclic graph or a missing node.
pub fn distance_to_root_level(graph: &Graph, id: NodeId) -> Option<usize> {
    if !graph.contains(id) || graph_has_cycle(graph) {
        return None;
    }
    let mut height = 0;
    let mut current = id;
    while let Some(&child) = graph.node_children(current).first() {
        height += 1;
        current = child;
    }
    Some(height)
}

/// Number of parent hops from `id` to its farthest primary node.
pub fn distance_to_primary_level(graph: &Graph, id: NodeId) -> Option<usize> {
    node_depth(graph, id).map(|d| d - 1)
}

/// Nodes exactly `layer` parent hops away from the roots (0 = roots).
///
/// A node reachable at that distance through several paths is listed once.
pub fn nodes_from_layer(graph: &Graph, layer: usize) -> Vec<NodeId> {
    let mut current = graph.root_nodes();
    for _ in 0..layer {
        let mut next: Vec<NodeId> = Vec::new();
        for id in &current {
            if let Some(node) = graph.node(*id) {
                for p in node.nodes_from() {
                    if !next.contains(p) {
                        next.push(*p);
                    }
                }
            }
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

/// `id` followed by its ancestry in depth-first order, each node once.
///
/// Fails with [`GraphError::Cyclic`] when a node is met again on its own
/// ancestry path.
pub fn ordered_subnodes_hierarchy(graph: &Graph, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
    let node = graph.node(id).ok_or(GraphError::NodeNotFound(id))?;
    let mut started: HashSet<NodeId> = HashSet::from([id]);
    let mut finished: HashSet<NodeId> = HashSet::new();
    let mut order = vec![id];
    // (node, position of the next parent to explore)
    let mut stack: Vec<(NodeId, usize)> = vec![(node.uid(), 0)];

    while let Some(top) = stack.last_mut() {
        let (cur, pos) = *top;
        let parents = graph.node(cur).map(|n| n.nodes_from()).unwrap_or(&[]);
        if pos == parents.len() {
            finished.insert(cur);
            stack.pop();
            continue;
        }
        top.1 += 1;
        let parent = parents[pos];
        if finished.contains(&parent) {
            continue;
        }
        if !started.insert(parent) {
            return Err(GraphError::Cyclic);
        }
        order.push(parent);
        stack.push((parent, 0));
    }
    Ok(order)
}
