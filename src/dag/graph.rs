//! Arena-backed directed acyclic graph with cycle-safe edit primitives.
//!
//! A [`Graph`] owns its nodes in a vector; edges are parent references
//! (`nodes_from`) stored on each child. Root nodes are the nodes without
//! children, i.e. the outputs of the graph. Primary nodes are the nodes
//! without parents.
//!
//! Every structural or content edit clears the cached descriptive id.
//! Read-only queries never touch it.

use super::node::{push_unique, GraphNode, NodeContent, NodeId};
use super::utils;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

/// Fingerprint emitted for a node revisited on its own ancestry path.
pub const CYCLED_ID: &str = "ID_CYCLED";

/// Errors raised by structural edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("edge {parent} -> {child} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("node {0} does not belong to the graph")]
    NodeNotFound(NodeId),
    #[error("parent index {index} is out of range for {len} nodes")]
    InvalidIndex { index: usize, len: usize },
    #[error("graph contains a cycle")]
    Cyclic,
    #[error("node id {0} is used more than once")]
    DuplicateId(NodeId),
}

/// How the children of a deleted node are rewired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReconnectType {
    /// Children only lose the deleted parent.
    None,
    /// When the node had exactly one child, that child inherits the node's parents.
    #[default]
    Single,
    /// Every child inherits every parent of the node.
    All,
}

/// Raw node description for [`Graph::set_nodes`]: parents are indices into
/// the same spec list.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub content: NodeContent,
    pub parents: Vec<usize>,
}

impl NodeSpec {
    pub fn new(content: impl Into<NodeContent>, parents: Vec<usize>) -> Self {
        Self {
            content: content.into(),
            parents,
        }
    }
}

/// Serializable form of a graph: a flat node list with parent references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub nodes: Vec<NodeRecord>,
}

/// One node of a [`GraphRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub uid: NodeId,
    pub content: NodeContent,
    pub nodes_from: Vec<NodeId>,
}

/// A graph of operation nodes.
///
/// # Examples
///
/// ```
/// use u_graphevo::dag::Graph;
///
/// let mut graph = Graph::new();
/// let a = graph.add_node("a");
/// let b = graph.add_node("b");
/// graph.connect_nodes(a, b).unwrap();
///
/// assert_eq!(graph.depth(), 2);
/// assert_eq!(graph.root_nodes(), vec![b]);
/// assert!(graph.connect_nodes(b, a).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    next_uid: u64,
    descriptive_id: OnceLock<String>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from raw node specs. See [`set_nodes`](Self::set_nodes).
    pub fn from_specs(specs: Vec<NodeSpec>) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        graph.set_nodes(specs)?;
        Ok(graph)
    }

    // ---- read-only accessors ----

    /// All nodes, in arena order.
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Ids of all nodes, in arena order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.uid).collect()
    }

    /// Looks up a node.
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.uid == id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of nodes.
    pub fn length(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes without children, in arena order.
    pub fn root_nodes(&self) -> Vec<NodeId> {
        let with_children: HashSet<NodeId> = self
            .nodes
            .iter()
            .flat_map(|n| n.nodes_from.iter().copied())
            .collect();
        self.nodes
            .iter()
            .map(|n| n.uid)
            .filter(|id| !with_children.contains(id))
            .collect()
    }

    /// The single root, or `None` when the graph is empty or has several roots.
    pub fn root_node(&self) -> Option<&GraphNode> {
        match self.root_nodes().as_slice() {
            [single] => self.node(*single),
            _ => None,
        }
    }

    /// Nodes listing `id` as a parent, in arena order.
    pub fn node_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.nodes_from.contains(&id))
            .map(|n| n.uid)
            .collect()
    }

    /// All edges as `(parent, child)` pairs.
    pub fn get_edges(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes
            .iter()
            .flat_map(|n| n.nodes_from.iter().map(move |&p| (p, n.uid)))
            .collect()
    }

    /// Whether the parent relation contains a cycle.
    pub fn has_cycle(&self) -> bool {
        utils::graph_has_cycle(self)
    }

    /// Longest root-to-primary chain, counted in nodes.
    ///
    /// Returns 0 for an empty graph and for a cyclic one.
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() || self.has_cycle() {
            return 0;
        }
        let index = self.index_map();
        let mut depths = vec![0usize; self.nodes.len()];
        for idx in self.topological_indices().into_iter().rev() {
            let parent_max = self.nodes[idx]
                .nodes_from
                .iter()
                .filter_map(|p| index.get(p))
                .map(|&pi| depths[pi])
                .max()
                .unwrap_or(0);
            depths[idx] = parent_max + 1;
        }
        depths.into_iter().max().unwrap_or(0)
    }

    /// Node ids in topological order: children before their parents, ties
    /// broken by arena position. Nodes trapped in cycles come last.
    pub fn sorted_node_ids(&self) -> Vec<NodeId> {
        self.topological_indices()
            .into_iter()
            .map(|i| self.nodes[i].uid)
            .collect()
    }

    /// Reorders the arena topologically (see [`sorted_node_ids`](Self::sorted_node_ids)).
    ///
    /// Node identity and structure are unchanged, so the descriptive id
    /// cache is kept.
    pub fn sort_nodes(&mut self) {
        let order = self.topological_indices();
        let mut slots: Vec<Option<GraphNode>> = self.nodes.drain(..).map(Some).collect();
        self.nodes = order.into_iter().filter_map(|i| slots[i].take()).collect();
    }

    /// Structural fingerprint of the whole graph.
    ///
    /// Equal for graphs that are isomorphic under node content. Computed
    /// lazily and cached until the next edit.
    pub fn descriptive_id(&self) -> &str {
        self.descriptive_id.get_or_init(|| {
            let ids = self.node_descriptive_ids();
            let mut root_ids: Vec<&String> = self
                .root_nodes()
                .iter()
                .filter_map(|r| ids.get(r))
                .collect();
            root_ids.sort();
            root_ids.into_iter().map(String::as_str).collect()
        })
    }

    /// Fingerprint of the subtree rooted at `id` (the node plus its ancestry).
    pub fn node_descriptive_id(&self, id: NodeId) -> Option<String> {
        let index = self.index_map();
        let idx = *index.get(&id)?;
        if self.has_cycle() {
            let mut on_path = vec![false; self.nodes.len()];
            Some(self.cyclic_node_id(idx, &index, &mut on_path))
        } else {
            self.node_descriptive_ids().remove(&id)
        }
    }

    /// Fingerprints of every node's subtree.
    pub fn node_descriptive_ids(&self) -> HashMap<NodeId, String> {
        let index = self.index_map();
        if self.has_cycle() {
            let mut out = HashMap::with_capacity(self.nodes.len());
            for (idx, node) in self.nodes.iter().enumerate() {
                let mut on_path = vec![false; self.nodes.len()];
                out.insert(node.uid, self.cyclic_node_id(idx, &index, &mut on_path));
            }
            return out;
        }
        let mut ids: Vec<Option<String>> = vec![None; self.nodes.len()];
        for idx in self.topological_indices().into_iter().rev() {
            let parent_ids: Vec<String> = self.nodes[idx]
                .nodes_from
                .iter()
                .filter_map(|p| index.get(p))
                .filter_map(|&pi| ids[pi].clone())
                .collect();
            ids[idx] = Some(compose_node_id(&self.nodes[idx], parent_ids));
        }
        self.nodes
            .iter()
            .zip(ids)
            .filter_map(|(n, id)| id.map(|id| (n.uid, id)))
            .collect()
    }

    /// Serializable snapshot of the structure.
    pub fn to_record(&self) -> GraphRecord {
        GraphRecord {
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeRecord {
                    uid: n.uid,
                    content: n.content.clone(),
                    nodes_from: n.nodes_from.clone(),
                })
                .collect(),
        }
    }

    /// Rebuilds a graph from a record, keeping node ids.
    ///
    /// Rejects duplicate ids, dangling parents and cyclic parent links.
    pub fn from_record(record: &GraphRecord) -> Result<Self, GraphError> {
        let mut known: HashSet<NodeId> = HashSet::with_capacity(record.nodes.len());
        for rec in &record.nodes {
            if !known.insert(rec.uid) {
                return Err(GraphError::DuplicateId(rec.uid));
            }
        }
        let mut nodes = Vec::with_capacity(record.nodes.len());
        for rec in &record.nodes {
            let mut parents = Vec::with_capacity(rec.nodes_from.len());
            for &p in &rec.nodes_from {
                if !known.contains(&p) {
                    return Err(GraphError::NodeNotFound(p));
                }
                push_unique(&mut parents, p);
            }
            nodes.push(GraphNode::new(rec.uid, rec.content.clone(), parents));
        }
        let next_uid = record.nodes.iter().map(|n| n.uid.0 + 1).max().unwrap_or(0);
        let graph = Self {
            nodes,
            next_uid,
            descriptive_id: OnceLock::new(),
        };
        if graph.has_cycle() {
            return Err(GraphError::Cyclic);
        }
        Ok(graph)
    }

    /// Copy of the subtree rooted at `root` with the original node ids.
    pub fn subgraph(&self, root: NodeId) -> Result<Graph, GraphError> {
        self.require(root)?;
        let keep: HashSet<NodeId> = std::iter::once(root).chain(self.ancestors(root)).collect();
        Ok(Graph {
            nodes: self
                .nodes
                .iter()
                .filter(|n| keep.contains(&n.uid))
                .cloned()
                .collect(),
            next_uid: self.next_uid,
            descriptive_id: OnceLock::new(),
        })
    }

    /// Whether `ancestor` is reachable from `id` through the parent relation.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// All nodes reachable from `id` through parents, excluding `id` unless
    /// it lies on a cycle.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let index = self.index_map();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = index
            .get(&id)
            .map(|&i| self.nodes[i].nodes_from.clone())
            .unwrap_or_default();
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            out.push(cur);
            if let Some(&i) = index.get(&cur) {
                stack.extend(self.nodes[i].nodes_from.iter().rev().copied());
            }
        }
        out
    }

    // ---- edits ----

    /// Appends a node without edges.
    pub fn add_node(&mut self, content: impl Into<NodeContent>) -> NodeId {
        let uid = self.alloc_uid();
        self.nodes.push(GraphNode::new(uid, content.into(), Vec::new()));
        self.touch();
        uid
    }

    /// Appends a node wired to existing parents.
    pub fn add_node_with_parents(
        &mut self,
        content: impl Into<NodeContent>,
        parents: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let mut nodes_from = Vec::with_capacity(parents.len());
        for &p in parents {
            self.require(p)?;
            push_unique(&mut nodes_from, p);
        }
        let uid = self.alloc_uid();
        self.nodes.push(GraphNode::new(uid, content.into(), nodes_from));
        self.touch();
        Ok(uid)
    }

    /// Adds the edge `parent -> child`.
    ///
    /// Existing edges are left alone. Fails without modifying the graph if
    /// `child` is `parent` or one of its ancestors.
    pub fn connect_nodes(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        self.require(parent)?;
        let child_idx = self.require(child)?;
        if self.nodes[child_idx].nodes_from.contains(&parent) {
            return Ok(());
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(GraphError::Cycle { parent, child });
        }
        self.nodes[child_idx].nodes_from.push(parent);
        self.touch();
        Ok(())
    }

    /// Removes the edge `parent -> child`. Returns whether it existed.
    pub fn disconnect_nodes(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(child_idx) = self.index_of(child) else {
            return false;
        };
        let parents = &mut self.nodes[child_idx].nodes_from;
        let before = parents.len();
        parents.retain(|&p| p != parent);
        let removed = parents.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Removes a node, rewiring its children per `reconnect`.
    pub fn delete_node(&mut self, id: NodeId, reconnect: ReconnectType) -> Result<(), GraphError> {
        let idx = self.require(id)?;
        let children = self.node_children(id);
        let removed = self.nodes.remove(idx);
        for node in &mut self.nodes {
            node.nodes_from.retain(|&p| p != id);
        }
        let heirs: &[NodeId] = match reconnect {
            ReconnectType::None => &[],
            ReconnectType::Single if children.len() == 1 => &children,
            ReconnectType::Single => &[],
            ReconnectType::All => &children,
        };
        for &child in heirs {
            if let Some(ci) = self.index_of(child) {
                for &p in &removed.nodes_from {
                    if p != child {
                        push_unique(&mut self.nodes[ci].nodes_from, p);
                    }
                }
            }
        }
        self.touch();
        Ok(())
    }

    /// Removes `id` and every ancestor that is reachable only through it.
    ///
    /// Ancestors that another surviving node still reaches stay in place,
    /// with their edges to removed nodes pruned. Returns the removed ids.
    pub fn delete_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.require(id)?;
        let mut candidates: HashSet<NodeId> = self.ancestors(id).into_iter().collect();
        candidates.insert(id);

        let index = self.index_map();
        let mut reached: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = self.root_nodes().into_iter().filter(|&r| r != id).collect();
        while let Some(cur) = stack.pop() {
            if cur == id || !reached.insert(cur) {
                continue;
            }
            if let Some(&i) = index.get(&cur) {
                stack.extend(self.nodes[i].nodes_from.iter().copied());
            }
        }

        let removed: Vec<NodeId> = self
            .nodes
            .iter()
            .map(|n| n.uid)
            .filter(|uid| candidates.contains(uid) && !reached.contains(uid))
            .collect();
        let removed_set: HashSet<NodeId> = removed.iter().copied().collect();
        self.nodes.retain(|n| !removed_set.contains(&n.uid));
        for node in &mut self.nodes {
            node.nodes_from.retain(|p| !removed_set.contains(p));
        }
        self.touch();
        Ok(removed)
    }

    /// Replaces the content of a node in place, keeping its id and edges.
    pub fn set_node_content(&mut self, id: NodeId, content: NodeContent) -> Result<(), GraphError> {
        let idx = self.require(id)?;
        self.nodes[idx].content = content;
        self.touch();
        Ok(())
    }

    /// Puts a new node at the position of `old`, inheriting its parents and
    /// children. Returns the id of the new node.
    pub fn update_node(&mut self, old: NodeId, content: NodeContent) -> Result<NodeId, GraphError> {
        let idx = self.require(old)?;
        let uid = self.alloc_uid();
        let nodes_from = std::mem::take(&mut self.nodes[idx].nodes_from);
        self.nodes[idx] = GraphNode::new(uid, content, nodes_from);
        for node in &mut self.nodes {
            for p in node.nodes_from.iter_mut() {
                if *p == old {
                    *p = uid;
                }
            }
        }
        self.touch();
        Ok(uid)
    }

    /// Replaces the subtree rooted at `old` with a copy of the subtree rooted
    /// at `donor_root` in `donor`. The children of `old` are wired to the
    /// copied root. Returns the new id of the copied root.
    ///
    /// On error the graph is left unchanged.
    pub fn update_subtree(
        &mut self,
        old: NodeId,
        donor: &Graph,
        donor_root: NodeId,
    ) -> Result<NodeId, GraphError> {
        self.require(old)?;
        donor.require(donor_root)?;
        if donor.has_cycle() {
            return Err(GraphError::Cyclic);
        }
        let slots: Vec<(NodeId, usize)> = self
            .nodes
            .iter()
            .filter_map(|n| n.nodes_from.iter().position(|&p| p == old).map(|pos| (n.uid, pos)))
            .collect();

        // edit a copy and commit only once every step succeeded
        let mut next = self.clone();
        next.delete_subtree(old)?;
        let new_root = next.import_subtree(donor, donor_root)?;
        let index = next.index_map();
        for (child, pos) in slots {
            if let Some(&ci) = index.get(&child) {
                let parents = &mut next.nodes[ci].nodes_from;
                if !parents.contains(&new_root) {
                    let at = pos.min(parents.len());
                    parents.insert(at, new_root);
                }
            }
        }
        next.touch();
        *self = next;
        Ok(new_root)
    }

    /// Copies `donor_root` and its ancestry from `donor` into this graph
    /// under fresh ids. Returns the new id of the copied root.
    pub fn import_subtree(&mut self, donor: &Graph, donor_root: NodeId) -> Result<NodeId, GraphError> {
        donor.require(donor_root)?;
        if donor.has_cycle() {
            return Err(GraphError::Cyclic);
        }
        let keep: HashSet<NodeId> = std::iter::once(donor_root)
            .chain(donor.ancestors(donor_root))
            .collect();
        let mut mapping: HashMap<NodeId, NodeId> = HashMap::with_capacity(keep.len());
        for idx in donor.topological_indices().into_iter().rev() {
            let source = &donor.nodes[idx];
            if !keep.contains(&source.uid) {
                continue;
            }
            let uid = self.alloc_uid();
            let nodes_from = source
                .nodes_from
                .iter()
                .filter_map(|p| mapping.get(p).copied())
                .collect();
            self.nodes.push(GraphNode::new(uid, source.content.clone(), nodes_from));
            mapping.insert(source.uid, uid);
        }
        self.touch();
        mapping
            .get(&donor_root)
            .copied()
            .ok_or(GraphError::NodeNotFound(donor_root))
    }

    /// Replaces the whole node list from raw specs.
    ///
    /// No acyclicity check is made, so this is the only way to build a
    /// cyclic structure (e.g. to exercise diagnostics). Duplicate parent
    /// indices are collapsed.
    pub fn set_nodes(&mut self, specs: Vec<NodeSpec>) -> Result<Vec<NodeId>, GraphError> {
        let len = specs.len();
        if let Some(index) = specs
            .iter()
            .flat_map(|s| s.parents.iter().copied())
            .find(|&i| i >= len)
        {
            return Err(GraphError::InvalidIndex { index, len });
        }
        let ids: Vec<NodeId> = (0..len).map(|_| self.alloc_uid()).collect();
        self.nodes = specs
            .into_iter()
            .zip(&ids)
            .map(|(spec, &uid)| {
                let mut nodes_from = Vec::with_capacity(spec.parents.len());
                for i in spec.parents {
                    push_unique(&mut nodes_from, ids[i]);
                }
                GraphNode::new(uid, spec.content, nodes_from)
            })
            .collect();
        self.touch();
        Ok(ids)
    }

    // ---- internals ----

    fn touch(&mut self) {
        self.descriptive_id.take();
    }

    fn alloc_uid(&mut self) -> NodeId {
        let uid = NodeId(self.next_uid);
        self.next_uid += 1;
        uid
    }

    pub(crate) fn index_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.uid == id)
    }

    pub(crate) fn require(&self, id: NodeId) -> Result<usize, GraphError> {
        self.index_of(id).ok_or(GraphError::NodeNotFound(id))
    }

    pub(crate) fn index_map(&self) -> HashMap<NodeId, usize> {
        self.nodes.iter().enumerate().map(|(i, n)| (n.uid, i)).collect()
    }

    /// Kahn's algorithm from the roots towards the primary nodes.
    fn topological_indices(&self) -> Vec<usize> {
        let index = self.index_map();
        let mut child_count = vec![0usize; self.nodes.len()];
        for node in &self.nodes {
            for p in &node.nodes_from {
                if let Some(&pi) = index.get(p) {
                    child_count[pi] += 1;
                }
            }
        }
        let mut ready: BTreeSet<usize> = child_count
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == 0)
            .map(|(i, _)| i)
            .collect();
        let mut placed = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(idx) = ready.pop_first() {
            placed[idx] = true;
            order.push(idx);
            for p in &self.nodes[idx].nodes_from {
                if let Some(&pi) = index.get(p) {
                    child_count[pi] -= 1;
                    if child_count[pi] == 0 {
                        ready.insert(pi);
                    }
                }
            }
        }
        order.extend((0..self.nodes.len()).filter(|&i| !placed[i]));
        order
    }

    fn cyclic_node_id(&self, idx: usize, index: &HashMap<NodeId, usize>, on_path: &mut [bool]) -> String {
        if on_path[idx] {
            return CYCLED_ID.to_string();
        }
        on_path[idx] = true;
        let parent_ids: Vec<String> = self.nodes[idx]
            .nodes_from
            .iter()
            .filter_map(|p| index.get(p))
            .map(|&pi| self.cyclic_node_id(pi, index, on_path))
            .collect();
        on_path[idx] = false;
        compose_node_id(&self.nodes[idx], parent_ids)
    }
}

/// `(<sorted parent ids, each suffixed by ';', joined by ';'>)/<description>`.
fn compose_node_id(node: &GraphNode, parent_ids: Vec<String>) -> String {
    let description = node.content.description();
    if parent_ids.is_empty() {
        return format!("/{description}");
    }
    let mut parts: Vec<String> = parent_ids.into_iter().map(|id| format!("{id};")).collect();
    parts.sort();
    format!("({})/{description}", parts.join(";"))
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.descriptive_id() == other.descriptive_id()
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .sorted_node_ids()
            .into_iter()
            .filter_map(|id| self.node(id))
            .map(GraphNode::name)
            .collect();
        write!(
            f,
            "{{depth: {}, length: {}, nodes: [{}]}}",
            self.depth(),
            self.length(),
            names.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// n1 -> n2, n1 -> n3, {n2, n3} -> n4
    fn diamond() -> (Graph, [NodeId; 4]) {
        let mut g = Graph::new();
        let n1 = g.add_node("n1");
        let n2 = g.add_node_with_parents("n2", &[n1]).unwrap();
        let n3 = g.add_node_with_parents("n3", &[n1]).unwrap();
        let n4 = g.add_node_with_parents("n4", &[n2, n3]).unwrap();
        (g, [n1, n2, n3, n4])
    }

    /// A -> B -> C -> D
    fn path4() -> (Graph, [NodeId; 4]) {
        let mut g = Graph::new();
        let a = g.add_node("A");
        let b = g.add_node_with_parents("B", &[a]).unwrap();
        let c = g.add_node_with_parents("C", &[b]).unwrap();
        let d = g.add_node_with_parents("D", &[c]).unwrap();
        (g, [a, b, c, d])
    }

    /// l3_n1 -> l2_n1; l2_n2 -> l2_n3; {l2_n1, l2_n2, l2_n3} -> l1_n1 -> l0_n1
    fn layered() -> Graph {
        let mut g = Graph::new();
        let l3 = g.add_node("l3_n1");
        let l2a = g.add_node_with_parents("l2_n1", &[l3]).unwrap();
        let l2b = g.add_node("l2_n2");
        let l2c = g.add_node_with_parents("l2_n3", &[l2b]).unwrap();
        let l1 = g.add_node_with_parents("l1_n1", &[l2a, l2b, l2c]).unwrap();
        g.add_node_with_parents("l0_n1", &[l1]).unwrap();
        g
    }

    fn by_name(g: &Graph, name: &str) -> Option<NodeId> {
        g.nodes().iter().find(|n| n.name() == name).map(|n| n.uid())
    }

    fn assert_no_dangling(g: &Graph) {
        for node in g.nodes() {
            for p in node.nodes_from() {
                assert!(g.contains(*p), "{} refers to missing parent {}", node.name(), p);
            }
        }
    }

    #[test]
    fn test_descriptive_id_format() {
        let (g, [.., n4]) = diamond();
        assert_eq!(g.descriptive_id(), "((/n_n1;)/n_n2;;(/n_n1;)/n_n3;)/n_n4");
        assert_eq!(
            g.node_descriptive_id(n4).as_deref(),
            Some("((/n_n1;)/n_n2;;(/n_n1;)/n_n3;)/n_n4")
        );
    }

    #[test]
    fn test_descriptive_id_ignores_insertion_order() {
        let (a, _) = diamond();
        let mut b = Graph::new();
        let n1 = b.add_node("n1");
        let n3 = b.add_node_with_parents("n3", &[n1]).unwrap();
        let n2 = b.add_node_with_parents("n2", &[n1]).unwrap();
        b.add_node_with_parents("n4", &[n3, n2]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_display() {
        let mut g = Graph::new();
        let n1 = g.add_node("n1");
        let n2 = g.add_node("n2");
        let n3 = g.add_node("n3");
        g.add_node_with_parents("n4", &[n1, n2, n3]).unwrap();
        assert_eq!(g.to_string(), "{depth: 2, length: 4, nodes: [n4, n1, n2, n3]}");
    }

    #[test]
    fn test_connect_rejects_cycle() {
        let (mut g, [a, _, _, d]) = path4();
        let before = g.descriptive_id().to_string();
        assert_eq!(g.connect_nodes(d, a), Err(GraphError::Cycle { parent: d, child: a }));
        assert_eq!(g.connect_nodes(a, a), Err(GraphError::Cycle { parent: a, child: a }));
        assert_eq!(g.get_edges().len(), 3);
        assert_eq!(g.descriptive_id(), before);
    }

    #[test]
    fn test_connect_existing_edge_is_noop() {
        let (mut g, [a, b, ..]) = path4();
        g.connect_nodes(a, b).unwrap();
        assert_eq!(g.get_edges().len(), 3);
    }

    #[test]
    fn test_disconnect_idempotent() {
        let (mut g, [a, b, ..]) = path4();
        assert!(g.disconnect_nodes(a, b));
        assert!(!g.disconnect_nodes(a, b));
        assert_eq!(g.get_edges().len(), 2);
        // a lost its only child and became a root
        assert!(g.root_nodes().contains(&a));
    }

    #[test]
    fn test_delete_single_on_path() {
        let (mut g, [a, b, c, _]) = path4();
        assert_eq!(g.get_edges().len(), 3);
        g.delete_node(b, ReconnectType::Single).unwrap();
        let edges = g.get_edges();
        assert_eq!(edges.len(), 2);
        assert!(edges.contains(&(a, c)));
        assert!(!g.contains(b));
    }

    #[test]
    fn test_delete_none_and_all() {
        let (mut g, [n1, n2, ..]) = diamond();
        g.delete_node(n1, ReconnectType::All).unwrap();
        assert_eq!(g.get_edges().len(), 2);
        assert!(g.node(n2).unwrap().is_primary());

        // n1 has two children, so Single does not rewire
        let (mut g, [n1, n2, n3, _]) = diamond();
        g.delete_node(n1, ReconnectType::Single).unwrap();
        assert!(g.node(n2).unwrap().is_primary());
        assert!(g.node(n3).unwrap().is_primary());

        let (mut g, [n1, n2, n3, n4]) = diamond();
        g.delete_node(n2, ReconnectType::All).unwrap();
        assert_eq!(g.node(n4).unwrap().nodes_from(), &[n3, n1]);
    }

    #[test]
    fn test_delete_root_promotes_parents() {
        let mut g = Graph::new();
        let n1 = g.add_node("n1");
        let n2 = g.add_node("n2");
        let n3 = g.add_node_with_parents("n3", &[n1]).unwrap();
        let n4 = g.add_node_with_parents("n4", &[n2, n3]).unwrap();
        assert_eq!(g.root_node().map(GraphNode::uid), Some(n4));
        assert_eq!(g.depth(), 3);

        g.delete_node(n4, ReconnectType::Single).unwrap();
        assert_eq!(g.root_nodes(), vec![n2, n3]);
        assert_eq!(g.depth(), 2);

        g.delete_node(n2, ReconnectType::Single).unwrap();
        assert_eq!(g.root_node().map(GraphNode::uid), Some(n3));
        assert_eq!(g.depth(), 2);
    }

    #[test]
    fn test_delete_leaves_cycle() {
        let mut g = Graph::from_specs(vec![
            NodeSpec::new("n1", vec![3]),
            NodeSpec::new("n2", vec![0]),
            NodeSpec::new("n3", vec![1]),
            NodeSpec::new("n4", vec![2]),
        ])
        .unwrap();
        let ids = g.node_ids();
        assert_eq!(g.get_edges().len(), 4);
        g.delete_node(ids[2], ReconnectType::Single).unwrap();
        assert_eq!(g.get_edges().len(), 3);
        assert!(g.get_edges().contains(&(ids[1], ids[3])));
        assert!(g.has_cycle());
    }

    #[test]
    fn test_delete_breaks_cycle() {
        let mut g = Graph::from_specs(vec![
            NodeSpec::new("n1", vec![3]),
            NodeSpec::new("n2", vec![0]),
            NodeSpec::new("n3", vec![1]),
            NodeSpec::new("n4", vec![2]),
        ])
        .unwrap();
        let ids = g.node_ids();
        g.delete_node(ids[2], ReconnectType::None).unwrap();
        assert_eq!(g.get_edges().len(), 2);
        assert!(g.node(ids[3]).unwrap().is_primary());
        assert!(!g.has_cycle());
    }

    #[test]
    fn test_set_nodes_collapses_duplicates() {
        let g = Graph::from_specs(vec![
            NodeSpec::new("n1", vec![]),
            NodeSpec::new("n2", vec![]),
            NodeSpec::new("n3", vec![1, 0, 1]),
        ])
        .unwrap();
        assert_eq!(g.get_edges().len(), 2);
        assert!(matches!(
            Graph::from_specs(vec![NodeSpec::new("x", vec![4])]),
            Err(GraphError::InvalidIndex { index: 4, len: 1 })
        ));
    }

    #[test]
    fn test_delete_subtree_keeps_shared_ancestor() {
        // n2a -> n2b -> n3, n1 -> n3, n2a -> n3
        let mut g = Graph::new();
        let ok = g.add_node("n1");
        let bad_primary = g.add_node("n2a");
        let bad = g.add_node_with_parents("n2b", &[bad_primary]).unwrap();
        let root = g.add_node_with_parents("n3", &[bad, ok, bad_primary]).unwrap();

        let removed = g.delete_subtree(bad).unwrap();
        assert_eq!(removed, vec![bad]);
        assert!(g.contains(bad_primary));
        assert_eq!(g.node(root).unwrap().nodes_from(), &[ok, bad_primary]);
        assert_no_dangling(&g);
    }

    #[test]
    fn test_delete_subtree_removes_exclusive_ancestry() {
        // n2a -> n2b -> n3 -> n4, n1 -> n3
        let mut g = Graph::new();
        let ok = g.add_node("n1");
        let bad_primary = g.add_node("n2a");
        let bad = g.add_node_with_parents("n2b", &[bad_primary]).unwrap();
        let child = g.add_node_with_parents("n3", &[bad, ok]).unwrap();
        g.add_node_with_parents("n4", &[child]).unwrap();

        let removed = g.delete_subtree(bad).unwrap();
        assert_eq!(removed, vec![bad_primary, bad]);
        assert_eq!(g.node(child).unwrap().nodes_from(), &[ok]);
        assert_eq!(g.length(), 3);
        assert_no_dangling(&g);
    }

    #[test]
    fn test_delete_subtree_of_root() {
        let (mut g, [.., n4]) = diamond();
        g.delete_subtree(n4).unwrap();
        assert!(g.is_empty());
    }

    #[test]
    fn test_update_node_rewires() {
        let mut g = Graph::new();
        let p1 = g.add_node("l1n1");
        let p2 = g.add_node("l1n2");
        let old = g.add_node_with_parents("l2n1", &[p1, p2]).unwrap();
        let root = g.add_node_with_parents("l3n1", &[old]).unwrap();

        let new = g.update_node(old, NodeContent::new("l2new")).unwrap();
        assert!(!g.contains(old));
        assert_eq!(g.node(new).unwrap().nodes_from(), &[p1, p2]);
        assert_eq!(g.node(root).unwrap().nodes_from(), &[new]);
    }

    #[test]
    fn test_update_subtree_replaces_ancestry() {
        let mut g = Graph::new();
        let ok = g.add_node("n1");
        let bad_primary = g.add_node("n2a");
        let bad = g.add_node_with_parents("n2b", &[bad_primary]).unwrap();
        let root = g.add_node_with_parents("n3", &[bad, ok]).unwrap();

        let mut donor = Graph::new();
        let d1 = donor.add_node("n4a");
        let d2 = donor.add_node_with_parents("n4b", &[d1]).unwrap();

        let new_root = g.update_subtree(bad, &donor, d2).unwrap();
        assert!(by_name(&g, "n2a").is_none());
        assert!(by_name(&g, "n2b").is_none());
        assert_eq!(g.node(root).unwrap().nodes_from(), &[new_root, ok]);
        assert_eq!(g.node(new_root).unwrap().name(), "n4b");
        assert_eq!(g.length(), 4);
        assert_no_dangling(&g);
    }

    #[test]
    fn test_read_only_ops_keep_descriptive_id() {
        let g = layered();
        let before = g.descriptive_id().to_string();
        let first = g.node_ids()[0];
        let _ = g.node_children(first);
        let _ = g.get_edges();
        let _ = g.sorted_node_ids();
        let _ = g.depth();
        let _ = g.root_nodes();
        let _ = g.to_string();
        assert_eq!(g.descriptive_id(), before);

        let mut sorted = g.clone();
        sorted.sort_nodes();
        assert_eq!(sorted.descriptive_id(), before);
    }

    #[test]
    fn test_mutating_ops_reset_descriptive_id() {
        let mut g = layered();
        let mut last = g.descriptive_id().to_string();
        let mut assert_changed = |g: &Graph| {
            let now = g.descriptive_id().to_string();
            assert_ne!(now, last);
            last = now;
        };

        let l2_n2 = by_name(&g, "l2_n2").unwrap();
        g.delete_node(l2_n2, ReconnectType::Single).unwrap();
        assert_changed(&g);

        let fresh = g.add_node("fresh");
        assert_changed(&g);

        let l1 = by_name(&g, "l1_n1").unwrap();
        g.connect_nodes(fresh, l1).unwrap();
        assert_changed(&g);

        g.disconnect_nodes(fresh, l1);
        assert_changed(&g);

        let l3 = by_name(&g, "l3_n1").unwrap();
        g.update_node(l3, NodeContent::new("l3_new")).unwrap();
        assert_changed(&g);

        let l2a = by_name(&g, "l2_n1").unwrap();
        g.set_node_content(l2a, NodeContent::new("l2_n1").with_param("k", 1.0))
            .unwrap();
        assert_changed(&g);

        let mut donor = Graph::new();
        donor.add_node("donor");
        let donor_root = donor.node_ids()[0];
        g.update_subtree(l2a, &donor, donor_root).unwrap();
        assert_changed(&g);

        let l2_n3 = by_name(&g, "l2_n3").unwrap();
        g.delete_subtree(l2_n3).unwrap();
        assert_changed(&g);

        g.set_nodes(vec![NodeSpec::new("only", vec![])]).unwrap();
        assert_changed(&g);
    }

    #[test]
    fn test_cyclic_descriptive_id() {
        let g = Graph::from_specs(vec![
            NodeSpec::new("a", vec![1]),
            NodeSpec::new("b", vec![0]),
            NodeSpec::new("c", vec![0]),
        ])
        .unwrap();
        assert!(g.descriptive_id().contains(CYCLED_ID));
        assert_eq!(g.depth(), 0);
    }

    #[test]
    fn test_record_round_trip_keeps_ids() {
        let g = layered();
        let json = serde_json::to_string(&g.to_record()).unwrap();
        let record: GraphRecord = serde_json::from_str(&json).unwrap();
        let restored = Graph::from_record(&record).unwrap();
        assert_eq!(restored, g);
        assert_eq!(restored.node_ids(), g.node_ids());
    }

    #[test]
    fn test_from_record_rejects_unknown_parent() {
        let record = GraphRecord {
            nodes: vec![NodeRecord {
                uid: NodeId(0),
                content: NodeContent::new("x"),
                nodes_from: vec![NodeId(9)],
            }],
        };
        assert_eq!(Graph::from_record(&record).unwrap_err(), GraphError::NodeNotFound(NodeId(9)));
    }

    #[test]
    fn test_from_record_rejects_duplicate_ids() {
        let record = GraphRecord {
            nodes: vec![
                NodeRecord {
                    uid: NodeId(0),
                    content: NodeContent::new("x"),
                    nodes_from: vec![],
                },
                NodeRecord {
                    uid: NodeId(0),
                    content: NodeContent::new("y"),
                    nodes_from: vec![NodeId(0)],
                },
            ],
        };
        assert_eq!(Graph::from_record(&record).unwrap_err(), GraphError::DuplicateId(NodeId(0)));
    }

    #[test]
    fn test_from_record_rejects_cycles() {
        let record = GraphRecord {
            nodes: vec![
                NodeRecord {
                    uid: NodeId(0),
                    content: NodeContent::new("a"),
                    nodes_from: vec![NodeId(1)],
                },
                NodeRecord {
                    uid: NodeId(1),
                    content: NodeContent::new("b"),
                    nodes_from: vec![NodeId(0)],
                },
            ],
        };
        assert_eq!(Graph::from_record(&record).unwrap_err(), GraphError::Cyclic);

        let self_loop = GraphRecord {
            nodes: vec![NodeRecord {
                uid: NodeId(3),
                content: NodeContent::new("a"),
                nodes_from: vec![NodeId(3)],
            }],
        };
        assert_eq!(Graph::from_record(&self_loop).unwrap_err(), GraphError::Cyclic);
    }

    #[test]
    fn test_update_subtree_with_cyclic_donor_keeps_graph() {
        let mut g = Graph::new();
        let a = g.add_node("a");
        let b = g.add_node_with_parents("b", &[a]).unwrap();
        g.add_node_with_parents("c", &[b]).unwrap();
        let before = g.descriptive_id().to_string();
        let ids_before = g.node_ids();

        let mut donor = Graph::new();
        let donor_ids = donor
            .set_nodes(vec![NodeSpec::new("p", vec![1]), NodeSpec::new("q", vec![0])])
            .unwrap();

        assert_eq!(g.update_subtree(b, &donor, donor_ids[0]), Err(GraphError::Cyclic));
        assert_eq!(g.descriptive_id(), before);
        assert_eq!(g.node_ids(), ids_before);
    }

    #[test]
    fn test_ancestors_of_long_chain() {
        let mut g = Graph::new();
        let mut prev = g.add_node("x");
        let first = prev;
        for _ in 0..2000 {
            prev = g.add_node_with_parents("op", &[prev]).unwrap();
        }
        let ancestors = g.ancestors(prev);
        assert_eq!(ancestors.len(), 2000);
        assert_eq!(ancestors.last(), Some(&first));
        assert!(g.is_ancestor(first, prev));
        assert!(!g.is_ancestor(prev, first));
    }

    #[test]
    fn test_subgraph_and_import() {
        let (g, [n1, n2, ..]) = diamond();
        let sub = g.subgraph(n2).unwrap();
        assert_eq!(sub.node_ids(), vec![n1, n2]);
        assert_eq!(sub.descriptive_id(), "(/n_n1;)/n_n2");

        let mut target = Graph::new();
        let imported = target.import_subtree(&g, n2).unwrap();
        assert_eq!(target.length(), 2);
        assert_eq!(target.node(imported).unwrap().name(), "n2");
    }

    fn arb_dag() -> impl Strategy<Value = Graph> {
        (1usize..10)
            .prop_flat_map(|n| proptest::collection::vec(proptest::collection::vec(any::<prop::sample::Index>(), 0..3), n))
            .prop_map(|parent_picks| {
                let mut g = Graph::new();
                let mut ids = Vec::new();
                for (i, picks) in parent_picks.into_iter().enumerate() {
                    let parents: Vec<NodeId> = if i == 0 {
                        Vec::new()
                    } else {
                        picks.iter().map(|p| ids[p.index(i)]).collect()
                    };
                    let id = g
                        .add_node_with_parents(format!("op{}", i % 3), &parents)
                        .unwrap();
                    ids.push(id);
                }
                g
            })
    }

    proptest! {
        #[test]
        fn prop_delete_subtree_no_dangling(g in arb_dag(), pick in any::<prop::sample::Index>()) {
            let mut g = g;
            let target = g.node_ids()[pick.index(g.length())];
            let removed = g.delete_subtree(target).unwrap();
            prop_assert!(removed.contains(&target));
            for node in g.nodes() {
                for p in node.nodes_from() {
                    prop_assert!(g.contains(*p));
                    prop_assert!(!removed.contains(p));
                }
            }
        }

        #[test]
        fn prop_edits_keep_acyclic(g in arb_dag(), a in any::<prop::sample::Index>(), b in any::<prop::sample::Index>()) {
            let mut g = g;
            let ids = g.node_ids();
            let (pa, pb) = (ids[a.index(ids.len())], ids[b.index(ids.len())]);
            let _ = g.connect_nodes(pa, pb);
            prop_assert!(!g.has_cycle());
            g.delete_node(pa, ReconnectType::All).unwrap();
            prop_assert!(!g.has_cycle());
        }
    }
}
