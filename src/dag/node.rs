//! Graph node entities.
//!
//! Nodes live in the arena of their owning [`Graph`](super::Graph) and refer
//! to their parents by [`NodeId`]. A node never owns another node.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier of a node within its graph.
///
/// Ids are allocated by the owning graph and never reused by it. Nodes
/// imported from another graph receive fresh ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Operation descriptor carried by a node.
///
/// Two nodes are structurally interchangeable when their contents are equal.
/// Parameters are kept sorted by name so that [`description`](Self::description)
/// is canonical.
///
/// # Examples
///
/// ```
/// use u_graphevo::dag::NodeContent;
///
/// let content = NodeContent::new("scale").with_param("factor", 0.5);
/// assert_eq!(content.description(), "n_scale_{factor=0.5}");
/// assert_eq!(NodeContent::new("sum").description(), "n_sum");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContent {
    /// Operation name.
    pub name: String,

    /// Numeric hyperparameters of the operation.
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl NodeContent {
    /// Creates a parameterless content.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Adds or replaces a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Canonical textual form used in structural fingerprints.
    pub fn description(&self) -> String {
        if self.params.is_empty() {
            return format!("n_{}", self.name);
        }
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("n_{}_{{{}}}", self.name, params.join(","))
    }
}

impl From<&str> for NodeContent {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for NodeContent {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A node of a [`Graph`](super::Graph).
///
/// `nodes_from` lists the parents (inputs) of the node in order. Edges are
/// therefore stored on the child side; children are derived on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub(crate) uid: NodeId,
    pub(crate) content: NodeContent,
    pub(crate) nodes_from: Vec<NodeId>,
}

impl GraphNode {
    pub(crate) fn new(uid: NodeId, content: NodeContent, nodes_from: Vec<NodeId>) -> Self {
        Self {
            uid,
            content,
            nodes_from,
        }
    }

    /// Identifier of this node.
    pub fn uid(&self) -> NodeId {
        self.uid
    }

    /// Operation descriptor.
    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    /// Operation name, shorthand for `content().name`.
    pub fn name(&self) -> &str {
        &self.content.name
    }

    /// Parents of this node, in insertion order.
    pub fn nodes_from(&self) -> &[NodeId] {
        &self.nodes_from
    }

    /// Whether the node has no parents.
    pub fn is_primary(&self) -> bool {
        self.nodes_from.is_empty()
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content.name)
    }
}

/// Pushes `id` unless already present.
pub(crate) fn push_unique(list: &mut Vec<NodeId>, id: NodeId) -> bool {
    if list.contains(&id) {
        false
    } else {
        list.push(id);
        true
    }
}
