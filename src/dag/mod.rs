//! Directed acyclic graph model.
//!
//! Candidates of the search are graphs of operation nodes. This module holds
//! the entities and the edit primitives the operators are built on.
//!
//! # Key Types
//!
//! - [`Graph`]: node arena with cycle-safe edits and a cached structural id
//! - [`GraphNode`], [`NodeId`], [`NodeContent`]: node entities
//! - [`ReconnectType`]: rewiring policy of [`Graph::delete_node`]
//! - [`GraphRecord`]: serializable snapshot
//!
//! # Functions
//!
//! - [`graph_has_cycle`], [`node_depth`], [`nodes_from_layer`] and friends
//! - [`equivalent_subtree`]: crossover point discovery

mod graph;
mod node;
mod subtree;
mod utils;

pub use graph::{Graph, GraphError, GraphRecord, NodeRecord, NodeSpec, ReconnectType, CYCLED_ID};
pub use node::{GraphNode, NodeContent, NodeId};
pub use subtree::equivalent_subtree;
pub use utils::{
    distance_to_primary_level, distance_to_root_level, graph_has_cycle, node_depth,
    nodes_from_layer, ordered_subnodes_hierarchy,
};
