//! Edge container for the multigraph
//!
//! Edges are directed and several edges may join the same pair of nodes.

use super::types::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};

/// A directed edge in a [`Graph`](super::Graph)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<E> {
    /// Dense identifier (insertion position), doubles as the multigraph key
    pub id: EdgeId,

    /// Source node
    pub source: NodeId,

    /// Target node
    pub target: NodeId,

    /// Edge attributes
    pub data: E,
}

impl<E> Edge<E> {
    /// Create a new directed edge
    pub fn new(id: EdgeId, source: NodeId, target: NodeId, data: E) -> Self {
        Edge {
            id,
            source,
            target,
            data,
        }
    }

    /// True when the edge runs from `source` to `target`
    pub fn joins(&self, source: NodeId, target: NodeId) -> bool {
        self.source == source && self.target == target
    }
}
