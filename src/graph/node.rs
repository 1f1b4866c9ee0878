//! Node container for the multigraph

use super::types::NodeId;
use serde::{Deserialize, Serialize};

/// A node in a [`Graph`](super::Graph), carrying caller-defined attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node<N> {
    /// Dense identifier (insertion position)
    pub id: NodeId,

    /// Node attributes
    pub data: N,
}

impl<N> Node<N> {
    pub fn new(id: NodeId, data: N) -> Self {
        Node { id, data }
    }
}
