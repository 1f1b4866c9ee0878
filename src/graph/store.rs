//! In-memory directed multigraph
//!
//! Uses dense vectors indexed by id:
//! - nodes: NodeId -> Node
//! - edges: EdgeId -> Edge
//! - outgoing: NodeId -> Vec<EdgeId>

use super::edge::Edge;
use super::node::Node;
use super::types::{EdgeId, NodeId};
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Invalid edge: source node {0} does not exist")]
    InvalidEdgeSource(NodeId),

    #[error("Invalid edge: target node {0} does not exist")]
    InvalidEdgeTarget(NodeId),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Directed multigraph with node attributes `N` and edge attributes `E`
///
/// Nodes and edges are never removed, so ids stay dense and equal to
/// insertion position.
#[derive(Debug, Clone)]
pub struct Graph<N, E> {
    nodes: Vec<Node<N>>,
    edges: Vec<Edge<E>>,
    outgoing: Vec<Vec<EdgeId>>,
}

impl<N, E> Graph<N, E> {
    /// Create a new empty graph
    pub fn new() -> Self {
        Graph {
            nodes: Vec::new(),
            edges: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// Add a node, returning its id
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u64);
        self.nodes.push(Node::new(id, data));
        self.outgoing.push(Vec::new());
        id
    }

    /// Add a directed edge between two existing nodes
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, data: E) -> GraphResult<EdgeId> {
        if !self.has_node(source) {
            return Err(GraphError::InvalidEdgeSource(source));
        }
        if !self.has_node(target) {
            return Err(GraphError::InvalidEdgeTarget(target));
        }

        let id = EdgeId::new(self.edges.len() as u64);
        self.outgoing[source.index()].push(id);
        self.edges.push(Edge::new(id, source, target, data));
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<N>> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<N>> {
        self.nodes.get_mut(id.index())
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge<E>> {
        self.edges.get(id.index())
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    /// Iterate nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node<N>> {
        self.nodes.iter()
    }

    /// Iterate edges in id order
    pub fn edges(&self) -> impl Iterator<Item = &Edge<E>> {
        self.edges.iter()
    }

    /// Edges leaving `node`, in insertion order
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &Edge<E>> {
        self.outgoing
            .get(node.index())
            .into_iter()
            .flatten()
            .filter_map(|&id| self.edge(id))
    }

    /// All parallel edges from `source` to `target`
    pub fn edges_between(&self, source: NodeId, target: NodeId) -> Vec<&Edge<E>> {
        self.outgoing(source).filter(|e| e.joins(source, target)).collect()
    }

    /// Find the first node whose attributes satisfy `pred`
    pub fn find_node(&self, mut pred: impl FnMut(&N) -> bool) -> Option<&Node<N>> {
        self.nodes.iter().find(|n| pred(&n.data))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<N, E> Default for Graph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}
