//! Directed multigraph used for alignment graphs and semantic models
//!
//! - Dense node/edge ids assigned in insertion order
//! - Directed edges with arbitrary attributes
//! - Multiple edges between the same nodes

pub mod edge;
pub mod node;
pub mod store;
pub mod types;

pub use edge::Edge;
pub use node::Node;
pub use store::{Graph, GraphError, GraphResult};
pub use types::{EdgeId, NodeId};
