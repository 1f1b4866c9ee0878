//! Karma alignment graph conversion
//!
//! Karma exports an alignment as `{"nodes": [...], "links": [...]}`. Links are
//! identified as `source---uri---target`. The converter rebuilds a directed
//! multigraph with dense ids assigned strictly by array position, so the same
//! export always produces the same node and link indices.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{SereneError, SereneResult};
use crate::graph::{EdgeId, Graph, NodeId};
use crate::namespace::{label_of, prefix_of};

/// Separator inside Karma link ids, also used to join composite labels
pub const LINK_SEPARATOR: &str = "---";

/// Link types that attach a data value or instance to a class. The target of
/// such a link inherits a composite label from its source class.
pub const TERMINAL_LINK_TYPES: [&str; 2] = ["DataPropertyLink", "ClassInstanceLink"];

/// Kind of an alignment node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignNodeKind {
    ClassNode,
    DataNode,
}

/// Attributes of an alignment node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignNode {
    pub kind: AlignNodeKind,
    /// Label derived from the class URI
    pub label: String,
    /// Label derived from the Karma node id
    pub lab: String,
    pub prefix: String,
}

/// Attributes of an alignment link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignEdge {
    /// Original Karma link id
    pub align_id: String,
    pub link_type: String,
    pub weight: f64,
    pub label: String,
    pub prefix: String,
}

/// Converted alignment: the multigraph plus vendor-id → dense-index tables
#[derive(Debug, Clone)]
pub struct AlignmentGraph {
    pub graph: Graph<AlignNode, AlignEdge>,
    /// Karma node id → node index, in input order
    pub node_map: IndexMap<String, NodeId>,
    /// Karma link id → edge index, in input order
    pub link_map: IndexMap<String, EdgeId>,
}

impl AlignmentGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Attributes of the node Karma knows as `vendor_id`
    pub fn node(&self, vendor_id: &str) -> Option<&AlignNode> {
        let id = self.node_map.get(vendor_id)?;
        self.graph.node(*id).map(|n| &n.data)
    }

    /// alignId → edge key lookup used to join vendor pattern exports
    pub fn align_lookup(&self) -> HashMap<&str, EdgeId> {
        self.graph
            .edges()
            .map(|e| (e.data.align_id.as_str(), e.id))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct KarmaGraph {
    nodes: Vec<KarmaNode>,
    links: Vec<KarmaLink>,
}

#[derive(Debug, Deserialize)]
struct KarmaNode {
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    label: Option<KarmaLabel>,
}

#[derive(Debug, Deserialize)]
struct KarmaLabel {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct KarmaLink {
    id: String,
    #[serde(rename = "type")]
    link_type: String,
    weight: f64,
}

fn node_attributes(node: &KarmaNode) -> SereneResult<AlignNode> {
    if node.node_type != "InternalNode" {
        return Ok(AlignNode {
            kind: AlignNodeKind::DataNode,
            label: String::new(),
            lab: String::new(),
            prefix: String::new(),
        });
    }

    let uri = node
        .label
        .as_ref()
        .map(|l| l.uri.as_str())
        .ok_or_else(|| SereneError::validation(format!("internal node {} has no label uri", node.id)))?;

    Ok(AlignNode {
        kind: AlignNodeKind::ClassNode,
        label: label_of(uri),
        lab: label_of(&node.id),
        prefix: prefix_of(uri),
    })
}

fn split_link_id(id: &str) -> SereneResult<(&str, &str, &str)> {
    let mut parts = id.split(LINK_SEPARATOR);
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(source), Some(uri), Some(target), None) => Ok((source, uri, target)),
        _ => Err(SereneError::validation(format!(
            "link id {} is not of the form source{sep}uri{sep}target",
            id,
            sep = LINK_SEPARATOR
        ))),
    }
}

/// Convert a Karma alignment export into an [`AlignmentGraph`].
pub fn convert_karma_graph(data: &Value) -> SereneResult<AlignmentGraph> {
    info!("Converting karma alignment graph");

    let karma = KarmaGraph::deserialize(data)?;

    let mut graph = Graph::new();
    let mut node_map = IndexMap::with_capacity(karma.nodes.len());
    let mut link_map = IndexMap::with_capacity(karma.links.len());

    for node in &karma.nodes {
        let id = graph.add_node(node_attributes(node)?);
        if node_map.insert(node.id.clone(), id).is_some() {
            return Err(SereneError::validation(format!("duplicate alignment node {}", node.id)));
        }
    }

    for link in &karma.links {
        let (source, uri, target) = split_link_id(&link.id)?;
        let lookup = |vendor: &str| {
            node_map
                .get(vendor)
                .copied()
                .ok_or_else(|| SereneError::validation(format!("link {} references unknown node {}", link.id, vendor)))
        };
        let (source, target) = (lookup(source)?, lookup(target)?);

        let edge = AlignEdge {
            align_id: link.id.clone(),
            link_type: link.link_type.clone(),
            weight: link.weight,
            label: label_of(uri),
            prefix: prefix_of(uri),
        };
        let edge_label = edge.label.clone();

        let key = graph
            .add_edge(source, target, edge)
            .map_err(|e| SereneError::validation(e.to_string()))?;
        if link_map.insert(link.id.clone(), key).is_some() {
            return Err(SereneError::validation(format!("duplicate alignment link {}", link.id)));
        }

        if TERMINAL_LINK_TYPES.contains(&link.link_type.as_str()) {
            propagate_label(&mut graph, source, target, &edge_label);
        }
    }

    info!(
        "Karma alignment graph read: {} nodes, {} links",
        graph.node_count(),
        graph.edge_count()
    );

    Ok(AlignmentGraph {
        graph,
        node_map,
        link_map,
    })
}

fn propagate_label(graph: &mut Graph<AlignNode, AlignEdge>, source: NodeId, target: NodeId, edge_label: &str) {
    let Some(class) = graph.node(source).map(|n| n.data.clone()) else {
        return;
    };
    if let Some(node) = graph.node_mut(target) {
        node.data.label = format!("{}{}{}", class.label, LINK_SEPARATOR, edge_label);
        node.data.lab = format!("{}{}{}", class.lab, LINK_SEPARATOR, edge_label);
        node.data.prefix = class.prefix;
        debug!("Labelled {} as {}", target, node.data.label);
    }
}
