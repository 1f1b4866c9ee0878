//! Semantic Source Description (SSD)
//!
//! An SSD maps the columns of one dataset onto a semantic model: a small
//! directed multigraph of ontology classes (class nodes) and their data
//! properties (data nodes). Each mapped column points at one data node.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ColumnLookup, Column, DataSet, Entity, EntityKind, Lookup, Ontology, StoredMeta};
use crate::error::{SereneError, SereneResult};
use crate::graph::{EdgeId, Graph, NodeId};
use crate::namespace::{label_of, prefix_of, NamespaceManager};

/// Link type joining a class to one of its data properties
pub const DATA_PROPERTY_LINK: &str = "DataPropertyLink";

/// Link type joining two classes
pub const OBJECT_PROPERTY_LINK: &str = "ObjectPropertyLink";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SemanticNodeKind {
    ClassNode,
    DataNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticNode {
    #[serde(rename = "type")]
    pub kind: SemanticNodeKind,
    /// `Class` for class nodes, `Class.property` for data nodes
    pub label: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticLink {
    #[serde(rename = "type")]
    pub link_type: String,
    pub label: String,
    pub prefix: String,
}

/// Names a data node by its class and property labels
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataNodeRef {
    pub class: String,
    pub property: String,
}

impl DataNodeRef {
    pub fn new(class: impl Into<String>, property: impl Into<String>) -> Self {
        DataNodeRef {
            class: class.into(),
            property: property.into(),
        }
    }

    /// The data node label, `Class.property`
    pub fn label(&self) -> String {
        format!("{}.{}", self.class, self.property)
    }
}

impl fmt::Display for DataNodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataNode({}, {})", self.class, self.property)
    }
}

#[derive(Deserialize)]
struct NodeBlob {
    id: i64,
    #[serde(flatten)]
    node: SemanticNode,
}

#[derive(Deserialize)]
struct LinkBlob {
    source: i64,
    target: i64,
    #[serde(flatten)]
    link: SemanticLink,
}

#[derive(Deserialize)]
struct ModelBlob {
    #[serde(default)]
    nodes: Vec<NodeBlob>,
    #[serde(default)]
    links: Vec<LinkBlob>,
}

/// Semantic model graph of an SSD
#[derive(Debug, Clone, Default)]
pub struct SemanticModel {
    graph: Graph<SemanticNode, SemanticLink>,
}

impl SemanticModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &Graph<SemanticNode, SemanticLink> {
        &self.graph
    }

    /// Class node with this label and prefix, created on first use
    pub fn add_class(&mut self, label: &str, prefix: &str) -> NodeId {
        let existing = self.graph.find_node(|n| {
            n.kind == SemanticNodeKind::ClassNode && n.label == label && n.prefix == prefix
        });
        if let Some(node) = existing {
            return node.id;
        }
        self.graph.add_node(SemanticNode {
            kind: SemanticNodeKind::ClassNode,
            label: label.to_string(),
            prefix: prefix.to_string(),
        })
    }

    /// Add a data node for `property` hanging off `class`
    pub fn add_data_node(&mut self, class: NodeId, property: &str, prefix: &str) -> SereneResult<NodeId> {
        let class_label = match self.graph.node(class) {
            Some(n) if n.data.kind == SemanticNodeKind::ClassNode => n.data.label.clone(),
            _ => return Err(SereneError::validation(format!("{} is not a class node", class))),
        };
        let node = self.graph.add_node(SemanticNode {
            kind: SemanticNodeKind::DataNode,
            label: format!("{}.{}", class_label, property),
            prefix: prefix.to_string(),
        });
        self.add_link(class, node, DATA_PROPERTY_LINK, property, prefix)?;
        Ok(node)
    }

    pub fn add_link(
        &mut self,
        source: NodeId,
        target: NodeId,
        link_type: &str,
        label: &str,
        prefix: &str,
    ) -> SereneResult<EdgeId> {
        let link = SemanticLink {
            link_type: link_type.to_string(),
            label: label.to_string(),
            prefix: prefix.to_string(),
        };
        self.graph
            .add_edge(source, target, link)
            .map_err(|e| SereneError::validation(e.to_string()))
    }

    /// Locate the data node `Class.property`
    pub fn find(&self, data_node: &DataNodeRef) -> Option<NodeId> {
        let label = data_node.label();
        self.graph
            .find_node(|n| n.kind == SemanticNodeKind::DataNode && n.label == label)
            .map(|n| n.id)
    }

    pub fn class_nodes(&self) -> impl Iterator<Item = &SemanticNode> {
        self.graph
            .nodes()
            .map(|n| &n.data)
            .filter(|n| n.kind == SemanticNodeKind::ClassNode)
    }

    pub fn data_nodes(&self) -> impl Iterator<Item = &SemanticNode> {
        self.graph
            .nodes()
            .map(|n| &n.data)
            .filter(|n| n.kind == SemanticNodeKind::DataNode)
    }

    /// Parse the server representation, returning the model and the map
    /// from server node ids to local node ids.
    pub fn from_json(json: &Value) -> SereneResult<(Self, HashMap<i64, NodeId>)> {
        let blob = ModelBlob::deserialize(json)?;
        let mut model = SemanticModel::new();
        let mut ids = HashMap::with_capacity(blob.nodes.len());

        for n in blob.nodes {
            ids.insert(n.id, model.graph.add_node(n.node));
        }
        for l in blob.links {
            let resolve = |id: i64| {
                ids.get(&id)
                    .copied()
                    .ok_or_else(|| SereneError::malformed("semantic model", format!("unknown node {}", id)))
            };
            let (source, target) = (resolve(l.source)?, resolve(l.target)?);
            model
                .graph
                .add_edge(source, target, l.link)
                .map_err(|e| SereneError::malformed("semantic model", e))?;
        }
        Ok((model, ids))
    }

    pub fn to_json(&self) -> Value {
        let nodes: Vec<Value> = self
            .graph
            .nodes()
            .map(|n| {
                json!({
                    "id": n.id.as_u64(),
                    "label": n.data.label,
                    "type": n.data.kind,
                    "prefix": n.data.prefix,
                })
            })
            .collect();
        let links: Vec<Value> = self
            .graph
            .edges()
            .map(|e| {
                json!({
                    "id": e.id.as_u64(),
                    "source": e.source.as_u64(),
                    "target": e.target.as_u64(),
                    "label": e.data.label,
                    "type": e.data.link_type,
                    "prefix": e.data.prefix,
                })
            })
            .collect();
        json!({ "nodes": nodes, "links": links })
    }
}

/// A Semantic Source Description
#[derive(Debug, Clone)]
pub struct Ssd {
    meta: Option<StoredMeta>,
    name: String,
    dataset: Arc<DataSet>,
    ontologies: Vec<Arc<Ontology>>,
    semantic_model: SemanticModel,
    mappings: IndexMap<NodeId, Column>,
    namespaces: NamespaceManager,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SsdBlob {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "dataSetID")]
    dataset_id: Option<i64>,
    #[serde(default)]
    ontologies: Vec<i64>,
    #[serde(default)]
    semantic_model: Value,
    #[serde(default)]
    mappings: Vec<MappingBlob>,
    #[serde(default)]
    attributes: Vec<AttributeBlob>,
}

#[derive(Deserialize)]
struct MappingBlob {
    attribute: i64,
    node: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributeBlob {
    id: i64,
    #[serde(default)]
    column_ids: Vec<i64>,
}

impl Ssd {
    /// A local, empty SSD over `dataset`
    pub fn new(dataset: Arc<DataSet>, ontologies: Vec<Arc<Ontology>>) -> Self {
        Ssd {
            meta: None,
            name: dataset.filename().to_string(),
            dataset,
            ontologies,
            semantic_model: SemanticModel::new(),
            mappings: IndexMap::new(),
            namespaces: NamespaceManager::new(),
        }
    }

    /// Hydrate an SSD, resolving its dataset (through the mapped columns)
    /// and its ontologies via the given collaborators.
    pub fn from_json<D, O>(json: &Value, datasets: &D, ontologies: &O) -> SereneResult<Self>
    where
        D: Lookup<DataSet> + ColumnLookup + ?Sized,
        O: Lookup<Ontology> + ?Sized,
    {
        let meta = StoredMeta::from_json(json)?;
        let mut ssd = Self::from_prediction(json, datasets, ontologies)?;
        ssd.meta = Some(meta);
        Ok(ssd)
    }

    /// Hydrate an SSD proposed by a prediction. It has no server identity
    /// and stays local.
    pub fn from_prediction<D, O>(json: &Value, datasets: &D, ontologies: &O) -> SereneResult<Self>
    where
        D: Lookup<DataSet> + ColumnLookup + ?Sized,
        O: Lookup<Ontology> + ?Sized,
    {
        let parts = Self::hydrate(json, datasets, ontologies)?;
        Ok(Ssd {
            meta: None,
            name: parts.name,
            dataset: parts.dataset,
            ontologies: parts.ontologies,
            semantic_model: parts.semantic_model,
            mappings: parts.mappings,
            namespaces: NamespaceManager::new(),
        })
    }

    /// Replace every field with the contents of `json`
    pub fn update<D, O>(&mut self, json: &Value, datasets: &D, ontologies: &O) -> SereneResult<&mut Self>
    where
        D: Lookup<DataSet> + ColumnLookup + ?Sized,
        O: Lookup<Ontology> + ?Sized,
    {
        let meta = StoredMeta::from_json(json)?;
        let parts = Self::hydrate(json, datasets, ontologies)?;
        self.meta = Some(meta);
        self.name = parts.name;
        self.dataset = parts.dataset;
        self.ontologies = parts.ontologies;
        self.semantic_model = parts.semantic_model;
        self.mappings = parts.mappings;
        Ok(self)
    }

    fn hydrate<D, O>(json: &Value, datasets: &D, ontologies: &O) -> SereneResult<SsdParts>
    where
        D: Lookup<DataSet> + ColumnLookup + ?Sized,
        O: Lookup<Ontology> + ?Sized,
    {
        let blob = SsdBlob::deserialize(json)?;
        let (semantic_model, node_ids) = SemanticModel::from_json(&blob.semantic_model)?;

        let attribute_columns: HashMap<i64, i64> = blob
            .attributes
            .iter()
            .filter_map(|a| a.column_ids.first().map(|c| (a.id, *c)))
            .collect();

        let mut mappings = IndexMap::with_capacity(blob.mappings.len());
        for m in &blob.mappings {
            let node = node_ids
                .get(&m.node)
                .copied()
                .ok_or_else(|| SereneError::malformed("ssd", format!("mapping to unknown node {}", m.node)))?;
            let column_id = attribute_columns.get(&m.attribute).copied().unwrap_or(m.attribute);
            mappings.insert(node, datasets.column(column_id)?);
        }

        let dataset_id = match (blob.dataset_id, mappings.values().next()) {
            (Some(id), _) => id,
            (None, Some(column)) => column.dataset_id,
            (None, None) => {
                let column_id = attribute_columns
                    .values()
                    .next()
                    .copied()
                    .ok_or_else(|| SereneError::malformed("ssd", format!("SSD {} references no columns", blob.name)))?;
                datasets.column(column_id)?.dataset_id
            }
        };
        if let Some(stray) = mappings.values().find(|c| c.dataset_id != dataset_id) {
            return Err(SereneError::malformed(
                "ssd",
                format!("column {} belongs to dataset {}, expected {}", stray.id, stray.dataset_id, dataset_id),
            ));
        }

        let ontologies = blob
            .ontologies
            .iter()
            .map(|id| ontologies.lookup(*id))
            .collect::<SereneResult<Vec<_>>>()?;

        Ok(SsdParts {
            name: blob.name,
            dataset: datasets.lookup(dataset_id)?,
            ontologies,
            semantic_model,
            mappings,
        })
    }

    /// Register a prefix usable in `map`/`link` class and property names
    pub fn add_prefix(&mut self, prefix: &str, iri: &str) {
        self.namespaces.add_prefix(prefix, iri);
    }

    fn resolve(&self, name: &str) -> SereneResult<(String, String)> {
        let uri = self
            .namespaces
            .resolve(name)
            .map_err(|e| SereneError::validation(e.to_string()))?;
        Ok((label_of(&uri), prefix_of(&uri)))
    }

    /// Map the column named `column` to `class.property`.
    ///
    /// Names may be full IRIs, `prefix:local` or bare labels. The SSD
    /// becomes local until uploaded again.
    pub fn map(&mut self, column: &str, class: &str, property: &str) -> SereneResult<NodeId> {
        let column = self
            .dataset
            .column(column)
            .cloned()
            .ok_or_else(|| SereneError::validation(format!("{} has no column {}", self.dataset, column)))?;
        if self.mappings.values().any(|c| c.id == column.id) {
            return Err(SereneError::validation(format!("{} is already mapped", column)));
        }

        let (class_label, class_prefix) = self.resolve(class)?;
        let (prop_label, prop_prefix) = self.resolve(property)?;

        let class_node = self.semantic_model.add_class(&class_label, &class_prefix);
        let data_node = self
            .semantic_model
            .add_data_node(class_node, &prop_label, &prop_prefix)?;
        self.mappings.insert(data_node, column);
        self.meta = None;
        Ok(data_node)
    }

    /// Join two classes with an object property
    pub fn link(&mut self, from: &str, property: &str, to: &str) -> SereneResult<EdgeId> {
        let (from_label, from_prefix) = self.resolve(from)?;
        let (prop_label, prop_prefix) = self.resolve(property)?;
        let (to_label, to_prefix) = self.resolve(to)?;

        let source = self.semantic_model.add_class(&from_label, &from_prefix);
        let target = self.semantic_model.add_class(&to_label, &to_prefix);
        let edge = self.semantic_model.add_link(
            source,
            target,
            OBJECT_PROPERTY_LINK,
            &prop_label,
            &prop_prefix,
        )?;
        self.meta = None;
        Ok(edge)
    }

    /// Request body for uploading this SSD
    pub fn to_json(&self) -> SereneResult<Value> {
        let dataset_id = self.dataset.id().ok_or_else(|| {
            SereneError::validation(format!(
                "{} is not stored on the server. Upload it through the dataset endpoint first.",
                self.dataset
            ))
        })?;
        let ontologies = self
            .ontologies
            .iter()
            .map(|o| {
                o.id().ok_or_else(|| {
                    SereneError::validation(format!(
                        "{} is not stored on the server. Upload it through the ontology endpoint first.",
                        o
                    ))
                })
            })
            .collect::<SereneResult<Vec<_>>>()?;

        let attributes: Vec<Value> = self
            .mappings
            .values()
            .map(|c| {
                json!({
                    "id": c.id,
                    "name": c.name,
                    "label": "identity",
                    "columnIds": [c.id],
                    "sql": format!("select {} from {}", c.name, self.dataset.filename()),
                })
            })
            .collect();
        let mappings: Vec<Value> = self
            .mappings
            .iter()
            .map(|(node, c)| json!({ "attribute": c.id, "node": node.as_u64() }))
            .collect();

        Ok(json!({
            "name": self.name,
            "dataSetID": dataset_id,
            "ontologies": ontologies,
            "semanticModel": self.semantic_model.to_json(),
            "attributes": attributes,
            "mappings": mappings,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dataset(&self) -> &Arc<DataSet> {
        &self.dataset
    }

    pub fn ontologies(&self) -> &[Arc<Ontology>] {
        &self.ontologies
    }

    pub fn semantic_model(&self) -> &SemanticModel {
        &self.semantic_model
    }

    /// Data node → mapped column
    pub fn mappings(&self) -> &IndexMap<NodeId, Column> {
        &self.mappings
    }

    /// Column mapped to `Class.property`, if any
    pub fn column_for(&self, data_node: &DataNodeRef) -> Option<&Column> {
        self.semantic_model
            .find(data_node)
            .and_then(|node| self.mappings.get(&node))
    }
}

struct SsdParts {
    name: String,
    dataset: Arc<DataSet>,
    ontologies: Vec<Arc<Ontology>>,
    semantic_model: SemanticModel,
    mappings: IndexMap<NodeId, Column>,
}

impl Entity for Ssd {
    const KIND: EntityKind = EntityKind::Ssd;

    fn meta(&self) -> Option<&StoredMeta> {
        self.meta.as_ref()
    }
}

impl fmt::Display for Ssd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "SSD({}, {})", id, self.name),
            None => write!(f, "SSD(local, {})", self.name),
        }
    }
}
