//! Octopus: SSDs + ontologies + a matcher model, trained together
//!
//! An octopus is built locally with [`OctopusBuilder`], uploaded through the
//! octopus endpoint, then trained and used for semantic-model prediction.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::model::default_bagging;
use super::{
    same_entity, Column, DataNodeRef, Element, Entity, EntityKind, Lookup, Model, ModelState,
    ModelType, Ontology, SamplingStrategy, Ssd, StoredMeta,
};
use crate::error::{SereneError, SereneResult};

/// Inclusive bound or strict lower bound for a modeling property
#[derive(Debug, Clone, Copy)]
enum Range {
    Positive,
    UnitInterval,
}

const RANGED_PROPS: [(&str, Range); 7] = [
    ("mappingBranchFactor", Range::Positive),
    ("numCandidateMappings", Range::Positive),
    ("topkSteinerTrees", Range::Positive),
    ("numSemanticTypes", Range::Positive),
    ("confidenceWeight", Range::UnitInterval),
    ("coherenceWeight", Range::UnitInterval),
    ("sizeWeight", Range::UnitInterval),
];

/// Semantic modeling parameters, validated on construction
///
/// Counts must be strictly positive and weights must lie in `[0, 1]`.
/// Out-of-range values are rejected, never clamped. Keys without a range
/// rule are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ModelingProps {
    props: IndexMap<String, Value>,
}

impl ModelingProps {
    pub fn new(props: Map<String, Value>) -> SereneResult<Self> {
        for (name, range) in RANGED_PROPS {
            let Some(value) = props.get(name) else {
                continue;
            };
            let x = value.as_f64().ok_or_else(|| {
                SereneError::validation(format!("Modeling property {} must be a number, got {}", name, value))
            })?;
            let ok = match range {
                Range::Positive => x > 0.0,
                Range::UnitInterval => (0.0..=1.0).contains(&x),
            };
            if !ok {
                let bounds = match range {
                    Range::Positive => format!("0 < {}", name),
                    Range::UnitInterval => format!("0 <= {} <= 1", name),
                };
                return Err(SereneError::validation(format!(
                    "Modeling property {} should be in range {}, got {}",
                    name, bounds, x
                )));
            }
        }
        Ok(ModelingProps {
            props: props.into_iter().collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.props.iter()
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

impl TryFrom<Value> for ModelingProps {
    type Error = SereneError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(ModelingProps::default()),
            Value::Object(map) => ModelingProps::new(map),
            other => Err(SereneError::validation(format!(
                "modeling properties must be an object, got {}",
                other
            ))),
        }
    }
}

/// Scores attached to one predicted semantic model
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OctopusScore {
    pub size_reduction: f64,
    pub node_confidence: f64,
    pub node_coherence: f64,
    pub link_coherence: f64,
    pub link_cost: f64,
    /// Weighted average of size reduction, node confidence and coherence
    pub karma_score: f64,
    pub karma_rank: i64,
    /// Share of the dataset's columns covered by the semantic model
    pub node_coverage: f64,
}

impl fmt::Display for OctopusScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Score(rank={}, score={:.2}, confidence={:.2}, coverage={:.2})",
            self.karma_rank, self.karma_score, self.node_confidence, self.node_coverage
        )
    }
}

/// One prediction: a candidate SSD and its score
#[derive(Debug, Clone)]
pub struct SsdResult {
    ssd: Ssd,
    score: OctopusScore,
}

impl SsdResult {
    pub fn new(ssd: Ssd, score: OctopusScore) -> Self {
        SsdResult { ssd, score }
    }

    pub fn ssd(&self) -> &Ssd {
        &self.ssd
    }

    pub fn score(&self) -> &OctopusScore {
        &self.score
    }
}

impl fmt::Display for SsdResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SSDResult({})", self.score.karma_rank)
    }
}

/// Builder for local octopii
#[derive(Debug, Clone)]
pub struct OctopusBuilder {
    name: String,
    description: String,
    ssds: Vec<Arc<Ssd>>,
    ontologies: Vec<Arc<Ontology>>,
    feature_config: Value,
    model_type: ModelType,
    resampling_strategy: SamplingStrategy,
    num_bags: u32,
    bag_size: u32,
    modeling_props: ModelingProps,
}

impl Default for OctopusBuilder {
    fn default() -> Self {
        OctopusBuilder {
            name: String::new(),
            description: String::new(),
            ssds: Vec::new(),
            ontologies: Vec::new(),
            feature_config: Value::Object(Map::new()),
            model_type: ModelType::default(),
            resampling_strategy: SamplingStrategy::default(),
            num_bags: default_bagging(),
            bag_size: default_bagging(),
            modeling_props: ModelingProps::default(),
        }
    }
}

impl OctopusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn ssd(mut self, ssd: Arc<Ssd>) -> Self {
        self.ssds.push(ssd);
        self
    }

    pub fn ssds(mut self, ssds: impl IntoIterator<Item = Arc<Ssd>>) -> Self {
        self.ssds.extend(ssds);
        self
    }

    pub fn ontology(mut self, ontology: Arc<Ontology>) -> Self {
        self.ontologies.push(ontology);
        self
    }

    pub fn ontologies(mut self, ontologies: impl IntoIterator<Item = Arc<Ontology>>) -> Self {
        self.ontologies.extend(ontologies);
        self
    }

    pub fn feature_config(mut self, features: Value) -> Self {
        self.feature_config = features;
        self
    }

    pub fn model_type(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    pub fn resampling_strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.resampling_strategy = strategy;
        self
    }

    pub fn num_bags(mut self, num_bags: u32) -> Self {
        self.num_bags = num_bags;
        self
    }

    pub fn bag_size(mut self, bag_size: u32) -> Self {
        self.bag_size = bag_size;
        self
    }

    pub fn modeling_props(mut self, props: ModelingProps) -> Self {
        self.modeling_props = props;
        self
    }

    /// Validate and produce a local octopus
    pub fn build(self) -> SereneResult<Octopus> {
        if self.num_bags == 0 || self.bag_size == 0 {
            return Err(SereneError::validation(format!(
                "Bagging needs num_bags > 0 and bag_size > 0, got {} and {}",
                self.num_bags, self.bag_size
            )));
        }
        Ok(Octopus {
            meta: None,
            name: self.name,
            description: self.description,
            ssds: self.ssds,
            ontologies: self.ontologies,
            feature_config: self.feature_config,
            model_type: self.model_type,
            resampling_strategy: self.resampling_strategy,
            num_bags: self.num_bags,
            bag_size: self.bag_size,
            modeling_props: self.modeling_props,
            model: None,
            semantic_type_map: IndexMap::new(),
            state: None,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OctopusBlob {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    ssds: Vec<i64>,
    #[serde(default)]
    ontologies: Vec<i64>,
    #[serde(rename = "lobsterID")]
    lobster_id: i64,
    #[serde(default)]
    modeling_props: Value,
    #[serde(default)]
    semantic_type_map: IndexMap<String, Value>,
    state: Value,
}

/// The central integration object for a collection of datasets
#[derive(Debug, Clone)]
pub struct Octopus {
    meta: Option<StoredMeta>,
    name: String,
    description: String,
    ssds: Vec<Arc<Ssd>>,
    ontologies: Vec<Arc<Ontology>>,
    feature_config: Value,
    model_type: ModelType,
    resampling_strategy: SamplingStrategy,
    num_bags: u32,
    bag_size: u32,
    modeling_props: ModelingProps,
    model: Option<Arc<Model>>,
    semantic_type_map: IndexMap<String, Value>,
    state: Option<ModelState>,
}

impl Octopus {
    pub fn builder() -> OctopusBuilder {
        OctopusBuilder::new()
    }

    /// Hydrate an octopus from a server response
    pub fn from_json<S, O, M>(json: &Value, ssds: &S, ontologies: &O, models: &M) -> SereneResult<Self>
    where
        S: Lookup<Ssd> + ?Sized,
        O: Lookup<Ontology> + ?Sized,
        M: Lookup<Model> + ?Sized,
    {
        let mut octopus = OctopusBuilder::new().build()?;
        octopus.update(json, ssds, ontologies, models)?;
        Ok(octopus)
    }

    /// Replace every field with the contents of `json`.
    ///
    /// Feature config, model type, resampling strategy and bagging are
    /// re-derived from the referenced model.
    pub fn update<S, O, M>(&mut self, json: &Value, ssds: &S, ontologies: &O, models: &M) -> SereneResult<&mut Self>
    where
        S: Lookup<Ssd> + ?Sized,
        O: Lookup<Ontology> + ?Sized,
        M: Lookup<Model> + ?Sized,
    {
        let meta = StoredMeta::from_json(json)?;
        let blob = OctopusBlob::deserialize(json)?;
        let state = ModelState::from_json(&blob.state)?;
        let modeling_props = ModelingProps::try_from(blob.modeling_props)?;

        let ssd_list = blob
            .ssds
            .iter()
            .map(|id| ssds.lookup(*id))
            .collect::<SereneResult<Vec<_>>>()?;
        let ontology_list = blob
            .ontologies
            .iter()
            .map(|id| ontologies.lookup(*id))
            .collect::<SereneResult<Vec<_>>>()?;
        let model = models.lookup(blob.lobster_id)?;

        self.meta = Some(meta);
        self.name = blob.name;
        self.description = blob.description;
        self.ssds = ssd_list;
        self.ontologies = ontology_list;
        self.modeling_props = modeling_props;
        self.semantic_type_map = blob.semantic_type_map;
        self.state = Some(state);

        self.feature_config = model.features().clone();
        self.model_type = model.model_type();
        self.resampling_strategy = model.resampling_strategy();
        self.num_bags = model.num_bags();
        self.bag_size = model.bag_size();
        self.model = Some(model);
        Ok(self)
    }

    /// Add an SSD or ontology. The octopus becomes local.
    pub fn add(&mut self, element: impl Into<Element>) -> SereneResult<&mut Self> {
        match element.into() {
            Element::Ssd(ssd) => self.ssds.push(ssd),
            Element::Ontology(ontology) => self.ontologies.push(ontology),
            other => {
                return Err(SereneError::validation(format!(
                    "Only SSD or Ontologies can be added to the Octopus, got {}",
                    other.kind()
                )))
            }
        }
        self.meta = None;
        Ok(self)
    }

    /// Remove an SSD or ontology. The octopus becomes local.
    pub fn remove(&mut self, element: impl Into<Element>) -> SereneResult<&mut Self> {
        let element = element.into();
        let removed = match &element {
            Element::Ssd(ssd) => remove_member(&mut self.ssds, ssd),
            Element::Ontology(ontology) => remove_member(&mut self.ontologies, ontology),
            other => {
                return Err(SereneError::validation(format!(
                    "Only SSD or Ontologies can be removed from the Octopus, got {}",
                    other.kind()
                )))
            }
        };
        if !removed {
            return Err(SereneError::validation(format!("{} is not a member of {}", element.kind(), self)));
        }
        self.meta = None;
        Ok(self)
    }

    /// Columns mapped to `data_node` across all SSDs
    pub fn mappings(&self, data_node: &DataNodeRef) -> Vec<Column> {
        self.ssds
            .iter()
            .filter_map(|ssd| ssd.column_for(data_node))
            .cloned()
            .collect()
    }

    /// Request body for uploading this octopus. Every SSD and ontology must
    /// already be stored.
    pub fn to_json(&self) -> SereneResult<Value> {
        let ssds = self
            .ssds
            .iter()
            .map(|s| {
                s.id().ok_or_else(|| {
                    SereneError::validation(format!(
                        "SSD is not stored on the server: {}. Upload it through the ssd endpoint first.",
                        s
                    ))
                })
            })
            .collect::<SereneResult<Vec<_>>>()?;
        let ontologies = self
            .ontologies
            .iter()
            .map(|o| {
                o.id().ok_or_else(|| {
                    SereneError::validation(format!(
                        "Ontology is not stored on the server: {}. Upload it through the ontology endpoint first.",
                        o
                    ))
                })
            })
            .collect::<SereneResult<Vec<_>>>()?;

        let name = if self.name.is_empty() { "unknown" } else { self.name.as_str() };
        Ok(json!({
            "name": name,
            "description": self.description,
            "ssds": ssds,
            "ontologies": ontologies,
            "features": self.feature_config,
            "modelType": self.model_type,
            "resamplingStrategy": self.resampling_strategy,
            "numBags": self.num_bags,
            "bagSize": self.bag_size,
            "modelingProps": self.modeling_props,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn ssds(&self) -> &[Arc<Ssd>] {
        &self.ssds
    }

    pub fn ontologies(&self) -> &[Arc<Ontology>] {
        &self.ontologies
    }

    /// The matcher model, once hydrated from the server
    pub fn model(&self) -> Option<&Arc<Model>> {
        self.model.as_ref()
    }

    pub fn model_id(&self) -> Option<i64> {
        self.model.as_ref().and_then(|m| m.id())
    }

    pub fn feature_config(&self) -> &Value {
        &self.feature_config
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn resampling_strategy(&self) -> SamplingStrategy {
        self.resampling_strategy
    }

    pub fn num_bags(&self) -> u32 {
        self.num_bags
    }

    pub fn bag_size(&self) -> u32 {
        self.bag_size
    }

    pub fn modeling_props(&self) -> &ModelingProps {
        &self.modeling_props
    }

    pub fn semantic_type_map(&self) -> &IndexMap<String, Value> {
        &self.semantic_type_map
    }

    pub fn state(&self) -> Option<&ModelState> {
        self.state.as_ref()
    }
}

fn remove_member<T: Entity>(members: &mut Vec<Arc<T>>, target: &Arc<T>) -> bool {
    match members.iter().position(|m| same_entity(m, target)) {
        Some(pos) => {
            members.remove(pos);
            true
        }
        None => false,
    }
}

impl Entity for Octopus {
    const KIND: EntityKind = EntityKind::Octopus;

    fn meta(&self) -> Option<&StoredMeta> {
        self.meta.as_ref()
    }
}

impl fmt::Display for Octopus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "Octopus({}, {})", id, self.name),
            None => write!(f, "Octopus(local, {})", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{DataSet, Status};

    struct Catalog {
        model: Arc<Model>,
        ontology: Arc<Ontology>,
    }

    impl Lookup<Ssd> for Catalog {
        fn lookup(&self, key: i64) -> SereneResult<Arc<Ssd>> {
            Err(SereneError::NotFound { kind: "SSD", key })
        }
    }

    impl Lookup<Ontology> for Catalog {
        fn lookup(&self, key: i64) -> SereneResult<Arc<Ontology>> {
            match self.ontology.id() {
                Some(id) if id == key => Ok(self.ontology.clone()),
                _ => Err(SereneError::NotFound { kind: "Ontology", key }),
            }
        }
    }

    impl Lookup<Model> for Catalog {
        fn lookup(&self, key: i64) -> SereneResult<Arc<Model>> {
            match self.model.id() {
                Some(id) if id == key => Ok(self.model.clone()),
                _ => Err(SereneError::NotFound { kind: "Model", key }),
            }
        }
    }

    fn catalog() -> Catalog {
        let model = Model::from_json(&json!({
            "id": 9,
            "modelType": "randomForest",
            "features": {"activeFeatures": ["shannon-entropy"]},
            "resamplingStrategy": "Bagging",
            "numBags": 40,
            "bagSize": 80,
            "state": {"status": "untrained"},
            "dateCreated": "2017-04-19T05:37:48.417Z",
            "dateModified": "2017-04-19T05:37:48.417Z"
        }))
        .unwrap();
        let ontology = Ontology::from_json(&json!({
            "id": 2,
            "name": "people.owl",
            "dateCreated": "2017-04-19T05:37:48.417Z",
            "dateModified": "2017-04-19T05:37:48.417Z"
        }))
        .unwrap();
        Catalog {
            model: Arc::new(model),
            ontology: Arc::new(ontology),
        }
    }

    fn octopus_blob() -> Value {
        json!({
            "id": 4,
            "name": "people",
            "description": "people octopus",
            "ssds": [],
            "ontologies": [2],
            "lobsterID": 9,
            "modelingProps": {"confidenceWeight": 0.5, "addOntologyPaths": false},
            "semanticTypeMap": {"Person": "http://schema.org/"},
            "state": {"status": "untrained", "message": "", "dateChanged": "2017-04-19T05:37:48.417Z"},
            "dateCreated": "2017-04-19T05:37:48.417Z",
            "dateModified": "2017-04-19T05:37:48.417Z"
        })
    }

    fn props(value: Value) -> SereneResult<ModelingProps> {
        ModelingProps::try_from(value)
    }

    #[test]
    fn test_modeling_props_ranges() {
        assert!(matches!(props(json!({"confidenceWeight": 1.5})), Err(SereneError::Validation(_))));
        assert!(props(json!({"confidenceWeight": 0.5})).is_ok());
        assert!(props(json!({"sizeWeight": 0.0, "coherenceWeight": 1.0})).is_ok());
        assert!(props(json!({"numSemanticTypes": 0})).is_err());
        assert!(props(json!({"topkSteinerTrees": 3})).is_ok());
        assert!(props(json!({"mappingBranchFactor": "many"})).is_err());
        assert!(props(json!({"unrelated": -4})).is_ok());
        assert!(props(json!([1, 2])).is_err());
        assert!(props(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_builder_rejects_empty_bagging() {
        assert!(Octopus::builder().num_bags(0).build().is_err());
        assert!(Octopus::builder().bag_size(0).build().is_err());

        let octo = Octopus::builder().name("local").build().unwrap();
        assert!(!octo.stored());
        assert_eq!(octo.id(), None);
        assert_eq!(octo.to_string(), "Octopus(local, local)");
    }

    #[test]
    fn test_update_derives_model_fields() {
        let cat = catalog();
        let octo = Octopus::from_json(&octopus_blob(), &cat, &cat, &cat).unwrap();

        assert!(octo.stored());
        assert_eq!(octo.id(), Some(4));
        assert_eq!(octo.model_id(), Some(9));
        assert_eq!(octo.feature_config(), cat.model.features());
        assert_eq!(octo.resampling_strategy(), SamplingStrategy::Bagging);
        assert_eq!(octo.num_bags(), 40);
        assert_eq!(octo.bag_size(), 80);
        assert_eq!(octo.ontologies().len(), 1);
        assert_eq!(octo.state().unwrap().status, Status::Untrained);
        assert_eq!(octo.modeling_props().get("confidenceWeight"), Some(&json!(0.5)));
    }

    #[test]
    fn test_add_and_remove_mark_local() {
        let cat = catalog();
        let mut octo = Octopus::from_json(&octopus_blob(), &cat, &cat, &cat).unwrap();

        let ssd = Arc::new(Ssd::new(Arc::new(DataSet::new()), vec![]));
        octo.add(ssd.clone()).unwrap();
        assert!(!octo.stored());
        assert_eq!(octo.ssds().len(), 1);

        octo.remove(ssd).unwrap();
        assert!(octo.ssds().is_empty());

        octo.remove(cat.ontology.clone()).unwrap();
        assert!(octo.ontologies().is_empty());
    }

    #[test]
    fn test_add_rejects_other_kinds() {
        let cat = catalog();
        let mut octo = Octopus::from_json(&octopus_blob(), &cat, &cat, &cat).unwrap();

        let err = octo.add(cat.model.clone()).unwrap_err();
        assert!(matches!(err, SereneError::Validation(_)));
        assert!(octo.stored());
        assert!(octo.ssds().is_empty());
        assert_eq!(octo.ontologies().len(), 1);

        let stranger = Arc::new(Ontology::new("/tmp/other.owl"));
        assert!(octo.remove(stranger).is_err());
        assert!(octo.stored());
    }

    #[test]
    fn test_to_json_names_unstored_dependency() {
        let local = Arc::new(Ontology::new("/tmp/draft.owl"));
        let octo = Octopus::builder().ontology(local).build().unwrap();

        let err = octo.to_json().unwrap_err();
        assert!(matches!(err, SereneError::Validation(_)));
        assert!(err.to_string().contains("Ontology is not stored"));
    }

    #[test]
    fn test_score_display() {
        let score: OctopusScore = serde_json::from_value(json!({
            "sizeReduction": 0.5,
            "nodeConfidence": 0.81,
            "nodeCoherence": 1.0,
            "linkCoherence": 1.0,
            "linkCost": 4.0,
            "karmaScore": 0.734,
            "karmaRank": 1,
            "nodeCoverage": 1.0
        }))
        .unwrap();
        assert_eq!(score.to_string(), "Score(rank=1, score=0.73, confidence=0.81, coverage=1.00)");
    }
}
