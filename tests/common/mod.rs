//! Shared fixtures: an in-memory server with people/places data loaded

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{json, Value};
use serene::{ClientConfig, DataSet, Entity, InMemoryTransport, Octopus, Ontology, Serene, Ssd};
use tempfile::TempDir;

pub const PEOPLE_CSV: &str = "name,city\nAnn,Oslo\nBob,Rome\nCid,Lima\n";
pub const PLACES_CSV: &str = "city,country\nOslo,Norway\nRome,Italy\n";
pub const PEOPLE_OWL: &str = "<rdf:RDF/>\n";

pub struct Fixture {
    pub server: Arc<InMemoryTransport>,
    pub serene: Serene,
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with(InMemoryTransport::new(), ClientConfig::default())
    }

    pub fn with(server: InMemoryTransport, config: ClientConfig) -> Self {
        let server = Arc::new(server);
        let serene = Serene::with_transport(config, server.clone());
        Fixture {
            server,
            serene,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn upload_dataset(&self, name: &str, content: &str) -> Arc<DataSet> {
        let path = self.write(name, content);
        let dataset = self
            .serene
            .datasets()
            .upload(&path, name, &IndexMap::new())
            .unwrap();
        self.serene.datasets().get(id_of(dataset.id())).unwrap()
    }

    pub fn upload_ontology(&self, name: &str) -> Arc<Ontology> {
        let path = self.write(name, PEOPLE_OWL);
        let ontology = self
            .serene
            .ontologies()
            .upload(path.as_path(), "people and places", None)
            .unwrap();
        self.serene.ontologies().get(id_of(ontology.id())).unwrap()
    }

    /// A stored SSD mapping both people columns
    pub fn upload_ssd(&self, dataset: &Arc<DataSet>, ontology: &Arc<Ontology>) -> Arc<Ssd> {
        let mut ssd = Ssd::new(dataset.clone(), vec![ontology.clone()]);
        ssd.map("name", "Person", "name").unwrap();
        ssd.map("city", "Place", "name").unwrap();
        ssd.link("Person", "livesIn", "Place").unwrap();
        self.serene.ssds().upload(&mut ssd).unwrap();
        self.serene.ssds().get(id_of(ssd.id())).unwrap()
    }

    /// Dataset, ontology, SSD and an uploaded (untrained) octopus over them
    pub fn stored_octopus(&self) -> (Arc<DataSet>, Octopus) {
        let dataset = self.upload_dataset("people.csv", PEOPLE_CSV);
        let ontology = self.upload_ontology("people.owl");
        let ssd = self.upload_ssd(&dataset, &ontology);

        let mut octopus = Octopus::builder()
            .name("people")
            .description("people and where they live")
            .ssd(ssd)
            .ontology(ontology)
            .build()
            .unwrap();
        self.serene.octopii().upload(&mut octopus).unwrap();
        (dataset, octopus)
    }
}

pub fn id_of(id: Option<i64>) -> i64 {
    id.expect("entity should be stored")
}

pub fn write_in(dir: &Path, name: &str, content: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), content).unwrap();
}

/// Karma alignment export matching the people SSD
pub fn karma_alignment() -> Value {
    json!({
        "nodes": [
            {"id": "http://ex.org/onto#Person1", "type": "InternalNode", "label": {"uri": "http://ex.org/onto#Person"}},
            {"id": "HN1", "type": "ColumnNode"},
            {"id": "http://ex.org/onto#Place1", "type": "InternalNode", "label": {"uri": "http://ex.org/onto#Place"}},
            {"id": "HN2", "type": "ColumnNode"}
        ],
        "links": [
            {"id": "http://ex.org/onto#Person1---http://ex.org/onto#name---HN1", "type": "DataPropertyLink", "weight": 1.0},
            {"id": "http://ex.org/onto#Person1---http://ex.org/onto#livesIn---http://ex.org/onto#Place1", "type": "ObjectPropertyLink", "weight": 0.5},
            {"id": "http://ex.org/onto#Place1---http://ex.org/onto#name---HN2", "type": "DataPropertyLink", "weight": 1.0}
        ]
    })
}

pub fn score(rank: i64) -> Value {
    json!({
        "sizeReduction": 0.5,
        "nodeConfidence": 0.9,
        "nodeCoherence": 1.0,
        "linkCoherence": 1.0,
        "linkCost": 3.0,
        "karmaScore": 0.8,
        "karmaRank": rank,
        "nodeCoverage": 1.0
    })
}
