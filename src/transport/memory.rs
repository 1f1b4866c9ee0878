//! InMemoryTransport: in-process fake Serene server
//!
//! Holds JSON blobs per entity kind, assigns ids and timestamps, counts
//! calls, and scripts training: a trained octopus reports `busy` for a
//! fixed number of reads before it turns `complete` (or `error`).

use std::collections::HashMap;
use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{Payload, Transport};
use crate::elements::{EntityKind, Status};
use crate::error::{SereneError, SereneResult};

const SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, Copy)]
struct Training {
    remaining: u32,
    outcome: Status,
}

#[derive(Default)]
struct ServerState {
    next_id: i64,
    blobs: HashMap<EntityKind, IndexMap<i64, Value>>,
    calls: HashMap<String, usize>,
    training: HashMap<i64, Training>,
    alignments: HashMap<i64, Value>,
    predictions: HashMap<i64, Value>,
    pattern_dirs: HashMap<i64, String>,
    fail_next_mutation: bool,
}

impl ServerState {
    fn fresh_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn table(&mut self, kind: EntityKind) -> &mut IndexMap<i64, Value> {
        self.blobs.entry(kind).or_default()
    }

    fn get(&self, kind: EntityKind, key: i64) -> SereneResult<&Value> {
        self.blobs
            .get(&kind)
            .and_then(|t| t.get(&key))
            .ok_or(SereneError::NotFound { kind: kind.name(), key })
    }

    fn count(&mut self, op: &str, kind: EntityKind) {
        *self.calls.entry(call_key(op, kind)).or_default() += 1;
    }

    /// Apply a mutation, then fail it if a failure was scripted
    fn mutation_outcome<T>(&mut self, result: SereneResult<T>) -> SereneResult<T> {
        if std::mem::take(&mut self.fail_next_mutation) {
            return Err(SereneError::Server {
                status: 503,
                message: "connection reset after write".to_string(),
            });
        }
        result
    }
}

fn call_key(op: &str, kind: EntityKind) -> String {
    format!("{} {}", op, kind.path())
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn state_blob(status: Status) -> Value {
    json!({ "status": status, "message": "", "dateChanged": now() })
}

/// Fake Serene server for tests and offline use
pub struct InMemoryTransport {
    state: Mutex<ServerState>,
    training_polls: u32,
    training_outcome: Status,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState::default()),
            training_polls: 2,
            training_outcome: Status::Complete,
        }
    }

    /// Number of reads a training octopus stays `busy`
    pub fn with_training_polls(mut self, polls: u32) -> Self {
        self.training_polls = polls;
        self
    }

    /// Terminal status training ends in
    pub fn with_training_outcome(mut self, outcome: Status) -> Self {
        self.training_outcome = outcome;
        self
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a blob directly, assigning an id and timestamps if missing.
    /// Returns the id.
    pub fn insert(&self, kind: EntityKind, mut blob: Value) -> i64 {
        let mut state = self.state();
        let id = match blob.get("id").and_then(Value::as_i64) {
            Some(id) => {
                state.next_id = state.next_id.max(id);
                id
            }
            None => state.fresh_id(),
        };
        stamp(&mut blob, id);
        state.table(kind).insert(id, blob);
        id
    }

    /// Alignment graph returned for `octopus`
    pub fn set_alignment(&self, octopus: i64, alignment: Value) {
        self.state().alignments.insert(octopus, alignment);
    }

    /// Prediction blob returned for `key` (an octopus or model id)
    pub fn set_prediction(&self, key: i64, prediction: Value) {
        self.state().predictions.insert(key, prediction);
    }

    /// Directory reported by pattern mining for `octopus`
    pub fn set_patterns_dir(&self, octopus: i64, dir: impl Into<String>) {
        self.state().pattern_dirs.insert(octopus, dir.into());
    }

    /// Make the next post/update/delete apply its change and then fail,
    /// as a dropped connection would.
    pub fn fail_next_mutation(&self) {
        self.state().fail_next_mutation = true;
    }

    /// How many times `op` ("keys", "item", "post", ...) hit `kind`
    pub fn calls(&self, op: &str, kind: EntityKind) -> usize {
        self.state().calls.get(&call_key(op, kind)).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.values().sum()
    }

    pub fn reset_calls(&self) {
        self.state().calls.clear();
    }

    /// Current stored blob, without counting a call
    pub fn peek(&self, kind: EntityKind, key: i64) -> Option<Value> {
        self.state().get(kind, key).ok().cloned()
    }

    fn create_dataset(state: &mut ServerState, payload: Payload) -> SereneResult<Value> {
        let Payload::File { path, .. } = &payload else {
            return Err(SereneError::validation("dataset upload needs a file"));
        };
        let content = fs::read_to_string(path)?;
        let id = state.fresh_id();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut lines = content.lines();
        let header: Vec<&str> = lines.next().map(|h| h.split(',').collect()).unwrap_or_default();
        let rows: Vec<Vec<&str>> = lines.map(|l| l.split(',').collect()).collect();

        let mut columns = Vec::with_capacity(header.len());
        for (index, name) in header.iter().enumerate() {
            let sample: Vec<&str> = rows
                .iter()
                .filter_map(|r| r.get(index).copied())
                .take(SAMPLE_ROWS)
                .collect();
            columns.push(json!({
                "id": state.fresh_id(),
                "index": index,
                "name": name.trim(),
                "datasetID": id,
                "size": rows.len(),
                "logicalType": "string",
                "sample": sample,
                "path": format!("/storage/datasets/{}/{}", id, filename),
            }));
        }

        let type_map: Value = payload
            .get_field("typeMap")
            .map(serde_json::from_str::<Value>)
            .transpose()?
            .unwrap_or_else(|| json!({}));
        let mut blob = json!({
            "description": payload.get_field("description").unwrap_or_default(),
            "filename": filename,
            "path": format!("/storage/datasets/{}/{}", id, filename),
            "typeMap": type_map,
            "columns": columns,
        });
        stamp(&mut blob, id);
        state.table(EntityKind::DataSet).insert(id, blob.clone());
        Ok(blob)
    }

    fn create_ontology(state: &mut ServerState, payload: Payload) -> SereneResult<Value> {
        let Payload::File { path, .. } = &payload else {
            return Err(SereneError::validation("ontology upload needs a file"));
        };
        if !path.exists() {
            return Err(SereneError::Server {
                status: 400,
                message: format!("no such file {}", path.display()),
            });
        }
        let id = state.fresh_id();
        let mut blob = json!({
            "name": path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            "description": payload.get_field("description").unwrap_or_default(),
            "format": payload.get_field("format").unwrap_or("owl"),
        });
        stamp(&mut blob, id);
        state.table(EntityKind::Ontology).insert(id, blob.clone());
        Ok(blob)
    }

    fn create_octopus(state: &mut ServerState, mut body: Value) -> SereneResult<Value> {
        let model_id = state.fresh_id();
        let octopus_id = state.fresh_id();

        let mut model = json!({
            "description": body["description"].clone(),
            "modelType": body["modelType"].clone(),
            "features": body["features"].clone(),
            "resamplingStrategy": body["resamplingStrategy"].clone(),
            "numBags": body["numBags"].clone(),
            "bagSize": body["bagSize"].clone(),
            "classes": [],
            "refDataSets": [],
            "state": state_blob(Status::Untrained),
        });
        stamp(&mut model, model_id);
        state.table(EntityKind::Model).insert(model_id, model);

        if let Some(obj) = body.as_object_mut() {
            for field in ["modelType", "features", "resamplingStrategy", "numBags", "bagSize"] {
                obj.remove(field);
            }
            obj.insert("lobsterID".to_string(), json!(model_id));
            obj.insert("semanticTypeMap".to_string(), json!({}));
            obj.insert("state".to_string(), state_blob(Status::Untrained));
        }
        stamp(&mut body, octopus_id);
        state.table(EntityKind::Octopus).insert(octopus_id, body.clone());
        Ok(body)
    }

    /// Advance scripted training by one read of `octopus`
    fn tick_training(&self, state: &mut ServerState, octopus: i64) {
        let Some(training) = state.training.get_mut(&octopus) else {
            return;
        };
        if training.remaining > 0 {
            training.remaining -= 1;
            return;
        }
        let outcome = training.outcome;
        state.training.remove(&octopus);
        debug!("Training of octopus {} finished: {}", octopus, outcome);

        let model_id = state
            .get(EntityKind::Octopus, octopus)
            .ok()
            .and_then(|b| b["lobsterID"].as_i64());
        set_status(state, EntityKind::Octopus, octopus, outcome);
        if let Some(model_id) = model_id {
            set_status(state, EntityKind::Model, model_id, outcome);
        }
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn stamp(blob: &mut Value, id: i64) {
    if let Some(obj) = blob.as_object_mut() {
        let ts = now();
        obj.insert("id".to_string(), json!(id));
        obj.entry("dateCreated").or_insert_with(|| json!(ts.clone()));
        obj.insert("dateModified".to_string(), json!(ts));
    }
}

fn set_status(state: &mut ServerState, kind: EntityKind, key: i64, status: Status) {
    if let Some(blob) = state.table(kind).get_mut(&key) {
        blob["state"] = state_blob(status);
    }
}

fn merge(target: &mut Value, patch: Map<String, Value>) {
    if let Some(obj) = target.as_object_mut() {
        obj.extend(patch);
    }
}

impl Transport for InMemoryTransport {
    fn keys(&self, kind: EntityKind) -> SereneResult<Vec<i64>> {
        let mut state = self.state();
        state.count("keys", kind);
        Ok(state.blobs.get(&kind).map(|t| t.keys().copied().collect()).unwrap_or_default())
    }

    fn item(&self, kind: EntityKind, key: i64) -> SereneResult<Value> {
        let mut state = self.state();
        state.count("item", kind);
        if kind == EntityKind::Octopus {
            self.tick_training(&mut state, key);
        }
        state.get(kind, key).cloned()
    }

    fn post(&self, kind: EntityKind, payload: Payload) -> SereneResult<Value> {
        let mut state = self.state();
        state.count("post", kind);
        let result = match (kind, payload) {
            (EntityKind::DataSet, payload) => Self::create_dataset(&mut state, payload),
            (EntityKind::Ontology, payload) => Self::create_ontology(&mut state, payload),
            (EntityKind::Octopus, Payload::Json(body)) => Self::create_octopus(&mut state, body),
            (EntityKind::Ssd, Payload::Json(mut body)) => {
                let id = state.fresh_id();
                stamp(&mut body, id);
                state.table(kind).insert(id, body.clone());
                Ok(body)
            }
            (kind, _) => Err(SereneError::Server {
                status: 405,
                message: format!("cannot create {} with this payload", kind),
            }),
        };
        state.mutation_outcome(result)
    }

    fn update(&self, kind: EntityKind, key: i64, payload: Payload) -> SereneResult<Value> {
        let mut state = self.state();
        state.count("update", kind);
        let mut blob = state.get(kind, key)?.clone();

        let patch = match payload {
            Payload::Json(Value::Object(map)) => map,
            Payload::Json(other) => return Err(SereneError::malformed("update", other)),
            Payload::File { fields, .. } => fields
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        };
        merge(&mut blob, patch);
        stamp(&mut blob, key);
        state.table(kind).insert(key, blob.clone());
        state.mutation_outcome(Ok(blob))
    }

    fn delete(&self, kind: EntityKind, key: i64) -> SereneResult<()> {
        let mut state = self.state();
        state.count("delete", kind);
        let result = state
            .table(kind)
            .shift_remove(&key)
            .map(|_| ())
            .ok_or(SereneError::NotFound { kind: kind.name(), key });
        state.mutation_outcome(result)
    }

    fn train(&self, kind: EntityKind, key: i64) -> SereneResult<()> {
        let mut state = self.state();
        state.count("train", kind);
        state.get(kind, key)?;
        set_status(&mut state, kind, key, Status::Busy);
        if kind == EntityKind::Octopus {
            state.training.insert(
                key,
                Training {
                    remaining: self.training_polls,
                    outcome: self.training_outcome,
                },
            );
        }
        Ok(())
    }

    fn predict(&self, kind: EntityKind, key: i64, dataset: i64) -> SereneResult<Value> {
        let mut state = self.state();
        state.count("predict", kind);
        state.get(kind, key)?;
        state.get(EntityKind::DataSet, dataset)?;
        Ok(state
            .predictions
            .get(&key)
            .cloned()
            .unwrap_or_else(|| json!({ "predictions": [] })))
    }

    fn alignment(&self, octopus: i64) -> SereneResult<Value> {
        let mut state = self.state();
        state.count("alignment", EntityKind::Octopus);
        state.get(EntityKind::Octopus, octopus)?;
        Ok(state
            .alignments
            .get(&octopus)
            .cloned()
            .unwrap_or_else(|| json!({ "nodes": [], "links": [] })))
    }

    fn patterns(&self, octopus: i64) -> SereneResult<String> {
        let mut state = self.state();
        state.count("patterns", EntityKind::Octopus);
        state.get(EntityKind::Octopus, octopus)?;
        state.pattern_dirs.get(&octopus).cloned().ok_or_else(|| SereneError::Server {
            status: 500,
            message: format!("no patterns mined for octopus {}", octopus),
        })
    }
}
