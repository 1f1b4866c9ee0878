//! Octopus endpoint: upload, training, prediction, alignment and pattern
//! export

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{require_stored, DatasetEndpoint, ModelEndpoint, OntologyEndpoint, SsdEndpoint, Target};
use crate::alignment::{convert_karma_graph, AlignmentGraph};
use crate::cache::EndpointCache;
use crate::elements::{DataSet, EntityKind, Lookup, ModelState, Octopus, OctopusScore, Ssd, SsdResult, Status};
use crate::error::{SereneError, SereneResult};
use crate::patterns::{export_patterns, PatternRow};
use crate::poll::{poll_until_terminal, CancelFlag, PollConfig, PollEvent};
use crate::transport::{Payload, Transport};

const STORAGE_SEGMENT: &str = "/storage/";

#[derive(Deserialize)]
struct PredictionBlob {
    predictions: Vec<PredictionEntry>,
}

#[derive(Deserialize)]
struct PredictionEntry {
    ssd: Value,
    score: Value,
}

/// Endpoints an octopus is hydrated against
pub(crate) struct Collaborators {
    pub datasets: Arc<DatasetEndpoint>,
    pub ontologies: Arc<OntologyEndpoint>,
    pub ssds: Arc<SsdEndpoint>,
    pub models: Arc<ModelEndpoint>,
}

pub struct OctopusEndpoint {
    transport: Arc<dyn Transport>,
    cache: Arc<EndpointCache<Octopus>>,
    datasets: Arc<DatasetEndpoint>,
    ontologies: Arc<OntologyEndpoint>,
    ssds: Arc<SsdEndpoint>,
    models: Arc<ModelEndpoint>,
    storage_root: Option<PathBuf>,
}

impl OctopusEndpoint {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<EndpointCache<Octopus>>,
        with: Collaborators,
        storage_root: Option<PathBuf>,
    ) -> Self {
        Self {
            transport,
            cache,
            datasets: with.datasets,
            ontologies: with.ontologies,
            ssds: with.ssds,
            models: with.models,
            storage_root,
        }
    }

    fn hydrate(&self, octopus: &mut Octopus, json: &Value) -> SereneResult<()> {
        octopus.update(json, self.ssds.as_ref(), self.ontologies.as_ref(), self.models.as_ref())?;
        Ok(())
    }

    /// The server creates or deletes the octopus' model along with it, so
    /// octopus mutations drop the model cache as well.
    fn mutate<R>(&self, call: impl FnOnce() -> SereneResult<R>) -> SereneResult<R> {
        let out = self.cache.mutate(call);
        self.models.invalidate();
        out
    }

    /// Upload `octopus` and hydrate it in place. Every SSD and ontology it
    /// references must already be stored.
    pub fn upload(&self, octopus: &mut Octopus) -> SereneResult<()> {
        let body = octopus.to_json()?;
        let json = self.mutate(|| self.transport.post(EntityKind::Octopus, Payload::Json(body)))?;
        self.hydrate(octopus, &json)?;
        info!("Uploaded {}", octopus);
        Ok(())
    }

    pub fn remove<'a>(&self, octopus: impl Into<Target<'a, Octopus>>) -> SereneResult<()> {
        let key = octopus.into().resolve()?;
        self.mutate(|| self.transport.delete(EntityKind::Octopus, key))?;
        info!("Removed octopus {}", key);
        Ok(())
    }

    pub fn get(&self, key: i64) -> SereneResult<Arc<Octopus>> {
        self.cache.lookup(key, || {
            let json = self.transport.item(EntityKind::Octopus, key)?;
            Octopus::from_json(&json, self.ssds.as_ref(), self.ontologies.as_ref(), self.models.as_ref())
        })
    }

    pub fn items(&self) -> SereneResult<Arc<[Arc<Octopus>]>> {
        self.cache.listing(|| {
            self.transport
                .keys(EntityKind::Octopus)?
                .into_iter()
                .map(|key| self.get(key))
                .collect()
        })
    }

    /// Re-read `octopus` from the server, bypassing the cache, and return
    /// its training status
    pub fn refresh(&self, octopus: &mut Octopus) -> SereneResult<Status> {
        let key = require_stored(octopus, "Upload it first.")?;
        let json = self.transport.item(EntityKind::Octopus, key)?;
        self.hydrate(octopus, &json)?;
        Ok(octopus.state().map_or(Status::Untrained, |s| s.status))
    }

    /// Train `octopus` and wait for the outcome. Returns `true` iff training
    /// completed, `false` if the server reports an error.
    pub fn train(
        &self,
        octopus: &mut Octopus,
        config: &PollConfig,
        on_event: impl FnMut(&PollEvent),
    ) -> SereneResult<bool> {
        self.train_cancellable(octopus, config, None, on_event)
    }

    /// [`train`](Self::train), stopping early once `cancel` is set
    pub fn train_cancellable(
        &self,
        octopus: &mut Octopus,
        config: &PollConfig,
        cancel: Option<&CancelFlag>,
        on_event: impl FnMut(&PollEvent),
    ) -> SereneResult<bool> {
        let key = require_stored(octopus, "Upload it before training.")?;
        self.transport.train(EntityKind::Octopus, key)?;
        info!("Training {}", octopus);

        let what = format!("training of {}", octopus);
        let outcome = poll_until_terminal(&what, config, cancel, || self.refresh(octopus), on_event);
        // model state changed server side
        self.models.invalidate();
        Ok(outcome? == Status::Complete)
    }

    /// Candidate SSDs for `dataset`, in the order the server ranks them
    pub fn predict<'a>(
        &self,
        octopus: &Octopus,
        dataset: impl Into<Target<'a, DataSet>>,
    ) -> SereneResult<Vec<SsdResult>> {
        let key = require_stored(octopus, "Upload and train it first.")?;
        let dataset = dataset.into().resolve()?;

        let blob = PredictionBlob::deserialize(self.transport.predict(EntityKind::Octopus, key, dataset)?)?;
        blob.predictions
            .iter()
            .map(|entry| -> SereneResult<SsdResult> {
                let ssd = Ssd::from_prediction(&entry.ssd, self.datasets.as_ref(), self.ontologies.as_ref())?;
                let score = OctopusScore::deserialize(&entry.score)?;
                Ok(SsdResult::new(ssd, score))
            })
            .collect()
    }

    /// Raw schema-matcher prediction of the octopus' model on `dataset`
    pub fn matcher_predict<'a>(
        &self,
        octopus: &Octopus,
        dataset: impl Into<Target<'a, DataSet>>,
    ) -> SereneResult<Value> {
        require_stored(octopus, "Upload and train it first.")?;
        let model = octopus
            .model_id()
            .ok_or_else(|| SereneError::precondition(format!("{} has no model", octopus)))?;
        self.models.predict(model, dataset)
    }

    /// Alignment graph of a trained octopus
    pub fn alignment(&self, octopus: &Octopus) -> SereneResult<AlignmentGraph> {
        let key = require_stored(octopus, "Upload and train it first.")?;
        convert_karma_graph(&self.transport.alignment(key)?)
    }

    /// Mine patterns for a trained octopus and write them as CSV to `out`
    pub fn patterns(&self, octopus: &Octopus, out: &Path) -> SereneResult<Vec<PatternRow>> {
        let key = require_stored(octopus, "Upload and train it first.")?;
        let current = self.transport.item(EntityKind::Octopus, key)?;
        let state = ModelState::from_json(&current["state"])?;
        if state.status != Status::Complete {
            return Err(SereneError::precondition(format!(
                "{} is not trained (status {}). Train it first.",
                octopus, state.status
            )));
        }

        let server_dir = self.transport.patterns(key)?;
        let export_dir = self.local_dir(&server_dir)?;
        info!("Reading pattern export from {}", export_dir.display());
        let alignment = self.alignment(octopus)?;
        export_patterns(&alignment, &export_dir, out)
    }

    /// Map a server storage path under the configured local storage root
    fn local_dir(&self, server_dir: &str) -> SereneResult<PathBuf> {
        let Some(root) = &self.storage_root else {
            return Ok(PathBuf::from(server_dir));
        };
        match server_dir.split_once(STORAGE_SEGMENT) {
            Some((_, rest)) => Ok(root.join(rest)),
            None => Err(SereneError::validation(format!(
                "{} is not under the server storage directory",
                server_dir
            ))),
        }
    }

    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

impl Lookup<Octopus> for OctopusEndpoint {
    fn lookup(&self, key: i64) -> SereneResult<Arc<Octopus>> {
        self.get(key)
    }
}
