//! Model endpoint
//!
//! Models are created by the server alongside an octopus, so there is no
//! upload here.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use super::Target;
use crate::cache::EndpointCache;
use crate::elements::{DataSet, EntityKind, Lookup, Model};
use crate::error::SereneResult;
use crate::transport::Transport;

pub struct ModelEndpoint {
    transport: Arc<dyn Transport>,
    cache: Arc<EndpointCache<Model>>,
}

impl ModelEndpoint {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<EndpointCache<Model>>) -> Self {
        Self { transport, cache }
    }

    pub fn remove<'a>(&self, model: impl Into<Target<'a, Model>>) -> SereneResult<()> {
        let key = model.into().resolve()?;
        self.cache.mutate(|| self.transport.delete(EntityKind::Model, key))?;
        info!("Removed model {}", key);
        Ok(())
    }

    pub fn get(&self, key: i64) -> SereneResult<Arc<Model>> {
        self.cache
            .lookup(key, || Model::from_json(&self.transport.item(EntityKind::Model, key)?))
    }

    pub fn items(&self) -> SereneResult<Arc<[Arc<Model>]>> {
        self.cache.listing(|| {
            self.transport
                .keys(EntityKind::Model)?
                .into_iter()
                .map(|key| self.get(key))
                .collect()
        })
    }

    /// Raw schema-matcher prediction of `model` on `dataset`
    pub fn predict<'a, 'b>(
        &self,
        model: impl Into<Target<'a, Model>>,
        dataset: impl Into<Target<'b, DataSet>>,
    ) -> SereneResult<Value> {
        let key = model.into().resolve()?;
        let dataset = dataset.into().resolve()?;
        self.transport.predict(EntityKind::Model, key, dataset)
    }

    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

impl Lookup<Model> for ModelEndpoint {
    fn lookup(&self, key: i64) -> SereneResult<Arc<Model>> {
        self.get(key)
    }
}
