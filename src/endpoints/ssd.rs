//! SSD endpoint

use std::sync::Arc;

use tracing::info;

use super::{DatasetEndpoint, OntologyEndpoint, Target};
use crate::cache::EndpointCache;
use crate::elements::{EntityKind, Lookup, Ssd};
use crate::error::SereneResult;
use crate::transport::{Payload, Transport};

/// View, upload and remove semantic source descriptions
pub struct SsdEndpoint {
    transport: Arc<dyn Transport>,
    cache: Arc<EndpointCache<Ssd>>,
    datasets: Arc<DatasetEndpoint>,
    ontologies: Arc<OntologyEndpoint>,
}

impl SsdEndpoint {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<EndpointCache<Ssd>>,
        datasets: Arc<DatasetEndpoint>,
        ontologies: Arc<OntologyEndpoint>,
    ) -> Self {
        Self {
            transport,
            cache,
            datasets,
            ontologies,
        }
    }

    /// Upload `ssd` and hydrate it in place with the stored version. Its
    /// dataset and ontologies must already be on the server.
    pub fn upload(&self, ssd: &mut Ssd) -> SereneResult<()> {
        let body = ssd.to_json()?;
        let json = self.cache.mutate(|| self.transport.post(EntityKind::Ssd, Payload::Json(body)))?;
        ssd.update(&json, self.datasets.as_ref(), self.ontologies.as_ref())?;
        info!("Uploaded {}", ssd);
        Ok(())
    }

    pub fn remove<'a>(&self, ssd: impl Into<Target<'a, Ssd>>) -> SereneResult<()> {
        let key = ssd.into().resolve()?;
        self.cache.mutate(|| self.transport.delete(EntityKind::Ssd, key))?;
        info!("Removed SSD {}", key);
        Ok(())
    }

    pub fn get(&self, key: i64) -> SereneResult<Arc<Ssd>> {
        self.cache.lookup(key, || {
            let json = self.transport.item(EntityKind::Ssd, key)?;
            Ssd::from_json(&json, self.datasets.as_ref(), self.ontologies.as_ref())
        })
    }

    pub fn items(&self) -> SereneResult<Arc<[Arc<Ssd>]>> {
        self.cache.listing(|| {
            self.transport
                .keys(EntityKind::Ssd)?
                .into_iter()
                .map(|key| self.get(key))
                .collect()
        })
    }

    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

impl Lookup<Ssd> for SsdEndpoint {
    fn lookup(&self, key: i64) -> SereneResult<Arc<Ssd>> {
        self.get(key)
    }
}
