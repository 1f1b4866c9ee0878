//! Session: one transport, one set of endpoints, and the cache cascade
//! between them

use std::sync::Arc;

use tracing::info;

use crate::cache::EndpointCache;
use crate::config::ClientConfig;
use crate::elements::{DataSet, Model, Octopus, Ontology, Ssd};
use crate::endpoints::octopus::Collaborators;
use crate::endpoints::{DatasetEndpoint, ModelEndpoint, OctopusEndpoint, OntologyEndpoint, SsdEndpoint};
use crate::error::SereneResult;
use crate::transport::{HttpTransport, Transport};

/// Entry point of the client.
///
/// ```no_run
/// use serene::{ClientConfig, Serene};
///
/// let serene = Serene::new(ClientConfig::from_env()?)?;
/// for dataset in serene.datasets().items()?.iter() {
///     println!("{}", dataset);
/// }
/// # Ok::<(), serene::SereneError>(())
/// ```
///
/// Entities refer to each other (an SSD to its dataset and ontologies, an
/// octopus to its SSDs, ontologies and model), so dropping one endpoint's
/// cache also drops the caches of every endpoint whose entities may hold
/// stale references into it.
pub struct Serene {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    datasets: Arc<DatasetEndpoint>,
    ontologies: Arc<OntologyEndpoint>,
    ssds: Arc<SsdEndpoint>,
    models: Arc<ModelEndpoint>,
    octopii: Arc<OctopusEndpoint>,
}

impl Serene {
    /// Connect to the server described by `config` over HTTP
    pub fn new(config: ClientConfig) -> SereneResult<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        info!("Connecting to Serene at {}", transport.base_url());
        Ok(Self::with_transport(config, transport))
    }

    /// Build a session over any transport, e.g. an `InMemoryTransport`
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let capacity = config.cache_capacity;

        let octopus_cache: Arc<EndpointCache<Octopus>> = Arc::new(EndpointCache::new("octopus", capacity));
        let ssd_cache: Arc<EndpointCache<Ssd>> = Arc::new(EndpointCache::new("ssd", capacity));
        let model_cache: Arc<EndpointCache<Model>> = Arc::new(EndpointCache::new("model", capacity));
        let ontology_cache: Arc<EndpointCache<Ontology>> = Arc::new(EndpointCache::new("ontology", capacity));
        let dataset_cache: Arc<EndpointCache<DataSet>> = Arc::new(EndpointCache::new("dataset", capacity));

        ssd_cache.add_downstream(octopus_cache.clone());
        model_cache.add_downstream(octopus_cache.clone());
        ontology_cache.add_downstream(ssd_cache.clone());
        ontology_cache.add_downstream(octopus_cache.clone());
        dataset_cache.add_downstream(ssd_cache.clone());
        dataset_cache.add_downstream(octopus_cache.clone());

        let datasets = Arc::new(DatasetEndpoint::new(transport.clone(), dataset_cache));
        let ontologies = Arc::new(OntologyEndpoint::new(transport.clone(), ontology_cache));
        let models = Arc::new(ModelEndpoint::new(transport.clone(), model_cache));
        let ssds = Arc::new(SsdEndpoint::new(
            transport.clone(),
            ssd_cache,
            datasets.clone(),
            ontologies.clone(),
        ));
        let octopii = Arc::new(OctopusEndpoint::new(
            transport.clone(),
            octopus_cache,
            Collaborators {
                datasets: datasets.clone(),
                ontologies: ontologies.clone(),
                ssds: ssds.clone(),
                models: models.clone(),
            },
            config.storage_root.clone(),
        ));

        Serene {
            config,
            transport,
            datasets,
            ontologies,
            ssds,
            models,
            octopii,
        }
    }

    pub fn datasets(&self) -> &DatasetEndpoint {
        &self.datasets
    }

    pub fn ontologies(&self) -> &OntologyEndpoint {
        &self.ontologies
    }

    pub fn ssds(&self) -> &SsdEndpoint {
        &self.ssds
    }

    pub fn models(&self) -> &ModelEndpoint {
        &self.models
    }

    pub fn octopii(&self) -> &OctopusEndpoint {
        &self.octopii
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl std::fmt::Debug for Serene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serene").field("config", &self.config).finish_non_exhaustive()
    }
}
