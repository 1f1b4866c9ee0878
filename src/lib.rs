//! Serene client
//!
//! A client SDK for the Serene data integration service. Serene learns
//! semantic models of tabular data: given datasets, ontologies and a few
//! hand-written semantic source descriptions (SSDs), it trains an *octopus*
//! that proposes SSDs for new datasets.
//!
//! # Layout
//!
//! - [`transport`]: raw REST calls (`HttpTransport`) or an in-process fake
//!   server (`InMemoryTransport`)
//! - [`endpoints`]: one proxy per entity kind, each with an identity cache
//! - [`elements`]: local mirrors of server entities, hydrated via `update`
//! - [`alignment`]: converter for Karma alignment graphs
//! - [`patterns`]: CSV export of mined patterns
//! - [`poll`]: bounded, cancellable training poller
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use serene::{ClientConfig, Entity, EntityKind, InMemoryTransport, Serene};
//! use serde_json::json;
//!
//! let server = Arc::new(InMemoryTransport::new());
//! server.insert(EntityKind::Ontology, json!({"name": "music.owl", "format": "owl"}));
//!
//! let serene = Serene::with_transport(ClientConfig::default(), server);
//! let ontologies = serene.ontologies().items().unwrap();
//! assert_eq!(ontologies.len(), 1);
//! assert_eq!(ontologies[0].name(), "music.owl");
//!
//! // Repeated lookups hand back the same object until something changes
//! let id = ontologies[0].id().unwrap();
//! let again = serene.ontologies().get(id).unwrap();
//! assert!(Arc::ptr_eq(&ontologies[0], &again));
//! ```

pub mod alignment;
pub mod cache;
pub mod config;
pub mod elements;
pub mod endpoints;
pub mod error;
pub mod graph;
pub mod namespace;
pub mod patterns;
pub mod poll;
pub mod session;
pub mod transport;

pub use alignment::{convert_karma_graph, AlignEdge, AlignNode, AlignNodeKind, AlignmentGraph};
pub use cache::{CacheStats, EndpointCache};
pub use config::ClientConfig;
pub use elements::{
    Column, DataNodeRef, DataSet, Element, Entity, EntityKind, Model, ModelState, ModelType, ModelingProps,
    Octopus, OctopusBuilder, OctopusScore, Ontology, OwlFormat, SamplingStrategy, Ssd, SsdResult, Status,
};
pub use endpoints::{
    DatasetEndpoint, ModelEndpoint, OctopusEndpoint, OntologyEndpoint, OntologySource, SsdEndpoint, Target,
};
pub use error::{SereneError, SereneResult};
pub use patterns::{export_patterns, PatternRow};
pub use poll::{CancelFlag, PollConfig, PollEvent};
pub use session::Serene;
pub use transport::{HttpTransport, InMemoryTransport, Payload, Transport};

/// Client version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
