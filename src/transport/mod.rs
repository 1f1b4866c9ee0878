//! Transport: raw access to the Serene REST API
//!
//! Implemented by:
//! - `HttpTransport`: blocking HTTP client for a running Serene server
//! - `InMemoryTransport`: in-process fake server (tests, offline demos)
//!
//! Transports deal in JSON blobs only. Hydration into entities and caching
//! happen in the endpoint layer.

pub mod http;
pub mod memory;

use std::path::PathBuf;

use serde_json::Value;

use crate::elements::EntityKind;
use crate::error::SereneResult;

pub use http::HttpTransport;
pub use memory::InMemoryTransport;

/// Body of a create or update request
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// JSON document
    Json(Value),
    /// Multipart upload of a local file plus text fields
    File {
        path: PathBuf,
        fields: Vec<(String, String)>,
    },
}

impl Payload {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Payload::File {
            path: path.into(),
            fields: Vec::new(),
        }
    }

    /// Add a text field to a file payload. No-op for JSON payloads.
    pub fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        if let Payload::File { fields, .. } = &mut self {
            fields.push((name.to_string(), value.into()));
        }
        self
    }

    /// Value of a text field of a file payload
    pub fn get_field(&self, name: &str) -> Option<&str> {
        match self {
            Payload::File { fields, .. } => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            Payload::Json(_) => None,
        }
    }
}

/// Raw calls against one Serene server.
///
/// Every call blocks until the server answers. An unknown key yields
/// `SereneError::NotFound`; any other non-success answer yields
/// `SereneError::Server`.
pub trait Transport: Send + Sync {
    /// Ids of every stored entity of `kind`, in server order
    fn keys(&self, kind: EntityKind) -> SereneResult<Vec<i64>>;

    fn item(&self, kind: EntityKind, key: i64) -> SereneResult<Value>;

    /// Create an entity, returning the stored blob
    fn post(&self, kind: EntityKind, payload: Payload) -> SereneResult<Value>;

    /// Replace an entity, returning the stored blob
    fn update(&self, kind: EntityKind, key: i64, payload: Payload) -> SereneResult<Value>;

    fn delete(&self, kind: EntityKind, key: i64) -> SereneResult<()>;

    /// Launch training of a model or octopus. Returns once accepted.
    fn train(&self, kind: EntityKind, key: i64) -> SereneResult<()>;

    /// Run a model or octopus against a stored dataset
    fn predict(&self, kind: EntityKind, key: i64, dataset: i64) -> SereneResult<Value>;

    /// Karma alignment graph of a trained octopus
    fn alignment(&self, octopus: i64) -> SereneResult<Value>;

    /// Run pattern mining for an octopus, returning the server-side directory
    /// holding `graphs.json` and `edges.json`
    fn patterns(&self, octopus: i64) -> SereneResult<String>;
}
