//! Local mirrors of server-side entities
//!
//! Every entity is either *local* (built in memory, never uploaded) or
//! *stored* (hydrated from a server response). The storage metadata is kept
//! in one `Option<StoredMeta>` so an entity can never carry an id without its
//! timestamps or vice versa.

pub mod dataset;
pub mod model;
pub mod octopus;
pub mod ontology;
pub mod ssd;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::{SereneError, SereneResult};

pub use dataset::{Column, ColumnIndex, DataSet};
pub use model::{Model, ModelState, ModelType, SamplingStrategy, Status};
pub use octopus::{ModelingProps, Octopus, OctopusBuilder, OctopusScore, SsdResult};
pub use ontology::{Ontology, OwlFormat};
pub use ssd::{DataNodeRef, SemanticLink, SemanticModel, SemanticNode, SemanticNodeKind, Ssd};

/// The five kinds of entity the server manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    DataSet,
    Ontology,
    Ssd,
    Model,
    Octopus,
}

impl EntityKind {
    /// Resource path segment on the server
    pub fn path(&self) -> &'static str {
        match self {
            EntityKind::DataSet => "dataset",
            EntityKind::Ontology => "owl",
            EntityKind::Ssd => "ssd",
            EntityKind::Model => "model",
            EntityKind::Octopus => "octopus",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::DataSet => "DataSet",
            EntityKind::Ontology => "Ontology",
            EntityKind::Ssd => "SSD",
            EntityKind::Model => "Model",
            EntityKind::Octopus => "Octopus",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity and timestamps of a stored entity
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMeta {
    pub id: i64,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaBlob {
    id: i64,
    date_created: String,
    date_modified: String,
}

impl StoredMeta {
    /// Read `id`, `dateCreated` and `dateModified` from a server blob
    pub fn from_json(json: &serde_json::Value) -> SereneResult<Self> {
        let blob = MetaBlob::deserialize(json)?;
        Ok(StoredMeta {
            id: blob.id,
            date_created: parse_timestamp(&blob.date_created)?,
            date_modified: parse_timestamp(&blob.date_modified)?,
        })
    }
}

/// Parse a server timestamp (RFC 3339, or naive ISO 8601 taken as UTC)
pub fn parse_timestamp(raw: &str) -> SereneResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| SereneError::malformed("timestamp", format!("{}: {}", raw, e)))
}

/// Common capability of all server-backed entities
pub trait Entity {
    const KIND: EntityKind;

    fn meta(&self) -> Option<&StoredMeta>;

    fn id(&self) -> Option<i64> {
        self.meta().map(|m| m.id)
    }

    /// `false` for local objects, and for stored objects mutated since
    fn stored(&self) -> bool {
        self.meta().is_some()
    }

    fn date_created(&self) -> Option<DateTime<Utc>> {
        self.meta().map(|m| m.date_created)
    }

    fn date_modified(&self) -> Option<DateTime<Utc>> {
        self.meta().map(|m| m.date_modified)
    }
}

/// Resolve a referenced entity by server id during hydration
pub trait Lookup<T> {
    fn lookup(&self, key: i64) -> SereneResult<Arc<T>>;
}

/// Resolve a column by id across all datasets
pub trait ColumnLookup {
    fn column(&self, id: i64) -> SereneResult<Column>;
}

/// Any entity, for APIs that accept several kinds at runtime
#[derive(Debug, Clone)]
pub enum Element {
    DataSet(Arc<DataSet>),
    Ontology(Arc<Ontology>),
    Ssd(Arc<Ssd>),
    Model(Arc<Model>),
    Octopus(Arc<Octopus>),
}

impl Element {
    pub fn kind(&self) -> EntityKind {
        match self {
            Element::DataSet(_) => EntityKind::DataSet,
            Element::Ontology(_) => EntityKind::Ontology,
            Element::Ssd(_) => EntityKind::Ssd,
            Element::Model(_) => EntityKind::Model,
            Element::Octopus(_) => EntityKind::Octopus,
        }
    }
}

macro_rules! element_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<Arc<$ty>> for Element {
                fn from(value: Arc<$ty>) -> Self {
                    Element::$variant(value)
                }
            }

            impl From<$ty> for Element {
                fn from(value: $ty) -> Self {
                    Element::$variant(Arc::new(value))
                }
            }
        )*
    };
}

element_from! {
    DataSet => DataSet,
    Ontology => Ontology,
    Ssd => Ssd,
    Model => Model,
    Octopus => Octopus,
}

/// Two handles denote the same entity when they share an allocation or are
/// stored under the same id.
pub(crate) fn same_entity<T: Entity>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::ptr_eq(a, b) || matches!((a.id(), b.id()), (Some(x), Some(y)) if x == y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_formats() {
        let a = parse_timestamp("2017-04-19T05:37:48.417Z").unwrap();
        assert_eq!(a.year(), 2017);
        assert_eq!(a.hour(), 5);

        let b = parse_timestamp("2017-04-19T05:37:48.417").unwrap();
        assert_eq!(a, b);

        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_stored_meta_from_json() {
        let meta = StoredMeta::from_json(&json!({
            "id": 7,
            "dateCreated": "2017-04-19T05:37:48.417Z",
            "dateModified": "2017-04-20T05:37:48.417Z"
        }))
        .unwrap();
        assert_eq!(meta.id, 7);
        assert!(meta.date_modified > meta.date_created);

        assert!(StoredMeta::from_json(&json!({"id": 7})).is_err());
    }

    #[test]
    fn test_entity_kind_paths() {
        assert_eq!(EntityKind::DataSet.path(), "dataset");
        assert_eq!(EntityKind::Ontology.path(), "owl");
        assert_eq!(EntityKind::Octopus.to_string(), "Octopus");
    }
}
