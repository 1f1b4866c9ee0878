//! Endpoint proxies, one per entity kind
//!
//! Reads (`get`, `items`) go through the endpoint's identity cache. Every
//! mutating call resolves its [`Target`] up front, performs the remote call,
//! and invalidates the cache afterwards whether or not the call succeeded.

pub mod dataset;
pub mod model;
pub mod octopus;
pub mod ontology;
pub mod ssd;

use std::fmt::Display;
use std::sync::Arc;

use crate::elements::Entity;
use crate::error::{SereneError, SereneResult};

pub use dataset::DatasetEndpoint;
pub use model::ModelEndpoint;
pub use octopus::OctopusEndpoint;
pub use ontology::{OntologyEndpoint, OntologySource};
pub use ssd::SsdEndpoint;

/// Argument of a mutating call: a raw server id or an entity
#[derive(Debug)]
pub enum Target<'a, T> {
    ById(i64),
    ByValue(&'a T),
}

impl<T> Clone for Target<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Target<'_, T> {}

impl<T: Entity + Display> Target<'_, T> {
    /// Server id of the target. A local entity has none and is rejected.
    pub fn resolve(&self) -> SereneResult<i64> {
        match self {
            Target::ById(id) => Ok(*id),
            Target::ByValue(entity) => entity.id().ok_or_else(|| {
                SereneError::validation(format!("{} is not stored on the server", entity))
            }),
        }
    }
}

impl<T> From<i64> for Target<'_, T> {
    fn from(id: i64) -> Self {
        Target::ById(id)
    }
}

impl<'a, T> From<&'a T> for Target<'a, T> {
    fn from(entity: &'a T) -> Self {
        Target::ByValue(entity)
    }
}

impl<'a, T> From<&'a Arc<T>> for Target<'a, T> {
    fn from(entity: &'a Arc<T>) -> Self {
        Target::ByValue(entity.as_ref())
    }
}

/// Precondition check shared by calls that need a stored entity
pub(crate) fn require_stored<T: Entity + Display>(entity: &T, hint: &str) -> SereneResult<i64> {
    entity.id().ok_or_else(|| {
        SereneError::precondition(format!("{} is not stored on the server. {}", entity, hint))
    })
}
