//! Ontology endpoint

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use super::Target;
use crate::cache::EndpointCache;
use crate::elements::{EntityKind, Lookup, Ontology, OwlFormat};
use crate::error::{SereneError, SereneResult};
use crate::transport::{Payload, Transport};

/// What to upload: an ontology file, or a local ontology object that is
/// hydrated in place
#[derive(Debug)]
pub enum OntologySource<'a> {
    Path(PathBuf),
    Local(&'a mut Ontology),
}

impl From<PathBuf> for OntologySource<'_> {
    fn from(path: PathBuf) -> Self {
        OntologySource::Path(path)
    }
}

impl From<&Path> for OntologySource<'_> {
    fn from(path: &Path) -> Self {
        OntologySource::Path(path.to_path_buf())
    }
}

impl From<&str> for OntologySource<'_> {
    fn from(path: &str) -> Self {
        OntologySource::Path(PathBuf::from(path))
    }
}

impl<'a> From<&'a mut Ontology> for OntologySource<'a> {
    fn from(ontology: &'a mut Ontology) -> Self {
        OntologySource::Local(ontology)
    }
}

fn existing_file(ontology: &Ontology) -> SereneResult<PathBuf> {
    match ontology.file() {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => Err(SereneError::validation(format!("No such file: {}", path.display()))),
        None => Err(SereneError::validation(format!("{} has no backing file", ontology))),
    }
}

fn file_payload(path: &Path, description: &str, format: OwlFormat) -> Payload {
    Payload::file(path)
        .field("description", description)
        .field("format", format.as_str())
}

/// View, upload, update and remove ontologies
pub struct OntologyEndpoint {
    transport: Arc<dyn Transport>,
    cache: Arc<EndpointCache<Ontology>>,
}

impl OntologyEndpoint {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<EndpointCache<Ontology>>) -> Self {
        Self { transport, cache }
    }

    /// Upload an ontology. The format defaults to the one implied by the
    /// file extension.
    pub fn upload<'a>(
        &self,
        source: impl Into<OntologySource<'a>>,
        description: &str,
        format: Option<OwlFormat>,
    ) -> SereneResult<Ontology> {
        let mut fresh;
        let ontology = match source.into() {
            OntologySource::Path(path) => {
                fresh = Ontology::new(path);
                &mut fresh
            }
            OntologySource::Local(ontology) => ontology,
        };
        let path = existing_file(ontology)?;
        let format = format.unwrap_or_else(|| ontology.format());

        let payload = file_payload(&path, description, format);
        let json = self.cache.mutate(|| self.transport.post(EntityKind::Ontology, payload))?;
        ontology.update(&json)?;
        info!("Uploaded {}", ontology);
        Ok(ontology.clone())
    }

    /// Replace a stored ontology on the server. With `file`, the ontology is
    /// rebuilt from that file first.
    pub fn update(
        &self,
        ontology: &mut Ontology,
        file: Option<&Path>,
        description: Option<&str>,
        format: Option<OwlFormat>,
    ) -> SereneResult<()> {
        let key = Target::from(&*ontology).resolve()?;
        let description = description.unwrap_or_else(|| ontology.description()).to_string();
        let format = format
            .or_else(|| file.and_then(OwlFormat::from_path))
            .unwrap_or_else(|| ontology.format());

        let payload = match file {
            Some(path) if path.is_file() => file_payload(path, &description, format),
            Some(path) => return Err(SereneError::validation(format!("No such file: {}", path.display()))),
            None if ontology.file().is_some() => file_payload(&existing_file(ontology)?, &description, format),
            None => Payload::Json(json!({ "description": description, "format": format })),
        };
        let json = self
            .cache
            .mutate(|| self.transport.update(EntityKind::Ontology, key, payload))?;
        if let Some(path) = file {
            ontology.set_file(path);
        }
        ontology.update(&json)?;
        info!("Updated {}", ontology);
        Ok(())
    }

    pub fn remove<'a>(&self, ontology: impl Into<Target<'a, Ontology>>) -> SereneResult<()> {
        let key = ontology.into().resolve()?;
        self.cache.mutate(|| self.transport.delete(EntityKind::Ontology, key))?;
        info!("Removed ontology {}", key);
        Ok(())
    }

    pub fn get(&self, key: i64) -> SereneResult<Arc<Ontology>> {
        self.cache
            .lookup(key, || Ontology::from_json(&self.transport.item(EntityKind::Ontology, key)?))
    }

    pub fn items(&self) -> SereneResult<Arc<[Arc<Ontology>]>> {
        self.cache.listing(|| {
            self.transport
                .keys(EntityKind::Ontology)?
                .into_iter()
                .map(|key| self.get(key))
                .collect()
        })
    }

    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

impl Lookup<Ontology> for OntologyEndpoint {
    fn lookup(&self, key: i64) -> SereneResult<Arc<Ontology>> {
        self.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::Entity;

    #[test]
    fn test_source_conversions() {
        assert!(matches!(OntologySource::from("a.owl"), OntologySource::Path(_)));

        let mut local = Ontology::new("b.ttl");
        assert!(matches!(OntologySource::from(&mut local), OntologySource::Local(_)));
    }

    #[test]
    fn test_existing_file_checks() {
        assert!(existing_file(&Ontology::new("/definitely/missing.owl")).is_err());

        let file = tempfile::Builder::new().suffix(".owl").tempfile().unwrap();
        let ontology = Ontology::new(file.path());
        assert_eq!(existing_file(&ontology).unwrap(), file.path());
        assert!(ontology.id().is_none());
    }
}
