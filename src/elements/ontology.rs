//! Ontology entity

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Entity, EntityKind, StoredMeta};
use crate::error::{SereneError, SereneResult};

/// Serialization format of an ontology file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwlFormat {
    #[default]
    Owl,
    Rdf,
    Ttl,
    N3,
    Xml,
}

impl OwlFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwlFormat::Owl => "owl",
            OwlFormat::Rdf => "rdf",
            OwlFormat::Ttl => "ttl",
            OwlFormat::N3 => "n3",
            OwlFormat::Xml => "xml",
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl FromStr for OwlFormat {
    type Err = SereneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "owl" => Ok(OwlFormat::Owl),
            "rdf" => Ok(OwlFormat::Rdf),
            "ttl" | "turtle" => Ok(OwlFormat::Ttl),
            "n3" => Ok(OwlFormat::N3),
            "xml" => Ok(OwlFormat::Xml),
            other => Err(SereneError::validation(format!(
                "Ontology format {} is invalid, use one of owl, rdf, ttl, n3, xml",
                other
            ))),
        }
    }
}

/// An ontology file registered with the server
#[derive(Debug, Clone, Default)]
pub struct Ontology {
    meta: Option<StoredMeta>,
    name: String,
    description: String,
    format: OwlFormat,
    file: Option<PathBuf>,
}

#[derive(Deserialize)]
struct OntologyBlob {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    format: OwlFormat,
}

impl Ontology {
    /// A local ontology backed by a file on disk
    pub fn new(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ontology {
            meta: None,
            format: OwlFormat::from_path(&file).unwrap_or_default(),
            name,
            description: String::new(),
            file: Some(file),
        }
    }

    pub fn from_json(json: &Value) -> SereneResult<Self> {
        let mut on = Self::default();
        on.update(json)?;
        Ok(on)
    }

    /// Replace every server-owned field with the contents of `json`.
    /// The local file reference is kept.
    pub fn update(&mut self, json: &Value) -> SereneResult<&mut Self> {
        let meta = StoredMeta::from_json(json)?;
        let blob = OntologyBlob::deserialize(json)?;

        self.meta = Some(meta);
        self.name = blob.name;
        self.description = blob.description;
        self.format = blob.format;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn format(&self) -> OwlFormat {
        self.format
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Point at a new backing file; the format follows its extension
    pub fn set_file(&mut self, file: impl Into<PathBuf>) {
        let file = file.into();
        if let Some(format) = OwlFormat::from_path(&file) {
            self.format = format;
        }
        self.file = Some(file);
    }
}

impl Entity for Ontology {
    const KIND: EntityKind = EntityKind::Ontology;

    fn meta(&self) -> Option<&StoredMeta> {
        self.meta.as_ref()
    }
}

impl fmt::Display for Ontology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "Ontology({}, {})", id, self.name),
            None => write!(f, "Ontology(local, {})", self.name),
        }
    }
}
