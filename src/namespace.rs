//! URI label/prefix helpers and namespace prefix management
//!
//! Karma and Serene both identify classes and properties by URI. The short
//! human-readable label is the part after the last separator (`#`, `/` or
//! `:`); the prefix is everything up to and including it.

use std::collections::HashMap;
use thiserror::Error;

/// Default namespace for classes created locally
pub const DEFAULT_NS: &str = "http://www.semanticweb.org/serene/report_example_ontology#";

/// Namespace Karma uses for its own helper classes
pub const KARMA_DEFAULT_NS: &str = "http://isi.edu/integration/karma/dev#";

/// Prefix errors
#[derive(Error, Debug)]
pub enum PrefixError {
    /// Unknown prefix
    #[error("Unknown prefix: {0}")]
    UnknownPrefix(String),
}

pub type PrefixResult<T> = Result<T, PrefixError>;

fn split_point(uri: &str) -> Option<usize> {
    uri.rfind(['#', '/', ':'])
}

/// Short label of a URI: `http://schema.org/Person` -> `Person`, `ex:name` -> `name`
pub fn label_of(uri: &str) -> String {
    match split_point(uri) {
        Some(pos) => uri[pos + 1..].to_string(),
        None => uri.to_string(),
    }
}

/// Namespace part of a URI: `http://schema.org/Person` -> `http://schema.org/`
pub fn prefix_of(uri: &str) -> String {
    match split_point(uri) {
        Some(pos) => uri[..=pos].to_string(),
        None => String::new(),
    }
}

/// Namespace manager with the prefixes Serene ontologies commonly use
#[derive(Debug, Clone)]
pub struct NamespaceManager {
    /// Prefix → IRI mappings
    prefixes: HashMap<String, String>,
}

impl NamespaceManager {
    pub fn new() -> Self {
        let mut mgr = Self {
            prefixes: HashMap::new(),
        };

        mgr.add_prefix("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#");
        mgr.add_prefix("rdfs", "http://www.w3.org/2000/01/rdf-schema#");
        mgr.add_prefix("xsd", "http://www.w3.org/2001/XMLSchema#");
        mgr.add_prefix("owl", "http://www.w3.org/2002/07/owl#");
        mgr.add_prefix("foaf", "http://xmlns.com/foaf/0.1/");
        mgr.add_prefix("schema", "http://schema.org/");
        mgr.add_prefix("serene", DEFAULT_NS);
        mgr.add_prefix("karma", KARMA_DEFAULT_NS);

        mgr
    }

    pub fn add_prefix(&mut self, prefix: impl Into<String>, iri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), iri.into());
    }

    pub fn get_iri(&self, prefix: &str) -> PrefixResult<&str> {
        self.prefixes
            .get(prefix)
            .map(|s| s.as_str())
            .ok_or_else(|| PrefixError::UnknownPrefix(prefix.to_string()))
    }

    /// Resolve a name to a full IRI.
    ///
    /// `foaf:name` expands through the prefix table, a full IRI is returned
    /// unchanged, and a bare name lands in [`DEFAULT_NS`].
    pub fn resolve(&self, name: &str) -> PrefixResult<String> {
        if name.contains("://") {
            return Ok(name.to_string());
        }
        match name.split_once(':') {
            Some((prefix, local)) => Ok(format!("{}{}", self.get_iri(prefix)?, local)),
            None => Ok(format!("{}{}", DEFAULT_NS, name)),
        }
    }
}

impl Default for NamespaceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_and_prefix() {
        assert_eq!(label_of("http://schema.org/Person"), "Person");
        assert_eq!(prefix_of("http://schema.org/Person"), "http://schema.org/");

        assert_eq!(label_of("http://isi.edu/integration/karma/dev#classLink"), "classLink");
        assert_eq!(prefix_of("http://isi.edu/integration/karma/dev#classLink"), KARMA_DEFAULT_NS);

        assert_eq!(label_of("ex:name"), "name");
        assert_eq!(prefix_of("ex:name"), "ex:");
    }

    #[test]
    fn test_label_without_separator() {
        assert_eq!(label_of("n1"), "n1");
        assert_eq!(prefix_of("n1"), "");
    }

    #[test]
    fn test_resolve() {
        let mgr = NamespaceManager::new();

        assert_eq!(mgr.resolve("foaf:name").unwrap(), "http://xmlns.com/foaf/0.1/name");
        assert_eq!(mgr.resolve("Person").unwrap(), format!("{}Person", DEFAULT_NS));
        assert_eq!(
            mgr.resolve("http://schema.org/Place").unwrap(),
            "http://schema.org/Place"
        );
        assert!(mgr.resolve("nope:thing").is_err());
    }
}
