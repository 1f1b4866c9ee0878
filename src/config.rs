//! Client configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::{SereneError, SereneResult};
use crate::poll::PollConfig;

/// Connection and behaviour settings for a [`Serene`](crate::Serene) session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host name
    pub host: String,
    /// Server port
    pub port: u16,
    /// API version path segment, e.g. `v1.0`
    pub api_version: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Distinct keys kept per endpoint cache
    pub cache_capacity: usize,
    /// Local mount of the server's `/storage` directory, used to read
    /// pattern exports (None = use server paths as-is)
    pub storage_root: Option<PathBuf>,
    /// Training poll schedule
    pub poll: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            api_version: "v1.0".to_string(),
            timeout_secs: 60,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            storage_root: None,
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/{}", self.host, self.port, self.api_version)
    }

    /// Defaults overridden by `SERENE_HOST`, `SERENE_PORT`,
    /// `SERENE_API_VERSION`, `SERENE_TIMEOUT_SECS` and `SERENE_STORAGE`
    pub fn from_env() -> SereneResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SereneResult<Self> {
        let mut config = Self::default();
        if let Some(host) = lookup("SERENE_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("SERENE_PORT") {
            config.port = parse_var("SERENE_PORT", &port)?;
        }
        if let Some(version) = lookup("SERENE_API_VERSION") {
            config.api_version = version;
        }
        if let Some(timeout) = lookup("SERENE_TIMEOUT_SECS") {
            config.timeout_secs = parse_var("SERENE_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(root) = lookup("SERENE_STORAGE") {
            config.storage_root = Some(PathBuf::from(root));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> SereneResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| SereneError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> SereneResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| SereneError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    fn validate(&self) -> SereneResult<()> {
        if self.host.is_empty() {
            return Err(SereneError::Config("host must not be empty".to_string()));
        }
        if self.cache_capacity == 0 {
            return Err(SereneError::Config("cache_capacity must be at least 1".to_string()));
        }
        if self.poll.max_attempts == 0 {
            return Err(SereneError::Config("poll.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> SereneResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| SereneError::Config(format!("{} has invalid value {:?}", name, raw)))
}
