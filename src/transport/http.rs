//! HttpTransport: blocking client for a running Serene server

use std::time::Duration;

use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::{Payload, Transport};
use crate::config::ClientConfig;
use crate::elements::EntityKind;
use crate::error::{SereneError, SereneResult};

/// Network transport that talks to `http://{host}:{port}/{api_version}`.
pub struct HttpTransport {
    base_url: String,
    http_client: Client,
}

impl HttpTransport {
    /// Create a transport for the given configuration.
    ///
    /// # Example
    /// ```no_run
    /// # use serene::{ClientConfig, HttpTransport};
    /// let transport = HttpTransport::new(&ClientConfig::default()).unwrap();
    /// assert_eq!(transport.base_url(), "http://localhost:8080/v1.0");
    /// ```
    pub fn new(config: &ClientConfig) -> SereneResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, kind: EntityKind, rest: &str) -> String {
        format!("{}/{}{}", self.base_url, kind.path(), rest)
    }

    fn send(&self, request: RequestBuilder, kind: EntityKind, key: Option<i64>) -> SereneResult<Response> {
        let response = request.send()?;
        let status = response.status();
        debug!("{} {:?} -> {}", kind, key, status);

        if status.is_success() {
            return Ok(response);
        }
        if let (StatusCode::NOT_FOUND, Some(key)) = (status, key) {
            return Err(SereneError::NotFound { kind: kind.name(), key });
        }

        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);
        Err(SereneError::Server {
            status: status.as_u16(),
            message,
        })
    }

    fn with_payload(&self, request: RequestBuilder, payload: Payload) -> SereneResult<RequestBuilder> {
        match payload {
            Payload::Json(body) => Ok(request.json(&body)),
            Payload::File { path, fields } => {
                let mut form = multipart::Form::new().file("file", &path)?;
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                Ok(request.multipart(form))
            }
        }
    }
}

impl Transport for HttpTransport {
    fn keys(&self, kind: EntityKind) -> SereneResult<Vec<i64>> {
        let response = self.send(self.http_client.get(self.url(kind, "")), kind, None)?;
        Ok(response.json()?)
    }

    fn item(&self, kind: EntityKind, key: i64) -> SereneResult<Value> {
        let url = self.url(kind, &format!("/{}", key));
        let response = self.send(self.http_client.get(url), kind, Some(key))?;
        Ok(response.json()?)
    }

    fn post(&self, kind: EntityKind, payload: Payload) -> SereneResult<Value> {
        let request = self.with_payload(self.http_client.post(self.url(kind, "")), payload)?;
        Ok(self.send(request, kind, None)?.json()?)
    }

    fn update(&self, kind: EntityKind, key: i64, payload: Payload) -> SereneResult<Value> {
        let url = self.url(kind, &format!("/{}", key));
        let request = self.with_payload(self.http_client.post(url), payload)?;
        Ok(self.send(request, kind, Some(key))?.json()?)
    }

    fn delete(&self, kind: EntityKind, key: i64) -> SereneResult<()> {
        let url = self.url(kind, &format!("/{}", key));
        self.send(self.http_client.delete(url), kind, Some(key))?;
        Ok(())
    }

    fn train(&self, kind: EntityKind, key: i64) -> SereneResult<()> {
        let url = self.url(kind, &format!("/{}/train", key));
        self.send(self.http_client.post(url), kind, Some(key))?;
        Ok(())
    }

    fn predict(&self, kind: EntityKind, key: i64, dataset: i64) -> SereneResult<Value> {
        let url = self.url(kind, &format!("/{}/predict/{}", key, dataset));
        let response = self.send(self.http_client.post(url), kind, Some(key))?;
        Ok(response.json()?)
    }

    fn alignment(&self, octopus: i64) -> SereneResult<Value> {
        let url = self.url(EntityKind::Octopus, &format!("/{}/alignment", octopus));
        let response = self.send(self.http_client.get(url), EntityKind::Octopus, Some(octopus))?;
        Ok(response.json()?)
    }

    fn patterns(&self, octopus: i64) -> SereneResult<String> {
        let url = self.url(EntityKind::Octopus, &format!("/{}/patterns", octopus));
        let response = self.send(self.http_client.get(url), EntityKind::Octopus, Some(octopus))?;
        let body: Value = response.json()?;
        match body {
            Value::String(path) => Ok(path),
            other => Err(SereneError::malformed("patterns", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_follow_config() {
        let config = ClientConfig {
            host: "serene.local".to_string(),
            port: 9000,
            ..ClientConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();

        assert_eq!(transport.base_url(), "http://serene.local:9000/v1.0");
        assert_eq!(transport.url(EntityKind::Ontology, ""), "http://serene.local:9000/v1.0/owl");
        assert_eq!(
            transport.url(EntityKind::Octopus, "/3/predict/7"),
            "http://serene.local:9000/v1.0/octopus/3/predict/7"
        );
    }
}
