//! Remote pinning service contract and its HTTP client.
//!
//! Endpoints, all JSON:
//! - `GET  {url}/includes?address=X` -> `{ "includes": bool }`
//! - `GET  {url}/getAll?address=X`
//! - `GET  {url}/getEntity?cid=X`
//! - `PUT  {url}/pin_hash` with `{ "cids": [..] }`
//! - `PUT  {url}/pin` with `{ "addresses": [..] }`
//!
//! The remote side must tolerate duplicate pin requests; a batch whose
//! acknowledgement was lost is sent again on the next flush.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::PinError;

/// Batched pin requests. A call returns `Ok` only when the service
/// acknowledged the whole batch.
#[async_trait]
pub trait PinningService: Send + Sync {
    async fn pin_hashes(&self, cids: &[String]) -> Result<(), PinError>;

    async fn pin_addresses(&self, addresses: &[String]) -> Result<(), PinError>;
}

/// Pinning service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinnerConfig {
    /// Base URL, e.g. `https://pinner.example.org`.
    pub url: String,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl PinnerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Serialize)]
struct PinHashBody<'a> {
    cids: &'a [String],
}

#[derive(Serialize)]
struct PinAddressBody<'a> {
    addresses: &'a [String],
}

#[derive(Deserialize)]
struct IncludesResponse {
    includes: bool,
}

/// HTTP client for the pinning service.
#[derive(Debug, Clone)]
pub struct HttpPinner {
    url: String,
    client: reqwest::Client,
}

impl HttpPinner {
    pub fn new(config: &PinnerConfig) -> Result<Self, PinError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| PinError::Config(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| PinError::Config(format!("header value: {}", e)))?;
            headers.insert(name, value);
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the service already tracks a database address.
    pub async fn includes(&self, address: &str) -> Result<bool, PinError> {
        let response: IncludesResponse = self
            .client
            .get(format!("{}/includes", self.url))
            .query(&[("address", address)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.includes)
    }

    /// Every entry the service holds for a database address.
    pub async fn get_all(&self, address: &str) -> Result<serde_json::Value, PinError> {
        let value = self
            .client
            .get(format!("{}/getAll", self.url))
            .query(&[("address", address)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }

    /// The object the service holds for a CID.
    pub async fn get_entity(&self, cid: &str) -> Result<serde_json::Value, PinError> {
        let value = self
            .client
            .get(format!("{}/getEntity", self.url))
            .query(&[("cid", cid)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }
}

#[async_trait]
impl PinningService for HttpPinner {
    async fn pin_hashes(&self, cids: &[String]) -> Result<(), PinError> {
        debug!(count = cids.len(), url = %self.url, "Pinning hashes");
        self.client
            .put(format!("{}/pin_hash", self.url))
            .json(&PinHashBody { cids })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn pin_addresses(&self, addresses: &[String]) -> Result<(), PinError> {
        debug!(count = addresses.len(), url = %self.url, "Pinning database addresses");
        self.client
            .put(format!("{}/pin", self.url))
            .json(&PinAddressBody { addresses })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let pinner = HttpPinner::new(&PinnerConfig::new("http://localhost:3100/")).unwrap();
        assert_eq!(pinner.url(), "http://localhost:3100");
    }

    #[test]
    fn test_bad_header_rejected() {
        let mut config = PinnerConfig::new("http://localhost:3100");
        config.headers.insert("bad header".into(), "x".into());
        assert!(HttpPinner::new(&config).is_err());
    }

    #[test]
    fn test_pin_bodies_shape() {
        let cids = vec!["c1".to_string()];
        assert_eq!(
            serde_json::to_value(PinHashBody { cids: &cids }).unwrap(),
            serde_json::json!({"cids": ["c1"]})
        );
        assert_eq!(
            serde_json::to_value(PinAddressBody { addresses: &cids }).unwrap(),
            serde_json::json!({"addresses": ["c1"]})
        );
    }
}
