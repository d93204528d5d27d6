//! IPFS-backed storage over the Kubo HTTP API.
//!
//! Objects are written as raw blocks with `block/put` using the codec and
//! hash function of the store's CID config, so the node computes the same
//! CID we do. The returned key is checked against the local hash; blocks
//! read back are re-hashed before they are decoded.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evees_cid::{canonicalize, cid_config_of, decode, encode, hash_bytes, same_cid, CidConfig, Value};
use evees_pinner::PinCache;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionState};
use crate::store::{ensure_hash, CasStore};
use crate::{CasError, DEFAULT_REQUEST_TIMEOUT_MS};

/// Connection settings for an IPFS node's HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpfsConfig {
    pub host: String,
    pub port: u16,
    /// `http` or `https`.
    pub protocol: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Time budget for a single request in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
            protocol: "http".to_string(),
            headers: HashMap::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl IpfsConfig {
    pub fn api_url(&self) -> String {
        format!("{}://{}:{}/api/v0", self.protocol, self.host, self.port)
    }
}

/// Kubo names multihash functions by their multicodec table entry, which
/// differs from ours for BLAKE3.
fn kubo_hash_name(hash_type: &str) -> &str {
    match hash_type {
        "blake3-256" => "blake3",
        other => other,
    }
}

#[derive(Deserialize)]
struct BlockPutResponse {
    #[serde(rename = "Key")]
    key: String,
}

/// Content-addressed store backed by an IPFS node.
pub struct IpfsStore {
    cas_id: String,
    api_url: String,
    cid_config: CidConfig,
    client: reqwest::Client,
    connection: Connection,
    timeout: Duration,
    pins: Option<Arc<PinCache>>,
}

impl IpfsStore {
    pub fn new(config: &IpfsConfig, cid_config: CidConfig) -> Result<Self, CasError> {
        cid_config.validate()?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CasError::InvalidArgument(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| CasError::InvalidArgument(format!("header value: {}", e)))?;
            headers.insert(name, value);
        }
        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            cas_id: "ipfs".to_string(),
            api_url: config.api_url(),
            cid_config,
            client,
            connection: Connection::new("ipfs"),
            timeout: Duration::from_millis(config.timeout_ms),
            pins: None,
        })
    }

    /// Register every created CID with a pin cache.
    pub fn with_pins(mut self, pins: Arc<PinCache>) -> Self {
        self.pins = Some(pins);
        self
    }

    pub fn with_cas_id(mut self, cas_id: impl Into<String>) -> Self {
        self.cas_id = cas_id.into();
        self
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    async fn with_timeout<T, F>(&self, fut: F) -> Result<T, CasError>
    where
        F: Future<Output = Result<T, CasError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CasError::RequestTimeout {
                cas_id: self.cas_id.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    async fn check_version(&self) -> Result<(), CasError> {
        self.with_timeout(async {
            self.client
                .post(format!("{}/version", self.api_url))
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        })
        .await
    }

    async fn put_block(&self, bytes: Vec<u8>) -> Result<String, CasError> {
        let form = Form::new().part("data", Part::bytes(bytes).file_name("data"));
        let response: BlockPutResponse = self
            .with_timeout(async {
                Ok(self
                    .client
                    .post(format!("{}/block/put", self.api_url))
                    .query(&[
                        ("cid-codec", self.cid_config.codec.as_str()),
                        ("mhtype", kubo_hash_name(&self.cid_config.hash_type)),
                        ("mhlen", "-1"),
                        ("pin", "false"),
                    ])
                    .multipart(form)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?)
            })
            .await?;
        Ok(response.key)
    }

    async fn get_block(&self, hash: &str) -> Result<Option<Vec<u8>>, CasError> {
        self.with_timeout(async {
            let response = self
                .client
                .post(format!("{}/block/get", self.api_url))
                .query(&[("arg", hash)])
                .send()
                .await?;
            let status = response.status();
            if status.is_success() {
                return Ok(Some(response.bytes().await?.to_vec()));
            }
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::NOT_FOUND || body.contains("not found") {
                return Ok(None);
            }
            Err(CasError::Backend {
                cas_id: self.cas_id.clone(),
                reason: format!("block/get returned {}: {}", status, body.trim()),
            })
        })
        .await
    }
}

#[async_trait]
impl CasStore for IpfsStore {
    fn cas_id(&self) -> &str {
        &self.cas_id
    }

    fn cid_config(&self) -> &CidConfig {
        &self.cid_config
    }

    async fn ready(&self) -> Result<(), CasError> {
        self.connection.ensure_ready(|| self.check_version()).await
    }

    async fn get(&self, hash: &str) -> Result<Option<Value>, CasError> {
        ensure_hash(hash)?;
        self.ready().await?;

        let Some(bytes) = self.get_block(hash).await? else {
            debug!(cas_id = %self.cas_id, hash, "Block not found");
            return Ok(None);
        };
        let computed = hash_bytes(&bytes, &cid_config_of(hash)?)?;
        if !same_cid(&computed, hash)? {
            return Err(CasError::HashMismatch {
                computed,
                returned: hash.to_string(),
            });
        }
        Ok(Some(decode(&bytes)?))
    }

    async fn create(&self, object: &Value) -> Result<String, CasError> {
        self.ready().await?;

        let bytes = encode(&canonicalize(object))?;
        let id = hash_bytes(&bytes, &self.cid_config)?;
        let returned = self.put_block(bytes).await?;
        if !same_cid(&id, &returned)? {
            return Err(CasError::HashMismatch {
                computed: id,
                returned,
            });
        }
        debug!(cas_id = %self.cas_id, id = %id, "Stored block");

        if let Some(pins) = &self.pins {
            if let Err(e) = pins.pin(&id).await {
                warn!(id = %id, error = %e, "Failed to register pin");
            }
        }
        Ok(id)
    }
}
