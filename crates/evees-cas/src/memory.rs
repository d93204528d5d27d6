//! In-process content-addressed storage.
//!
//! Objects are kept in their encoded form keyed by id:
//! - Deduplication: identical objects share one id and one slot
//! - Integrity: the id is recomputed from the bytes on every create
//! - Optional pin registration, so a fast local write can later be made
//!   durable by the pin flush loop

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use evees_cid::{canonicalize, decode, encode, hash_bytes, CidConfig, Value};
use evees_pinner::PinCache;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::store::{ensure_hash, CasStore};
use crate::CasError;

/// Content-addressed storage held in memory.
pub struct MemoryStore {
    cas_id: String,
    config: CidConfig,
    /// id -> encoded object bytes.
    data: RwLock<HashMap<String, Vec<u8>>>,
    pins: Option<Arc<PinCache>>,
}

impl MemoryStore {
    /// Create an empty store. Fails if the CID config names something
    /// unsupported.
    pub fn new(cas_id: impl Into<String>, config: CidConfig) -> Result<Self, CasError> {
        config.validate()?;
        Ok(Self {
            cas_id: cas_id.into(),
            config,
            data: RwLock::new(HashMap::new()),
            pins: None,
        })
    }

    /// Register every created id with a pin cache.
    pub fn with_pins(mut self, pins: Arc<PinCache>) -> Self {
        self.pins = Some(pins);
        self
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.data.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl CasStore for MemoryStore {
    fn cas_id(&self) -> &str {
        &self.cas_id
    }

    fn cid_config(&self) -> &CidConfig {
        &self.config
    }

    async fn ready(&self) -> Result<(), CasError> {
        Ok(())
    }

    async fn get(&self, hash: &str) -> Result<Option<Value>, CasError> {
        ensure_hash(hash)?;
        let data = self.data.read().await;
        match data.get(hash) {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, object: &Value) -> Result<String, CasError> {
        let bytes = encode(&canonicalize(object))?;
        let id = hash_bytes(&bytes, &self.config)?;
        let inserted = {
            let mut data = self.data.write().await;
            if data.contains_key(&id) {
                false
            } else {
                data.insert(id.clone(), bytes);
                true
            }
        };
        debug!(cas_id = %self.cas_id, id = %id, inserted, "Stored object");

        if let Some(pins) = &self.pins {
            if let Err(e) = pins.pin(&id).await {
                warn!(id = %id, error = %e, "Failed to register pin");
            }
        }
        Ok(id)
    }

    async fn remove_entities(&self, hashes: &[String]) -> Result<(), CasError> {
        let mut data = self.data.write().await;
        for hash in hashes {
            data.remove(hash);
        }
        Ok(())
    }
}
