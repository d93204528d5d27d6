//! Write-back cache layered over a remote store.
//!
//! Creates land in an in-memory store and are queued; `flush` pushes the
//! queue to the remote. Reads hit the cache first and fill it on a remote
//! hit. Ids are computed with the remote's CID config so an entity keeps
//! the same id before and after it is flushed.

use std::sync::Arc;

use async_trait::async_trait;
use evees_cid::{same_cid, CidConfig, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::entity::Entity;
use crate::memory::MemoryStore;
use crate::store::{ensure_hash, CasStore};
use crate::CasError;

pub struct CachedStore {
    cache: MemoryStore,
    remote: Arc<dyn CasStore>,
    pending: Mutex<Vec<Entity>>,
}

impl CachedStore {
    pub fn new(remote: Arc<dyn CasStore>) -> Result<Self, CasError> {
        let cache = MemoryStore::new(remote.cas_id(), remote.cid_config().clone())?;
        Ok(Self {
            cache,
            remote,
            pending: Mutex::new(Vec::new()),
        })
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[async_trait]
impl CasStore for CachedStore {
    fn cas_id(&self) -> &str {
        self.remote.cas_id()
    }

    fn cid_config(&self) -> &CidConfig {
        self.remote.cid_config()
    }

    async fn ready(&self) -> Result<(), CasError> {
        self.remote.ready().await
    }

    async fn get(&self, hash: &str) -> Result<Option<Value>, CasError> {
        ensure_hash(hash)?;
        if let Some(object) = self.cache.get(hash).await? {
            return Ok(Some(object));
        }
        let Some(object) = self.remote.get(hash).await? else {
            return Ok(None);
        };
        self.cache.create(&object).await?;
        Ok(Some(object))
    }

    async fn create(&self, object: &Value) -> Result<String, CasError> {
        let id = self.cache.create(object).await?;
        let mut pending = self.pending.lock().await;
        if !pending.iter().any(|e| e.id == id) {
            pending.push(Entity::new(id.clone(), object.clone()).with_remote(self.cas_id()));
        }
        debug!(cas_id = self.cas_id(), id = %id, "Queued entity for flush");
        Ok(id)
    }

    /// Push every pending entity to the remote. Entities the remote
    /// acknowledges leave the queue; on the first failure the rest stay
    /// queued for the next flush.
    async fn flush(&self) -> Result<(), CasError> {
        let mut pending = self.pending.lock().await;
        let total = pending.len();
        while let Some(entity) = pending.first() {
            let returned = self.remote.create(&entity.object).await?;
            if !same_cid(&entity.id, &returned)? {
                return Err(CasError::HashMismatch {
                    computed: entity.id.clone(),
                    returned,
                });
            }
            pending.remove(0);
        }
        if total > 0 {
            info!(cas_id = self.cas_id(), count = total, "Flushed cached entities");
        }
        Ok(())
    }

    async fn diff(&self) -> Result<Vec<Entity>, CasError> {
        Ok(self.pending.lock().await.clone())
    }
}
