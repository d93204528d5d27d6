//! The contract every content-addressed backend implements.

use async_trait::async_trait;
use evees_cid::{hash_object, parse_cid, CidConfig, Value};
use futures::future::try_join_all;
use tracing::warn;

use crate::entity::{Entity, EntityCreate};
use crate::CasError;

/// Reject an empty or malformed hash before any I/O is issued.
pub fn ensure_hash(hash: &str) -> Result<(), CasError> {
    if hash.trim().is_empty() {
        return Err(CasError::InvalidArgument("hash must not be empty".to_string()));
    }
    parse_cid(hash).map_err(|e| CasError::InvalidArgument(e.to_string()))?;
    Ok(())
}

/// A content-addressed store.
///
/// `get` and `create` wait for the backend to become ready on their own;
/// callers never have to sequence `ready()` first. Network backends bound
/// every request by a timeout and report [`CasError::RequestTimeout`].
#[async_trait]
pub trait CasStore: Send + Sync {
    /// Name of this backend instance, e.g. `"ipfs"` or `"local"`.
    fn cas_id(&self) -> &str;

    /// The pipeline used to compute ids for objects created here.
    fn cid_config(&self) -> &CidConfig;

    /// Establish the backend connection. Idempotent and safe to call
    /// concurrently.
    async fn ready(&self) -> Result<(), CasError>;

    /// Fetch and decode an object. `Ok(None)` when the backend does not hold it.
    async fn get(&self, hash: &str) -> Result<Option<Value>, CasError>;

    /// Store an object and return its id.
    async fn create(&self, object: &Value) -> Result<String, CasError>;

    /// Compute the id `create` would return, without storing anything.
    fn hash(&self, object: &Value) -> Result<String, CasError> {
        Ok(hash_object(object, self.cid_config())?)
    }

    /// Hash a batch of objects in order. Entities without an explicit remote
    /// are tagged with this backend.
    fn hash_objects(&self, creates: &[EntityCreate]) -> Result<Vec<Entity>, CasError> {
        creates
            .iter()
            .map(|create| {
                let id = self.hash(&create.object)?;
                let remote = create.remote.clone().unwrap_or_else(|| self.cas_id().to_string());
                Ok(Entity::new(id, create.object.clone()).with_remote(remote))
            })
            .collect()
    }

    /// Fetch an object or fail with [`CasError::NotFound`].
    async fn get_entity(&self, hash: &str) -> Result<Entity, CasError> {
        match self.get(hash).await? {
            Some(object) => Ok(Entity::new(hash, object).with_remote(self.cas_id())),
            None => Err(CasError::NotFound(hash.to_string())),
        }
    }

    /// Fetch every hash concurrently. The result lines up index by index with
    /// `hashes`; any missing hash fails the whole call.
    async fn get_entities(&self, hashes: &[String]) -> Result<Vec<Entity>, CasError> {
        try_join_all(hashes.iter().map(|hash| self.get_entity(hash))).await
    }

    /// Content-addressed stores generally cannot delete by reference; the
    /// default only warns.
    async fn remove_entities(&self, hashes: &[String]) -> Result<(), CasError> {
        warn!(
            cas_id = self.cas_id(),
            count = hashes.len(),
            "remove_entities is not supported by this store"
        );
        Ok(())
    }

    /// Push locally pending objects to their durable home.
    async fn flush(&self) -> Result<(), CasError> {
        Ok(())
    }

    /// Objects created locally and not yet flushed.
    async fn diff(&self) -> Result<Vec<Entity>, CasError> {
        Ok(Vec::new())
    }
}
