//! Concurrent lookups across every registered backend.
//!
//! Every hash is requested from every backend at once. Results are merged by
//! id as backends answer, first writer wins, and the call returns as soon as
//! every requested hash is found or every backend has answered for every
//! hash. A backend that fails or runs out of time on a hash contributes
//! nothing for it; stragglers are dropped. Integrity errors are not
//! swallowed.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use evees_cid::{cid_config_of, hash_object, same_cid, Value};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::store::{ensure_hash, CasStore};
use crate::{CasError, DEFAULT_SOURCE_TIMEOUT_MS};

/// Immutable registry of backends keyed by `cas_id`.
pub struct MultiSourceResolver {
    sources: BTreeMap<String, Arc<dyn CasStore>>,
    source_timeout: Duration,
}

impl MultiSourceResolver {
    /// Build the registry. Two backends sharing a `cas_id` is an error.
    pub fn new<I>(sources: I) -> Result<Self, CasError>
    where
        I: IntoIterator<Item = Arc<dyn CasStore>>,
    {
        let mut registry = BTreeMap::new();
        for source in sources {
            let cas_id = source.cas_id().to_string();
            if registry.insert(cas_id.clone(), source).is_some() {
                return Err(CasError::InvalidArgument(format!(
                    "duplicate source {}",
                    cas_id
                )));
            }
        }
        Ok(Self {
            sources: registry,
            source_timeout: Duration::from_millis(DEFAULT_SOURCE_TIMEOUT_MS),
        })
    }

    /// Upper bound on how long one backend may take to answer for one hash.
    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub fn cas_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source(&self, cas_id: &str) -> Result<&Arc<dyn CasStore>, CasError> {
        self.sources
            .get(cas_id)
            .ok_or_else(|| CasError::UnknownSource(cas_id.to_string()))
    }

    /// Store an object on the named backend.
    pub async fn create(&self, cas_id: &str, object: &Value) -> Result<String, CasError> {
        self.source(cas_id)?.create(object).await
    }

    /// Fetch one hash from one backend, bounded by the source timeout.
    ///
    /// Integrity errors reported by the backend propagate. Every other
    /// failure, and running out of time, counts as the backend not holding
    /// the hash. An object that does not reproduce the id it was requested
    /// under is discarded.
    async fn fetch(
        &self,
        store: &Arc<dyn CasStore>,
        cas_id: &str,
        hash: &str,
    ) -> Result<Option<Entity>, CasError> {
        match tokio::time::timeout(self.source_timeout, store.get(hash)).await {
            Ok(Ok(Some(object))) => Ok(verify(hash, &object, cas_id)
                .then(|| Entity::new(hash, object).with_remote(cas_id))),
            Ok(Ok(None)) => Ok(None),
            Ok(Err(e)) if e.is_integrity() => {
                warn!(cas_id, hash, error = %e, "Source returned corrupt data");
                Err(e)
            }
            Ok(Err(e)) => {
                debug!(cas_id, hash, error = %e, "Source get failed");
                Ok(None)
            }
            Err(_) => {
                warn!(
                    cas_id,
                    hash,
                    timeout_ms = self.source_timeout.as_millis() as u64,
                    "Source timed out, ignoring"
                );
                Ok(None)
            }
        }
    }

    /// Fetch whichever of `hashes` one backend holds.
    ///
    /// Each hash is bounded by the source timeout on its own, so a hash the
    /// backend hangs on does not hold back the ones it answered.
    pub async fn get_from_source(
        &self,
        hashes: &[String],
        cas_id: &str,
    ) -> Result<Vec<Entity>, CasError> {
        let store = self.source(cas_id)?;
        let results = join_all(hashes.iter().map(|hash| self.fetch(store, cas_id, hash))).await;

        let mut entities = Vec::new();
        for result in results {
            if let Some(entity) = result? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// Resolve `hashes` against every backend.
    ///
    /// Returns the entities found; a short result means some hashes are
    /// held by no backend. Each found id appears once. A backend reporting
    /// corrupt data fails the whole call.
    pub async fn get(&self, hashes: &[String]) -> Result<Vec<Entity>, CasError> {
        for hash in hashes {
            ensure_hash(hash)?;
        }

        let mut seen = HashSet::new();
        let unique: Vec<&str> = hashes
            .iter()
            .map(String::as_str)
            .filter(|h| seen.insert(*h))
            .collect();
        if unique.is_empty() || self.sources.is_empty() {
            return Ok(Vec::new());
        }

        let requested = &unique;
        let mut pending: FuturesUnordered<_> = self
            .sources
            .iter()
            .flat_map(move |(cas_id, store)| {
                requested
                    .iter()
                    .map(move |hash| async move { self.fetch(store, cas_id, hash).await })
            })
            .collect();

        let mut found: Vec<Entity> = Vec::with_capacity(unique.len());
        while let Some(result) = pending.next().await {
            if let Some(entity) = result? {
                if !found.iter().any(|e| e.id == entity.id) {
                    found.push(entity);
                }
            }

            if found.len() == unique.len() {
                debug!(
                    count = found.len(),
                    outstanding = pending.len(),
                    "All hashes resolved"
                );
                break;
            }
        }

        Ok(found)
    }

    /// Resolve one hash, failing with [`CasError::NotFound`] if no backend
    /// holds it.
    pub async fn get_entity(&self, hash: &str) -> Result<Entity, CasError> {
        self.get(&[hash.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CasError::NotFound(hash.to_string()))
    }
}

fn verify(hash: &str, object: &Value, cas_id: &str) -> bool {
    let computed = cid_config_of(hash)
        .and_then(|config| hash_object(object, &config))
        .and_then(|computed| same_cid(&computed, hash).map(|same| (computed, same)));
    match computed {
        Ok((_, true)) => true,
        Ok((computed, false)) => {
            warn!(cas_id, hash, computed = %computed, "Dropping object that does not match its id");
            false
        }
        Err(e) => {
            warn!(cas_id, hash, error = %e, "Cannot verify object");
            false
        }
    }
}
