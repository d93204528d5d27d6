//! The evees node: wires the configured backends, the resolver and the pin
//! cache together.
//!
//! Every object is written to a local in-memory store, registered with the
//! pin cache when pinning is configured, and written to IPFS when that
//! backend is enabled. Reads go through the multi-source resolver.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use evees_cas::{CasStore, Entity, IpfsStore, MemoryStore, MultiSourceResolver};
use evees_cid::{same_cid, Value};
use evees_pinner::{FlushOutcome, HttpPinner, PinCache, PinLedger, PinRecord, PinningService};
use futures::future::try_join_all;

use crate::config::NodeConfig;

/// Name of the in-process backend.
pub const LOCAL_CAS_ID: &str = "local";

pub struct EveesNode {
    config: NodeConfig,
    resolver: MultiSourceResolver,
    pins: Option<Arc<PinCache>>,
}

impl EveesNode {
    /// Build a node from configuration. The pinning service, if any, is the
    /// HTTP pinner at `pinner.url`.
    pub fn new(config: NodeConfig) -> Result<Self, anyhow::Error> {
        let service = match config.pinner.service_config() {
            Some(pinner) => Some(Arc::new(HttpPinner::new(&pinner)?) as Arc<dyn PinningService>),
            None => None,
        };
        Self::build(config, service)
    }

    /// Build a node that pins through `service` regardless of `pinner.url`.
    pub fn with_pinning_service(
        config: NodeConfig,
        service: Arc<dyn PinningService>,
    ) -> Result<Self, anyhow::Error> {
        Self::build(config, Some(service))
    }

    fn build(
        config: NodeConfig,
        service: Option<Arc<dyn PinningService>>,
    ) -> Result<Self, anyhow::Error> {
        config.validate()?;

        let pins = match service {
            Some(service) => {
                let ledger = match &config.pinner.db_path {
                    Some(path) => PinLedger::persistent(path).with_context(|| {
                        format!("Failed to open pin ledger at {}", path.display())
                    })?,
                    None => PinLedger::in_memory()?,
                };
                Some(Arc::new(PinCache::new(ledger, service)))
            }
            None => None,
        };

        let mut local = MemoryStore::new(LOCAL_CAS_ID, config.cid.clone())?;
        if let Some(pins) = &pins {
            local = local.with_pins(pins.clone());
        }
        let mut sources: Vec<Arc<dyn CasStore>> = vec![Arc::new(local)];

        if config.ipfs.enabled {
            let ipfs = IpfsStore::new(&config.ipfs.store_config(), config.cid.clone())?;
            sources.push(Arc::new(ipfs));
        }

        let resolver = MultiSourceResolver::new(sources)?.with_source_timeout(config.source_timeout());

        tracing::info!(
            sources = ?resolver.cas_ids().collect::<Vec<_>>(),
            pinning = pins.is_some(),
            base = %config.cid.base,
            hash = %config.cid.hash_type,
            "Node initialized"
        );

        Ok(Self {
            config,
            resolver,
            pins,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn resolver(&self) -> &MultiSourceResolver {
        &self.resolver
    }

    pub fn pins(&self) -> Option<&Arc<PinCache>> {
        self.pins.as_ref()
    }

    /// Compute the id of an object without storing it.
    pub fn hash(&self, object: &Value) -> Result<String, anyhow::Error> {
        Ok(self.resolver.source(LOCAL_CAS_ID)?.hash(object)?)
    }

    /// Store an object on every backend. All backends must agree on its id.
    pub async fn create(&self, object: &Value) -> Result<String, anyhow::Error> {
        let cas_ids: Vec<&str> = self.resolver.cas_ids().collect();
        let ids = try_join_all(cas_ids.iter().map(|cas_id| self.resolver.create(cas_id, object))).await?;

        let local = self.hash(object)?;
        for (cas_id, id) in cas_ids.iter().zip(&ids) {
            if !same_cid(&local, id)? {
                anyhow::bail!("Backend {} stored object under {}, expected {}", cas_id, id, local);
            }
        }
        tracing::debug!(id = %local, backends = ids.len(), "Object created");
        Ok(local)
    }

    pub async fn get(&self, hashes: &[String]) -> Result<Vec<Entity>, anyhow::Error> {
        Ok(self.resolver.get(hashes).await?)
    }

    pub async fn get_entity(&self, hash: &str) -> Result<Entity, anyhow::Error> {
        Ok(self.resolver.get_entity(hash).await?)
    }

    pub async fn pin_status(&self, reference: &str) -> Result<Option<PinRecord>, anyhow::Error> {
        match &self.pins {
            Some(pins) => Ok(pins.status(reference).await?),
            None => anyhow::bail!("Pinning is not configured"),
        }
    }

    /// Run one flush now. `None` when pinning is not configured.
    pub async fn flush_pins(&self) -> Result<Option<FlushOutcome>, anyhow::Error> {
        match &self.pins {
            Some(pins) => Ok(Some(pins.flush().await?)),
            None => Ok(None),
        }
    }

    /// Run the pin flush loop until Ctrl-C.
    pub async fn run(&self) -> Result<(), anyhow::Error> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Run the pin flush loop until `shutdown` completes, then stop it and
    /// wait for it to exit.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), anyhow::Error>
    where
        F: Future<Output = ()>,
    {
        let handle = self
            .pins
            .as_ref()
            .map(|pins| pins.start(self.config.pinner.flush_interval()));
        if handle.is_none() {
            tracing::warn!("Pinning is not configured, nothing to flush");
        }

        shutdown.await;
        tracing::info!("Shutting down");

        if let Some(handle) = handle {
            handle.stop().await?;
        }
        Ok(())
    }
}
