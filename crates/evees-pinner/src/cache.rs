//! The pin durability cache and its flush loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::ledger::{PinLedger, PinRecord};
use crate::reference::{PinBatch, PinKind, PinRef};
use crate::service::PinningService;
use crate::PinError;

/// Shortest interval the flush loop accepts.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Result of a single flush call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Another flush was in flight; nothing was done.
    Skipped,
    Completed(FlushReport),
}

/// Per-partition outcome of a completed flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub hashes_pinned: usize,
    pub addresses_pinned: usize,
    /// Partitions whose batch was not acknowledged and stays unpinned.
    pub failed: Vec<PinKind>,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.hashes_pinned == 0 && self.addresses_pinned == 0 && self.failed.is_empty()
    }
}

/// Clears the in-flight flag however the flush ends, cancellation included.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Durable queue of unpinned references plus the logic to flush it.
///
/// The ledger is owned exclusively by this cache. `pin` may run while a
/// flush is in progress; each ledger operation is its own transaction.
pub struct PinCache {
    ledger: Arc<PinLedger>,
    service: Arc<dyn PinningService>,
    flushing: AtomicBool,
}

impl PinCache {
    pub fn new(ledger: PinLedger, service: Arc<dyn PinningService>) -> Self {
        Self {
            ledger: Arc::new(ledger),
            service,
            flushing: AtomicBool::new(false),
        }
    }

    async fn with_ledger<T, F>(&self, op: F) -> Result<T, PinError>
    where
        T: Send + 'static,
        F: FnOnce(&PinLedger) -> Result<T, PinError> + Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        tokio::task::spawn_blocking(move || op(&ledger))
            .await
            .map_err(|e| PinError::Task(e.to_string()))?
    }

    /// Register a reference for pinning. A reference that is already tracked,
    /// pinned or not, is left untouched.
    ///
    /// Returns `true` when the reference was newly registered.
    pub async fn pin(&self, reference: &str) -> Result<bool, PinError> {
        let owned = reference.to_string();
        let inserted = self.with_ledger(move |l| l.insert_unpinned(&owned)).await?;
        if inserted {
            debug!(reference, "Registered unpinned reference");
        }
        Ok(inserted)
    }

    pub async fn status(&self, reference: &str) -> Result<Option<PinRecord>, PinError> {
        let owned = reference.to_string();
        self.with_ledger(move |l| l.status(&owned)).await
    }

    pub async fn unpinned(&self) -> Result<Vec<String>, PinError> {
        self.with_ledger(|l| l.unpinned()).await
    }

    pub async fn len(&self) -> Result<u64, PinError> {
        self.with_ledger(|l| l.len()).await
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Push every unpinned reference to the pinning service.
    ///
    /// Returns [`FlushOutcome::Skipped`] without touching the ledger when a
    /// flush is already running. Hashes and database addresses are sent as
    /// one batch each; a partition is marked pinned only when its own batch
    /// is acknowledged. A failed partition is logged and stays unpinned for
    /// the next flush. Only ledger failures are returned as errors.
    pub async fn flush(&self) -> Result<FlushOutcome, PinError> {
        if self
            .flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Flush already in flight, skipping");
            return Ok(FlushOutcome::Skipped);
        }
        let _in_flight = InFlight(&self.flushing);

        let unpinned = self.unpinned().await?;
        let batch = PinBatch::partition(unpinned.iter().map(|r| PinRef::parse(r)));
        if batch.is_empty() {
            return Ok(FlushOutcome::Completed(FlushReport::default()));
        }

        let (hashes, addresses) = tokio::join!(
            self.flush_partition(PinKind::Hash, batch.get(PinKind::Hash)),
            self.flush_partition(PinKind::DatabaseAddress, batch.get(PinKind::DatabaseAddress)),
        );

        let mut report = FlushReport::default();
        match hashes? {
            Some(n) => report.hashes_pinned = n,
            None => report.failed.push(PinKind::Hash),
        }
        match addresses? {
            Some(n) => report.addresses_pinned = n,
            None => report.failed.push(PinKind::DatabaseAddress),
        }
        Ok(FlushOutcome::Completed(report))
    }

    /// `Ok(None)` when the service did not acknowledge the batch.
    async fn flush_partition(&self, kind: PinKind, refs: &[String]) -> Result<Option<usize>, PinError> {
        if refs.is_empty() {
            return Ok(Some(0));
        }

        let sent = match kind {
            PinKind::Hash => self.service.pin_hashes(refs).await,
            PinKind::DatabaseAddress => self.service.pin_addresses(refs).await,
        };
        if let Err(e) = sent {
            warn!(%kind, count = refs.len(), error = %e, "Pin batch failed, will retry");
            return Ok(None);
        }

        let acknowledged = refs.to_vec();
        let marked = self.with_ledger(move |l| l.mark_pinned(&acknowledged)).await?;
        debug!(%kind, marked, "Pin batch acknowledged");
        Ok(Some(marked))
    }

    /// Start flushing every `interval` until the returned handle is stopped
    /// or dropped. The first flush runs immediately.
    pub fn start(self: &Arc<Self>, interval: Duration) -> FlushHandle {
        let interval = interval.max(MIN_FLUSH_INTERVAL);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let cache = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_ms = interval.as_millis() as u64, "Pin flush loop started");

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        match cache.flush().await {
                            Ok(FlushOutcome::Completed(report)) if !report.is_empty() => {
                                info!(
                                    hashes = report.hashes_pinned,
                                    addresses = report.addresses_pinned,
                                    failed = report.failed.len(),
                                    "Pin flush completed"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "Pin flush failed"),
                        }
                    }
                }
            }

            info!("Pin flush loop stopped");
        });

        FlushHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// Handle to a running flush loop. Dropping it aborts the loop.
#[derive(Debug)]
pub struct FlushHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl FlushHandle {
    /// Ask the loop to exit and wait for it. A flush already running is
    /// allowed to finish.
    pub async fn stop(mut self) -> Result<(), PinError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| PinError::Task(e.to_string()))?;
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for FlushHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
