//! Indexer background worker.
//!
//! Runs the [`Indexer`] on one named thread (`launchdex-indexer`) that
//! consumes a bounded command channel and a reconciliation timer. Commands
//! are handled strictly in order, so a flush barrier observes every command
//! queued before it. A panicking cycle is caught and logged; the worker
//! keeps running.

use crate::discovery::ProviderBatch;
use crate::feedback::FeedbackEvent;
use crate::indexer::Indexer;
use crate::report::IndexRefreshReport;
use crossbeam_channel::{after, bounded, select, Receiver, Sender, TrySendError};
use launchdex_core::{Error, Result};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Name of the worker thread
pub const WORKER_THREAD_NAME: &str = "launchdex-indexer";

/// Default command queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Batches or feedback events folded into one cycle
const MAX_COALESCED: usize = 64;

/// Messages consumed by the worker.
pub(crate) enum Command {
    Batch(ProviderBatch),
    Incremental(Vec<ProviderBatch>, Sender<IndexRefreshReport>),
    Feedback(FeedbackEvent),
    Bootstrap(Option<Sender<IndexRefreshReport>>),
    Refresh(Option<Sender<IndexRefreshReport>>),
    Reconcile(Option<Sender<IndexRefreshReport>>),
    Flush(Sender<()>),
    Shutdown,
}

/// Send a flush barrier and wait for the worker to pass it.
pub(crate) fn flush_via(tx: &Sender<Command>) -> Result<()> {
    let (ack_tx, ack_rx) = bounded(1);
    tx.send(Command::Flush(ack_tx))
        .map_err(|_| Error::Shutdown)?;
    ack_rx.recv().map_err(|_| Error::Shutdown)
}

/// Worker metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    /// Commands waiting in the queue
    pub queue_depth: usize,
    /// Cycles completed since start
    pub cycles_completed: u64,
    /// Cycles that panicked
    pub panics: u64,
}

#[derive(Default)]
struct WorkerCounters {
    cycles: AtomicU64,
    panics: AtomicU64,
}

/// Handle to the running indexer thread.
pub struct IndexerWorker {
    tx: Sender<Command>,
    counters: Arc<WorkerCounters>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl IndexerWorker {
    /// Start the worker thread with a command queue of `capacity`.
    ///
    /// # Errors
    ///
    /// `Error::StoreIo` if the thread cannot be spawned.
    pub fn spawn(indexer: Indexer, capacity: usize) -> Result<Self> {
        let (tx, rx) = bounded(capacity.max(1));
        let counters = Arc::new(WorkerCounters::default());
        let thread_counters = Arc::clone(&counters);
        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker_loop(indexer, rx, &thread_counters))?;

        Ok(IndexerWorker {
            tx,
            counters,
            thread: Mutex::new(Some(thread)),
        })
    }

    pub(crate) fn sender(&self) -> Sender<Command> {
        self.tx.clone()
    }

    /// Run a full bootstrap and wait for its report.
    pub fn bootstrap(&self) -> Result<IndexRefreshReport> {
        self.request(|reply| Command::Bootstrap(Some(reply)))
    }

    /// Apply provider batches and wait for the report.
    pub fn apply_incremental(&self, batches: Vec<ProviderBatch>) -> Result<IndexRefreshReport> {
        self.request(|reply| Command::Incremental(batches, reply))
    }

    /// Rescan providers whose stamp moved and wait for the report.
    pub fn refresh(&self) -> Result<IndexRefreshReport> {
        self.request(|reply| Command::Refresh(Some(reply)))
    }

    /// Run a reconciliation now and wait for its report.
    pub fn reconcile(&self) -> Result<IndexRefreshReport> {
        self.request(|reply| Command::Reconcile(Some(reply)))
    }

    /// Queue a reconciliation without waiting.
    pub fn schedule_reconcile(&self) -> Result<()> {
        match self.tx.try_send(Command::Reconcile(None)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::Backpressure),
            Err(TrySendError::Disconnected(_)) => Err(Error::Shutdown),
        }
    }

    /// Wait until every command queued so far has been handled, changes are
    /// published and the store is synced.
    pub fn flush(&self) -> Result<()> {
        flush_via(&self.tx)
    }

    /// Metrics snapshot
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            queue_depth: self.tx.len(),
            cycles_completed: self.counters.cycles.load(Ordering::Relaxed),
            panics: self.counters.panics.load(Ordering::Relaxed),
        }
    }

    /// Stop the worker after it finishes the commands already queued.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        let Some(thread) = self.thread.lock().take() else {
            return;
        };
        let _ = self.tx.send(Command::Shutdown);
        if thread.join().is_err() {
            warn!(target: "launchdex::index", "Indexer thread exited abnormally");
        }
    }

    fn request(
        &self,
        make: impl FnOnce(Sender<IndexRefreshReport>) -> Command,
    ) -> Result<IndexRefreshReport> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send(make(reply_tx))
            .map_err(|_| Error::Shutdown)?;
        // A panicked cycle drops the reply sender.
        reply_rx.recv().map_err(|_| Error::Shutdown)
    }
}

impl Drop for IndexerWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for IndexerWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexerWorker")
            .field("stats", &self.stats())
            .finish()
    }
}

// ============================================================================
// Worker loop
// ============================================================================

enum Cycle {
    Incremental(Vec<ProviderBatch>, Option<Sender<IndexRefreshReport>>),
    Feedback(Vec<FeedbackEvent>),
    Bootstrap(Option<Sender<IndexRefreshReport>>),
    Refresh(Option<Sender<IndexRefreshReport>>),
    Reconcile(Option<Sender<IndexRefreshReport>>),
    Flush(Sender<()>),
}

fn worker_loop(mut indexer: Indexer, rx: Receiver<Command>, counters: &WorkerCounters) {
    info!(target: "launchdex::index", "Indexer worker started");
    let mut last_reconcile = Instant::now();
    let mut held: Option<Command> = None;

    loop {
        let command = match held.take() {
            Some(command) => command,
            None => {
                let interval = indexer.config().load().indexer.reconcile_interval();
                let wait = (last_reconcile + interval).saturating_duration_since(Instant::now());
                select! {
                    recv(rx) -> msg => match msg {
                        Ok(command) => command,
                        Err(_) => break,
                    },
                    recv(after(wait)) -> _ => Command::Reconcile(None),
                }
            }
        };

        let cycle = match command {
            Command::Shutdown => break,
            Command::Batch(first) => {
                let mut batches = vec![first];
                while batches.len() < MAX_COALESCED {
                    match rx.try_recv() {
                        Ok(Command::Batch(batch)) => batches.push(batch),
                        Ok(other) => {
                            held = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                Cycle::Incremental(batches, None)
            }
            Command::Incremental(batches, reply) => Cycle::Incremental(batches, Some(reply)),
            Command::Feedback(first) => {
                let mut events = vec![first];
                while events.len() < MAX_COALESCED {
                    match rx.try_recv() {
                        Ok(Command::Feedback(event)) => events.push(event),
                        Ok(other) => {
                            held = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                Cycle::Feedback(events)
            }
            Command::Bootstrap(reply) => {
                last_reconcile = Instant::now();
                Cycle::Bootstrap(reply)
            }
            Command::Refresh(reply) => Cycle::Refresh(reply),
            Command::Reconcile(reply) => {
                last_reconcile = Instant::now();
                Cycle::Reconcile(reply)
            }
            Command::Flush(ack) => Cycle::Flush(ack),
        };

        match catch_unwind(AssertUnwindSafe(|| run_cycle(&mut indexer, cycle))) {
            Ok(()) => {
                counters.cycles.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.panics.fetch_add(1, Ordering::Relaxed);
                error!(
                    target: "launchdex::index",
                    "indexer cycle panicked: {:?}",
                    e.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
                );
            }
        }
    }

    indexer.publish();
    if let Err(e) = indexer.sync() {
        warn!(target: "launchdex::index", error = %e, "Final store sync failed");
    }
    info!(target: "launchdex::index", "Indexer worker stopped");
}

fn run_cycle(indexer: &mut Indexer, cycle: Cycle) {
    match cycle {
        Cycle::Incremental(batches, reply) => {
            let report = indexer.apply_incremental(batches);
            if let Some(reply) = reply {
                let _ = reply.send(report);
            }
        }
        Cycle::Feedback(events) => {
            indexer.replay_retries();
            for event in events {
                // Store failures are queued for retry inside the indexer.
                if let Err(e) = indexer.apply_feedback(event) {
                    debug!(target: "launchdex::index", error = %e, "Feedback not applied");
                }
            }
            indexer.publish();
        }
        Cycle::Bootstrap(reply) => {
            let roots = indexer.config().load().discovery_roots.clone();
            let report = indexer.bootstrap(&roots);
            if let Some(reply) = reply {
                let _ = reply.send(report);
            }
        }
        Cycle::Refresh(reply) => {
            let report = indexer.refresh();
            if let Some(reply) = reply {
                let _ = reply.send(report);
            }
        }
        Cycle::Reconcile(reply) => {
            let report = indexer.reconcile();
            if let Some(reply) = reply {
                let _ = reply.send(report);
            }
        }
        Cycle::Flush(ack) => {
            indexer.publish();
            if let Err(e) = indexer.sync() {
                warn!(target: "launchdex::index", error = %e, "Store sync failed");
            }
            let _ = ack.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DiscoveredItem, DiscoveryProvider, DiscoveryScope, StaticProvider};
    use arc_swap::ArcSwap;
    use launchdex_core::{ChangeStamp, EngineConfig, ItemKind, ProviderId};
    use launchdex_search::GenerationCell;
    use launchdex_storage::IndexStore;
    use std::time::Duration;

    fn spawn_with(provider: Arc<dyn DiscoveryProvider>, config: EngineConfig) -> (IndexerWorker, Arc<GenerationCell>) {
        let cell = Arc::new(GenerationCell::new());
        let indexer = Indexer::new(
            IndexStore::ephemeral(),
            Arc::clone(&cell),
            Arc::new(ArcSwap::from_pointee(config)),
        )
        .with_provider(provider);
        (IndexerWorker::spawn(indexer, 16).unwrap(), cell)
    }

    struct PanickingProvider;

    impl DiscoveryProvider for PanickingProvider {
        fn id(&self) -> ProviderId {
            ProviderId::from("boom")
        }

        fn change_stamp(&self, _scope: &DiscoveryScope) -> Result<ChangeStamp> {
            Ok(ChangeStamp::new(1))
        }

        fn scan(&self, _scope: &DiscoveryScope) -> Result<Vec<DiscoveredItem>> {
            panic!("scan exploded");
        }
    }

    #[test]
    fn test_bootstrap_request_returns_report() {
        let provider = Arc::new(StaticProvider::new("apps"));
        provider.set_items(
            ChangeStamp::new(1),
            vec![DiscoveredItem::new("a", ItemKind::App, "Alpha", "/a", ChangeStamp::new(1))],
        );
        let (worker, cell) = spawn_with(provider, EngineConfig::default());
        let report = worker.bootstrap().unwrap();
        assert_eq!(report.upserted(), 1);
        assert_eq!(cell.current_number(), 1);
        worker.shutdown();
    }

    #[test]
    fn test_refresh_request_skips_unchanged_provider() {
        let provider = Arc::new(StaticProvider::new("apps"));
        provider.set_items(
            ChangeStamp::new(1),
            vec![DiscoveredItem::new("a", ItemKind::App, "Alpha", "/a", ChangeStamp::new(1))],
        );
        let (worker, cell) = spawn_with(provider.clone(), EngineConfig::default());
        worker.bootstrap().unwrap();
        let report = worker.refresh().unwrap();
        assert!(report.provider("apps").unwrap().unchanged);
        assert_eq!(provider.scan_count(), 1);
        assert_eq!(cell.current_number(), 1);
        worker.shutdown();
    }

    #[test]
    fn test_panicking_cycle_keeps_worker_alive() {
        let (worker, _cell) = spawn_with(Arc::new(PanickingProvider), EngineConfig::default());
        assert!(matches!(worker.bootstrap(), Err(Error::Shutdown)));
        worker.flush().unwrap();
        let stats = worker.stats();
        assert_eq!(stats.panics, 1);
        assert!(stats.cycles_completed >= 1);
    }

    #[test]
    fn test_reconcile_timer_fires() {
        let provider = Arc::new(StaticProvider::new("apps"));
        let mut config = EngineConfig::default();
        config.indexer.reconcile_interval_ms = 10;
        let (worker, _cell) = spawn_with(provider.clone(), config);

        let deadline = Instant::now() + Duration::from_secs(5);
        while provider.scan_count() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(provider.scan_count() >= 2);
        worker.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (worker, _cell) = spawn_with(Arc::new(StaticProvider::new("apps")), EngineConfig::default());
        worker.shutdown();
        worker.shutdown();
        assert!(matches!(worker.flush(), Err(Error::Shutdown)));
    }
}
