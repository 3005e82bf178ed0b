//! IndexHandle: the embedding surface.
//!
//! One handle owns one store, the indexer worker that writes it and the
//! search engine that reads its published generations. Hosts query through
//! the handle (or a [`QueryClient`] per search box) and report launches
//! through the [`UsageFeedbackSink`].

use crate::config_channel::{ConfigChannel, ConfigUpdate, ConfigWatcher};
use crate::discovery::{DiscoveryFeed, DiscoveryProvider, ProviderBatch};
use crate::feedback::UsageFeedbackSink;
use crate::indexer::Indexer;
use crate::report::IndexRefreshReport;
use crate::worker::{Command, IndexerWorker, WorkerStats, DEFAULT_QUEUE_CAPACITY};
use launchdex_core::{
    Clock, EngineConfig, ItemKind, QueryHit, Result, SearchItem, SystemClock,
};
use launchdex_search::{GenerationCell, QueryClient, QueryLoad, SearchEngine, SearchOutcome};
use launchdex_storage::{DurabilityMode, IndexStore, StoreOptions, StoreStats};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Builder for [`IndexHandle`].
pub struct IndexHandleBuilder {
    config: EngineConfig,
    data_dir: Option<PathBuf>,
    store: Option<IndexStore>,
    durability: DurabilityMode,
    providers: Vec<Arc<dyn DiscoveryProvider>>,
    clock: Arc<dyn Clock>,
    queue_capacity: usize,
}

impl IndexHandleBuilder {
    fn new(config: EngineConfig) -> Self {
        IndexHandleBuilder {
            config,
            data_dir: None,
            store: None,
            durability: DurabilityMode::default(),
            providers: Vec::new(),
            clock: Arc::new(SystemClock),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Persist the store in `dir`. Without this the store is in-memory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Use an already-open store (takes precedence over `data_dir`)
    pub fn store(mut self, store: IndexStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Journal fsync policy for stores opened from `data_dir`
    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    /// Register a polled discovery provider
    pub fn provider(mut self, provider: Arc<dyn DiscoveryProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Time source for ranking and launch stamps
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Indexer command queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Open the store, publish what it already holds and start the worker.
    ///
    /// Does not scan providers; call [`IndexHandle::bootstrap`] for that.
    ///
    /// # Errors
    ///
    /// `Error::ConfigValidation` for an invalid config, store errors from
    /// [`IndexStore::open`].
    pub fn build(self) -> Result<IndexHandle> {
        let channel = Arc::new(ConfigChannel::new(self.config)?);
        let config = channel.load();

        let store = match (self.store, self.data_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => IndexStore::open(
                &dir,
                StoreOptions {
                    durability: self.durability,
                    compaction_threshold: config.indexer.compaction_threshold,
                },
            )?,
            (None, None) => IndexStore::ephemeral(),
        };

        let generations = Arc::new(GenerationCell::new());
        let load = QueryLoad::new();
        let mut indexer = Indexer::new(store, Arc::clone(&generations), channel.shared())
            .with_query_load(load.clone());
        for provider in self.providers {
            indexer.add_provider(provider);
        }
        indexer.publish();
        let store = Arc::clone(indexer.store());

        let engine = Arc::new(
            SearchEngine::new(Arc::clone(&generations), channel.shared())
                .with_clock(Arc::clone(&self.clock))
                .with_query_load(load),
        );
        let worker = IndexerWorker::spawn(indexer, self.queue_capacity)?;
        let tx = worker.sender();

        info!(
            target: "launchdex::index",
            items = store.lock().len(),
            generation = generations.current_number(),
            "Index handle ready"
        );

        Ok(IndexHandle {
            feedback: UsageFeedbackSink::new(tx.clone(), self.clock),
            feed: DiscoveryFeed::new(tx),
            engine,
            generations,
            config: channel,
            store,
            worker,
        })
    }
}

/// Running search index.
pub struct IndexHandle {
    engine: Arc<SearchEngine>,
    generations: Arc<GenerationCell>,
    config: Arc<ConfigChannel>,
    store: Arc<Mutex<IndexStore>>,
    feedback: UsageFeedbackSink,
    feed: DiscoveryFeed,
    worker: IndexerWorker,
}

impl IndexHandle {
    /// Start configuring a handle
    pub fn builder(config: EngineConfig) -> IndexHandleBuilder {
        IndexHandleBuilder::new(config)
    }

    /// Open a persistent index in `dir` with no polled providers
    pub fn open(dir: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        Self::builder(config).data_dir(dir.as_ref()).build()
    }

    /// An in-memory index with no polled providers
    pub fn ephemeral(config: EngineConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The search engine
    pub fn engine(&self) -> &Arc<SearchEngine> {
        &self.engine
    }

    /// Top hits for `query`. Empty when nothing matches.
    pub fn search(&self, query: &str, limit: usize) -> Vec<QueryHit> {
        self.engine.search(query, limit)
    }

    /// Full outcome for `query`, optionally restricted to one kind.
    pub fn search_with_filter(
        &self,
        query: &str,
        limit: usize,
        filter: Option<ItemKind>,
    ) -> SearchOutcome {
        self.engine.search_with_filter(query, limit, filter)
    }

    /// A new client for one search box
    pub fn client(&self) -> QueryClient {
        self.engine.client()
    }

    /// Number of the generation queries currently read
    pub fn generation(&self) -> u64 {
        self.generations.current_number()
    }

    // ========================================================================
    // Indexing
    // ========================================================================

    /// Full scan of every registered provider.
    pub fn bootstrap(&self) -> Result<IndexRefreshReport> {
        self.worker.bootstrap()
    }

    /// Rescan only the providers whose change stamp moved.
    ///
    /// The cheap start-up path once a generation is being served.
    pub fn refresh(&self) -> Result<IndexRefreshReport> {
        self.worker.refresh()
    }

    /// Apply provider batches and wait for the result.
    pub fn apply_incremental(&self, batches: Vec<ProviderBatch>) -> Result<IndexRefreshReport> {
        self.worker.apply_incremental(batches)
    }

    /// Run a reconciliation now.
    pub fn reconcile(&self) -> Result<IndexRefreshReport> {
        self.worker.reconcile()
    }

    /// Sender for pushed discovery batches
    pub fn feed(&self) -> DiscoveryFeed {
        self.feed.clone()
    }

    /// Sender for launch feedback
    pub fn feedback(&self) -> UsageFeedbackSink {
        self.feedback.clone()
    }

    /// Wait until everything queued so far is applied and published.
    pub fn flush(&self) -> Result<()> {
        self.worker.flush()
    }

    /// A copy of the stored item, stale or not
    pub fn get(&self, id: &str) -> Option<SearchItem> {
        self.store.lock().get(id).cloned()
    }

    /// Store counters
    pub fn stats(&self) -> StoreStats {
        self.store.lock().stats()
    }

    /// Worker counters
    pub fn worker_stats(&self) -> WorkerStats {
        self.worker.stats()
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// The live configuration channel
    pub fn config(&self) -> &Arc<ConfigChannel> {
        &self.config
    }

    /// Validate and apply a new configuration.
    ///
    /// A change to discovery or exclusion roots queues a reconciliation.
    pub fn update_config(&self, next: EngineConfig) -> Result<ConfigUpdate> {
        let update = self.config.propose(next)?;
        if update.discovery_changed() {
            if let Err(e) = self.worker.schedule_reconcile() {
                warn!(target: "launchdex::config", error = %e, "Could not queue reconciliation");
            }
        }
        Ok(update)
    }

    /// Watch a config file and apply its changes once `debounce` passes
    /// without further file events.
    pub fn watch_config(
        &self,
        path: impl Into<PathBuf>,
        debounce: Duration,
    ) -> Result<ConfigWatcher> {
        let tx = self.worker.sender();
        ConfigWatcher::spawn(path.into(), Arc::clone(&self.config), debounce, move |update| {
            if update.discovery_changed() && tx.try_send(Command::Reconcile(None)).is_err() {
                warn!(target: "launchdex::config", "Could not queue reconciliation");
            }
        })
    }

    /// Stop the worker after queued commands finish and sync the store.
    pub fn shutdown(self) {
        self.worker.shutdown();
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("generation", &self.generation())
            .field("worker", &self.worker)
            .finish()
    }
}
