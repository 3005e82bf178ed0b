//! Indexer: keeps the hot index eventually consistent with discovery.
//!
//! The indexer is the only writer of the [`IndexStore`] and the only
//! publisher of generations. Every cycle diffs what providers report
//! against what the store holds, writes the difference and, if anything
//! searchable changed, publishes the next generation.
//!
//! Cost control:
//! - a provider whose stamp matches the recorded one is skipped entirely,
//!   both for pushed batches and for polled refreshes
//! - an item whose own stamp matches is skipped individually
//! - reconciliation pauses between item batches and backs off while queries
//!   are running

use crate::discovery::{DiscoveredItem, DiscoveryProvider, DiscoveryScope, ProviderBatch};
use crate::feedback::FeedbackEvent;
use crate::report::{IndexRefreshReport, ProviderReport, RefreshKind};
use launchdex_core::{
    ChangeStamp, EngineConfig, Error, FailureCode, ItemId, ProviderId, PruneReason, Result,
    SearchItem, Timestamp,
};
use launchdex_search::{GenerationCell, HotIndex, QueryLoad, SharedConfig};
use launchdex_storage::{IndexStore, StoreStats, UpsertOutcome};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Feedback events kept for replay after store write failures
pub const MAX_RETRY_BACKLOG: usize = 1024;

const BACKOFF_STEP: Duration = Duration::from_millis(1);

/// Single-writer indexing core. Driven by the indexer worker thread.
pub struct Indexer {
    store: Arc<Mutex<IndexStore>>,
    providers: Vec<Arc<dyn DiscoveryProvider>>,
    generations: Arc<GenerationCell>,
    config: SharedConfig,
    query_load: QueryLoad,
    pending_deletions: BTreeMap<ProviderId, BTreeSet<ItemId>>,
    retries: VecDeque<FeedbackEvent>,
    dirty: bool,
}

impl Indexer {
    /// Create an indexer over `store`, publishing into `generations`.
    ///
    /// A store opened with existing items starts with unpublished changes,
    /// so the first [`publish`](Self::publish) serves them.
    pub fn new(store: IndexStore, generations: Arc<GenerationCell>, config: SharedConfig) -> Self {
        let dirty = !store.is_empty();
        Indexer {
            store: Arc::new(Mutex::new(store)),
            providers: Vec::new(),
            generations,
            config,
            query_load: QueryLoad::new(),
            pending_deletions: BTreeMap::new(),
            retries: VecDeque::new(),
            dirty,
        }
    }

    /// Share the query counter used for reconciliation back-off
    pub fn with_query_load(mut self, load: QueryLoad) -> Self {
        self.query_load = load;
        self
    }

    /// Register a polled provider
    pub fn with_provider(mut self, provider: Arc<dyn DiscoveryProvider>) -> Self {
        self.add_provider(provider);
        self
    }

    /// Register a polled provider. Providers are processed in registration order.
    pub fn add_provider(&mut self, provider: Arc<dyn DiscoveryProvider>) {
        self.providers.push(provider);
    }

    /// The store, shared for read access
    pub fn store(&self) -> &Arc<Mutex<IndexStore>> {
        &self.store
    }

    /// Live configuration
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Generation cell this indexer publishes into
    pub fn generations(&self) -> &Arc<GenerationCell> {
        &self.generations
    }

    /// Store counters
    pub fn stats(&self) -> StoreStats {
        self.store.lock().stats()
    }

    /// Items marked stale and awaiting deletion confirmation
    pub fn pending_deletions(&self) -> usize {
        self.pending_deletions.values().map(BTreeSet::len).sum()
    }

    /// Feedback events waiting for replay
    pub fn retry_backlog(&self) -> usize {
        self.retries.len()
    }

    /// True when store changes have not been published yet
    pub fn has_unpublished_changes(&self) -> bool {
        self.dirty
    }

    // ========================================================================
    // Cycles
    // ========================================================================

    /// Full scan of every provider under `roots`, then publish.
    ///
    /// Always publishes when no generation has been published yet.
    pub fn bootstrap(&mut self, roots: &[PathBuf]) -> IndexRefreshReport {
        let started = Instant::now();
        let mut report = IndexRefreshReport::new(RefreshKind::Bootstrap);
        self.replay_retries();
        let config = self.config.load_full();
        self.remove_excluded(&config);

        let scope = DiscoveryScope::new(roots.to_vec(), config.exclude_set());
        for provider in self.providers.clone() {
            let entry = self.scan_provider(provider.as_ref(), &scope, None, false);
            report.providers.push(entry);
        }

        if self.generations.current_number() == 0 {
            self.dirty = true;
        }
        report.generation = self.publish();
        report.elapsed = started.elapsed();
        info!(target: "launchdex::index", "{}", report);
        report
    }

    /// Apply pushed provider batches, then publish if anything changed.
    pub fn apply_incremental(&mut self, batches: Vec<ProviderBatch>) -> IndexRefreshReport {
        let started = Instant::now();
        let mut report = IndexRefreshReport::new(RefreshKind::Incremental);
        self.replay_retries();

        for batch in batches {
            let recorded = self.store.lock().provider_stamp(&batch.provider);
            if batch.change_stamp == recorded {
                let mut entry = ProviderReport::new(batch.provider);
                entry.discovered = batch.items.len();
                entry.skipped = batch.items.len();
                entry.unchanged = true;
                debug!(
                    target: "launchdex::index",
                    provider = %entry.provider,
                    stamp = %recorded,
                    "Provider unchanged, skipping"
                );
                report.providers.push(entry);
                continue;
            }
            let entry = self.apply_batch(batch, None);
            report.providers.push(entry);
        }

        report.generation = self.publish();
        report.elapsed = started.elapsed();
        debug!(target: "launchdex::index", "{}", report);
        report
    }

    /// Polled incremental update: rescan only providers whose stamp moved.
    ///
    /// Each provider's stamp is read for the configured scope and compared
    /// with the recorded one. Unchanged providers are reported as such and
    /// never scanned. A provider with deletions awaiting confirmation is
    /// always scanned.
    pub fn refresh(&mut self) -> IndexRefreshReport {
        let started = Instant::now();
        let mut report = IndexRefreshReport::new(RefreshKind::Incremental);
        self.replay_retries();
        let config = self.config.load_full();
        self.remove_excluded(&config);

        let scope = DiscoveryScope::from_config(&config);
        for provider in self.providers.clone() {
            let entry = self.scan_provider(provider.as_ref(), &scope, None, true);
            report.providers.push(entry);
        }

        report.generation = self.publish();
        report.elapsed = started.elapsed();
        debug!(target: "launchdex::index", "{}", report);
        report
    }

    /// Periodic full diff against every provider, rate-limited.
    pub fn reconcile(&mut self) -> IndexRefreshReport {
        let started = Instant::now();
        let mut report = IndexRefreshReport::new(RefreshKind::Reconcile);
        self.replay_retries();
        let config = self.config.load_full();
        self.remove_excluded(&config);

        let scope = DiscoveryScope::from_config(&config);
        for (n, provider) in self.providers.clone().into_iter().enumerate() {
            if n > 0 {
                self.yield_to_queries(&config);
            }
            let entry = self.scan_provider(provider.as_ref(), &scope, Some(&config), false);
            report.providers.push(entry);
        }

        report.generation = self.publish();
        report.elapsed = started.elapsed();
        info!(target: "launchdex::index", "{}", report);
        report
    }

    /// Mark or remove one item, then publish.
    ///
    /// Returns whether the item existed and changed.
    pub fn prune_stale(&mut self, id: &str, reason: PruneReason) -> Result<bool> {
        let changed = if reason.removes() {
            self.remove(id, reason)?
        } else {
            self.mark_stale(id)?
        };
        if changed {
            info!(
                target: "launchdex::index",
                id = %id,
                reason = reason.as_str(),
                "Pruned item"
            );
            self.publish();
        }
        Ok(changed)
    }

    /// Publish the next generation if the store changed since the last one.
    pub fn publish(&mut self) -> Option<u64> {
        if !self.dirty {
            return None;
        }
        let store = self.store.lock();
        let generation = self
            .generations
            .publish_with(|| HotIndex::build(store.scan_all()));
        drop(store);
        self.dirty = false;
        Some(generation.number())
    }

    /// Flush buffered store writes to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.store.lock().sync()
    }

    // ========================================================================
    // Feedback
    // ========================================================================

    /// Apply one feedback event.
    ///
    /// Events that fail with a store I/O error are queued and replayed at
    /// the start of the next cycle.
    pub fn apply_feedback(&mut self, event: FeedbackEvent) -> Result<bool> {
        let result = match &event {
            FeedbackEvent::Launch { id, at } => self.record_launch(id, *at),
            FeedbackEvent::Failure { id, code } => self.record_failure(id, *code),
        };
        if let Err(Error::StoreIo(e)) = &result {
            warn!(
                target: "launchdex::index",
                id = %event.id(),
                error = %e,
                "Feedback write failed, queued for retry"
            );
            self.queue_retry(event);
        }
        result
    }

    /// Count a successful launch. Unknown ids are ignored.
    pub fn record_launch(&mut self, id: &ItemId, at: Timestamp) -> Result<bool> {
        let Some(mut item) = self.store.lock().get(id.as_str()).cloned() else {
            debug!(target: "launchdex::index", id = %id, "Launch for unknown item ignored");
            return Ok(false);
        };
        item.record_use(at);
        let outcome = self.store.lock().upsert(item)?;
        self.note_outcome(outcome);
        Ok(true)
    }

    /// Handle a failed launch: stale-target codes prune immediately.
    pub fn record_failure(&mut self, id: &ItemId, code: FailureCode) -> Result<bool> {
        match code.prune_reason() {
            Some(reason) => self.prune_stale(id.as_str(), reason),
            None => {
                info!(
                    target: "launchdex::index",
                    id = %id,
                    code = ?code,
                    "Launch failed; item kept"
                );
                Ok(false)
            }
        }
    }

    /// Replay queued feedback. Events that fail again go back on the queue.
    pub fn replay_retries(&mut self) {
        if self.retries.is_empty() {
            return;
        }
        let queued: Vec<FeedbackEvent> = self.retries.drain(..).collect();
        let count = queued.len();
        for event in queued {
            // Failures re-queue themselves.
            let _ = self.apply_feedback(event);
        }
        debug!(
            target: "launchdex::index",
            replayed = count,
            remaining = self.retries.len(),
            "Replayed feedback"
        );
    }

    fn queue_retry(&mut self, event: FeedbackEvent) {
        if self.retries.len() >= MAX_RETRY_BACKLOG {
            if let Some(dropped) = self.retries.pop_front() {
                warn!(
                    target: "launchdex::index",
                    id = %dropped.id(),
                    "Retry backlog full, dropping oldest feedback event"
                );
            }
        }
        self.retries.push_back(event);
    }

    // ========================================================================
    // Diffing
    // ========================================================================

    fn scan_provider(
        &mut self,
        provider: &dyn DiscoveryProvider,
        scope: &DiscoveryScope,
        throttle: Option<&EngineConfig>,
        skip_unchanged: bool,
    ) -> ProviderReport {
        let started = Instant::now();
        let id = provider.id();
        let stamp = match provider.change_stamp(scope) {
            Ok(stamp) => stamp,
            Err(e) => return scan_failed(id, &e, started),
        };

        if skip_unchanged && self.is_unchanged(&id, stamp) {
            debug!(
                target: "launchdex::index",
                provider = %id,
                stamp = %stamp,
                "Provider unchanged, skipping scan"
            );
            let mut entry = ProviderReport::new(id);
            entry.unchanged = true;
            entry.elapsed = started.elapsed();
            return entry;
        }

        match provider.scan(scope) {
            Ok(items) => self.apply_batch(ProviderBatch::full(id, stamp, items), throttle),
            Err(e) => scan_failed(id, &e, started),
        }
    }

    /// Recorded stamp matches and no deletion waits on a full scan.
    fn is_unchanged(&self, provider: &ProviderId, stamp: ChangeStamp) -> bool {
        let awaiting_confirmation = self
            .pending_deletions
            .get(provider)
            .is_some_and(|pending| !pending.is_empty());
        !awaiting_confirmation && self.store.lock().provider_stamp(provider) == stamp
    }

    fn apply_batch(&mut self, batch: ProviderBatch, throttle: Option<&EngineConfig>) -> ProviderReport {
        let started = Instant::now();
        let config = self.config.load_full();
        let excludes = config.exclude_set();
        let batch_size = config.indexer.reconcile_batch_size.max(1);
        let ProviderBatch {
            provider,
            change_stamp,
            complete,
            items,
            deletions,
        } = batch;

        let mut entry = ProviderReport::new(provider.clone());
        entry.discovered = items.len();

        let owned: BTreeSet<ItemId> = if complete {
            self.store.lock().ids_for_provider(&provider).into_iter().collect()
        } else {
            BTreeSet::new()
        };
        let mut seen: FxHashSet<ItemId> = FxHashSet::default();

        for (n, discovered) in items.into_iter().enumerate() {
            if let Some(throttle) = throttle {
                if n > 0 && n % batch_size == 0 {
                    self.yield_to_queries(throttle);
                }
            }

            if excludes.covers(&discovered.path) {
                entry.skipped += 1;
                match self.remove(discovered.id.as_str(), PruneReason::Excluded) {
                    Ok(true) => entry.removed += 1,
                    Ok(false) => {}
                    Err(e) => self.write_failed(&mut entry, &discovered.id, &e),
                }
                continue;
            }

            seen.insert(discovered.id.clone());
            self.unqueue_pending(&provider, &discovered.id);

            let existing = self.store.lock().get(discovered.id.as_str()).cloned();
            let next = match existing {
                Some(existing)
                    if !existing.stale
                        && existing.change_stamp == discovered.change_stamp
                        && existing.source_provider == provider =>
                {
                    entry.skipped += 1;
                    continue;
                }
                Some(existing) => rediscover(existing, discovered, &provider),
                None => discovered.into_item(&provider),
            };

            let id = next.id.clone();
            let outcome = self.store.lock().upsert(next);
            match outcome {
                Ok(UpsertOutcome::Unchanged) => entry.skipped += 1,
                Ok(outcome) => {
                    entry.upserted += 1;
                    self.note_outcome(outcome);
                }
                Err(e) => self.write_failed(&mut entry, &id, &e),
            }
        }

        for id in deletions {
            let owner = self
                .store
                .lock()
                .get(id.as_str())
                .map(|item| item.source_provider.clone());
            if owner.as_ref() != Some(&provider) {
                debug!(
                    target: "launchdex::index",
                    provider = %provider,
                    id = %id,
                    "Deletion for unknown or foreign item ignored"
                );
                continue;
            }
            if config.indexer.confirm_deletions {
                match self.mark_stale(id.as_str()) {
                    Ok(marked) => {
                        if marked {
                            entry.marked_stale += 1;
                        }
                        self.pending_deletions
                            .entry(provider.clone())
                            .or_default()
                            .insert(id);
                    }
                    Err(e) => self.write_failed(&mut entry, &id, &e),
                }
            } else {
                match self.remove(id.as_str(), PruneReason::VanishedAtSource) {
                    Ok(true) => entry.removed += 1,
                    Ok(false) => {}
                    Err(e) => self.write_failed(&mut entry, &id, &e),
                }
            }
        }

        if complete {
            let pending = self.pending_deletions.remove(&provider).unwrap_or_default();
            for id in owned.iter().filter(|id| !seen.contains(*id)) {
                let reason = if pending.contains(id) {
                    PruneReason::DeletionConfirmed
                } else {
                    PruneReason::VanishedAtSource
                };
                match self.remove(id.as_str(), reason) {
                    Ok(true) => entry.removed += 1,
                    Ok(false) => {}
                    Err(e) => {
                        self.write_failed(&mut entry, id, &e);
                        if pending.contains(id) {
                            self.pending_deletions
                                .entry(provider.clone())
                                .or_default()
                                .insert(id.clone());
                        }
                    }
                }
            }
        }

        if entry.failed == 0 {
            let recorded = self.store.lock().set_provider_stamp(&provider, change_stamp);
            if let Err(e) = recorded {
                warn!(
                    target: "launchdex::index",
                    provider = %provider,
                    error = %e,
                    "Failed to record provider stamp"
                );
                entry.failed += 1;
            }
        }

        entry.elapsed = started.elapsed();
        entry
    }

    fn remove(&mut self, id: &str, reason: PruneReason) -> Result<bool> {
        let removed = self.store.lock().delete(id)?;
        match removed {
            Some(item) => {
                if !item.stale {
                    self.dirty = true;
                }
                debug!(
                    target: "launchdex::index",
                    id = %id,
                    reason = reason.as_str(),
                    "Removed item"
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn mark_stale(&mut self, id: &str) -> Result<bool> {
        let Some(mut item) = self.store.lock().get(id).cloned() else {
            return Ok(false);
        };
        if item.stale {
            return Ok(false);
        }
        item.stale = true;
        let outcome = self.store.lock().upsert(item)?;
        self.note_outcome(outcome);
        Ok(true)
    }

    fn remove_excluded(&mut self, config: &EngineConfig) {
        let excludes = config.exclude_set();
        if excludes.is_empty() {
            return;
        }
        let covered: Vec<ItemId> = self
            .store
            .lock()
            .scan_all()
            .filter(|item| excludes.covers(&item.path))
            .map(|item| item.id.clone())
            .collect();
        for id in covered {
            if let Err(e) = self.remove(id.as_str(), PruneReason::Excluded) {
                warn!(target: "launchdex::index", id = %id, error = %e, "Failed to remove excluded item");
            }
        }
    }

    fn unqueue_pending(&mut self, provider: &ProviderId, id: &ItemId) {
        if let Some(pending) = self.pending_deletions.get_mut(provider) {
            if pending.remove(id) {
                debug!(target: "launchdex::index", id = %id, "Pending deletion revalidated");
            }
            if pending.is_empty() {
                self.pending_deletions.remove(provider);
            }
        }
    }

    fn note_outcome(&mut self, outcome: UpsertOutcome) {
        if outcome.is_content_change() {
            self.dirty = true;
        }
    }

    fn write_failed(&self, entry: &mut ProviderReport, id: &ItemId, error: &Error) {
        entry.failed += 1;
        warn!(
            target: "launchdex::index",
            provider = %entry.provider,
            id = %id,
            error = %error,
            "Store write failed"
        );
    }

    /// Pause between reconciliation batches, longer while queries run.
    fn yield_to_queries(&self, config: &EngineConfig) {
        let pause = config.indexer.reconcile_pause();
        if !pause.is_zero() {
            thread::sleep(pause);
        }
        let limit = config.indexer.max_query_backoff();
        let started = Instant::now();
        while !self.query_load.is_idle() && started.elapsed() < limit {
            thread::sleep(BACKOFF_STEP);
        }
    }
}

fn scan_failed(provider: ProviderId, error: &Error, started: Instant) -> ProviderReport {
    warn!(
        target: "launchdex::index",
        provider = %provider,
        error = %error,
        "Provider scan failed, retrying at next reconciliation"
    );
    let mut entry = ProviderReport::new(provider);
    entry.error = Some(error.to_string());
    entry.elapsed = started.elapsed();
    entry
}

/// Carry a stored item forward to a new discovery, keeping usage signals.
fn rediscover(
    mut item: SearchItem,
    discovered: DiscoveredItem,
    provider: &ProviderId,
) -> SearchItem {
    item.kind = discovered.kind;
    item.set_title(discovered.title);
    item.path = discovered.path;
    item.source_provider = provider.clone();
    item.change_stamp = discovered.change_stamp;
    item.stale = false;
    item
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("providers", &self.providers.len())
            .field("pending_deletions", &self.pending_deletions())
            .field("retries", &self.retries.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
