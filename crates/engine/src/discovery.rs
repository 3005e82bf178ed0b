//! Discovery contract
//!
//! Providers report what exists; the indexer decides what changed. A
//! provider either gets polled by the indexer ([`DiscoveryProvider`]) or
//! pushes [`ProviderBatch`]es through a [`DiscoveryFeed`].

use crate::worker::Command;
use crossbeam_channel::{Sender, TrySendError};
use launchdex_core::{
    ChangeStamp, EngineConfig, Error, ItemId, ItemKind, ProviderId, Result, RootSet, SearchItem,
};
use parking_lot::Mutex;
use std::path::PathBuf;

/// One item as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredItem {
    /// Stable identifier
    pub id: ItemId,
    /// Item kind
    pub kind: ItemKind,
    /// Display title
    pub title: String,
    /// Launch path or payload
    pub path: String,
    /// Stamp of the scan that last saw this item change
    pub change_stamp: ChangeStamp,
}

impl DiscoveredItem {
    /// Create a discovered item
    pub fn new(
        id: impl Into<ItemId>,
        kind: ItemKind,
        title: impl Into<String>,
        path: impl Into<String>,
        change_stamp: ChangeStamp,
    ) -> Self {
        DiscoveredItem {
            id: id.into(),
            kind,
            title: title.into(),
            path: path.into(),
            change_stamp,
        }
    }

    /// A fresh store item owned by `provider`
    pub fn into_item(self, provider: &ProviderId) -> SearchItem {
        SearchItem::new(
            self.id,
            self.kind,
            self.title,
            self.path,
            provider.clone(),
            self.change_stamp,
        )
    }
}

/// A provider's report for one scan or event burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderBatch {
    /// Reporting provider
    pub provider: ProviderId,
    /// Provider-level stamp of this report
    pub change_stamp: ChangeStamp,
    /// Full scan: owned items missing from `items` are gone
    pub complete: bool,
    /// Reported items
    pub items: Vec<DiscoveredItem>,
    /// Explicit deletion markers
    pub deletions: Vec<ItemId>,
}

impl ProviderBatch {
    /// A complete scan result.
    pub fn full(
        provider: impl Into<ProviderId>,
        change_stamp: ChangeStamp,
        items: Vec<DiscoveredItem>,
    ) -> Self {
        ProviderBatch {
            provider: provider.into(),
            change_stamp,
            complete: true,
            items,
            deletions: Vec::new(),
        }
    }

    /// A delta: only the listed items and deletions apply.
    pub fn delta(
        provider: impl Into<ProviderId>,
        change_stamp: ChangeStamp,
        items: Vec<DiscoveredItem>,
        deletions: Vec<ItemId>,
    ) -> Self {
        ProviderBatch {
            provider: provider.into(),
            change_stamp,
            complete: false,
            items,
            deletions,
        }
    }
}

/// Roots and exclusions a polled provider works against in one cycle.
///
/// Built from the live config at the start of every cycle, so root changes
/// reach providers without rebuilding them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryScope {
    /// Discovery roots
    pub roots: Vec<PathBuf>,
    /// Paths at or under these roots are not reported
    pub excludes: RootSet,
}

impl DiscoveryScope {
    /// Scope over `roots` with `excludes`
    pub fn new(roots: Vec<PathBuf>, excludes: RootSet) -> Self {
        DiscoveryScope { roots, excludes }
    }

    /// Scope for the configured discovery and exclusion roots
    pub fn from_config(config: &EngineConfig) -> Self {
        DiscoveryScope::new(config.discovery_roots.clone(), config.exclude_set())
    }
}

/// Source of discoverable items polled by the indexer.
///
/// `change_stamp` must be cheap: it is compared against the recorded stamp
/// before any scan work happens. A provider whose results depend on the
/// scope must fold the scope into its stamp, so a root change is never
/// mistaken for "unchanged".
pub trait DiscoveryProvider: Send + Sync {
    /// Stable provider id
    fn id(&self) -> ProviderId;

    /// Current provider-level stamp for `scope`
    fn change_stamp(&self, scope: &DiscoveryScope) -> Result<ChangeStamp>;

    /// Enumerate every item in `scope`.
    ///
    /// Providers that do not work on paths ignore the scope.
    fn scan(&self, scope: &DiscoveryScope) -> Result<Vec<DiscoveredItem>>;
}

// ============================================================================
// StaticProvider
// ============================================================================

struct StaticState {
    stamp: ChangeStamp,
    items: Vec<DiscoveredItem>,
    failing: bool,
    scans: usize,
}

/// An in-memory provider whose contents are set directly.
///
/// Used for command lists and in tests.
pub struct StaticProvider {
    id: ProviderId,
    state: Mutex<StaticState>,
}

impl StaticProvider {
    /// An empty provider at stamp 0
    pub fn new(id: impl Into<ProviderId>) -> Self {
        StaticProvider {
            id: id.into(),
            state: Mutex::new(StaticState {
                stamp: ChangeStamp::ZERO,
                items: Vec::new(),
                failing: false,
                scans: 0,
            }),
        }
    }

    /// Replace the contents and move to `stamp`
    pub fn set_items(&self, stamp: ChangeStamp, items: Vec<DiscoveredItem>) {
        let mut state = self.state.lock();
        state.stamp = stamp;
        state.items = items;
    }

    /// Remove one item and move to `stamp`
    pub fn remove(&self, stamp: ChangeStamp, id: &str) {
        let mut state = self.state.lock();
        state.stamp = stamp;
        state.items.retain(|item| item.id.as_str() != id);
    }

    /// Make stamp reads and scans fail
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// Number of scans performed
    pub fn scan_count(&self) -> usize {
        self.state.lock().scans
    }
}

impl DiscoveryProvider for StaticProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    fn change_stamp(&self, _scope: &DiscoveryScope) -> Result<ChangeStamp> {
        let state = self.state.lock();
        if state.failing {
            return Err(Error::provider_scan(self.id.clone(), "provider unavailable"));
        }
        Ok(state.stamp)
    }

    fn scan(&self, _scope: &DiscoveryScope) -> Result<Vec<DiscoveredItem>> {
        let mut state = self.state.lock();
        if state.failing {
            return Err(Error::provider_scan(self.id.clone(), "provider unavailable"));
        }
        state.scans += 1;
        Ok(state.items.clone())
    }
}

impl std::fmt::Debug for StaticProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StaticProvider")
            .field("id", &self.id)
            .field("stamp", &state.stamp)
            .field("items", &state.items.len())
            .finish()
    }
}

// ============================================================================
// DiscoveryFeed
// ============================================================================

/// Push side of the indexer's command channel for discovery batches.
#[derive(Debug, Clone)]
pub struct DiscoveryFeed {
    tx: Sender<Command>,
}

impl DiscoveryFeed {
    pub(crate) fn new(tx: Sender<Command>) -> Self {
        DiscoveryFeed { tx }
    }

    /// Queue a batch without blocking.
    ///
    /// Returns [`Error::Backpressure`] when the indexer queue is full.
    pub fn try_send(&self, batch: ProviderBatch) -> Result<()> {
        match self.tx.try_send(Command::Batch(batch)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::Backpressure),
            Err(TrySendError::Disconnected(_)) => Err(Error::Shutdown),
        }
    }

    /// Queue a batch, waiting for room.
    pub fn send(&self, batch: ProviderBatch) -> Result<()> {
        self.tx
            .send(Command::Batch(batch))
            .map_err(|_| Error::Shutdown)
    }
}
