//! Refresh reports returned by every indexing cycle.

use launchdex_core::ProviderId;
use std::fmt;
use std::time::Duration;

/// Which indexing operation produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Full scan of every provider
    Bootstrap,
    /// Pushed provider batches
    Incremental,
    /// Periodic full diff
    Reconcile,
}

impl RefreshKind {
    /// Short label for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshKind::Bootstrap => "bootstrap",
            RefreshKind::Incremental => "incremental",
            RefreshKind::Reconcile => "reconcile",
        }
    }
}

/// Counters for one provider within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReport {
    /// Provider these counters belong to
    pub provider: ProviderId,
    /// Items the provider reported
    pub discovered: usize,
    /// Items written to the store
    pub upserted: usize,
    /// Items removed from the store
    pub removed: usize,
    /// Items marked stale pending deletion confirmation
    pub marked_stale: usize,
    /// Items skipped because nothing changed (or they were excluded)
    pub skipped: usize,
    /// Store writes that failed
    pub failed: usize,
    /// The provider stamp matched the recorded one; nothing was examined
    pub unchanged: bool,
    /// Scan failure, if the provider could not be read
    pub error: Option<String>,
    /// Wall time spent on this provider
    pub elapsed: Duration,
}

impl ProviderReport {
    pub(crate) fn new(provider: ProviderId) -> Self {
        ProviderReport {
            provider,
            discovered: 0,
            upserted: 0,
            removed: 0,
            marked_stale: 0,
            skipped: 0,
            failed: 0,
            unchanged: false,
            error: None,
            elapsed: Duration::ZERO,
        }
    }

    /// True when the provider's changes were fully applied
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.error.is_none()
    }
}

/// Outcome of one bootstrap, incremental or reconcile cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRefreshReport {
    /// Operation that ran
    pub kind: RefreshKind,
    /// Per-provider counters, in processing order
    pub providers: Vec<ProviderReport>,
    /// Generation published at the end, if anything changed
    pub generation: Option<u64>,
    /// Wall time of the whole cycle
    pub elapsed: Duration,
}

impl IndexRefreshReport {
    pub(crate) fn new(kind: RefreshKind) -> Self {
        IndexRefreshReport {
            kind,
            providers: Vec::new(),
            generation: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Counters for `provider`, if it took part
    pub fn provider(&self, provider: &str) -> Option<&ProviderReport> {
        self.providers.iter().find(|p| p.provider.as_str() == provider)
    }

    /// Total discovered items
    pub fn discovered(&self) -> usize {
        self.providers.iter().map(|p| p.discovered).sum()
    }

    /// Total store writes
    pub fn upserted(&self) -> usize {
        self.providers.iter().map(|p| p.upserted).sum()
    }

    /// Total removals
    pub fn removed(&self) -> usize {
        self.providers.iter().map(|p| p.removed).sum()
    }

    /// Total skipped items
    pub fn skipped(&self) -> usize {
        self.providers.iter().map(|p| p.skipped).sum()
    }

    /// Total failed writes
    pub fn failed(&self) -> usize {
        self.providers.iter().map(|p| p.failed).sum()
    }

    /// Providers whose scan failed
    pub fn failed_providers(&self) -> Vec<&ProviderId> {
        self.providers
            .iter()
            .filter(|p| p.error.is_some())
            .map(|p| &p.provider)
            .collect()
    }
}

impl fmt::Display for IndexRefreshReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: discovered={} upserted={} removed={} skipped={} failed={} in {:?}",
            self.kind.as_str(),
            self.discovered(),
            self.upserted(),
            self.removed(),
            self.skipped(),
            self.failed(),
            self.elapsed
        )?;
        if let Some(generation) = self.generation {
            write!(f, " (generation {})", generation)?;
        }
        Ok(())
    }
}
