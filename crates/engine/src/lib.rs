//! Indexing engine for launchdex
//!
//! This crate ties the lower layers together:
//! - Discovery: the provider contract and the push feed
//! - Indexer: diffs discovery against the store and publishes generations
//! - Worker: runs the indexer on its own thread with a reconcile timer
//! - Feedback: launch outcomes that update usage or prune stale items
//! - Config channel: validated hot reload of `launchdex.toml`
//! - IndexHandle: the surface a launcher embeds
//!
//! Only the indexer worker writes the store. Queries read immutable
//! generations and never wait on indexing.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config_channel;
pub mod discovery;
pub mod feedback;
pub mod handle;
pub mod indexer;
pub mod report;
pub mod worker;

pub use config_channel::{ConfigChannel, ConfigUpdate, ConfigWatcher, DEFAULT_DEBOUNCE};
pub use discovery::{
    DiscoveredItem, DiscoveryFeed, DiscoveryProvider, DiscoveryScope, ProviderBatch,
    StaticProvider,
};
pub use feedback::{FeedbackEvent, UsageFeedbackSink};
pub use handle::{IndexHandle, IndexHandleBuilder};
pub use indexer::{Indexer, MAX_RETRY_BACKLOG};
pub use report::{IndexRefreshReport, ProviderReport, RefreshKind};
pub use worker::{IndexerWorker, WorkerStats, DEFAULT_QUEUE_CAPACITY, WORKER_THREAD_NAME};
