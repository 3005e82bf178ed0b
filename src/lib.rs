//! launchdex - incremental local search index for desktop launchers
//!
//! launchdex keeps a durable index of launchable items (apps, files,
//! folders, commands), serves ranked type-ahead queries from immutable
//! in-memory generations, and learns from launch outcomes.
//!
//! # Quick Start
//!
//! ```ignore
//! use launchdex::{EngineConfig, IndexHandle, StaticProvider};
//!
//! let apps = Arc::new(StaticProvider::new("apps"));
//! let handle = IndexHandle::builder(EngineConfig::default())
//!     .data_dir(".launchdex")
//!     .provider(apps)
//!     .build()?;
//!
//! handle.bootstrap()?;
//! let hits = handle.search("q4 reort", 10);
//! handle.feedback().record_launch(hits[0].id.clone())?;
//! ```
//!
//! # Architecture
//!
//! A single indexer worker owns the store and publishes generations; the
//! search engine reads whichever generation is current. Everything a
//! launcher needs is reachable from [`IndexHandle`].

pub use launchdex_core::{
    tokenize, ChangeStamp, Clock, EngineConfig, Error, FailureCode, ItemId, ItemKind,
    ManualClock, ProviderId, QueryHit, Result, RootSet, SearchItem, SystemClock, Timestamp,
    CONFIG_FILE_NAME,
};
pub use launchdex_engine::{
    ConfigUpdate, ConfigWatcher, DiscoveredItem, DiscoveryFeed, DiscoveryProvider,
    DiscoveryScope, IndexHandle, IndexHandleBuilder, IndexRefreshReport, ProviderBatch,
    ProviderReport, RefreshKind, StaticProvider, UsageFeedbackSink,
};
pub use launchdex_search::{
    QueryClient, QuerySession, QueryStatus, SearchEngine, SearchOutcome, StageProfile,
};
pub use launchdex_storage::{DurabilityMode, IndexStore, StoreOptions, StoreStats};
