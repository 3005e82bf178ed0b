//! Search infrastructure for launchdex
//!
//! This crate provides:
//! - Scoring model: per-word match classes plus usage, recency and kind signals
//! - Bounded OSA edit distance for typo tolerance
//! - HotIndex: sorted token vocabulary with posting lists
//! - GenerationCell: atomically published, immutable index generations
//! - SearchEngine: staged query pipeline with budgets and cancellation
//! - QueryClient / QuerySession: debounce of superseded queries
//!
//! Queries never touch durable storage and never return errors; they degrade
//! to partial or empty results with a [`QueryStatus`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod distance;
pub mod engine;
pub mod generation;
pub mod hot_index;
pub mod scoring;
pub mod session;

use arc_swap::ArcSwap;
use launchdex_core::EngineConfig;
use std::sync::Arc;

/// Live, validated configuration shared between the config channel and
/// readers. Readers `load()` a snapshot per query.
pub type SharedConfig = Arc<ArcSwap<EngineConfig>>;

pub use distance::{bounded_osa, str_distance};
pub use engine::{QueryStatus, SearchEngine, SearchOutcome, Stage, StageBudgets, StageProfile};
pub use generation::{Generation, GenerationCell};
pub use hot_index::HotIndex;
pub use scoring::{
    fuzzy_distance_score, kind_bias, recency_decay, score, MatchClass, QueryContext,
};
pub use session::{LoadGuard, QueryClient, QueryLoad, QuerySession};
