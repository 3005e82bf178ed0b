//! Scenario Tests
//!
//! End-to-end launcher flows through the public facade:
//! - Ranking: typo tolerance, ambiguous prefixes, usage learning
//! - Lifecycle: idempotent indexing, warm restart, pruning
//! - Latency: warm query latency on a large index (release builds)

#[path = "../common/mod.rs"]
mod common;

mod latency;
mod lifecycle;
mod ranking;
