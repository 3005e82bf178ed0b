//! Generation management
//!
//! A [`Generation`] is an immutable, sequence-numbered [`HotIndex`]. The
//! [`GenerationCell`] holds the current one behind an `ArcSwap`: readers
//! `load()` an `Arc` and keep using it for as long as they like, while the
//! single writer builds the next generation off to the side and publishes
//! it with one pointer swap.

use crate::hot_index::HotIndex;
use arc_swap::ArcSwap;
use launchdex_core::Timestamp;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// One published, immutable hot index.
#[derive(Debug)]
pub struct Generation {
    number: u64,
    index: HotIndex,
    published_at: Timestamp,
    build_time: Duration,
}

impl Generation {
    /// Sequence number; 0 is the empty generation
    pub fn number(&self) -> u64 {
        self.number
    }

    /// The index this generation serves
    pub fn index(&self) -> &HotIndex {
        &self.index
    }

    /// When it was published
    pub fn published_at(&self) -> Timestamp {
        self.published_at
    }

    /// How long the build took
    pub fn build_time(&self) -> Duration {
        self.build_time
    }

    /// Number of items served
    pub fn item_count(&self) -> usize {
        self.index.len()
    }
}

/// Holder of the current generation.
pub struct GenerationCell {
    current: ArcSwap<Generation>,
    build_lock: Mutex<()>,
}

impl GenerationCell {
    /// A cell holding the empty generation 0
    pub fn new() -> Self {
        GenerationCell {
            current: ArcSwap::from_pointee(Generation {
                number: 0,
                index: HotIndex::empty(),
                published_at: Timestamp::now(),
                build_time: Duration::ZERO,
            }),
            build_lock: Mutex::new(()),
        }
    }

    /// The current generation. Never blocks.
    pub fn load(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    /// Number of the current generation
    pub fn current_number(&self) -> u64 {
        self.current.load().number
    }

    /// Build the next generation and publish it.
    ///
    /// Builds are serialized: concurrent callers wait for each other, so
    /// numbers increase by exactly one per publish. Readers are never
    /// blocked.
    pub fn publish_with<F>(&self, build: F) -> Arc<Generation>
    where
        F: FnOnce() -> HotIndex,
    {
        let _guard = self.build_lock.lock();
        let started = Instant::now();
        let index = build();
        let next = Arc::new(Generation {
            number: self.current.load().number + 1,
            index,
            published_at: Timestamp::now(),
            build_time: started.elapsed(),
        });
        self.current.store(Arc::clone(&next));
        info!(
            target: "launchdex::index",
            generation = next.number,
            items = next.item_count(),
            terms = next.index.vocabulary_len(),
            build_us = next.build_time.as_micros() as u64,
            "Published generation"
        );
        next
    }
}

impl Default for GenerationCell {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GenerationCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCell")
            .field("current", &self.current_number())
            .finish()
    }
}
