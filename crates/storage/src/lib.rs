//! Storage layer for launchdex
//!
//! This crate implements the Index Store:
//! - IndexStore: canonical item map + per-provider change stamps
//! - Journal: CRC32-framed append-only record log with torn-tail recovery
//! - Snapshot: atomically written compacted state
//! - DurabilityMode: fsync-per-record or buffered
//!
//! The in-memory view only changes after a record is durably appended, so
//! a failed write never leaves the store ahead of its files.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod durability;
pub mod journal;
pub mod record;
mod snapshot;
pub mod store;

pub use durability::DurabilityMode;
pub use journal::{FaultSwitch, FileJournal, Journal, JournalReplay, MemoryJournal};
pub use record::{JournalRecord, RecordError};
pub use store::{IndexStore, StoreOptions, StoreStats, UpsertOutcome, JOURNAL_FILE, SNAPSHOT_FILE};
