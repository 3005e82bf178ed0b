//! Index Store: the durable canonical record of every item.
//!
//! Writes go journal-first: a record is framed, appended (and fsynced under
//! [`DurabilityMode::Always`]) before the in-memory view changes, so a
//! failed write leaves the previous state authoritative.
//!
//! On-disk layout inside the data directory:
//!
//! ```text
//! <dir>/.lock           exclusive advisory lock
//! <dir>/items.snap      compacted snapshot
//! <dir>/items.journal   records appended since the snapshot
//! ```

use crate::durability::DurabilityMode;
use crate::journal::{FaultSwitch, FileJournal, Journal, MemoryJournal};
use crate::record::JournalRecord;
use crate::snapshot::{load_snapshot, write_snapshot, SnapshotData};
use launchdex_core::{tokenize, ChangeStamp, Error, ItemId, ProviderId, Result, SearchItem};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Snapshot file name
pub const SNAPSHOT_FILE: &str = "items.snap";
/// Journal file name
pub const JOURNAL_FILE: &str = "items.journal";
/// Lock file name
pub const LOCK_FILE: &str = ".lock";

/// Store tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// When journal records are fsynced
    pub durability: DurabilityMode,
    /// Journal records accumulated before compaction
    pub compaction_threshold: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            durability: DurabilityMode::Always,
            compaction_threshold: 4096,
        }
    }
}

/// What an [`IndexStore::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Identical item already stored; nothing written
    Unchanged,
    /// Only the change stamp moved; a stamp record was written
    Restamped,
    /// New item
    Inserted,
    /// Existing item replaced
    Updated,
}

impl UpsertOutcome {
    /// True when the searchable content changed
    pub fn is_content_change(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted | UpsertOutcome::Updated)
    }
}

/// Store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Items stored
    pub items: usize,
    /// Providers with a recorded stamp
    pub providers: usize,
    /// Records in the journal since the last compaction
    pub journal_records: usize,
}

struct StoreFiles {
    dir: PathBuf,
    // Held for the lifetime of the store; dropping it releases the lock.
    _lock: File,
}

/// Durable item store keyed by [`ItemId`].
pub struct IndexStore {
    items: FxHashMap<ItemId, SearchItem>,
    provider_stamps: FxHashMap<ProviderId, ChangeStamp>,
    journal: Box<dyn Journal>,
    journal_records: usize,
    options: StoreOptions,
    files: Option<StoreFiles>,
}

impl IndexStore {
    /// Open (or create) a store in `dir`.
    ///
    /// Loads the snapshot, replays the journal (truncating a torn tail) and
    /// takes an exclusive lock on the directory.
    ///
    /// # Errors
    ///
    /// `Error::StoreIo` if the directory is locked by another process or
    /// cannot be accessed; `Error::Corruption` for unreadable files.
    pub fn open(dir: &Path, options: StoreOptions) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let lock_path = dir.join(LOCK_FILE);
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)?;
        fs2::FileExt::try_lock_exclusive(&lock_file).map_err(|_| {
            Error::StoreIo(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                format!(
                    "data directory '{}' is already in use by another process",
                    dir.display()
                ),
            ))
        })?;

        let mut store = IndexStore {
            items: FxHashMap::default(),
            provider_stamps: FxHashMap::default(),
            journal: Box::new(MemoryJournal::new()),
            journal_records: 0,
            options,
            files: None,
        };

        if let Some(snapshot) = load_snapshot(&dir.join(SNAPSHOT_FILE))? {
            for item in snapshot.items {
                store.items.insert(item.id.clone(), item);
            }
            store.provider_stamps.extend(snapshot.provider_stamps);
        }

        let (journal, replay) = FileJournal::open(&dir.join(JOURNAL_FILE))?;
        let replayed = replay.records.len();
        for record in replay.records {
            store.apply(record);
        }
        store.journal = Box::new(journal);
        store.journal_records = replayed;
        store.files = Some(StoreFiles {
            dir: dir.to_path_buf(),
            _lock: lock_file,
        });

        info!(
            target: "launchdex::store",
            path = %dir.display(),
            items = store.items.len(),
            providers = store.provider_stamps.len(),
            records_replayed = replayed,
            bytes_truncated = replay.truncated_bytes,
            "Index store opened"
        );
        Ok(store)
    }

    /// A store that keeps everything in memory.
    pub fn ephemeral() -> Self {
        Self::with_journal(Box::new(MemoryJournal::new()), StoreOptions::default())
    }

    /// An in-memory store whose writes fail while `faults` is set.
    pub fn ephemeral_with_faults(faults: FaultSwitch) -> Self {
        Self::with_journal(
            Box::new(MemoryJournal::with_faults(faults)),
            StoreOptions::default(),
        )
    }

    /// An in-memory store writing through a caller-supplied journal.
    pub fn with_journal(journal: Box<dyn Journal>, options: StoreOptions) -> Self {
        IndexStore {
            items: FxHashMap::default(),
            provider_stamps: FxHashMap::default(),
            journal,
            journal_records: 0,
            options,
            files: None,
        }
    }

    /// True for stores with no data directory
    pub fn is_ephemeral(&self) -> bool {
        self.files.is_none()
    }

    /// Data directory, if any
    pub fn dir(&self) -> Option<&Path> {
        self.files.as_ref().map(|f| f.dir.as_path())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Look up an item by id
    pub fn get(&self, id: &str) -> Option<&SearchItem> {
        self.items.get(id)
    }

    /// True when `id` is stored
    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Every stored item, in no particular order
    pub fn scan_all(&self) -> impl Iterator<Item = &SearchItem> + '_ {
        self.items.values()
    }

    /// Ids of items owned by `provider`, sorted
    pub fn ids_for_provider(&self, provider: &ProviderId) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self
            .items
            .values()
            .filter(|item| &item.source_provider == provider)
            .map(|item| item.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Last recorded scan stamp for `provider`; `ZERO` when never scanned
    pub fn provider_stamp(&self, provider: &ProviderId) -> ChangeStamp {
        self.provider_stamps
            .get(provider)
            .copied()
            .unwrap_or(ChangeStamp::ZERO)
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no items are stored
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Store counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            items: self.items.len(),
            providers: self.provider_stamps.len(),
            journal_records: self.journal_records,
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert or replace an item.
    ///
    /// An identical item is a no-op. An item that differs only in
    /// `change_stamp` writes a stamp record. Tokens are re-derived when the
    /// title differs from the stored one and carried over otherwise.
    pub fn upsert(&mut self, mut item: SearchItem) -> Result<UpsertOutcome> {
        let (record, outcome) = match self.items.get(&item.id) {
            Some(existing) if existing.title == item.title => {
                item.tokens = existing.tokens.clone();
                if *existing == item {
                    return Ok(UpsertOutcome::Unchanged);
                }
                if differs_only_in_stamp(existing, &item) {
                    let record = JournalRecord::Stamp {
                        id: item.id.clone(),
                        change_stamp: item.change_stamp,
                    };
                    (record, UpsertOutcome::Restamped)
                } else {
                    (JournalRecord::Upsert(item), UpsertOutcome::Updated)
                }
            }
            Some(_) => {
                item.tokens = tokenize(&item.title);
                (JournalRecord::Upsert(item), UpsertOutcome::Updated)
            }
            None => {
                if !item.tokens_consistent() {
                    item.tokens = tokenize(&item.title);
                }
                (JournalRecord::Upsert(item), UpsertOutcome::Inserted)
            }
        };
        self.commit(record)?;
        Ok(outcome)
    }

    /// Remove an item. Returns the removed item, or `None` if absent.
    pub fn delete(&mut self, id: &str) -> Result<Option<SearchItem>> {
        let Some(existing) = self.items.get(id) else {
            return Ok(None);
        };
        let removed = existing.clone();
        self.commit(JournalRecord::Delete {
            id: removed.id.clone(),
        })?;
        Ok(Some(removed))
    }

    /// Record the last scan stamp for `provider`. Writes nothing if unchanged.
    pub fn set_provider_stamp(&mut self, provider: &ProviderId, stamp: ChangeStamp) -> Result<()> {
        if self.provider_stamps.get(provider) == Some(&stamp) {
            return Ok(());
        }
        self.commit(JournalRecord::ProviderStamp {
            provider: provider.clone(),
            stamp,
        })
    }

    /// Flush buffered journal records to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.journal.sync()?;
        Ok(())
    }

    /// Write a fresh snapshot and reset the journal.
    ///
    /// Ephemeral stores just drop their journal buffer.
    pub fn compact(&mut self) -> Result<()> {
        if let Some(files) = &self.files {
            let path = files.dir.join(SNAPSHOT_FILE);
            write_snapshot(&path, &self.snapshot_data())?;
        }
        self.journal.reset()?;
        debug!(
            target: "launchdex::store",
            items = self.items.len(),
            records = self.journal_records,
            "Store compacted"
        );
        self.journal_records = 0;
        Ok(())
    }

    fn commit(&mut self, record: JournalRecord) -> Result<()> {
        let frame = record.to_bytes()?;
        self.journal.append(&frame)?;
        if self.options.durability.requires_immediate_fsync() {
            self.journal.sync()?;
        }
        self.apply(record);
        self.journal_records += 1;

        if self.journal_records >= self.options.compaction_threshold {
            // The record is already durable; a failed compaction only
            // means the journal keeps growing until the next attempt.
            if let Err(e) = self.compact() {
                warn!(target: "launchdex::store", error = %e, "Compaction failed");
            }
        }
        Ok(())
    }

    fn apply(&mut self, record: JournalRecord) {
        match record {
            JournalRecord::Upsert(item) => {
                self.items.insert(item.id.clone(), item);
            }
            JournalRecord::Stamp { id, change_stamp } => {
                if let Some(item) = self.items.get_mut(&id) {
                    item.change_stamp = change_stamp;
                }
            }
            JournalRecord::Delete { id } => {
                self.items.remove(&id);
            }
            JournalRecord::ProviderStamp { provider, stamp } => {
                self.provider_stamps.insert(provider, stamp);
            }
        }
    }

    fn snapshot_data(&self) -> SnapshotData {
        let mut items: Vec<SearchItem> = self.items.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        let mut provider_stamps: Vec<(ProviderId, ChangeStamp)> = self
            .provider_stamps
            .iter()
            .map(|(p, s)| (p.clone(), *s))
            .collect();
        provider_stamps.sort();
        SnapshotData {
            items,
            provider_stamps,
        }
    }
}

fn differs_only_in_stamp(existing: &SearchItem, item: &SearchItem) -> bool {
    existing.kind == item.kind
        && existing.path == item.path
        && existing.source_provider == item.source_provider
        && existing.last_used_at == item.last_used_at
        && existing.use_count == item.use_count
        && existing.stale == item.stale
        && existing.change_stamp != item.change_stamp
}

impl Drop for IndexStore {
    fn drop(&mut self) {
        if !self.options.durability.requires_immediate_fsync() {
            if let Err(e) = self.journal.sync() {
                warn!(target: "launchdex::store", error = %e, "Journal sync on close failed");
            }
        }
    }
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("items", &self.items.len())
            .field("providers", &self.provider_stamps.len())
            .field("journal_records", &self.journal_records)
            .field("dir", &self.dir())
            .finish()
    }
}
