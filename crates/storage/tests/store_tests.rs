//! Integration tests for the Index Store
//!
//! These tests verify the store as a complete system:
//! - Round-trip of items and provider stamps across reopen
//! - Idempotent upserts leave files byte-identical
//! - Torn journal tails are recovered
//! - Injected write failures leave the previous state authoritative
//! - Compaction

use launchdex_core::{ChangeStamp, Error, ItemKind, ProviderId, SearchItem, Timestamp};
use launchdex_storage::{
    DurabilityMode, FaultSwitch, IndexStore, StoreOptions, UpsertOutcome, JOURNAL_FILE,
    SNAPSHOT_FILE,
};
use proptest::prelude::*;
use std::path::Path;
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn item(id: &str, title: &str, stamp: u64) -> SearchItem {
    SearchItem::new(
        id,
        ItemKind::App,
        title,
        format!("/apps/{}", id),
        "start-menu",
        ChangeStamp::new(stamp),
    )
}

fn open(dir: &Path) -> IndexStore {
    IndexStore::open(dir, StoreOptions::default()).unwrap()
}

fn read_files(dir: &Path) -> (Vec<u8>, Option<Vec<u8>>) {
    let journal = std::fs::read(dir.join(JOURNAL_FILE)).unwrap();
    let snapshot = std::fs::read(dir.join(SNAPSHOT_FILE)).ok();
    (journal, snapshot)
}

// ============================================================================
// Round-trip
// ============================================================================

mod round_trip {
    use super::*;

    #[test]
    fn test_upsert_then_get() {
        let mut store = IndexStore::ephemeral();
        let original = item("app:code", "Visual Studio Code", 1);
        store.upsert(original.clone()).unwrap();
        assert_eq!(store.get("app:code"), Some(&original));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let mut launched = item("app:code", "Visual Studio Code", 1);
        launched.record_use(Timestamp::from_secs(1_700_000_000));
        {
            let mut store = open(dir.path());
            store.upsert(launched.clone()).unwrap();
            store.upsert(item("app:calc", "Calculator", 1)).unwrap();
            store
                .set_provider_stamp(&ProviderId::new("start-menu"), ChangeStamp::new(1))
                .unwrap();
            store.delete("app:calc").unwrap();
        }
        let store = open(dir.path());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("app:code"), Some(&launched));
        assert_eq!(
            store.provider_stamp(&ProviderId::new("start-menu")),
            ChangeStamp::new(1)
        );
    }

    #[test]
    fn test_unknown_provider_stamp_is_zero() {
        let store = IndexStore::ephemeral();
        assert_eq!(
            store.provider_stamp(&ProviderId::new("nobody")),
            ChangeStamp::ZERO
        );
    }

    proptest! {
        #[test]
        fn prop_upsert_get_roundtrip(
            title in "[A-Za-z][A-Za-z0-9 ._]{0,30}",
            uses in 0u64..1000,
            stamp in 1u64..1_000_000,
        ) {
            let mut store = IndexStore::ephemeral();
            let mut original = item("x", &title, stamp);
            original.use_count = uses;
            store.upsert(original.clone()).unwrap();
            prop_assert_eq!(store.get("x"), Some(&original));
        }
    }
}

// ============================================================================
// Idempotence
// ============================================================================

mod idempotence {
    use super::*;

    #[test]
    fn test_identical_upsert_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = open(dir.path());
        assert_eq!(
            store.upsert(item("a", "Alpha", 1)).unwrap(),
            UpsertOutcome::Inserted
        );
        let before = read_files(dir.path());

        assert_eq!(
            store.upsert(item("a", "Alpha", 1)).unwrap(),
            UpsertOutcome::Unchanged
        );
        store
            .set_provider_stamp(&ProviderId::new("p"), ChangeStamp::new(3))
            .unwrap();
        let with_stamp = read_files(dir.path());
        store
            .set_provider_stamp(&ProviderId::new("p"), ChangeStamp::new(3))
            .unwrap();

        assert_ne!(before, with_stamp);
        assert_eq!(read_files(dir.path()), with_stamp);
        assert_eq!(store.stats().journal_records, 2);
    }

    #[test]
    fn test_stamp_only_change() {
        let mut store = IndexStore::ephemeral();
        store.upsert(item("a", "Alpha", 1)).unwrap();
        assert_eq!(
            store.upsert(item("a", "Alpha", 2)).unwrap(),
            UpsertOutcome::Restamped
        );
        assert_eq!(store.get("a").unwrap().change_stamp, ChangeStamp::new(2));
    }

    #[test]
    fn test_title_change_retokenizes() {
        let mut store = IndexStore::ephemeral();
        store.upsert(item("a", "Alpha", 1)).unwrap();

        let mut renamed = store.get("a").unwrap().clone();
        renamed.title = "Beta Gamma".to_string();
        assert_eq!(store.upsert(renamed).unwrap(), UpsertOutcome::Updated);

        let stored = store.get("a").unwrap();
        assert!(stored.tokens_consistent());
        assert!(stored.tokens.contains("gamma"));
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let mut store = IndexStore::ephemeral();
        assert_eq!(store.delete("missing").unwrap(), None);
        assert_eq!(store.stats().journal_records, 0);
    }
}

// ============================================================================
// Recovery
// ============================================================================

mod recovery {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_torn_tail_keeps_complete_records() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(dir.path());
            store.upsert(item("a", "Alpha", 1)).unwrap();
            store.upsert(item("b", "Beta", 1)).unwrap();
        }
        // Simulate a crash mid-append: a length prefix with no body.
        {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(dir.path().join(JOURNAL_FILE))
                .unwrap();
            file.write_all(&[200, 0, 0, 0, 1, 2, 3]).unwrap();
        }
        let mut store = open(dir.path());
        assert_eq!(store.len(), 2);

        store.upsert(item("c", "Gamma", 1)).unwrap();
        drop(store);
        assert_eq!(open(dir.path()).len(), 3);
    }

    #[test]
    fn test_second_open_is_locked_out() {
        let dir = TempDir::new().unwrap();
        let _first = open(dir.path());
        let second = IndexStore::open(dir.path(), StoreOptions::default());
        assert!(matches!(second, Err(Error::StoreIo(_))));
    }

    #[test]
    fn test_corrupt_snapshot_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SNAPSHOT_FILE), b"garbage!garbage").unwrap();
        let result = IndexStore::open(dir.path(), StoreOptions::default());
        assert!(matches!(result, Err(Error::Corruption(_))));
    }
}

// ============================================================================
// Write failures
// ============================================================================

mod write_failures {
    use super::*;

    #[test]
    fn test_failed_write_leaves_state_unchanged() {
        let faults = FaultSwitch::new();
        let mut store = IndexStore::ephemeral_with_faults(faults.clone());
        store.upsert(item("a", "Alpha", 1)).unwrap();

        faults.set_failing(true);
        let err = store.upsert(item("a", "Alpha Prime", 2)).unwrap_err();
        assert!(matches!(err, Error::StoreIo(_)));
        assert!(err.is_retryable());
        assert_eq!(store.get("a").unwrap().title, "Alpha");

        assert!(store.delete("a").is_err());
        assert!(store.contains("a"));

        faults.set_failing(false);
        store.upsert(item("a", "Alpha Prime", 2)).unwrap();
        assert_eq!(store.get("a").unwrap().title, "Alpha Prime");
    }
}

// ============================================================================
// Compaction
// ============================================================================

mod compaction {
    use super::*;

    #[test]
    fn test_threshold_triggers_snapshot() {
        let dir = TempDir::new().unwrap();
        let options = StoreOptions {
            durability: DurabilityMode::Buffered,
            compaction_threshold: 16,
        };
        {
            let mut store = IndexStore::open(dir.path(), options).unwrap();
            for i in 0..20 {
                store.upsert(item(&format!("i{}", i), "Item", 1)).unwrap();
            }
            assert!(dir.path().join(SNAPSHOT_FILE).exists());
            assert_eq!(store.stats().journal_records, 4);
        }
        let store = IndexStore::open(dir.path(), options).unwrap();
        assert_eq!(store.len(), 20);
    }

    #[test]
    fn test_explicit_compact_preserves_everything() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(dir.path());
            store.upsert(item("a", "Alpha", 1)).unwrap();
            store
                .set_provider_stamp(&ProviderId::new("start-menu"), ChangeStamp::new(5))
                .unwrap();
            store.compact().unwrap();
            assert_eq!(store.stats().journal_records, 0);
        }
        let store = open(dir.path());
        assert_eq!(store.get("a").unwrap().title, "Alpha");
        assert_eq!(
            store.provider_stamp(&ProviderId::new("start-menu")),
            ChangeStamp::new(5)
        );
    }
}
