//! Index lifecycle across restarts

use crate::common::*;
use launchdex::{ChangeStamp, FailureCode, IndexStore, ProviderId, StoreOptions};
use tempfile::TempDir;

#[test]
fn test_launcher_session_round_trip() {
    let temp = TempDir::new().unwrap();

    // First run: index, use a few items, exit.
    {
        let (handle, _provider, _clock) = handle_with(launcher_corpus(), Some(temp.path()));
        let report = handle.bootstrap().unwrap();
        assert_eq!(report.upserted(), launcher_corpus().len());
        handle.feedback().record_launch("app:chrome").unwrap();
        handle.feedback().record_launch("app:chrome").unwrap();
        handle.flush().unwrap();
        handle.shutdown();
    }

    // Second run: results are served before discovery runs again.
    let (handle, provider, _clock) = handle_with(launcher_corpus(), Some(temp.path()));
    assert_eq!(titles(&handle, "chrome"), vec!["Google Chrome"]);
    assert_eq!(handle.get("app:chrome").unwrap().use_count, 2);

    // Unchanged provider stamp: the warm start does not rescan.
    let warm = handle.refresh().unwrap();
    assert!(warm.provider("fixture").unwrap().unchanged);
    assert_eq!(provider.scan_count(), 0);

    // A forced rebuild over unchanged discovery leaves everything in place.
    let again = handle.bootstrap().unwrap();
    assert_eq!(again.upserted(), 0);
    assert_eq!(again.removed(), 0);

    // Deleted at source: gone after one reconciliation.
    provider.remove(ChangeStamp::new(2), "file:q3");
    handle.reconcile().unwrap();
    assert!(handle.get("file:q3").is_none());
    assert!(!titles(&handle, "report").contains(&"Q3_Report.xlsx".to_string()));

    // Missing target: gone right after the failed launch is recorded.
    handle
        .feedback()
        .record_failure("folder:docs", FailureCode::MissingTarget)
        .unwrap();
    handle.flush().unwrap();
    assert!(handle.get("folder:docs").is_none());
    handle.shutdown();

    let store = IndexStore::open(temp.path(), StoreOptions::default()).unwrap();
    assert_eq!(store.len(), launcher_corpus().len() - 2);
    assert_eq!(
        store.provider_stamp(&ProviderId::from("fixture")),
        ChangeStamp::new(2)
    );
}
