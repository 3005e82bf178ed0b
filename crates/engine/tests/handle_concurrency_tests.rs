//! Concurrency tests
//!
//! Queries run on their own threads while the indexer publishes new
//! generations; readers must always see one complete generation.

use launchdex_core::{ChangeStamp, EngineConfig, ItemKind};
use launchdex_engine::{DiscoveredItem, IndexHandle, ProviderBatch};
use launchdex_search::QueryStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

fn numbered(n: usize, stamp: u64) -> DiscoveredItem {
    DiscoveredItem::new(
        format!("doc:{:04}", n),
        ItemKind::File,
        format!("Report {:04}.docx", n),
        format!("/docs/report-{:04}.docx", n),
        ChangeStamp::new(stamp),
    )
}

#[test]
fn test_readers_see_monotonic_complete_generations() {
    let handle = Arc::new(IndexHandle::ephemeral(EngineConfig::default()).unwrap());
    let stop = Arc::new(AtomicBool::new(false));
    let start = Arc::new(Barrier::new(5));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let handle = Arc::clone(&handle);
            let stop = Arc::clone(&stop);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut last_generation = 0;
                while !stop.load(Ordering::SeqCst) {
                    let outcome = handle.search_with_filter("report", 100, None);
                    assert_eq!(outcome.status, QueryStatus::Completed);
                    assert!(outcome.generation >= last_generation);
                    // Every generation holds a whole number of ten-item batches.
                    assert_eq!(outcome.hits.len() % 10, 0);
                    last_generation = outcome.generation;
                }
                last_generation
            })
        })
        .collect();

    start.wait();
    for round in 0..10u64 {
        let items = (0..10)
            .map(|i| numbered(round as usize * 10 + i, round + 1))
            .collect();
        handle
            .apply_incremental(vec![ProviderBatch::delta(
                "docs",
                ChangeStamp::new(round + 1),
                items,
                vec![],
            )])
            .unwrap();
    }
    stop.store(true, Ordering::SeqCst);

    for reader in readers {
        assert!(reader.join().unwrap() <= handle.generation());
    }
    assert_eq!(handle.stats().items, 100);
}

#[test]
fn test_session_keeps_generation_across_publish() {
    let handle = IndexHandle::ephemeral(EngineConfig::default()).unwrap();
    handle
        .apply_incremental(vec![ProviderBatch::full(
            "docs",
            ChangeStamp::new(1),
            vec![numbered(1, 1)],
        )])
        .unwrap();

    let client = handle.client();
    let session = client.begin("report");
    handle
        .apply_incremental(vec![ProviderBatch::delta(
            "docs",
            ChangeStamp::new(2),
            vec![numbered(2, 2)],
            vec![],
        )])
        .unwrap();

    let outcome = client.run(&session, 10);
    assert_eq!(outcome.generation, 1);
    assert_eq!(outcome.hits.len(), 1);
    assert_eq!(handle.search("report", 10).len(), 2);
}

#[test]
fn test_typing_only_delivers_last_keystroke() {
    let handle = IndexHandle::ephemeral(EngineConfig::default()).unwrap();
    handle
        .apply_incremental(vec![ProviderBatch::full(
            "apps",
            ChangeStamp::new(1),
            vec![
                DiscoveredItem::new("app:code", ItemKind::App, "Visual Studio Code", "/code", ChangeStamp::new(1)),
                DiscoveredItem::new("app:calc", ItemKind::App, "Calculator", "/calc", ChangeStamp::new(1)),
            ],
        )])
        .unwrap();

    let client = handle.client();
    let (tx, rx) = mpsc::channel();
    let c = client.begin("c");
    let co = client.begin("co");
    let tx_c = tx.clone();
    client.submit_session(c, 10, move |outcome| tx_c.send(("c", outcome)).unwrap());
    client.submit_session(co, 10, move |outcome| tx.send(("co", outcome)).unwrap());

    let (which, outcome) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(which, "co");
    assert_eq!(outcome.hits[0].title, "Visual Studio Code");
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn test_queries_do_not_wait_for_reconcile() {
    let mut config = EngineConfig::default();
    config.indexer.reconcile_pause_us = 50_000;
    config.indexer.reconcile_batch_size = 1;
    let provider = Arc::new(launchdex_engine::StaticProvider::new("docs"));
    provider.set_items(ChangeStamp::new(1), (0..20).map(|i| numbered(i, 1)).collect());
    let handle = Arc::new(
        IndexHandle::builder(config)
            .provider(provider)
            .build()
            .unwrap(),
    );
    handle.bootstrap().unwrap();

    let background = {
        let handle = Arc::clone(&handle);
        thread::spawn(move || handle.reconcile().unwrap())
    };
    // The reconcile pauses between every item; queries still complete.
    for _ in 0..20 {
        let outcome = handle.search_with_filter("report 0001", 5, None);
        assert_eq!(outcome.status, QueryStatus::Completed);
        assert_eq!(outcome.hits[0].id.as_str(), "doc:0001");
    }
    background.join().unwrap();
}
