//! Query latency benchmarks
//!
//! Run with: cargo bench --bench query_latency
//!
//! Labels:
//! - Layer (search_*, tokenize)
//! - Query shape (prefix, exact, typo, multi_word)
//! - Item count (1k, 10k, 50k)
//!
//! Targets:
//! - search_*/50k: < 15ms at P95
//! - tokenize: < 2µs per title

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use launchdex::{
    tokenize, ChangeStamp, DiscoveredItem, EngineConfig, IndexHandle, ItemKind, ProviderBatch,
};
use std::time::Duration;

// ============================================================================
// Constants and Utilities
// ============================================================================

const WORDS: [&str; 16] = [
    "report", "budget", "invoice", "notes", "draft", "final", "summary", "design", "meeting",
    "project", "archive", "backup", "photo", "music", "studio", "tool",
];

fn corpus(count: usize) -> Vec<DiscoveredItem> {
    (0..count)
        .map(|i| {
            let a = WORDS[i % WORDS.len()];
            let b = WORDS[(i / WORDS.len()) % WORDS.len()];
            DiscoveredItem::new(
                format!("file:{}", i),
                ItemKind::File,
                format!("{}_{} {}.docx", a, b, i),
                format!("/corpus/{}_{}_{}.docx", a, b, i),
                ChangeStamp::new(1),
            )
        })
        .collect()
}

fn indexed(count: usize) -> IndexHandle {
    let handle = IndexHandle::ephemeral(EngineConfig::default()).unwrap();
    handle
        .apply_incremental(vec![ProviderBatch::full(
            "bench",
            ChangeStamp::new(1),
            corpus(count),
        )])
        .unwrap();
    handle
}

fn label(count: usize) -> &'static str {
    match count {
        1_000 => "1k",
        10_000 => "10k",
        50_000 => "50k",
        _ => "custom",
    }
}

// ============================================================================
// search - end-to-end query latency
// ============================================================================

fn search_by_query_shape(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.measurement_time(Duration::from_secs(5));

    for count in [1_000, 10_000, 50_000] {
        let handle = indexed(count);
        for (shape, query) in [
            ("prefix", "rep"),
            ("exact", "budget"),
            ("typo", "reprot"),
            ("multi_word", "meeting notes"),
        ] {
            group.bench_with_input(
                BenchmarkId::new(format!("{}_{}", shape, label(count)), count),
                &query,
                |b, query| b.iter(|| handle.search(query, 20)),
            );
        }
        handle.shutdown();
    }

    group.finish();
}

// ============================================================================
// tokenize
// ============================================================================

fn tokenize_titles(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");
    let titles = [
        "VisualStudioCode.exe",
        "Q4_Report.xlsx",
        "meeting-notes 2024 final.docx",
        "Control Panel",
    ];
    group.throughput(Throughput::Elements(titles.len() as u64));
    group.bench_function("titles", |b| {
        b.iter(|| {
            for title in titles {
                criterion::black_box(tokenize(title));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, search_by_query_shape, tokenize_titles);
criterion_main!(benches);
