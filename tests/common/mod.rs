//! Shared fixtures for the scenario suites.

#![allow(dead_code)]

use launchdex::{
    ChangeStamp, DiscoveredItem, EngineConfig, IndexHandle, ItemKind, ManualClock,
    StaticProvider, Timestamp,
};
use std::path::Path;
use std::sync::Arc;

/// Fixed "now" for ranking tests
pub const NOW: Timestamp = Timestamp::from_secs(1_700_000_000);

/// A discovered item at stamp 1.
pub fn discovered(id: &str, kind: ItemKind, title: &str) -> DiscoveredItem {
    DiscoveredItem::new(id, kind, title, format!("/{}", id), ChangeStamp::new(1))
}

/// Small launcher corpus with the classic ambiguous titles.
pub fn launcher_corpus() -> Vec<DiscoveredItem> {
    vec![
        discovered("file:q4", ItemKind::File, "Q4_Report.xlsx"),
        discovered("file:q3", ItemKind::File, "Q3_Report.xlsx"),
        discovered("file:q4plan", ItemKind::File, "Q4 Planning.docx"),
        discovered("file:review", ItemKind::File, "Quarterly Review.pptx"),
        discovered("app:builder", ItemKind::App, "Report Builder"),
        discovered("app:vscode", ItemKind::App, "Visual Studio Code"),
        discovered("app:codeium", ItemKind::App, "Codeium"),
        discovered("app:chrome", ItemKind::App, "Google Chrome"),
        discovered("cmd:control", ItemKind::Command, "Control Panel"),
        discovered("folder:docs", ItemKind::Folder, "Documents"),
    ]
}

/// Deterministic synthetic corpus of `count` items.
pub fn synthetic_corpus(count: usize) -> Vec<DiscoveredItem> {
    const WORDS: [&str; 16] = [
        "report", "budget", "invoice", "notes", "draft", "final", "summary", "design",
        "meeting", "project", "archive", "backup", "photo", "music", "studio", "tool",
    ];
    const EXTENSIONS: [&str; 5] = ["docx", "xlsx", "pdf", "txt", "exe"];
    (0..count)
        .map(|i| {
            let a = WORDS[i % WORDS.len()];
            let b = WORDS[(i / WORDS.len()) % WORDS.len()];
            let ext = EXTENSIONS[i % EXTENSIONS.len()];
            let kind = if ext == "exe" {
                ItemKind::App
            } else {
                ItemKind::File
            };
            DiscoveredItem::new(
                format!("file:{}", i),
                kind,
                format!("{}_{} {}.{}", a, b, i, ext),
                format!("/corpus/{}/{}_{}_{}.{}", i % 97, a, b, i, ext),
                ChangeStamp::new(1),
            )
        })
        .collect()
}

/// Handle over a static provider with a manual clock.
pub fn handle_with(
    items: Vec<DiscoveredItem>,
    dir: Option<&Path>,
) -> (IndexHandle, Arc<StaticProvider>, Arc<ManualClock>) {
    let provider = Arc::new(StaticProvider::new("fixture"));
    provider.set_items(ChangeStamp::new(1), items);
    let clock = Arc::new(ManualClock::new(NOW));
    let mut builder = IndexHandle::builder(EngineConfig::default())
        .provider(provider.clone())
        .clock(clock.clone());
    if let Some(dir) = dir {
        builder = builder.data_dir(dir);
    }
    let handle = builder.build().unwrap();
    (handle, provider, clock)
}

/// Titles returned for `query`, best first.
pub fn titles(handle: &IndexHandle, query: &str) -> Vec<String> {
    handle
        .search(query, 20)
        .into_iter()
        .map(|hit| hit.title)
        .collect()
}
