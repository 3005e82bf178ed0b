//! Ranking scenarios through the facade

use crate::common::*;
use launchdex::{tokenize, QueryStatus};
use std::sync::mpsc;
use std::time::Duration;

fn indexed() -> launchdex::IndexHandle {
    let (handle, _provider, _clock) = handle_with(launcher_corpus(), None);
    handle.bootstrap().unwrap();
    handle
}

#[test]
fn test_title_tokens_include_compound_and_acronym() {
    assert_eq!(
        tokenize("VisualStudioCode.exe").as_slice(),
        ["visual", "studio", "code", "visualstudiocode", "vscode"]
    );
}

#[test]
fn test_typo_still_finds_report_first() {
    let handle = indexed();
    let hits = titles(&handle, "q4 reort");
    assert_eq!(hits.first().map(String::as_str), Some("Q4_Report.xlsx"));
}

#[test]
fn test_ambiguous_prefix_returns_both_in_stable_order() {
    let handle = indexed();
    let first = titles(&handle, "code");
    let mut top_two = first[..2].to_vec();
    top_two.sort();
    assert_eq!(top_two, ["Codeium", "Visual Studio Code"]);
    for _ in 0..20 {
        assert_eq!(titles(&handle, "code"), first);
    }
}

#[test]
fn test_only_latest_keystroke_is_delivered() {
    let handle = indexed();
    let client = handle.client();
    let (tx, rx) = mpsc::channel();
    let c = client.begin("c");
    let co = client.begin("co");
    let tx_c = tx.clone();
    client.submit_session(c, 10, move |outcome| tx_c.send(("c", outcome)).unwrap());
    client.submit_session(co, 10, move |outcome| tx.send(("co", outcome)).unwrap());

    let (query, outcome) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(query, "co");
    assert_eq!(outcome.status, QueryStatus::Completed);
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn test_launched_item_overtakes_equal_competitor() {
    let handle = indexed();
    let position = |titles: &[String], title: &str| titles.iter().position(|t| t == title).unwrap();
    let before = titles(&handle, "report");
    let q3_before = position(&before, "Q3_Report.xlsx");

    handle.feedback().record_launch("file:q3").unwrap();
    handle.flush().unwrap();

    let after = titles(&handle, "report");
    let q3_after = position(&after, "Q3_Report.xlsx");
    assert!(q3_after <= q3_before);
    assert!(q3_after < position(&after, "Q4_Report.xlsx"));
}

#[test]
fn test_kind_filter() {
    let handle = indexed();
    let outcome = handle.search_with_filter("co", 20, Some(launchdex::ItemKind::Command));
    assert!(outcome
        .hits
        .iter()
        .all(|hit| hit.kind == launchdex::ItemKind::Command));
    assert_eq!(outcome.hits[0].title, "Control Panel");
}
