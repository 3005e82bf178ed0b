//! Hot Index: read-optimized candidate lookup
//!
//! Built once from the Index Store and never mutated afterwards:
//! - items: non-stale items by ordinal, sorted by id
//! - vocabulary: sorted unique tokens, each with a posting list of ordinals
//! - length buckets: token ids grouped by character length, so fuzzy
//!   expansion only examines tokens that can be within the tolerance
//!
//! Prefix lookups are a binary search over the vocabulary; substring and
//! fuzzy lookups scan it.

use crate::distance::str_distance;
use launchdex_core::{ItemId, SearchItem};
use rustc_hash::FxHashMap;
use std::ops::Range;

/// Item ordinal within one index
pub type Ordinal = u32;

/// Token id within one index's vocabulary
pub type TermId = usize;

/// Immutable token → item lookup structure.
#[derive(Debug, Default)]
pub struct HotIndex {
    items: Vec<SearchItem>,
    by_id: FxHashMap<ItemId, Ordinal>,
    vocabulary: Vec<String>,
    postings: Vec<Vec<Ordinal>>,
    by_length: Vec<Vec<TermId>>,
}

impl HotIndex {
    /// An index with no items
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from the given items. Stale items are left out.
    pub fn build<'a>(source: impl IntoIterator<Item = &'a SearchItem>) -> Self {
        let mut items: Vec<SearchItem> = source
            .into_iter()
            .filter(|item| !item.stale)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));

        let mut term_postings: FxHashMap<&str, Vec<Ordinal>> = FxHashMap::default();
        for (ordinal, item) in items.iter().enumerate() {
            for token in item.tokens.iter() {
                term_postings
                    .entry(token)
                    .or_default()
                    .push(ordinal as Ordinal);
            }
        }

        let mut terms: Vec<(&str, Vec<Ordinal>)> = term_postings.into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let mut vocabulary = Vec::with_capacity(terms.len());
        let mut postings = Vec::with_capacity(terms.len());
        let mut by_length: Vec<Vec<TermId>> = Vec::new();
        for (term_id, (term, list)) in terms.into_iter().enumerate() {
            let len = term.chars().count();
            if by_length.len() <= len {
                by_length.resize_with(len + 1, Vec::new);
            }
            by_length[len].push(term_id);
            vocabulary.push(term.to_string());
            postings.push(list);
        }

        let by_id = items
            .iter()
            .enumerate()
            .map(|(ordinal, item)| (item.id.clone(), ordinal as Ordinal))
            .collect();

        HotIndex {
            items,
            by_id,
            vocabulary,
            postings,
            by_length,
        }
    }

    /// Number of indexed items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct tokens
    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Item at `ordinal`
    pub fn item(&self, ordinal: Ordinal) -> &SearchItem {
        &self.items[ordinal as usize]
    }

    /// Look up an indexed item by id
    pub fn get(&self, id: &str) -> Option<&SearchItem> {
        self.by_id.get(id).map(|&ordinal| self.item(ordinal))
    }

    /// All indexed items, sorted by id
    pub fn items(&self) -> &[SearchItem] {
        &self.items
    }

    /// Token text for `term`
    pub fn term(&self, term: TermId) -> &str {
        &self.vocabulary[term]
    }

    /// Ordinals of items containing `term`, ascending
    pub fn postings(&self, term: TermId) -> &[Ordinal] {
        &self.postings[term]
    }

    /// Term ids of every token starting with `prefix` (including equality).
    pub fn prefix_range(&self, prefix: &str) -> Range<TermId> {
        let start = self
            .vocabulary
            .partition_point(|term| term.as_str() < prefix);
        let len = self.vocabulary[start..].partition_point(|term| term.starts_with(prefix));
        start..start + len
    }

    /// Term ids of tokens containing `word` anywhere but at the start.
    ///
    /// Stops early once `should_stop` returns true; it is polled every
    /// `poll_every` terms.
    pub fn substring_terms(
        &self,
        word: &str,
        poll_every: usize,
        should_stop: &mut dyn FnMut() -> bool,
    ) -> ScanResult {
        let mut result = ScanResult::default();
        for (term_id, term) in self.vocabulary.iter().enumerate() {
            if poll_every > 0 && term_id % poll_every == 0 && term_id > 0 && should_stop() {
                result.interrupted = true;
                break;
            }
            if term.len() > word.len() && !term.starts_with(word) && term.contains(word) {
                result.terms.push((term_id, 0));
            }
        }
        result
    }

    /// Term ids within `tolerance` edits of `word`, with their distance.
    ///
    /// Only tokens whose length is within `tolerance` of the word's are
    /// examined, and at most `cap` matches are returned (closest first).
    pub fn fuzzy_terms(
        &self,
        word: &str,
        tolerance: usize,
        cap: usize,
        poll_every: usize,
        should_stop: &mut dyn FnMut() -> bool,
    ) -> ScanResult {
        let mut result = ScanResult::default();
        if tolerance == 0 || cap == 0 {
            return result;
        }
        let len = word.chars().count();
        let lo = len.saturating_sub(tolerance);
        let hi = (len + tolerance).min(self.by_length.len().saturating_sub(1));
        let mut examined = 0usize;

        'scan: for bucket in self.by_length.get(lo..=hi).unwrap_or(&[]) {
            for &term_id in bucket {
                examined += 1;
                if poll_every > 0 && examined % poll_every == 0 && should_stop() {
                    result.interrupted = true;
                    break 'scan;
                }
                if let Some(distance) = str_distance(word, &self.vocabulary[term_id], tolerance) {
                    if distance > 0 {
                        result.terms.push((term_id, distance));
                    }
                }
            }
        }
        result.examined = examined;

        if result.terms.len() > cap {
            result
                .terms
                .sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
            result.terms.truncate(cap);
            result.capped = true;
        }
        result
    }
}

/// Output of a vocabulary scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Matching term ids with their edit distance (0 for substring scans)
    pub terms: Vec<(TermId, usize)>,
    /// Terms examined (fuzzy scans only)
    pub examined: usize,
    /// The scan stopped early because `should_stop` fired
    pub interrupted: bool,
    /// Matches beyond the cap were dropped
    pub capped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchdex_core::{ChangeStamp, ItemKind};

    fn item(id: &str, title: &str) -> SearchItem {
        SearchItem::new(id, ItemKind::App, title, "/x", "test", ChangeStamp::new(1))
    }

    fn never() -> impl FnMut() -> bool {
        || false
    }

    fn sample() -> HotIndex {
        let mut stale = item("d", "Code Stale");
        stale.stale = true;
        let items = vec![
            item("a", "Visual Studio Code"),
            item("b", "Codeium"),
            item("c", "Decoder Ring"),
            stale,
        ];
        HotIndex::build(&items)
    }

    fn terms(index: &HotIndex, range: Range<TermId>) -> Vec<&str> {
        range.map(|t| index.term(t)).collect()
    }

    #[test]
    fn test_stale_items_omitted() {
        let index = sample();
        assert_eq!(index.len(), 3);
        assert!(index.get("d").is_none());
        assert!(index.get("a").is_some());
    }

    #[test]
    fn test_prefix_range() {
        let index = sample();
        assert_eq!(terms(&index, index.prefix_range("cod")), vec!["code", "codeium"]);
        assert_eq!(terms(&index, index.prefix_range("code")), vec!["code", "codeium"]);
        assert!(index.prefix_range("zzz").is_empty());
    }

    #[test]
    fn test_postings() {
        let index = sample();
        let range = index.prefix_range("code");
        let code = range.start;
        assert_eq!(index.term(code), "code");
        let titles: Vec<&str> = index
            .postings(code)
            .iter()
            .map(|&o| index.item(o).title.as_str())
            .collect();
        assert_eq!(titles, vec!["Visual Studio Code"]);
    }

    #[test]
    fn test_substring_terms_exclude_prefix_matches() {
        let index = sample();
        let found = index.substring_terms("code", 64, &mut never());
        let names: Vec<&str> = found.terms.iter().map(|(t, _)| index.term(*t)).collect();
        assert!(names.contains(&"decoder"));
        assert!(names.contains(&"visualstudiocode"));
        assert!(!names.contains(&"codeium"));
    }

    #[test]
    fn test_fuzzy_terms() {
        let index = sample();
        let found = index.fuzzy_terms("cdoe", 2, 16, 64, &mut never());
        let names: Vec<&str> = found.terms.iter().map(|(t, _)| index.term(*t)).collect();
        assert!(names.contains(&"code"));
        assert!(!found.capped);
    }

    #[test]
    fn test_fuzzy_cap_keeps_closest() {
        let items: Vec<SearchItem> = ["abcd", "abce", "abxy", "abcf"]
            .iter()
            .enumerate()
            .map(|(i, t)| item(&i.to_string(), t))
            .collect();
        let index = HotIndex::build(&items);
        let found = index.fuzzy_terms("abcz", 2, 2, 64, &mut never());
        assert!(found.capped);
        assert_eq!(found.terms.len(), 2);
        assert!(found.terms.iter().all(|(_, d)| *d == 1));
    }

    #[test]
    fn test_scan_interrupt() {
        let items: Vec<SearchItem> = (0..200).map(|i| item(&i.to_string(), &format!("term{}", i))).collect();
        let index = HotIndex::build(&items);
        let found = index.substring_terms("erm", 10, &mut || true);
        assert!(found.interrupted);
    }

    #[test]
    fn test_empty_index() {
        let index = HotIndex::empty();
        assert!(index.is_empty());
        assert!(index.prefix_range("a").is_empty());
        assert!(index.fuzzy_terms("abc", 2, 8, 64, &mut never()).terms.is_empty());
    }
}
