//! Scoring model
//!
//! ```text
//! score = exact_match_boost
//!       + prefix_match_boost
//!       + fuzzy_distance_score   (bounded by typo_tolerance)
//!       + usage_weight  * ln(1 + use_count)
//!       + recency_weight * recency_decay(last_used_at)
//!       + kind_bias
//! ```
//!
//! Every query word has to match some item token (AND). Each word takes its
//! best match class; whole-query bonuses reward exact titles and matches on
//! the leading token. Scoring is pure: `now` travels in the [`QueryContext`].

use crate::distance::str_distance;
use launchdex_core::{analyze, EngineConfig, ItemKind, SearchItem, Timestamp};
use std::time::Duration;

/// Score for a word equal to a token
pub const EXACT_SCORE: f64 = 10.0;
/// Base score for a word that prefixes a token
pub const PREFIX_BASE: f64 = 6.0;
/// Extra prefix score at full coverage
pub const PREFIX_COVERAGE: f64 = 4.0;
/// Base score for a word found inside a token
pub const SUBSTRING_BASE: f64 = 3.0;
/// Extra substring score at full coverage
pub const SUBSTRING_COVERAGE: f64 = 2.0;
/// Fuzzy score at distance zero
pub const FUZZY_MAX: f64 = 2.5;
/// Bonus when the query spells the whole title
pub const EXACT_TITLE_BONUS: f64 = 20.0;
/// Bonus when the title's first token starts with the first query word
pub const LEADING_TOKEN_BONUS: f64 = 4.0;
/// Time for the recency signal to halve
pub const RECENCY_HALF_LIFE: Duration = Duration::from_secs(72 * 60 * 60);

/// Shortest word considered for fuzzy matching
pub const MIN_FUZZY_LEN: usize = 3;
/// Shortest word considered for substring matching
pub const MIN_SUBSTRING_LEN: usize = 2;

/// How a query word matched a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchClass {
    /// Word equals the token
    Exact,
    /// Word is a proper prefix of the token
    Prefix,
    /// Word occurs inside the token, not at the start
    Substring,
    /// Within the typo tolerance
    Fuzzy {
        /// Edit distance
        distance: usize,
    },
}

impl MatchClass {
    /// Exact and prefix matches count as high quality
    pub fn is_high_quality(&self) -> bool {
        matches!(self, MatchClass::Exact | MatchClass::Prefix)
    }
}

/// Everything scoring needs to know about the query.
#[derive(Debug, Clone)]
pub struct QueryContext {
    words: Vec<String>,
    compound: String,
    typo_tolerance: usize,
    usage_weight: f64,
    recency_weight: f64,
    now: Timestamp,
}

impl QueryContext {
    /// Tokenize `text` the same way item titles are tokenized.
    pub fn new(text: &str, config: &EngineConfig, now: Timestamp) -> Self {
        let analysis = analyze(text);
        let mut words = analysis.words;
        if let Some(ext) = analysis.extension {
            words.push(ext);
        }
        let compound = words.concat();
        QueryContext {
            words,
            compound,
            typo_tolerance: usize::from(config.typo_tolerance),
            usage_weight: config.usage_weight,
            recency_weight: config.recency_weight,
            now,
        }
    }

    /// Query words in order
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// All words concatenated
    pub fn compound(&self) -> &str {
        &self.compound
    }

    /// Configured maximum edit distance
    pub fn typo_tolerance(&self) -> usize {
        self.typo_tolerance
    }

    /// Time the query was issued
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// True when the query has nothing to match
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Tolerance for `word`: `min(typo_tolerance, len / 2)`, zero below
    /// [`MIN_FUZZY_LEN`] characters.
    pub fn effective_tolerance(&self, word: &str) -> usize {
        let len = word.chars().count();
        if len < MIN_FUZZY_LEN {
            0
        } else {
            self.typo_tolerance.min(len / 2)
        }
    }
}

/// Classify how `word` matches `token`, if at all.
pub fn match_word(word: &str, token: &str, tolerance: usize) -> Option<(MatchClass, f64)> {
    if word == token {
        return Some((MatchClass::Exact, EXACT_SCORE));
    }
    let coverage = coverage(word, token);
    if token.starts_with(word) {
        return Some((MatchClass::Prefix, PREFIX_BASE + PREFIX_COVERAGE * coverage));
    }
    if word.chars().count() >= MIN_SUBSTRING_LEN && token.contains(word) {
        return Some((
            MatchClass::Substring,
            SUBSTRING_BASE + SUBSTRING_COVERAGE * coverage,
        ));
    }
    if tolerance > 0 {
        if let Some(distance) = str_distance(word, token, tolerance) {
            return Some((
                MatchClass::Fuzzy { distance },
                fuzzy_distance_score(distance, tolerance),
            ));
        }
    }
    None
}

/// Best match of `word` against any of `tokens`.
pub fn best_match<'a>(
    word: &str,
    tokens: impl IntoIterator<Item = &'a str>,
    tolerance: usize,
) -> Option<(MatchClass, f64)> {
    let mut best: Option<(MatchClass, f64)> = None;
    for token in tokens {
        if let Some(found) = match_word(word, token, tolerance) {
            if best.map_or(true, |(_, s)| found.1 > s) {
                best = Some(found);
                if found.0 == MatchClass::Exact {
                    break;
                }
            }
        }
    }
    best
}

/// Score `item` against the query, or `None` when it does not match.
pub fn score(item: &SearchItem, ctx: &QueryContext) -> Option<f64> {
    if ctx.is_empty() {
        return None;
    }
    let relevance = text_relevance(item, ctx)?;

    let mut total = relevance;
    if item.tokens.compound() == ctx.compound() {
        total += EXACT_TITLE_BONUS;
    }
    if let (Some(leading), Some(first)) = (item.tokens.leading(), ctx.words.first()) {
        if leading.starts_with(first.as_str()) {
            total += LEADING_TOKEN_BONUS;
        }
    }
    total += ctx.usage_weight * usage_signal(item.use_count);
    total += ctx.recency_weight * recency_decay(item.last_used_at, ctx.now);
    total += kind_bias(item.kind);
    Some(total)
}

/// Sum of per-word match scores, falling back to matching the query
/// compound (`vsc`, `visualstu`) against whole tokens.
fn text_relevance(item: &SearchItem, ctx: &QueryContext) -> Option<f64> {
    let mut sum = 0.0;
    let mut all_matched = true;
    for word in &ctx.words {
        let tolerance = ctx.effective_tolerance(word);
        match best_match(word, item.tokens.iter(), tolerance) {
            Some((_, s)) => sum += s,
            None => {
                all_matched = false;
                break;
            }
        }
    }
    if all_matched {
        return Some(sum);
    }
    if ctx.words.len() > 1 {
        return compound_match(item, ctx.compound());
    }
    None
}

fn compound_match(item: &SearchItem, compound: &str) -> Option<f64> {
    item.tokens
        .iter()
        .filter_map(|token| match match_word(compound, token, 0) {
            Some((class, s)) if class.is_high_quality() => Some(s),
            _ => None,
        })
        .max_by(f64::total_cmp)
}

/// Fraction of `token` covered by `word`, in characters.
fn coverage(word: &str, token: &str) -> f64 {
    let token_len = token.chars().count();
    if token_len == 0 {
        return 0.0;
    }
    (word.chars().count() as f64 / token_len as f64).min(1.0)
}

/// `FUZZY_MAX * (tolerance + 1 - distance) / (tolerance + 1)`
///
/// Strictly decreasing in `distance`.
pub fn fuzzy_distance_score(distance: usize, tolerance: usize) -> f64 {
    let steps = (tolerance + 1) as f64;
    FUZZY_MAX * (steps - distance as f64) / steps
}

/// `ln(1 + use_count)`
pub fn usage_signal(use_count: u64) -> f64 {
    (use_count as f64).ln_1p()
}

/// `0.5 ^ (age / 72h)`; 0 when never used, 1 for launches in the future.
pub fn recency_decay(last_used_at: Option<Timestamp>, now: Timestamp) -> f64 {
    let Some(last) = last_used_at else {
        return 0.0;
    };
    match now.duration_since(last) {
        Some(age) => 0.5f64.powf(age.as_secs_f64() / RECENCY_HALF_LIFE.as_secs_f64()),
        None => 1.0,
    }
}

/// Fixed per-kind adjustment.
pub fn kind_bias(kind: ItemKind) -> f64 {
    match kind {
        ItemKind::App => 1.0,
        ItemKind::Command => 0.5,
        ItemKind::Folder => 0.0,
        ItemKind::File => -0.25,
    }
}
