//! Search Engine: the staged query pipeline
//!
//! ```text
//! Parse/Normalize ─► Candidate Generation ─► Fuzzy Expansion ─► Rank & Project
//!     (≤1ms)            (≤5ms)                 (≤7ms, optional)     (≤2ms)
//! ```
//!
//! A query reads exactly one generation. Cancellation is checked at every
//! stage boundary; a stage that runs past its budget stops with what it has
//! and the query finishes as `TimedOut` with best-effort results.

use crate::generation::{Generation, GenerationCell};
use crate::hot_index::{HotIndex, Ordinal};
use crate::scoring::{score, QueryContext, MIN_SUBSTRING_LEN};
use crate::session::{QueryClient, QueryLoad};
use crate::SharedConfig;
use launchdex_core::{Clock, ItemKind, QueryConfig, QueryHit, SearchItem, SystemClock};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Query words considered for candidate generation
pub const MAX_QUERY_WORDS: usize = 64;

/// Fuzzy matches kept per query character
const FUZZY_TERMS_PER_CHAR: usize = 8;

/// Vocabulary terms scanned between deadline checks
const SCAN_POLL: usize = 1024;

/// Candidates scored between deadline checks
const RANK_POLL: usize = 256;

/// Terminal state of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// All stages ran to completion
    Completed,
    /// Superseded by a newer session; no output
    Cancelled,
    /// A stage ran over budget; results are best-effort
    TimedOut,
}

/// Pipeline stage, for profiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Parse/normalize
    Parse,
    /// Candidate generation
    Candidates,
    /// Fuzzy expansion
    Fuzzy,
    /// Rank & project
    Rank,
}

/// Per-stage time budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageBudgets {
    /// Parse/normalize
    pub parse: Duration,
    /// Candidate generation
    pub candidates: Duration,
    /// Fuzzy expansion
    pub fuzzy: Duration,
    /// Rank & project
    pub rank: Duration,
}

impl From<&QueryConfig> for StageBudgets {
    fn from(config: &QueryConfig) -> Self {
        StageBudgets {
            parse: Duration::from_micros(config.parse_budget_us),
            candidates: Duration::from_micros(config.candidate_budget_us),
            fuzzy: Duration::from_micros(config.fuzzy_budget_us),
            rank: Duration::from_micros(config.rank_budget_us),
        }
    }
}

/// Where a query spent its time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageProfile {
    /// Parse/normalize time
    pub parse: Duration,
    /// Candidate generation time
    pub candidates: Duration,
    /// Fuzzy expansion time, when the stage ran
    pub fuzzy: Option<Duration>,
    /// Rank & project time
    pub rank: Duration,
    /// End-to-end time
    pub total: Duration,
    /// First stage that exceeded its budget
    pub overrun: Option<Stage>,
    /// Items matching every query word
    pub candidate_count: usize,
    /// High-quality (exact/prefix) candidates found before fuzzy expansion
    pub high_quality_count: usize,
}

impl fmt::Display for StageProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse={}us candidates={}us fuzzy={} rank={}us total={}us",
            self.parse.as_micros(),
            self.candidates.as_micros(),
            self.fuzzy
                .map(|d| format!("{}us", d.as_micros()))
                .unwrap_or_else(|| "skipped".to_string()),
            self.rank.as_micros(),
            self.total.as_micros()
        )
    }
}

/// Result of one query execution.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Terminal state
    pub status: QueryStatus,
    /// Ranked hits, best first
    pub hits: Vec<QueryHit>,
    /// Generation the query read
    pub generation: u64,
    /// Stage latency profile
    pub profile: StageProfile,
}

impl SearchOutcome {
    fn empty(status: QueryStatus, generation: u64, profile: StageProfile) -> Self {
        SearchOutcome {
            status,
            hits: Vec::new(),
            generation,
            profile,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct WordMask {
    matched: u64,
    high_quality: u64,
}

/// Runs queries against published generations.
pub struct SearchEngine {
    generations: Arc<GenerationCell>,
    config: SharedConfig,
    clock: Arc<dyn Clock>,
    load: QueryLoad,
}

impl SearchEngine {
    /// Create an engine reading from `generations` with live `config`.
    pub fn new(generations: Arc<GenerationCell>, config: SharedConfig) -> Self {
        SearchEngine {
            generations,
            config,
            clock: Arc::new(SystemClock),
            load: QueryLoad::new(),
        }
    }

    /// Replace the time source used for recency scoring.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share an in-flight counter with other components.
    pub fn with_query_load(mut self, load: QueryLoad) -> Self {
        self.load = load;
        self
    }

    /// The generation cell queries bind to
    pub fn generations(&self) -> &Arc<GenerationCell> {
        &self.generations
    }

    /// In-flight query counter
    pub fn query_load(&self) -> QueryLoad {
        self.load.clone()
    }

    /// A debounce client for one search box.
    pub fn client(self: &Arc<Self>) -> QueryClient {
        QueryClient::new(Arc::clone(self))
    }

    /// Ranked hits for `query`, at most `min(limit, max_results)`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<QueryHit> {
        self.search_with_filter(query, limit, None).hits
    }

    /// Run a query against the current generation, optionally restricted to
    /// one item kind.
    pub fn search_with_filter(
        &self,
        query: &str,
        limit: usize,
        filter: Option<ItemKind>,
    ) -> SearchOutcome {
        let generation = self.generations.load();
        self.execute(query, &generation, limit, filter, &|| false)
    }

    /// Run the pipeline against a bound generation.
    ///
    /// `cancelled` is polled at every stage boundary and during long scans.
    pub fn execute(
        &self,
        query: &str,
        generation: &Generation,
        limit: usize,
        filter: Option<ItemKind>,
        cancelled: &dyn Fn() -> bool,
    ) -> SearchOutcome {
        let _load = self.load.enter();
        let started = Instant::now();
        let config = self.config.load();
        let budgets = StageBudgets::from(&config.query);
        let gen_number = generation.number();
        let index = generation.index();
        let mut profile = StageProfile::default();

        // Stage 1: parse/normalize
        let ctx = QueryContext::new(query, &config, self.clock.now());
        profile.parse = started.elapsed();
        if profile.parse > budgets.parse {
            profile.overrun = Some(Stage::Parse);
        }
        if cancelled() {
            return self.finish(query, QueryStatus::Cancelled, Vec::new(), gen_number, profile, started);
        }
        let limit = limit.min(usize::from(config.max_results));
        if ctx.is_empty() || limit == 0 || index.is_empty() {
            return self.finish(query, QueryStatus::Completed, Vec::new(), gen_number, profile, started);
        }

        let words: Vec<&str> = ctx
            .words()
            .iter()
            .take(MAX_QUERY_WORDS)
            .map(String::as_str)
            .collect();
        let full_mask = full_mask(words.len());

        // Stage 2: candidate generation
        let stage = Instant::now();
        let deadline = stage + budgets.candidates;
        let mut masks: FxHashMap<Ordinal, WordMask> = FxHashMap::default();
        let interrupted = generate_candidates(index, &ctx, &words, &mut masks, &mut || {
            cancelled() || Instant::now() >= deadline
        });
        profile.candidates = stage.elapsed();
        if cancelled() {
            return self.finish(query, QueryStatus::Cancelled, Vec::new(), gen_number, profile, started);
        }
        if interrupted || profile.candidates > budgets.candidates {
            profile.overrun.get_or_insert(Stage::Candidates);
        }
        profile.high_quality_count = masks
            .iter()
            .filter(|(ord, mask)| {
                mask.high_quality == full_mask && kind_matches(index.item(**ord), filter)
            })
            .count();

        // Stage 3: fuzzy expansion, only when exact/prefix matching came up short
        let wants_fuzzy = profile.overrun.is_none()
            && ctx.typo_tolerance() > 0
            && profile.high_quality_count < config.query.fuzzy_confidence_threshold;
        if wants_fuzzy {
            let stage = Instant::now();
            let deadline = stage + budgets.fuzzy;
            let interrupted = expand_fuzzy(index, &ctx, &words, &mut masks, &mut || {
                cancelled() || Instant::now() >= deadline
            });
            let elapsed = stage.elapsed();
            profile.fuzzy = Some(elapsed);
            if cancelled() {
                return self.finish(query, QueryStatus::Cancelled, Vec::new(), gen_number, profile, started);
            }
            if interrupted || elapsed > budgets.fuzzy {
                profile.overrun.get_or_insert(Stage::Fuzzy);
            }
        }

        // Stage 4: rank & project
        let stage = Instant::now();
        let deadline = stage + budgets.rank;
        let mut scored: Vec<(f64, &SearchItem)> = Vec::new();
        let mut rank_interrupted = false;
        for (n, (ordinal, mask)) in masks.iter().enumerate() {
            if n > 0 && n % RANK_POLL == 0 && (cancelled() || Instant::now() >= deadline) {
                rank_interrupted = true;
                break;
            }
            if mask.matched != full_mask {
                continue;
            }
            let item = index.item(*ordinal);
            if !kind_matches(item, filter) {
                continue;
            }
            if let Some(s) = score(item, &ctx) {
                scored.push((s, item));
            }
        }
        profile.candidate_count = scored.len();
        if scored.len() > limit {
            scored.select_nth_unstable_by(limit - 1, compare_ranked);
            scored.truncate(limit);
        }
        scored.sort_by(compare_ranked);
        let hits: Vec<QueryHit> = scored.iter().map(|(_, item)| item.to_hit()).collect();
        profile.rank = stage.elapsed();

        if cancelled() {
            return self.finish(query, QueryStatus::Cancelled, Vec::new(), gen_number, profile, started);
        }
        if rank_interrupted || profile.rank > budgets.rank {
            profile.overrun.get_or_insert(Stage::Rank);
        }
        let status = if profile.overrun.is_some() {
            QueryStatus::TimedOut
        } else {
            QueryStatus::Completed
        };
        self.finish(query, status, hits, gen_number, profile, started)
    }

    fn finish(
        &self,
        query: &str,
        status: QueryStatus,
        hits: Vec<QueryHit>,
        generation: u64,
        mut profile: StageProfile,
        started: Instant,
    ) -> SearchOutcome {
        profile.total = started.elapsed();
        match status {
            QueryStatus::TimedOut => warn!(
                target: "launchdex::search",
                query,
                generation,
                stage = ?profile.overrun,
                hits = hits.len(),
                profile = %profile,
                "Slow query, returning partial results"
            ),
            QueryStatus::Cancelled => debug!(
                target: "launchdex::search",
                query,
                generation,
                "Query cancelled"
            ),
            QueryStatus::Completed => debug!(
                target: "launchdex::search",
                query,
                generation,
                hits = hits.len(),
                total_us = profile.total.as_micros() as u64,
                "Query completed"
            ),
        }
        if status == QueryStatus::Cancelled {
            return SearchOutcome::empty(status, generation, profile);
        }
        SearchOutcome {
            status,
            hits,
            generation,
            profile,
        }
    }
}

impl fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchEngine")
            .field("generation", &self.generations.current_number())
            .field("in_flight", &self.load.in_flight())
            .finish()
    }
}

/// Prefix and substring matches per word, plus whole-query compound
/// prefixes. Returns true if the scan was interrupted.
fn generate_candidates(
    index: &HotIndex,
    ctx: &QueryContext,
    words: &[&str],
    masks: &mut FxHashMap<Ordinal, WordMask>,
    should_stop: &mut dyn FnMut() -> bool,
) -> bool {
    for (i, word) in words.iter().enumerate() {
        let bit = 1u64 << i;
        for term in index.prefix_range(word) {
            for &ordinal in index.postings(term) {
                let mask = masks.entry(ordinal).or_default();
                mask.matched |= bit;
                mask.high_quality |= bit;
            }
        }
        if word.chars().count() >= MIN_SUBSTRING_LEN {
            let scan = index.substring_terms(word, SCAN_POLL, should_stop);
            for (term, _) in scan.terms {
                for &ordinal in index.postings(term) {
                    masks.entry(ordinal).or_default().matched |= bit;
                }
            }
            if scan.interrupted {
                return true;
            }
        }
    }

    if words.len() > 1 {
        let full = full_mask(words.len());
        for term in index.prefix_range(ctx.compound()) {
            for &ordinal in index.postings(term) {
                let mask = masks.entry(ordinal).or_default();
                mask.matched = full;
                mask.high_quality = full;
            }
        }
    }
    should_stop()
}

/// Adds tokens within the typo tolerance of each word. Returns true if the
/// scan was interrupted.
fn expand_fuzzy(
    index: &HotIndex,
    ctx: &QueryContext,
    words: &[&str],
    masks: &mut FxHashMap<Ordinal, WordMask>,
    should_stop: &mut dyn FnMut() -> bool,
) -> bool {
    for (i, word) in words.iter().enumerate() {
        let tolerance = ctx.effective_tolerance(word);
        if tolerance == 0 {
            continue;
        }
        let cap = FUZZY_TERMS_PER_CHAR * word.chars().count();
        let scan = index.fuzzy_terms(word, tolerance, cap, SCAN_POLL, should_stop);
        let bit = 1u64 << i;
        for (term, _) in scan.terms {
            for &ordinal in index.postings(term) {
                masks.entry(ordinal).or_default().matched |= bit;
            }
        }
        if scan.interrupted {
            return true;
        }
    }
    false
}

fn full_mask(words: usize) -> u64 {
    if words >= 64 {
        u64::MAX
    } else {
        (1u64 << words) - 1
    }
}

fn kind_matches(item: &SearchItem, filter: Option<ItemKind>) -> bool {
    filter.map_or(true, |kind| item.kind == kind)
}

/// Higher score, then higher `use_count`, then more recent `last_used_at`,
/// then shorter title, then id.
fn compare_ranked(a: &(f64, &SearchItem), b: &(f64, &SearchItem)) -> Ordering {
    b.0.total_cmp(&a.0)
        .then_with(|| b.1.use_count.cmp(&a.1.use_count))
        .then_with(|| b.1.last_used_at.cmp(&a.1.last_used_at))
        .then_with(|| a.1.title.chars().count().cmp(&b.1.title.chars().count()))
        .then_with(|| a.1.id.cmp(&b.1.id))
}
