//! Query sessions and debounce
//!
//! Every keystroke issues a new [`QuerySession`] from the same
//! [`QueryClient`]; issuing bumps the client's sequence number, which
//! supersedes every older session. Sessions check their sequence at each
//! stage boundary and at delivery, so a superseded query produces no output.

use crate::engine::{QueryStatus, SearchEngine, SearchOutcome};
use crate::generation::Generation;
use launchdex_core::ItemKind;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// QueryLoad
// ============================================================================

/// Count of queries currently executing.
///
/// Shared with the indexer so reconciliation can back off while the user
/// is typing.
#[derive(Debug, Clone, Default)]
pub struct QueryLoad(Arc<AtomicUsize>);

impl QueryLoad {
    /// A fresh counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a query as running until the guard drops
    pub fn enter(&self) -> LoadGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        LoadGuard(self.clone())
    }

    /// Queries currently running
    pub fn in_flight(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// True when no query is running
    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }
}

/// Decrements the [`QueryLoad`] on drop.
#[derive(Debug)]
pub struct LoadGuard(QueryLoad);

impl Drop for LoadGuard {
    fn drop(&mut self) {
        (self.0).0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// QuerySession
// ============================================================================

/// One issued query, bound to a single generation.
#[derive(Debug, Clone)]
pub struct QuerySession {
    text: String,
    seq: u64,
    filter: Option<ItemKind>,
    latest: Arc<AtomicU64>,
    generation: Arc<Generation>,
}

impl QuerySession {
    /// Query text as typed
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Issue sequence number within the client
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Optional kind filter
    pub fn filter(&self) -> Option<ItemKind> {
        self.filter
    }

    /// The generation this session reads for its whole execution
    pub fn generation(&self) -> &Arc<Generation> {
        &self.generation
    }

    /// True while no later session has been issued by the same client
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.seq
    }

    /// True once superseded
    pub fn is_cancelled(&self) -> bool {
        !self.is_current()
    }
}

// ============================================================================
// QueryClient
// ============================================================================

/// Issues sessions for one UI context (one search box).
#[derive(Clone)]
pub struct QueryClient {
    engine: Arc<SearchEngine>,
    latest: Arc<AtomicU64>,
}

impl QueryClient {
    /// A client with no sessions issued yet
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        QueryClient {
            engine,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Issue a session, superseding every earlier one.
    pub fn begin(&self, text: impl Into<String>) -> QuerySession {
        self.begin_filtered(text, None)
    }

    /// Issue a session restricted to one item kind.
    pub fn begin_filtered(&self, text: impl Into<String>, filter: Option<ItemKind>) -> QuerySession {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        QuerySession {
            text: text.into(),
            seq,
            filter,
            latest: Arc::clone(&self.latest),
            generation: self.engine.generations().load(),
        }
    }

    /// Supersede every in-flight session without issuing a new query.
    pub fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// Run a session on the calling thread.
    pub fn run(&self, session: &QuerySession, limit: usize) -> SearchOutcome {
        self.engine.execute(
            session.text(),
            session.generation(),
            limit,
            session.filter(),
            &|| session.is_cancelled(),
        )
    }

    /// Issue a session and run it on the rayon pool.
    ///
    /// `deliver` is called only if the session is still current once the
    /// query finishes.
    pub fn submit<F>(&self, text: impl Into<String>, limit: usize, deliver: F) -> u64
    where
        F: FnOnce(SearchOutcome) + Send + 'static,
    {
        let session = self.begin(text);
        let seq = session.seq();
        self.submit_session(session, limit, deliver);
        seq
    }

    /// Run an already-issued session on the rayon pool.
    pub fn submit_session<F>(&self, session: QuerySession, limit: usize, deliver: F)
    where
        F: FnOnce(SearchOutcome) + Send + 'static,
    {
        let client = self.clone();
        rayon::spawn(move || {
            let outcome = client.run(&session, limit);
            if outcome.status != QueryStatus::Cancelled && session.is_current() {
                deliver(outcome);
            } else {
                debug!(
                    target: "launchdex::search",
                    seq = session.seq(),
                    "Dropped superseded query"
                );
            }
        });
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("latest", &self.latest.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_load_guard() {
        let load = QueryLoad::new();
        assert!(load.is_idle());
        let a = load.enter();
        let b = load.enter();
        assert_eq!(load.in_flight(), 2);
        drop(a);
        assert_eq!(load.in_flight(), 1);
        drop(b);
        assert!(load.is_idle());
    }
}
