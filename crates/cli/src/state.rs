//! Session wrapper around an [`IndexHandle`].
//!
//! Shell invocations, pipe mode and the interactive prompt all execute
//! [`CliAction`]s through one `SessionState`.

use std::sync::Arc;
use std::thread;

use launchdex_core::{FailureCode, ItemKind, Result};
use launchdex_engine::{IndexHandle, IndexRefreshReport, WorkerStats};
use launchdex_search::{QueryStatus, StageProfile};
use launchdex_storage::StoreStats;
use tracing::{error, info};

use crate::parse::CliAction;

/// Results shown when a query gives no `--limit`.
pub const DEFAULT_LIMIT: usize = 10;

/// What an executed action produced.
pub enum Output {
    /// Ranked query results
    Hits {
        hits: Vec<launchdex_core::QueryHit>,
        status: QueryStatus,
        generation: u64,
        profile: Option<StageProfile>,
    },
    /// Indexing pass summary
    Report(IndexRefreshReport),
    /// Feedback accepted and applied
    Recorded { id: String, event: &'static str },
    /// Index statistics
    Stats {
        store: StoreStats,
        worker: WorkerStats,
        generation: u64,
    },
}

/// Holds the open index for the lifetime of the process.
pub struct SessionState {
    handle: Arc<IndexHandle>,
}

impl SessionState {
    /// Wrap an open handle.
    pub fn new(handle: IndexHandle) -> Self {
        SessionState {
            handle: Arc::new(handle),
        }
    }

    /// The underlying handle.
    pub fn handle(&self) -> &Arc<IndexHandle> {
        &self.handle
    }

    /// Execute one action against the index.
    pub fn execute(&self, action: CliAction) -> Result<Output> {
        match action {
            CliAction::Index => self.handle.bootstrap().map(Output::Report),
            CliAction::Reconcile => self.handle.reconcile().map(Output::Report),
            CliAction::Query {
                text,
                limit,
                kind,
                profile,
            } => Ok(self.query(&text, limit, kind, profile)),
            CliAction::Launch { id } => {
                self.handle.feedback().record_launch(id.as_str())?;
                self.handle.flush()?;
                Ok(Output::Recorded {
                    id,
                    event: "launch",
                })
            }
            CliAction::Fail { id, code } => {
                let failure = FailureCode::from_os_error(code);
                self.handle.feedback().record_failure(id.as_str(), failure)?;
                self.handle.flush()?;
                Ok(Output::Recorded {
                    id,
                    event: match failure {
                        FailureCode::MissingTarget => "missing target",
                        FailureCode::AccessDenied => "access denied",
                        FailureCode::Other(_) => "failure",
                    },
                })
            }
            CliAction::Stats => Ok(Output::Stats {
                store: self.handle.stats(),
                worker: self.handle.worker_stats(),
                generation: self.handle.generation(),
            }),
        }
    }

    /// Run a query with the shell's defaults.
    pub fn query(
        &self,
        text: &str,
        limit: Option<usize>,
        kind: Option<ItemKind>,
        profile: bool,
    ) -> Output {
        let outcome =
            self.handle
                .search_with_filter(text, limit.unwrap_or(DEFAULT_LIMIT), kind);
        Output::Hits {
            hits: outcome.hits,
            status: outcome.status,
            generation: outcome.generation,
            profile: profile.then_some(outcome.profile),
        }
    }

    /// Bring the index up to date on a background thread; persisted items
    /// stay searchable while it runs.
    ///
    /// A fresh index gets a full bootstrap. Once a generation is served, only
    /// providers whose change stamp moved are rescanned.
    pub fn index_in_background(&self) {
        let handle = Arc::clone(&self.handle);
        let spawned = thread::Builder::new()
            .name("launchdex-startup".to_string())
            .spawn(move || {
                let result = if handle.generation() == 0 {
                    handle.bootstrap()
                } else {
                    handle.refresh()
                };
                match result {
                    Ok(report) => info!(target: "launchdex::index", "{}", report),
                    Err(e) => {
                        error!(target: "launchdex::index", error = %e, "Start-up indexing failed")
                    }
                }
            });
        if let Err(e) = spawned {
            error!(target: "launchdex::index", error = %e, "Could not start indexing thread");
        }
    }

    /// Prompt for the interactive shell.
    pub fn prompt(&self) -> String {
        format!("launchdex[g{}]> ", self.handle.generation())
    }
}
