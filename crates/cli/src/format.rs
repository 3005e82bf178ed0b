//! Output → human/raw string formatting.
//!
//! Two modes:
//! - **Human** (default): numbered results with kind and id
//! - **Raw** (`--raw`): tab-separated fields, one record per line

use launchdex_core::{ConfigValidationError, Error, QueryHit};
use launchdex_search::QueryStatus;

use crate::state::Output;

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Raw,
}

/// Format a successful output.
pub fn format_output(output: &Output, mode: OutputMode) -> String {
    match mode {
        OutputMode::Raw => format_raw(output),
        OutputMode::Human => format_human(output),
    }
}

/// Format an error.
pub fn format_error(err: &Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Raw => format!("{}", err),
        OutputMode::Human => format!("(error) {}", err),
    }
}

/// Format the result of `check-config`.
pub fn format_config_check(
    path: &str,
    result: &Result<(), ConfigValidationError>,
    mode: OutputMode,
) -> String {
    match (result, mode) {
        (Ok(()), OutputMode::Human) => format!("{}: OK", path),
        (Ok(()), OutputMode::Raw) => "ok".to_string(),
        (Err(e), OutputMode::Human) => format!("{}: invalid {}", path, e),
        (Err(e), OutputMode::Raw) => format!("invalid\t{}\t{}", e.field, e.message),
    }
}

fn format_raw(output: &Output) -> String {
    match output {
        Output::Hits { hits, .. } => hits
            .iter()
            .map(|hit| {
                format!(
                    "{}\t{}\t{}\t{}",
                    hit.id.as_str(),
                    hit.kind.as_str(),
                    hit.title,
                    hit.path
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Output::Report(report) => format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            report.kind.as_str(),
            report.discovered(),
            report.upserted(),
            report.removed(),
            report.skipped(),
            report.failed()
        ),
        Output::Recorded { id, event } => format!("{}\t{}", event, id),
        Output::Stats {
            store,
            worker,
            generation,
        } => format!(
            "{}\t{}\t{}\t{}\t{}",
            generation, store.items, store.providers, store.journal_records, worker.queue_depth
        ),
    }
}

fn format_human(output: &Output) -> String {
    match output {
        Output::Hits {
            hits,
            status,
            generation,
            profile,
        } => {
            let mut out = if hits.is_empty() {
                "(no results)".to_string()
            } else {
                hits.iter()
                    .enumerate()
                    .map(|(i, hit)| format_hit_human(i + 1, hit))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            if *status == QueryStatus::TimedOut {
                out.push_str("\n(partial: a stage ran over budget)");
            }
            if let Some(profile) = profile {
                out.push_str(&format!("\n(generation {}) {}", generation, profile));
            }
            out
        }
        Output::Report(report) => {
            let mut out = report.to_string();
            for provider in &report.providers {
                if let Some(error) = &provider.error {
                    out.push_str(&format!("\n  {}: {}", provider.provider, error));
                }
            }
            out
        }
        Output::Recorded { id, event } => format!("recorded {} for {}", event, id),
        Output::Stats {
            store,
            worker,
            generation,
        } => format!(
            "generation:      {}\nitems:           {}\nproviders:       {}\njournal records: {}\nqueue depth:     {}\ncycles:          {}\npanics:          {}",
            generation,
            store.items,
            store.providers,
            store.journal_records,
            worker.queue_depth,
            worker.cycles_completed,
            worker.panics
        ),
    }
}

fn format_hit_human(rank: usize, hit: &QueryHit) -> String {
    format!(
        "{}) {} ({})\n   {}",
        rank,
        hit.title,
        hit.kind.as_str(),
        hit.id.as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchdex_core::{ItemId, ItemKind};
    use launchdex_search::StageProfile;

    fn hits() -> Output {
        Output::Hits {
            hits: vec![QueryHit {
                id: ItemId::from("file:/docs/Q4_Report.xlsx"),
                kind: ItemKind::File,
                title: "Q4_Report.xlsx".to_string(),
                path: "/docs/Q4_Report.xlsx".to_string(),
            }],
            status: QueryStatus::Completed,
            generation: 3,
            profile: None,
        }
    }

    #[test]
    fn test_human_hits() {
        assert_eq!(
            format_output(&hits(), OutputMode::Human),
            "1) Q4_Report.xlsx (file)\n   file:/docs/Q4_Report.xlsx"
        );
    }

    #[test]
    fn test_raw_hits_are_tab_separated() {
        assert_eq!(
            format_output(&hits(), OutputMode::Raw),
            "file:/docs/Q4_Report.xlsx\tfile\tQ4_Report.xlsx\t/docs/Q4_Report.xlsx"
        );
    }

    #[test]
    fn test_empty_and_partial_results() {
        let output = Output::Hits {
            hits: vec![],
            status: QueryStatus::TimedOut,
            generation: 1,
            profile: Some(StageProfile::default()),
        };
        let text = format_output(&output, OutputMode::Human);
        assert!(text.starts_with("(no results)"));
        assert!(text.contains("partial"));
        assert!(text.contains("generation 1"));
    }

    #[test]
    fn test_error_modes() {
        let err = Error::Backpressure;
        assert_eq!(format_error(&err, OutputMode::Raw), "Indexer queue is full");
        assert_eq!(
            format_error(&err, OutputMode::Human),
            "(error) Indexer queue is full"
        );
    }
}
