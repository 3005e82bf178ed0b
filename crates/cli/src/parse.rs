//! ArgMatches → CliAction conversion.
//!
//! Index commands become a [`CliAction`]; `check-config` and `shell` are
//! handled by `main` before an index is opened. Shell lines that start with
//! `:` are meta-commands or subcommands, anything else is a query.

use clap::ArgMatches;
use launchdex_core::ItemKind;

/// The result of parsing user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    /// Bootstrap from the discovery roots
    Index,
    /// Full reconciliation pass
    Reconcile,
    /// Search
    Query {
        text: String,
        limit: Option<usize>,
        kind: Option<ItemKind>,
        profile: bool,
    },
    /// Successful launch feedback
    Launch { id: String },
    /// Failed launch feedback with the launcher's error code
    Fail { id: String, code: i32 },
    /// Index statistics
    Stats,
}

/// Shell-only commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Help,
    Quit,
    Clear,
}

/// One line typed into the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellLine {
    /// Nothing to do
    Empty,
    /// A shell-only command
    Meta(MetaCommand),
    /// A `:`-prefixed subcommand, split into words
    Command(Vec<String>),
    /// Free text to search for
    Query(String),
}

/// Classify a shell line.
pub fn classify_line(line: &str) -> ShellLine {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return ShellLine::Empty;
    }
    let Some(command) = trimmed.strip_prefix(':') else {
        return ShellLine::Query(trimmed.to_string());
    };
    let words: Vec<String> = command.split_whitespace().map(str::to_string).collect();
    match words.first().map(String::as_str) {
        None => ShellLine::Empty,
        Some("q") | Some("quit") | Some("exit") => ShellLine::Meta(MetaCommand::Quit),
        Some("help") | Some("h") => ShellLine::Meta(MetaCommand::Help),
        Some("clear") => ShellLine::Meta(MetaCommand::Clear),
        Some(_) => ShellLine::Command(words),
    }
}

/// Convert clap ArgMatches into a CliAction.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    let (sub_name, sub_matches) = matches
        .subcommand()
        .ok_or_else(|| "No command provided".to_string())?;

    match sub_name {
        "index" => Ok(CliAction::Index),
        "reconcile" => Ok(CliAction::Reconcile),
        "query" => parse_query(sub_matches),
        "launch" => Ok(CliAction::Launch {
            id: required(sub_matches, "id")?,
        }),
        "fail" => Ok(CliAction::Fail {
            id: required(sub_matches, "id")?,
            code: *sub_matches
                .get_one::<i32>("code")
                .ok_or_else(|| "Missing error code".to_string())?,
        }),
        "stats" => Ok(CliAction::Stats),
        other => Err(format!("Unknown command: {}", other)),
    }
}

fn parse_query(matches: &ArgMatches) -> Result<CliAction, String> {
    let text = matches
        .get_many::<String>("text")
        .ok_or_else(|| "Missing query text".to_string())?
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    let kind = match matches.get_one::<String>("kind") {
        Some(name) => {
            Some(ItemKind::parse(name).ok_or_else(|| format!("Unknown item kind: {}", name))?)
        }
        None => None,
    };
    Ok(CliAction::Query {
        text,
        limit: matches.get_one::<usize>("limit").copied(),
        kind,
        profile: matches.get_flag("profile"),
    })
}

fn required(matches: &ArgMatches, name: &str) -> Result<String, String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .ok_or_else(|| format!("Missing {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{build_cli, build_shell_cmd};

    fn action(args: &[&str]) -> CliAction {
        let matches = build_cli().try_get_matches_from(args).unwrap();
        matches_to_action(&matches).unwrap()
    }

    #[test]
    fn test_query_action() {
        assert_eq!(
            action(&["launchdex", "query", "q4", "reort", "--kind", "file", "--profile"]),
            CliAction::Query {
                text: "q4 reort".to_string(),
                limit: None,
                kind: Some(ItemKind::File),
                profile: true,
            }
        );
    }

    #[test]
    fn test_feedback_actions() {
        assert_eq!(
            action(&["launchdex", "launch", "app:code"]),
            CliAction::Launch {
                id: "app:code".to_string()
            }
        );
        assert_eq!(
            action(&["launchdex", "fail", "app:code", "2"]),
            CliAction::Fail {
                id: "app:code".to_string(),
                code: 2
            }
        );
    }

    #[test]
    fn test_shell_line_classification() {
        assert_eq!(classify_line("   "), ShellLine::Empty);
        assert_eq!(classify_line("# comment"), ShellLine::Empty);
        assert_eq!(classify_line(":q"), ShellLine::Meta(MetaCommand::Quit));
        assert_eq!(classify_line(":help"), ShellLine::Meta(MetaCommand::Help));
        assert_eq!(
            classify_line("  visual code "),
            ShellLine::Query("visual code".to_string())
        );
        assert_eq!(
            classify_line(":launch app:code"),
            ShellLine::Command(vec!["launch".to_string(), "app:code".to_string()])
        );
    }

    #[test]
    fn test_shell_command_parses_through_multicall() {
        let ShellLine::Command(words) = classify_line(":reconcile") else {
            panic!("expected a command");
        };
        let matches = build_shell_cmd().try_get_matches_from(words).unwrap();
        assert_eq!(matches_to_action(&matches).unwrap(), CliAction::Reconcile);
    }
}
