//! Clap command tree definition.
//!
//! The same subcommands serve shell invocations (`launchdex query notes`)
//! and the interactive shell's `:`-prefixed commands.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("launchdex")
        .about("Local search index for desktop launchers")
        .subcommand_required(false)
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .help("Index directory (default: .launchdex)")
                .global(true),
        )
        .arg(
            Arg::new("ephemeral")
                .long("ephemeral")
                .help("In-memory index, nothing written to disk")
                .action(ArgAction::SetTrue)
                .conflicts_with("data-dir")
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Config file (default: <data-dir>/launchdex.toml)")
                .global(true),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .help("Extra discovery root, may be repeated")
                .action(ArgAction::Append)
                .global(true),
        )
        .arg(
            Arg::new("raw")
                .long("raw")
                .help("Raw output: tab-separated fields, no decoration")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_index())
        .subcommand(build_query())
        .subcommand(build_launch())
        .subcommand(build_fail())
        .subcommand(build_stats())
        .subcommand(build_shell())
        .subcommand(build_check_config())
}

/// Command tree for the interactive shell (no global flags).
pub fn build_shell_cmd() -> Command {
    Command::new("shell")
        .multicall(true)
        .subcommand_required(true)
        .subcommand(build_index())
        .subcommand(build_reconcile())
        .subcommand(build_query())
        .subcommand(build_launch())
        .subcommand(build_fail())
        .subcommand(build_stats())
}

fn build_index() -> Command {
    Command::new("index").about("Walk the discovery roots and update the index")
}

fn build_reconcile() -> Command {
    Command::new("reconcile").about("Run a full reconciliation pass now")
}

fn build_query() -> Command {
    Command::new("query")
        .about("Search the index")
        .arg(
            Arg::new("text")
                .required(true)
                .num_args(1..)
                .help("Query text"),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .short('n')
                .value_parser(clap::value_parser!(usize))
                .help("Maximum results (capped by max_results)"),
        )
        .arg(
            Arg::new("kind")
                .long("kind")
                .value_parser(["app", "file", "folder", "command"])
                .help("Only return items of this kind"),
        )
        .arg(
            Arg::new("profile")
                .long("profile")
                .action(ArgAction::SetTrue)
                .help("Print per-stage latency"),
        )
}

fn build_launch() -> Command {
    Command::new("launch")
        .about("Record a successful launch")
        .arg(Arg::new("id").required(true).help("Item id"))
}

fn build_fail() -> Command {
    Command::new("fail")
        .about("Record a failed launch")
        .arg(Arg::new("id").required(true).help("Item id"))
        .arg(
            Arg::new("code")
                .required(true)
                .value_parser(clap::value_parser!(i32))
                .allow_negative_numbers(true)
                .help("Launcher error code (2/3 missing, 5 access denied)"),
        )
}

fn build_stats() -> Command {
    Command::new("stats").about("Show index and worker statistics")
}

fn build_shell() -> Command {
    Command::new("shell").about("Interactive search prompt with live config reload")
}

fn build_check_config() -> Command {
    Command::new("check-config")
        .about("Validate a config file without opening the index")
        .arg(Arg::new("file").help("Config file to check"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli().debug_assert();
        build_shell_cmd().debug_assert();
    }

    #[test]
    fn test_query_collects_words() {
        let matches = build_cli()
            .try_get_matches_from(["launchdex", "query", "q4", "reort", "-n", "5"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "query");
        let words: Vec<&String> = sub.get_many::<String>("text").unwrap().collect();
        assert_eq!(words, vec!["q4", "reort"]);
        assert_eq!(sub.get_one::<usize>("limit"), Some(&5));
    }

    #[test]
    fn test_ephemeral_conflicts_with_data_dir() {
        let result = build_cli().try_get_matches_from([
            "launchdex",
            "--ephemeral",
            "--data-dir",
            "x",
            "stats",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_shell_commands_parse_without_binary_name() {
        let matches = build_shell_cmd()
            .try_get_matches_from(["fail", "file:/tmp/a", "-5"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "fail");
        assert_eq!(sub.get_one::<i32>("code"), Some(&-5));
    }
}
