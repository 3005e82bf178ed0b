//! launchdex CLI: index, search and feed back launches from a terminal.
//!
//! Modes:
//! - **Command mode**: `launchdex [flags] COMMAND`, runs one command and exits
//! - **Shell**: `launchdex shell` or no command on a TTY, interactive prompt
//! - **Pipe mode**: `echo "q4 report" | launchdex`, one line per query
//!
//! Logs go to stderr; `RUST_LOG` overrides the default `info` filter.

mod commands;
mod format;
mod parse;
mod provider;
mod shell;
mod state;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::ArgMatches;
use launchdex_core::{EngineConfig, Error, CONFIG_FILE_NAME};
use launchdex_engine::{IndexHandle, DEFAULT_DEBOUNCE};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use commands::build_cli;
use format::{format_config_check, format_error, format_output, OutputMode};
use parse::matches_to_action;
use provider::FsWalkProvider;
use state::SessionState;

const DEFAULT_DATA_DIR: &str = ".launchdex";

fn main() {
    init_tracing();
    let matches = build_cli().get_matches();
    let mode = if matches.get_flag("raw") {
        OutputMode::Raw
    } else {
        OutputMode::Human
    };

    // check-config never opens the index.
    if let Some(("check-config", sub)) = matches.subcommand() {
        process::exit(run_check_config(&matches, sub, mode));
    }

    let (config, config_path) = match load_config(&matches) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(1);
        }
    };
    let handle = match open_index(&matches, config) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(1);
        }
    };
    let state = SessionState::new(handle);

    let exit_code = match matches.subcommand_name() {
        Some("shell") => {
            run_interactive(&state, config_path, mode);
            0
        }
        Some(_) => run_command(&matches, &state, mode),
        None if std::io::stdin().is_terminal() => {
            run_interactive(&state, config_path, mode);
            0
        }
        None => shell::run_pipe(&state, mode),
    };
    drop(state);
    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn data_dir(matches: &ArgMatches) -> Option<PathBuf> {
    if matches.get_flag("ephemeral") {
        return None;
    }
    Some(
        matches
            .get_one::<String>("data-dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
    )
}

fn config_path(matches: &ArgMatches) -> Option<PathBuf> {
    matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .or_else(|| data_dir(matches).map(|dir| dir.join(CONFIG_FILE_NAME)))
}

/// Load the config, creating a default file inside a fresh data dir.
fn load_config(matches: &ArgMatches) -> Result<(EngineConfig, Option<PathBuf>), Error> {
    let explicit = matches.contains_id("config");
    let path = config_path(matches);
    let mut config = match &path {
        Some(path) => {
            if !explicit {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                EngineConfig::write_default_if_missing(path)?;
            }
            EngineConfig::from_file(path)?
        }
        None => EngineConfig::default(),
    };
    if let Some(extra) = matches.get_many::<String>("root") {
        config.discovery_roots.extend(extra.map(PathBuf::from));
        config.validate()?;
    }
    Ok((config, path))
}

fn open_index(matches: &ArgMatches, config: EngineConfig) -> Result<IndexHandle, Error> {
    let mut builder = IndexHandle::builder(config).provider(Arc::new(FsWalkProvider::new()));
    if let Some(dir) = data_dir(matches) {
        builder = builder.data_dir(dir);
    }
    builder.build()
}

fn run_command(matches: &ArgMatches, state: &SessionState, mode: OutputMode) -> i32 {
    let action = match matches_to_action(matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("(error) {}", e);
            return 1;
        }
    };
    match state.execute(action) {
        Ok(output) => {
            let formatted = format_output(&output, mode);
            if !formatted.is_empty() {
                println!("{}", formatted);
            }
            0
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            1
        }
    }
}

fn run_interactive(state: &SessionState, config_path: Option<PathBuf>, mode: OutputMode) {
    state.index_in_background();
    let _watcher = config_path.and_then(|path| {
        match state.handle().watch_config(&path, DEFAULT_DEBOUNCE) {
            Ok(watcher) => {
                info!(target: "launchdex::config", path = %path.display(), "Watching config");
                Some(watcher)
            }
            Err(e) => {
                warn!(target: "launchdex::config", error = %e, "Config reload disabled");
                None
            }
        }
    });
    shell::run_shell(state, mode);
}

fn run_check_config(matches: &ArgMatches, sub: &ArgMatches, mode: OutputMode) -> i32 {
    let Some(path) = sub
        .get_one::<String>("file")
        .map(PathBuf::from)
        .or_else(|| config_path(matches))
    else {
        eprintln!("(error) No config file given");
        return 1;
    };
    let display = path.display().to_string();
    match EngineConfig::from_file(&path) {
        Ok(_) => {
            println!("{}", format_config_check(&display, &Ok(()), mode));
            0
        }
        Err(Error::ConfigValidation(e)) => {
            println!("{}", format_config_check(&display, &Err(e), mode));
            1
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            2
        }
    }
}
