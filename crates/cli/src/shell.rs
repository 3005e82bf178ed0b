//! Interactive prompt and pipe mode.
//!
//! Every line is a query unless it starts with `:`. Pipe mode reads the same
//! line syntax from stdin without a prompt.

use std::io::{self, BufRead, Write};

use crate::commands::build_shell_cmd;
use crate::format::{format_error, format_output, OutputMode};
use crate::parse::{classify_line, matches_to_action, MetaCommand, ShellLine};
use crate::state::SessionState;

/// What the loop should do after a line.
enum Flow {
    Continue,
    Quit,
}

/// Run the interactive prompt until `:quit` or end of input.
pub fn run_shell(state: &SessionState, mode: OutputMode) {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{}", state.prompt());
        if io::stdout().flush().is_err() {
            break;
        }
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("(error) {}", e);
                break;
            }
            None => break,
        };
        let (flow, _) = execute_line(&line, state, mode);
        if let Flow::Quit = flow {
            break;
        }
    }
}

/// Run lines from stdin. Returns 1 if any line failed.
pub fn run_pipe(state: &SessionState, mode: OutputMode) -> i32 {
    let stdin = io::stdin();
    let mut exit_code = 0;
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        let (flow, ok) = execute_line(&line, state, mode);
        if !ok {
            exit_code = 1;
        }
        if let Flow::Quit = flow {
            break;
        }
    }
    exit_code
}

fn execute_line(line: &str, state: &SessionState, mode: OutputMode) -> (Flow, bool) {
    match classify_line(line) {
        ShellLine::Empty => (Flow::Continue, true),
        ShellLine::Meta(MetaCommand::Quit) => (Flow::Quit, true),
        ShellLine::Meta(MetaCommand::Clear) => {
            print!("\x1B[2J\x1B[1;1H");
            (Flow::Continue, true)
        }
        ShellLine::Meta(MetaCommand::Help) => {
            print_help();
            (Flow::Continue, true)
        }
        ShellLine::Query(text) => {
            print_nonempty(&format_output(&state.query(&text, None, None, false), mode));
            (Flow::Continue, true)
        }
        ShellLine::Command(words) => {
            let matches = match build_shell_cmd().try_get_matches_from(words) {
                Ok(matches) => matches,
                Err(e) => {
                    eprintln!("{}", e);
                    return (Flow::Continue, false);
                }
            };
            let action = match matches_to_action(&matches) {
                Ok(action) => action,
                Err(e) => {
                    eprintln!("(error) {}", e);
                    return (Flow::Continue, false);
                }
            };
            match state.execute(action) {
                Ok(output) => {
                    print_nonempty(&format_output(&output, mode));
                    (Flow::Continue, true)
                }
                Err(e) => {
                    eprintln!("{}", format_error(&e, mode));
                    (Flow::Continue, false)
                }
            }
        }
    }
}

fn print_nonempty(text: &str) {
    if !text.is_empty() {
        println!("{}", text);
    }
}

fn print_help() {
    println!("Type to search. Commands:");
    println!("  :query <text> [-n N] [--kind K] [--profile]");
    println!("  :launch <id>          record a successful launch");
    println!("  :fail <id> <code>     record a failed launch");
    println!("  :index                bootstrap from discovery roots");
    println!("  :reconcile            full reconciliation pass");
    println!("  :stats                index statistics");
    println!("  :clear  :help  :quit");
}
