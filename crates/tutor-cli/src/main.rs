use std::process;

use tutor_cli::{build_cli, parse_command, ExitStatus, Session};
use tutor_core::init_tracing_with_level;

fn main() {
    let matches = build_cli().get_matches();
    process::exit(run(&matches).code());
}

fn run(matches: &clap::ArgMatches) -> ExitStatus {
    let (command, options) = match parse_command(matches) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitStatus::Fatal;
        }
    };

    let mut session = match Session::from_options(&options) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitStatus::Fatal;
        }
    };

    // A debug flag in the configuration file counts as well.
    init_tracing_with_level(if session.config().debug { "debug" } else { "info" });

    match session.handle_command(command) {
        Ok(status) => status,
        Err(e) => {
            session.notifier().on_error(&format!("{e:#}"));
            ExitStatus::Fatal
        }
    }
}
