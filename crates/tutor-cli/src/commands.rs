//! Command definitions and argument parsing
//!
//! Builds the clap command tree for `tutor` and turns parsed arguments into
//! [`TutorCommand`] values.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

/// Available commands
#[derive(Debug, Clone, PartialEq)]
pub enum TutorCommand {
    /// Repair one submission with a patch set
    Fix {
        source: PathBuf,
        patches: PathBuf,
        tests: PathBuf,
        out: Option<PathBuf>,
    },
    /// Learn transformations from a before/after pair, optionally applying
    /// them to another program
    Learn {
        before: PathBuf,
        after: PathBuf,
        grammar: Option<PathBuf>,
        apply: Option<PathBuf>,
        tests: Option<PathBuf>,
    },
    /// Repair every submission in a directory
    Batch {
        dir: PathBuf,
        patches: PathBuf,
        tests: PathBuf,
        out: PathBuf,
    },
    /// List the locations where a pattern matches
    Match { source: PathBuf, pattern: String },
}

/// Options accepted by every command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub debug: bool,
}

fn file_arg(id: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(id)
        .value_name("FILE")
        .help(help)
        .value_parser(value_parser!(PathBuf))
}

fn positional(id: &'static str, index: usize, help: &'static str) -> Arg {
    Arg::new(id)
        .help(help)
        .index(index)
        .required(true)
        .value_parser(value_parser!(PathBuf))
}

pub fn build_cli() -> Command {
    Command::new("tutor")
        .version(tutor_core::VERSION)
        .about("Repair small programs with patches or with transformations learned from one example")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_name("MS")
                .help("Wall-clock budget per candidate run")
                .value_parser(value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("fix")
                .about("Repair a submission with a patch set")
                .arg(positional("source", 1, "Submission to repair"))
                .arg(file_arg("patches", "JSON list of patches").required(true))
                .arg(file_arg("tests", "JSON list of test cases").required(true))
                .arg(file_arg("out", "Write the repaired program here instead of stdout")),
        )
        .subcommand(
            Command::new("learn")
                .about("Learn transformations from a before/after example")
                .arg(positional("before", 1, "Program before the edit"))
                .arg(positional("after", 2, "Program after the edit"))
                .arg(file_arg("grammar", "Edit grammar; the configured or built-in grammar otherwise"))
                .arg(file_arg("apply", "Program to rewrite with the learned transformations"))
                .arg(
                    file_arg("tests", "Validate rewrites of --apply against these test cases").requires("apply"),
                ),
        )
        .subcommand(
            Command::new("batch")
                .about("Repair every submission in a directory")
                .arg(positional("dir", 1, "Directory of submissions"))
                .arg(file_arg("patches", "JSON list of patches").required(true))
                .arg(file_arg("tests", "JSON list of test cases").required(true))
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_name("DIR")
                        .help("Directory for repaired submissions")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("match")
                .about("Show where a pattern matches")
                .arg(positional("source", 1, "Program to search"))
                .arg(
                    Arg::new("pattern")
                        .long("pattern")
                        .value_name("TEXT")
                        .help("Pattern source, e.g. 'n == $1{1}'")
                        .required(true),
                ),
        )
}

/// Parse matched arguments into a command and its global options
pub fn parse_command(matches: &ArgMatches) -> Result<(TutorCommand, GlobalOptions)> {
    let (name, sub) = matches.subcommand().ok_or_else(|| anyhow!("No command given"))?;

    let command = match name {
        "fix" => TutorCommand::Fix {
            source: required_path(sub, "source")?,
            patches: required_path(sub, "patches")?,
            tests: required_path(sub, "tests")?,
            out: sub.get_one::<PathBuf>("out").cloned(),
        },
        "learn" => TutorCommand::Learn {
            before: required_path(sub, "before")?,
            after: required_path(sub, "after")?,
            grammar: sub.get_one::<PathBuf>("grammar").cloned(),
            apply: sub.get_one::<PathBuf>("apply").cloned(),
            tests: sub.get_one::<PathBuf>("tests").cloned(),
        },
        "batch" => TutorCommand::Batch {
            dir: required_path(sub, "dir")?,
            patches: required_path(sub, "patches")?,
            tests: required_path(sub, "tests")?,
            out: required_path(sub, "out")?,
        },
        "match" => TutorCommand::Match {
            source: required_path(sub, "source")?,
            pattern: sub
                .get_one::<String>("pattern")
                .cloned()
                .ok_or_else(|| anyhow!("Usage: tutor match <SOURCE> --pattern <TEXT>"))?,
        },
        other => return Err(anyhow!("Unknown command: {other}")),
    };

    // Global arguments are propagated to the subcommand's matches.
    let options = GlobalOptions {
        config: sub.get_one::<PathBuf>("config").cloned(),
        timeout_ms: sub.get_one::<u64>("timeout-ms").copied(),
        debug: sub.get_flag("debug"),
    };
    Ok((command, options))
}

fn required_path(matches: &ArgMatches, id: &str) -> Result<PathBuf> {
    matches
        .get_one::<PathBuf>(id)
        .cloned()
        .ok_or_else(|| anyhow!("Missing argument: {id}"))
}
