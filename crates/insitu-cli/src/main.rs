//! # insitu CLI
//!
//! Rewrite a file in place through a shell command:
//!
//! ```text
//! insitu [-t] <FILE> <COMMAND>
//! ```
//!
//! The command gets the file on stdin; its stdout replaces the file. The file
//! is truncated to the new length if the command exits 0, or always with `-t`.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use insitu_config::logging::{init_logging, LogLevel};
use insitu_config::{log_cli_debug, log_cli_warn, Config};
use insitu_relay::{edit_in_place, EditOptions, Outcome, RelayError};

mod exit;

use exit::CliError;

/// Edit a file in place through a filter command
#[derive(Parser, Debug)]
#[command(name = "insitu")]
#[command(version, about, long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
#[command(override_usage = "insitu [-t] <FILE> <COMMAND>")]
struct Cli {
    /// Truncate the file to the new length even if the command fails
    #[arg(short = 't')]
    truncate: bool,

    /// File to rewrite
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Shell command; runs as `$SHELL -c <COMMAND>`
    #[arg(value_name = "COMMAND")]
    command: String,
}

/// Pin the argument shape to `[-t] FILE COMMAND`.
///
/// A `--` goes in front of the last two arguments, so only the first of
/// three can be parsed as a flag. With any other count the arguments are
/// left alone and clap reports the arity error.
fn positional_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().collect();
    let split = match args.len() {
        3 => Some(1),
        4 => Some(2),
        _ => None,
    };
    if let Some(at) = split {
        args.insert(at, OsString::from("--"));
    }
    args
}

fn main() -> ExitCode {
    init_logging(LogLevel::Warn);

    let cli = match Cli::try_parse_from(positional_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(exit::EXIT_USAGE);
        }
    };

    match run(&cli) {
        Ok(outcome) => ExitCode::from(exit::status_byte(outcome.exit_code)),
        Err(e) => {
            eprintln!("insitu: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: &Cli) -> Result<Outcome, CliError> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&cli.file)
        .map_err(|source| CliError::File {
            path: cli.file.clone(),
            source,
        })?;

    let options = EditOptions::from_config(&load_config(), cli.truncate);
    log_cli_debug!(
        "Editing in place",
        file = cli.file.display().to_string(),
        shell = options.shell.display().to_string(),
        force_truncate = cli.truncate,
    );

    insitu_relay::ignore_sigpipe().map_err(|errno| CliError::Signal(errno.into()))?;

    let outcome = edit_in_place(file, &cli.command, &options)?;
    if !outcome.truncated && outcome.report.bytes_read > outcome.content_len {
        log_cli_warn!(
            "Filter failed; old bytes left past the new content (use -t to truncate)",
            exit_code = outcome.exit_code,
            content_len = outcome.content_len,
        );
    }
    Ok(outcome)
}

/// Config file problems never block an edit; fall back to defaults.
fn load_config() -> Config {
    let path = Config::config_path();
    Config::load()
        .with_context(|| match &path {
            Some(p) => format!("failed to load config from {}", p.display()),
            None => "failed to load config".to_string(),
        })
        .unwrap_or_else(|e| {
            log_cli_warn!("Using default config", error = format!("{:#}", e));
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        })
}

impl From<RelayError> for CliError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Launch { .. } => CliError::Launch(e),
            other => CliError::Relay(other),
        }
    }
}
