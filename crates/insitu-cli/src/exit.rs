//! Exit codes and the errors that produce them.
//!
//! Anything else the process exits with is the filter's own status.

use std::io;
use std::path::PathBuf;

use insitu_relay::RelayError;
use thiserror::Error;

/// Wrong number or shape of arguments
pub const EXIT_USAGE: u8 = 128;
/// Target file cannot be opened read-write
pub const EXIT_FILE: u8 = 129;
/// Shell could not be started
pub const EXIT_LAUNCH: u8 = 130;
/// Unrecoverable I/O failure while relaying
pub const EXIT_RELAY: u8 = 131;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to ignore SIGPIPE: {0}")]
    Signal(#[source] io::Error),

    #[error("{0}")]
    Launch(#[source] RelayError),

    #[error("{0}")]
    Relay(#[source] RelayError),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::File { .. } => EXIT_FILE,
            CliError::Signal(_) | CliError::Launch(_) => EXIT_LAUNCH,
            CliError::Relay(_) => EXIT_RELAY,
        }
    }
}

/// Clamp a filter status into a process exit byte.
pub fn status_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(u8::MAX)
}
