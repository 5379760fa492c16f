use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that end a relay run.
///
/// `Interrupted` never shows up here; it is retried where it happens.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("failed to read file at offset {offset}: {source}")]
    FileRead {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to write file: {0}")]
    FileWrite(#[source] io::Error),

    #[error("failed to locate write cursor: {0}")]
    Seek(#[source] io::Error),

    #[error("failed to truncate file to {len} bytes: {source}")]
    Truncate {
        len: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to feed filter input: {0}")]
    FilterInput(#[source] io::Error),

    #[error("failed to read filter output: {0}")]
    FilterOutput(#[source] io::Error),

    #[error("readiness wait failed: {0}")]
    Wait(#[source] io::Error),

    #[error("failed to collect filter exit status: {0}")]
    Status(#[source] io::Error),

    #[error("{}: {source}", shell.display())]
    Launch {
        shell: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, RelayError>;
