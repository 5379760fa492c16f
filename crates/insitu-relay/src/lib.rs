//! # insitu-relay
//!
//! Edit a file in place through an external filter command.
//!
//! The file is both the filter's input and its output destination. The relay
//! reads the file ahead of where it writes, and never lets a write pass the
//! read position:
//!
//! ```text
//!   0                 write cursor        read cursor                 EOF
//!   ├── filter output ──────┤░░░ credit ░░░┤──── not read yet ────────┤
//! ```
//!
//! Output that arrives while the credit is spent waits in an overflow buffer
//! until more of the file has been read, or until the filter is done.
//!
//! ## Components
//! - [`OverflowBuffer`]: block queue for output the file cannot take yet
//! - [`Credit`]: bytes read but not yet overwritten
//! - [`DiskWriter`]: credit-bounded writes, spilling into the overflow buffer
//! - [`RelayEngine`]: the poll loop between file, filter stdin and stdout
//! - [`finalize`]: flush the backlog, collect the exit status, truncate
//! - [`spawn_filter`]: `$SHELL -c <command>` with both pipes captured

mod credit;
mod engine;
mod error;
mod finalize;
mod io;
mod launch;
mod overflow;
mod writer;

#[cfg(test)]
mod testing;

pub use credit::Credit;
pub use engine::{RelayEngine, RelayReport, RelayState, Relayed};
pub use error::{RelayError, Result};
pub use finalize::{finalize, Outcome};
pub use io::{FilterChannel, FilterProcess, FilterStatus, Interest, Readiness, TargetFile};
pub use launch::{ignore_sigpipe, spawn_filter, FilterChild, PipeChannel};
pub use overflow::OverflowBuffer;
pub use writer::DiskWriter;

use std::fs::File;
use std::path::PathBuf;

use insitu_config::{log_relay_debug, Config, RelayConfig};

/// Knobs for one in-place edit.
#[derive(Debug, Clone)]
pub struct EditOptions {
    pub relay: RelayConfig,
    /// Interpreter for the command, run as `<shell> -c <command>`
    pub shell: PathBuf,
    /// Truncate even if the filter fails
    pub force_truncate: bool,
}

impl EditOptions {
    pub fn from_config(config: &Config, force_truncate: bool) -> Self {
        Self {
            relay: config.relay.clone(),
            shell: config.shell.program(),
            force_truncate,
        }
    }
}

/// Run `command` over `file`, rewriting it in place.
///
/// `file` must be open for reading and writing with its cursor at 0.
pub fn edit_in_place(file: File, command: &str, options: &EditOptions) -> Result<Outcome> {
    let (channel, mut child) = spawn_filter(command, &options.shell)?;
    log_relay_debug!(
        "Filter started",
        pid = child.id(),
        shell = options.shell.display().to_string(),
    );

    let relayed = RelayEngine::new(file, channel, &options.relay).run()?;
    finalize(relayed, &mut child, options.force_truncate)
}
