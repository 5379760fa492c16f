//! Finalizer: flush what is left, collect the filter's status, truncate.

use std::io;

use insitu_config::log_relay_info;

use crate::engine::{RelayReport, Relayed};
use crate::error::{RelayError, Result};
use crate::io::{FilterChannel, FilterProcess, FilterStatus, TargetFile};
use crate::writer::write_fully;

/// Result of a finished edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: FilterStatus,
    /// Exit code to propagate
    pub exit_code: i32,
    pub truncated: bool,
    /// Length of the filter's output, i.e. the write cursor at the end
    pub content_len: u64,
    /// Bytes written from the overflow buffer after the loop ended
    pub flushed: u64,
    pub report: RelayReport,
}

/// Finish a relay run.
///
/// The file is truncated to the end of the new content only when the filter
/// exited 0 or `force_truncate` is set. Otherwise bytes of the old content past
/// the new end are left in place.
pub fn finalize<F, C, P>(
    relayed: Relayed<F, C>,
    process: &mut P,
    force_truncate: bool,
) -> Result<Outcome>
where
    F: TargetFile,
    C: FilterChannel,
    P: FilterProcess,
{
    let Relayed {
        writer,
        mut channel,
        report,
    } = relayed;

    // A filter that closed its output early may still be blocked on input.
    channel.close_input();
    drop(channel);

    // The file has been read to the end, so credit no longer applies.
    let (mut file, _credit, mut overflow) = writer.into_parts();
    let mut scratch = vec![0u8; overflow.block_size()];
    let mut flushed = 0u64;
    loop {
        let n = overflow.drain(&mut scratch);
        if n == 0 {
            break;
        }
        write_fully(&mut file, &scratch[..n])?;
        flushed += n as u64;
    }

    let status = wait_for(process)?;
    let content_len = file.position().map_err(RelayError::Seek)?;

    let truncated = status.success() || force_truncate;
    if truncated {
        file.truncate(content_len)
            .map_err(|source| RelayError::Truncate {
                len: content_len,
                source,
            })?;
    }

    log_relay_info!(
        "Edit finished",
        exit_code = status.exit_code(),
        truncated = truncated,
        content_len = content_len,
        bytes_read = report.bytes_read,
        bytes_written = report.bytes_written + flushed,
        peak_overflow_blocks = report.peak_overflow_blocks,
    );

    Ok(Outcome {
        status,
        exit_code: status.exit_code(),
        truncated,
        content_len,
        flushed,
        report,
    })
}

fn wait_for<P: FilterProcess>(process: &mut P) -> Result<FilterStatus> {
    loop {
        match process.wait() {
            Ok(status) => return Ok(status),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(RelayError::Status(e)),
        }
    }
}
