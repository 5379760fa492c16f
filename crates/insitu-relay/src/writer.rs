//! Disk writer: commits filter output to the file without outrunning reads.

use std::io;

use insitu_config::log_relay_debug;

use crate::credit::Credit;
use crate::error::{RelayError, Result};
use crate::io::TargetFile;
use crate::overflow::OverflowBuffer;

/// Writes filter output at the file's write cursor, never more than the
/// credit allows. Anything that does not fit waits in the overflow buffer.
///
/// Output order is preserved: while a backlog exists, new output queues
/// behind it instead of going straight to disk.
pub struct DiskWriter<F> {
    file: F,
    credit: Credit,
    overflow: OverflowBuffer,
    scratch: Vec<u8>,
}

impl<F: TargetFile> DiskWriter<F> {
    pub fn new(file: F, block_size: usize) -> Self {
        let overflow = OverflowBuffer::new(block_size);
        let scratch = vec![0u8; overflow.block_size()];
        Self {
            file,
            credit: Credit::new(),
            overflow,
            scratch,
        }
    }

    pub fn file(&self) -> &F {
        &self.file
    }

    pub fn credit(&self) -> &Credit {
        &self.credit
    }

    pub fn overflow(&self) -> &OverflowBuffer {
        &self.overflow
    }

    /// Account for `n` bytes read from the file, then move as much of the
    /// backlog to disk as the new credit allows.
    pub fn record_read(&mut self, n: usize) -> Result<()> {
        self.credit.increase(n);
        self.flush_backlog()
    }

    /// Commit `bytes` of filter output: backlog first, then direct writes up
    /// to the credit, then the overflow buffer for the rest.
    pub fn commit(&mut self, bytes: &[u8]) -> Result<()> {
        self.flush_backlog()?;

        let mut rest = bytes;
        if self.overflow.is_empty() {
            let budget = self.credit.budget(rest.len());
            write_fully(&mut self.file, &rest[..budget])?;
            self.credit.decrease(budget);
            rest = &rest[budget..];
        }

        if !rest.is_empty() {
            let blocks = self.overflow.block_count();
            self.overflow.append(rest);
            if self.overflow.block_count() > blocks {
                log_relay_debug!(
                    "Overflow buffer grew",
                    blocks = self.overflow.block_count(),
                    buffered = self.overflow.len(),
                    credit = self.credit.available(),
                );
            }
        }
        Ok(())
    }

    /// Drain the backlog to disk while credit lasts.
    pub fn flush_backlog(&mut self) -> Result<()> {
        while !self.overflow.is_empty() {
            let budget = self.credit.budget(self.scratch.len());
            if budget == 0 {
                break;
            }
            let n = self.overflow.drain(&mut self.scratch[..budget]);
            write_fully(&mut self.file, &self.scratch[..n])?;
            self.credit.decrease(n);
        }
        Ok(())
    }

    pub fn into_parts(self) -> (F, Credit, OverflowBuffer) {
        (self.file, self.credit, self.overflow)
    }
}

/// Write all of `buf` at the file's cursor, retrying on `EINTR` and short
/// writes. A write that makes no progress is an error.
pub(crate) fn write_fully<F: TargetFile>(file: &mut F, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        match file.write(buf) {
            Ok(0) => {
                return Err(RelayError::FileWrite(io::Error::from(
                    io::ErrorKind::WriteZero,
                )))
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(RelayError::FileWrite(e)),
        }
    }
    Ok(())
}
