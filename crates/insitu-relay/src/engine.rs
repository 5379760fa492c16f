//! Relay engine: the readiness loop between the file and the filter.
//!
//! ```text
//!            pread (read_cursor)              send
//!   file ─────────────────────▶ window ───────────────▶ filter stdin
//!    ▲                                                      │
//!    │  write (≤ credit)                                    ▼
//!    └──────── DiskWriter ◀──── overflow ◀──── recv ── filter stdout
//! ```
//!
//! States: `Open` → `FileDrained` (file exhausted, filter stdin closed) →
//! `Done` (filter stdout closed).

use std::io;

use insitu_config::{log_relay_debug, log_relay_trace, RelayConfig};

use crate::error::{RelayError, Result};
use crate::io::{FilterChannel, Interest, TargetFile};
use crate::writer::DiskWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// File not yet exhausted
    Open,
    /// File fully read (or filter stopped reading); filter stdin closed
    FileDrained,
    /// Filter closed its stdout
    Done,
}

impl RelayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayState::Open => "open",
            RelayState::FileDrained => "file_drained",
            RelayState::Done => "done",
        }
    }
}

/// Most recently read file bytes; `sent..len` still has to reach the filter.
struct ReadWindow {
    buf: Vec<u8>,
    len: usize,
    sent: usize,
}

impl ReadWindow {
    fn new(size: usize) -> Self {
        Self {
            buf: vec![0u8; size],
            len: 0,
            sent: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.sent == self.len
    }

    fn pending(&self) -> &[u8] {
        &self.buf[self.sent..self.len]
    }

    fn refill(&mut self, len: usize) {
        self.len = len;
        self.sent = 0;
    }

    fn advance(&mut self, n: usize) {
        self.sent = (self.sent + n).min(self.len);
    }
}

/// Byte counts for one relay run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub bytes_read: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Written straight to disk during the loop (not via finalization)
    pub bytes_written: u64,
    pub peak_overflow_blocks: usize,
}

/// Everything the finalizer needs once the loop is over.
pub struct Relayed<F, C> {
    pub writer: DiskWriter<F>,
    pub channel: C,
    pub report: RelayReport,
}

pub struct RelayEngine<F, C> {
    writer: DiskWriter<F>,
    channel: C,
    window: ReadWindow,
    recv_buf: Vec<u8>,
    read_cursor: u64,
    state: RelayState,
    report: RelayReport,
}

impl<F: TargetFile, C: FilterChannel> RelayEngine<F, C> {
    pub fn new(file: F, channel: C, config: &RelayConfig) -> Self {
        Self {
            writer: DiskWriter::new(file, config.block_size()),
            channel,
            window: ReadWindow::new(config.window_size()),
            recv_buf: vec![0u8; config.block_size()],
            read_cursor: 0,
            state: RelayState::Open,
            report: RelayReport::default(),
        }
    }

    /// Run until the filter closes its output.
    pub fn run(mut self) -> Result<Relayed<F, C>> {
        log_relay_debug!(
            "Relay started",
            window = self.window.buf.len(),
            block = self.recv_buf.len(),
        );

        while self.state != RelayState::Done {
            if self.state == RelayState::Open && self.window.is_empty() {
                self.fill_window()?;
            }

            let interest = Interest {
                send: self.state == RelayState::Open && !self.window.is_empty(),
                recv: true,
            };
            if self.state == RelayState::Open && !interest.send {
                // The read was interrupted; retry it before blocking.
                continue;
            }

            let ready = match self.channel.wait(interest) {
                Ok(ready) => ready,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(RelayError::Wait(e)),
            };

            if ready.send {
                self.send_window()?;
            }
            if ready.recv {
                self.receive()?;
            }
        }

        self.report.bytes_written = self.writer.credit().total_written();
        self.report.peak_overflow_blocks = self.writer.overflow().peak_blocks();
        Ok(Relayed {
            writer: self.writer,
            channel: self.channel,
            report: self.report,
        })
    }

    fn fill_window(&mut self) -> Result<()> {
        match self
            .writer
            .file()
            .read_at(&mut self.window.buf, self.read_cursor)
        {
            Ok(0) => {
                self.channel.close_input();
                self.transition(RelayState::FileDrained);
            }
            Ok(n) => {
                self.read_cursor += n as u64;
                self.window.refill(n);
                self.report.bytes_read += n as u64;
                self.writer.record_read(n)?;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(source) => {
                return Err(RelayError::FileRead {
                    offset: self.read_cursor,
                    source,
                })
            }
        }
        Ok(())
    }

    fn send_window(&mut self) -> Result<()> {
        match self.channel.send(self.window.pending()) {
            Ok(n) => {
                self.window.advance(n);
                self.report.bytes_sent += n as u64;
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                // The filter stopped reading. Its output still counts.
                log_relay_debug!(
                    "Filter closed its input early",
                    read_cursor = self.read_cursor,
                );
                self.channel.close_input();
                self.transition(RelayState::FileDrained);
            }
            Err(e) => return Err(RelayError::FilterInput(e)),
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<()> {
        match self.channel.recv(&mut self.recv_buf) {
            Ok(0) => self.transition(RelayState::Done),
            Ok(n) => {
                self.report.bytes_received += n as u64;
                log_relay_trace!("Filter output", bytes = n);
                self.writer.commit(&self.recv_buf[..n])?;
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) => {}
            Err(e) => return Err(RelayError::FilterOutput(e)),
        }
        Ok(())
    }

    fn transition(&mut self, next: RelayState) {
        log_relay_debug!(
            "State transition",
            from = self.state.as_str(),
            to = next.as_str(),
            read_cursor = self.read_cursor,
        );
        self.state = next;
    }
}
