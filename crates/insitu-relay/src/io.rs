//! I/O seams between the relay and the outside world.
//!
//! The engine only talks to the file, the filter's pipes and the filter's exit
//! status through these traits, so the whole relay can run against in-memory
//! doubles in tests.

use std::fs::File;
use std::io::{self, Seek, Write};
use std::os::unix::fs::FileExt;

/// The file being edited: positioned reads, sequential writes.
///
/// Reads never move the write cursor, writes always land at it.
pub trait TargetFile {
    /// Read up to `buf.len()` bytes at `offset` (`pread`).
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Write at the write cursor and advance it by the amount written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Current write cursor.
    fn position(&mut self) -> io::Result<u64>;

    /// Cut the file to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl TargetFile for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        FileExt::read_at(self, buf, offset)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(self, buf)
    }

    fn position(&mut self) -> io::Result<u64> {
        Seek::stream_position(self)
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

impl<T: TargetFile + ?Sized> TargetFile for &mut T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn position(&mut self) -> io::Result<u64> {
        (**self).position()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        (**self).truncate(len)
    }
}

/// Which endpoints the engine wants to hear about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interest {
    /// Filter input is writable
    pub send: bool,
    /// Filter output is readable (or hung up)
    pub recv: bool,
}

/// Which endpoints are ready after a wait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub send: bool,
    pub recv: bool,
}

/// Both pipes of a running filter, seen from our side.
pub trait FilterChannel {
    /// Block until at least one endpoint in `interest` is ready. No timeout.
    fn wait(&mut self, interest: Interest) -> io::Result<Readiness>;

    /// Write to the filter's stdin. `Ok(0)` means the pipe is full right now.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read from the filter's stdout. `Ok(0)` means the filter closed it.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Close the filter's stdin so it sees end of input. Idempotent.
    fn close_input(&mut self);
}

/// How the filter process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
    Exited(i32),
    Signaled(i32),
}

impl FilterStatus {
    pub fn success(&self) -> bool {
        matches!(self, FilterStatus::Exited(0))
    }

    /// Exit code to propagate; signals map to `128 + signo` like a shell does.
    pub fn exit_code(&self) -> i32 {
        match *self {
            FilterStatus::Exited(code) => code,
            FilterStatus::Signaled(signo) => 128 + signo,
        }
    }
}

/// Handle on the filter process; the exit status is consumed once.
pub trait FilterProcess {
    fn wait(&mut self) -> io::Result<FilterStatus>;
}
