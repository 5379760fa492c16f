//! In-memory doubles for the I/O seams.
//!
//! `MemFile` panics the moment a write lands on an original byte that has not
//! been read yet, so every relay test doubles as a check of the credit rule.

use std::cell::Cell;
use std::collections::VecDeque;
use std::io;

use crate::io::{FilterChannel, FilterProcess, FilterStatus, Interest, Readiness, TargetFile};

fn interrupted() -> io::Error {
    io::Error::from(io::ErrorKind::Interrupted)
}

/// Fails every `every`-th call with `Interrupted` when enabled.
#[derive(Default)]
struct Interrupter {
    every: Option<usize>,
    calls: Cell<usize>,
    fired: Cell<usize>,
}

impl Interrupter {
    fn hit(&self) -> bool {
        let Some(every) = self.every else {
            return false;
        };
        let calls = self.calls.get() + 1;
        self.calls.set(calls);
        if calls % every == 0 {
            self.fired.set(self.fired.get() + 1);
            true
        } else {
            false
        }
    }
}

pub(crate) struct MemFile {
    data: Vec<u8>,
    original_len: u64,
    cursor: usize,
    /// Furthest original offset handed out by `read_at`
    read_end: Cell<u64>,
    /// Cap on bytes moved per read/write call
    max_io: usize,
    interrupter: Interrupter,
}

impl MemFile {
    pub(crate) fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            original_len: data.len() as u64,
            cursor: 0,
            read_end: Cell::new(0),
            max_io: usize::MAX,
            interrupter: Interrupter::default(),
        }
    }

    /// Short reads and writes of at most `max` bytes.
    pub(crate) fn with_max_io(mut self, max: usize) -> Self {
        self.max_io = max;
        self
    }

    pub(crate) fn interrupting_every(mut self, every: usize) -> Self {
        self.interrupter.every = Some(every);
        self
    }

    pub(crate) fn contents(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn interrupts(&self) -> usize {
        self.interrupter.fired.get()
    }
}

impl TargetFile for MemFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if self.interrupter.hit() {
            return Err(interrupted());
        }
        let start = (offset as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start).min(self.max_io);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        let end = (start + n) as u64;
        if end > self.read_end.get() {
            self.read_end.set(end);
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.interrupter.hit() {
            return Err(interrupted());
        }
        let n = buf.len().min(self.max_io);
        let start = self.cursor as u64;
        let end = start + n as u64;
        let unread = self.read_end.get()..self.original_len;
        assert!(
            unread.is_empty() || end <= unread.start || start >= unread.end,
            "write of {start}..{end} clobbers unread source bytes {unread:?}"
        );

        if self.data.len() < self.cursor + n {
            self.data.resize(self.cursor + n, 0);
        }
        self.data[self.cursor..self.cursor + n].copy_from_slice(&buf[..n]);
        self.cursor += n;
        Ok(n)
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.cursor as u64)
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.data.resize(len as usize, 0);
        Ok(())
    }
}

/// What the scripted filter does with its input.
pub(crate) enum Script {
    /// Echo input as it arrives
    Identity,
    /// Emit every input byte `n` times, as it arrives
    Repeat(usize),
    /// Swallow everything, then emit `f(input)` once input is closed
    Buffered(fn(&[u8]) -> Vec<u8>),
    /// Echo the first `n` bytes, then stop reading and close output (`head -c`)
    Head(usize),
}

pub(crate) struct ScriptedFilter {
    script: Script,
    input_open: bool,
    reader_gone: bool,
    received: Vec<u8>,
    pending: VecDeque<u8>,
    /// Bytes accepted per `send`
    pipe_capacity: usize,
    /// Bytes returned per `recv`
    out_chunk: usize,
    interrupter: Interrupter,
}

impl ScriptedFilter {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            input_open: true,
            reader_gone: false,
            received: Vec::new(),
            pending: VecDeque::new(),
            pipe_capacity: usize::MAX,
            out_chunk: usize::MAX,
            interrupter: Interrupter::default(),
        }
    }

    pub(crate) fn with_pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity;
        self
    }

    pub(crate) fn with_out_chunk(mut self, chunk: usize) -> Self {
        self.out_chunk = chunk;
        self
    }

    pub(crate) fn interrupting_every(mut self, every: usize) -> Self {
        self.interrupter.every = Some(every);
        self
    }

    pub(crate) fn received(&self) -> &[u8] {
        &self.received
    }

    pub(crate) fn input_open(&self) -> bool {
        self.input_open
    }

    pub(crate) fn interrupts(&self) -> usize {
        self.interrupter.fired.get()
    }

    fn output_closed(&self) -> bool {
        !self.input_open || self.reader_gone
    }
}

impl FilterChannel for ScriptedFilter {
    fn wait(&mut self, interest: Interest) -> io::Result<Readiness> {
        if self.interrupter.hit() {
            return Err(interrupted());
        }
        let ready = Readiness {
            send: interest.send && self.input_open,
            recv: interest.recv && (!self.pending.is_empty() || self.output_closed()),
        };
        if ready == Readiness::default() {
            return Err(io::Error::other("relay would block forever"));
        }
        Ok(ready)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.interrupter.hit() {
            return Err(interrupted());
        }
        if !self.input_open || self.reader_gone {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        let n = buf.len().min(self.pipe_capacity);
        let chunk = &buf[..n];
        self.received.extend_from_slice(chunk);
        match self.script {
            Script::Identity => self.pending.extend(chunk),
            Script::Repeat(times) => {
                for &b in chunk {
                    self.pending.extend(std::iter::repeat(b).take(times));
                }
            }
            Script::Buffered(_) => {}
            Script::Head(limit) => {
                let already = self.received.len() - n;
                let keep = limit.saturating_sub(already).min(n);
                self.pending.extend(&chunk[..keep]);
                if self.received.len() >= limit {
                    self.reader_gone = true;
                }
            }
        }
        Ok(n)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.interrupter.hit() {
            return Err(interrupted());
        }
        let n = buf.len().min(self.pending.len()).min(self.out_chunk);
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn close_input(&mut self) {
        if !self.input_open {
            return;
        }
        self.input_open = false;
        if let Script::Buffered(transform) = self.script {
            self.pending.extend(transform(&self.received));
        }
    }
}

pub(crate) struct ScriptedProcess {
    pub(crate) status: FilterStatus,
    pub(crate) waits: usize,
}

impl ScriptedProcess {
    pub(crate) fn exiting(code: i32) -> Self {
        Self {
            status: FilterStatus::Exited(code),
            waits: 0,
        }
    }
}

impl FilterProcess for ScriptedProcess {
    fn wait(&mut self) -> io::Result<FilterStatus> {
        self.waits += 1;
        Ok(self.status)
    }
}
