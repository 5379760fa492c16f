//! Subprocess launcher: `<shell> -c <command>` with both pipes wired to us.

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{signal, SigHandler, Signal};

use crate::error::{RelayError, Result};
use crate::io::{FilterChannel, FilterProcess, FilterStatus, Interest, Readiness};

/// Ignore `SIGPIPE` so a filter that exits early surfaces as `EPIPE`.
///
/// Children spawned through `std::process::Command` get the default
/// disposition back before exec.
pub fn ignore_sigpipe() -> nix::Result<()> {
    // Safety: SIG_IGN installs no handler code.
    unsafe { signal(Signal::SIGPIPE, SigHandler::SigIgn) }.map(drop)
}

/// Our ends of the filter's stdin and stdout.
pub struct PipeChannel {
    input: Option<ChildStdin>,
    output: ChildStdout,
}

impl PipeChannel {
    /// Wrap the pipes; the input end is switched to non-blocking so a write
    /// never stalls the loop once poll reports it writable.
    pub fn new(input: ChildStdin, output: ChildStdout) -> io::Result<Self> {
        set_nonblocking(input.as_raw_fd())?;
        Ok(Self {
            input: Some(input),
            output,
        })
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

impl FilterChannel for PipeChannel {
    fn wait(&mut self, interest: Interest) -> io::Result<Readiness> {
        let send_fd = match (&self.input, interest.send) {
            (Some(input), true) => Some(input.as_fd()),
            _ => None,
        };
        let recv_fd = interest.recv.then(|| self.output.as_fd());

        let mut fds = Vec::with_capacity(2);
        if let Some(fd) = send_fd {
            fds.push(PollFd::new(fd, PollFlags::POLLOUT));
        }
        if let Some(fd) = recv_fd {
            fds.push(PollFd::new(fd, PollFlags::POLLIN));
        }
        if fds.is_empty() {
            return Ok(Readiness::default());
        }

        poll(&mut fds, PollTimeout::NONE)?;

        // HUP and ERR count as ready: the next read or write reports them.
        let fired = |pfd: &PollFd| pfd.revents().map_or(false, |r| !r.is_empty());
        let mut events = fds.iter();
        let mut ready = Readiness::default();
        if send_fd.is_some() {
            ready.send = events.next().map_or(false, fired);
        }
        if recv_fd.is_some() {
            ready.recv = events.next().map_or(false, fired);
        }
        Ok(ready)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(input) = self.input.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        };
        match input.write(buf) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            other => other,
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.output.read(buf)
    }

    fn close_input(&mut self) {
        self.input = None;
    }
}

/// The running filter process.
pub struct FilterChild {
    child: Child,
}

impl FilterChild {
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl FilterProcess for FilterChild {
    fn wait(&mut self) -> io::Result<FilterStatus> {
        let status = self.child.wait()?;
        Ok(match status.code() {
            Some(code) => FilterStatus::Exited(code),
            None => FilterStatus::Signaled(status.signal().unwrap_or(0)),
        })
    }
}

/// Start `<shell> -c <command>` with piped stdin/stdout; stderr is inherited.
pub fn spawn_filter(command: &str, shell: &Path) -> Result<(PipeChannel, FilterChild)> {
    let launch_error = |source| RelayError::Launch {
        shell: shell.to_path_buf(),
        source,
    };

    let mut child = Command::new(shell)
        .arg("-c")
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(launch_error)?;

    let pipes = match (child.stdin.take(), child.stdout.take()) {
        (Some(input), Some(output)) => PipeChannel::new(input, output),
        _ => Err(io::Error::other("filter pipes were not captured")),
    };
    match pipes {
        Ok(channel) => Ok((channel, FilterChild { child })),
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(launch_error(e))
        }
    }
}
