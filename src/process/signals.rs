//! Signal Discipline
//!
//! Interactive sessions install handlers for SIGINT, SIGCHLD and SIGWINCH.
//! Handlers do only async-signal-safe work: they write the signal number as
//! one byte to a self-pipe whose read end the main loop drains. Running
//! trap commands and updating job state happens in the main loop, never in
//! a handler. Children reset every catchable signal to the default
//! disposition before exec.

use nix::sys::signal::{signal, SigHandler, Signal};
use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};

static SELF_PIPE_WRITE: AtomicI32 = AtomicI32::new(-1);

extern "C" fn note_signal(sig: libc::c_int) {
    let fd = SELF_PIPE_WRITE.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = sig as u8;
        unsafe {
            libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
        }
    }
}

/// Owns the self-pipe read end and which signals are routed through it.
#[derive(Debug)]
pub struct SignalManager {
    read_fd: RawFd,
}

impl SignalManager {
    /// Install the interactive-shell dispositions: SIGINT and SIGCHLD (and
    /// SIGWINCH) note themselves on the self-pipe; the job-stopping signals
    /// are ignored so the shell itself cannot be suspended by its children.
    pub fn install_interactive() -> io::Result<Self> {
        let manager = Self::new()?;
        unsafe {
            signal(Signal::SIGINT, SigHandler::Handler(note_signal))
                .map_err(io::Error::from)?;
            signal(Signal::SIGCHLD, SigHandler::Handler(note_signal))
                .map_err(io::Error::from)?;
            signal(Signal::SIGWINCH, SigHandler::Handler(note_signal))
                .map_err(io::Error::from)?;
            signal(Signal::SIGQUIT, SigHandler::SigIgn).map_err(io::Error::from)?;
            signal(Signal::SIGTSTP, SigHandler::SigIgn).map_err(io::Error::from)?;
            signal(Signal::SIGTTIN, SigHandler::SigIgn).map_err(io::Error::from)?;
            signal(Signal::SIGTTOU, SigHandler::SigIgn).map_err(io::Error::from)?;
        }
        Ok(manager)
    }

    /// Non-interactive shells only route SIGCHLD for background reaping.
    pub fn install_script() -> io::Result<Self> {
        let manager = Self::new()?;
        unsafe {
            signal(Signal::SIGCHLD, SigHandler::Handler(note_signal))
                .map_err(io::Error::from)?;
        }
        Ok(manager)
    }

    fn new() -> io::Result<Self> {
        let mut fds = [0i32; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        for f in fds {
            let flags = unsafe { libc::fcntl(f, libc::F_GETFL) };
            unsafe { libc::fcntl(f, libc::F_SETFL, flags | libc::O_NONBLOCK) };
            let fd_flags = unsafe { libc::fcntl(f, libc::F_GETFD) };
            unsafe { libc::fcntl(f, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC) };
        }
        SELF_PIPE_WRITE.store(fds[1], Ordering::SeqCst);
        Ok(SignalManager { read_fd: fds[0] })
    }

    /// Route an additional signal (a `trap`ped one) through the self-pipe.
    pub fn watch(&self, sig: Signal) -> io::Result<()> {
        unsafe { signal(sig, SigHandler::Handler(note_signal)) }
            .map(|_| ())
            .map_err(io::Error::from)
    }

    /// Stop routing a signal: restore the default disposition.
    pub fn unwatch(&self, sig: Signal) -> io::Result<()> {
        unsafe { signal(sig, SigHandler::SigDfl) }
            .map(|_| ())
            .map_err(io::Error::from)
    }

    /// Drain pending signal bytes. Never blocks.
    pub fn pending(&self) -> Vec<i32> {
        let mut out = Vec::new();
        let mut byte = 0u8;
        loop {
            let n = unsafe {
                libc::read(
                    self.read_fd,
                    &mut byte as *mut u8 as *mut libc::c_void,
                    1,
                )
            };
            if n == 1 {
                out.push(byte as i32);
            } else {
                return out;
            }
        }
    }
}

/// Every catchable signal back to SIG_DFL; the single primitive every
/// forked child runs before exec.
pub fn reset_child_signals() {
    for sig in Signal::iterator() {
        if matches!(sig, Signal::SIGKILL | Signal::SIGSTOP) {
            continue;
        }
        unsafe {
            let _ = signal(sig, SigHandler::SigDfl);
        }
    }
}

pub fn ignore_sigttou() {
    unsafe {
        let _ = signal(Signal::SIGTTOU, SigHandler::SigIgn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_pipe_reports_raised_signal() {
        let manager = SignalManager::install_script().unwrap();
        manager.watch(Signal::SIGUSR1).unwrap();
        unsafe {
            libc::raise(libc::SIGUSR1);
        }
        let pending = manager.pending();
        assert!(pending.contains(&(libc::SIGUSR1)));
        manager.unwatch(Signal::SIGUSR1).unwrap();
    }

    #[test]
    fn pending_is_nonblocking_when_empty() {
        let manager = SignalManager::install_script().unwrap();
        // no signal raised; must return immediately
        let _ = manager.pending();
    }
}
