//! Process Substitution Bookkeeping
//!
//! `<(cmd)` and `>(cmd)` hand the parent a `/dev/fd/N` path backed by a
//! pipe to a child process. The pipe end and the child pid must outlive the
//! redirect setup and are cleaned up only after the command using them has
//! finished: scope exit closes the descriptors and reaps the children.

use crate::io::fd;
use crate::process::wait::wait_for;
use std::os::unix::io::RawFd;

pub fn dev_fd_path(fd_num: RawFd) -> String {
    format!("/dev/fd/{fd_num}")
}

/// One live substitution: the parent-held pipe end and the child running
/// the command.
#[derive(Debug)]
pub struct ProcSubEntry {
    pub fd: RawFd,
    pub pid: i32,
}

/// Tracks substitutions for the command currently being set up/executed.
#[derive(Debug, Default)]
pub struct ProcSubTracker {
    active: Vec<ProcSubEntry>,
}

impl ProcSubTracker {
    pub fn new() -> Self {
        ProcSubTracker::default()
    }

    /// Adopt a spawned substitution; returns the path the command sees.
    pub fn adopt(&mut self, fd_num: RawFd, pid: i32) -> String {
        let path = dev_fd_path(fd_num);
        self.active.push(ProcSubEntry { fd: fd_num, pid });
        path
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Close the pipe ends and reap the children. Called after the owning
    /// command completes, never before.
    pub fn cleanup(&mut self) {
        for entry in self.active.drain(..) {
            fd::close_quietly(entry.fd);
            if entry.pid > 0 {
                let _ = wait_for(entry.pid);
            }
        }
    }
}

impl Drop for ProcSubTracker {
    fn drop(&mut self) {
        self.cleanup();
    }
}
