//! Saved Descriptor Scope
//!
//! Temporary and builtin redirections save each affected descriptor before
//! overwriting it and restore it on scope exit. Saved descriptors live on
//! the scope object, never on the shell itself, and are restored and closed
//! exactly once on every path out (normal return or error unwind).
//!
//! Ordering matters: the descriptor's open/closed status is probed *before*
//! any duplication happens, because `dup` may reuse a just-closed fd number
//! and make a later probe pass incorrectly.

use crate::io::fd;
use crate::io::RedirError;
use std::os::unix::io::RawFd;

/// Saved descriptors stash above this number.
const SAVE_FD_BASE: RawFd = 10;

#[derive(Debug)]
struct SavedEntry {
    /// The user-visible descriptor that was overwritten
    original: RawFd,
    /// A high duplicate holding the old file, or None when the descriptor
    /// was closed before the redirection
    stash: Option<RawFd>,
}

/// A set of saved descriptors, restored exactly once.
#[derive(Debug, Default)]
pub struct RedirectScope {
    saved: Vec<SavedEntry>,
    restored: bool,
}

impl RedirectScope {
    pub fn new() -> Self {
        RedirectScope::default()
    }

    /// Record the current state of `fd` before it is overwritten.
    pub fn save(&mut self, fd_num: RawFd) -> Result<(), RedirError> {
        // Probe first; duplicate second (see module docs)
        let stash = if fd::is_open(fd_num) {
            Some(fd::dup_above(fd_num, SAVE_FD_BASE)?)
        } else {
            None
        };
        self.saved.push(SavedEntry {
            original: fd_num,
            stash,
        });
        Ok(())
    }

    /// Put every saved descriptor back and close the stashes. Reverse order,
    /// so the earliest save wins when the same fd was saved twice.
    pub fn restore(&mut self) -> Result<(), RedirError> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        let mut first_err = None;
        for entry in self.saved.drain(..).rev() {
            let result = match entry.stash {
                Some(stash) => {
                    let r = fd::dup2(stash, entry.original);
                    fd::close_quietly(stash);
                    r
                }
                None => fd::close(entry.original),
            };
            if first_err.is_none() {
                first_err = result.err();
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Permanent mode: forget the stashes without restoring.
    pub fn forget(&mut self) {
        self.restored = true;
        for entry in self.saved.drain(..) {
            if let Some(stash) = entry.stash {
                fd::close_quietly(stash);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}

impl Drop for RedirectScope {
    fn drop(&mut self) {
        // Error-path insurance; normal paths call restore() explicitly
        let _ = self.restore();
    }
}
