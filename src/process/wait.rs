//! Child Waiting
//!
//! Exit-code conventions: a normal exit keeps its code, death by signal N
//! reports 128+N. Blocking waits pass `WUNTRACED` so a child stopped by
//! SIGTSTP/SIGSTOP is observed instead of blocking the shell forever; the
//! caller records such a job as stopped and regains the prompt.

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// What a blocking wait observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The child terminated with this exit code (128+N for signal deaths)
    Done(i32),
    /// The child was stopped by this signal; it is still alive and belongs
    /// in the job table as a stopped job
    Stopped(i32),
}

impl WaitOutcome {
    /// Shell status convention: stopped jobs report 128+N like signal
    /// deaths do.
    pub fn code(self) -> i32 {
        match self {
            WaitOutcome::Done(code) => code,
            WaitOutcome::Stopped(sig) => 128 + sig,
        }
    }
}

/// Block until `pid` terminates or stops.
pub fn wait_for(pid: i32) -> WaitOutcome {
    loop {
        match waitpid(Pid::from_raw(pid), Some(WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::Exited(_, code)) => return WaitOutcome::Done(code),
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                return WaitOutcome::Done(128 + sig as i32)
            }
            Ok(WaitStatus::Stopped(_, sig)) => return WaitOutcome::Stopped(sig as i32),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(_) => return WaitOutcome::Done(127),
        }
    }
}

/// One non-blocking reap pass; returns (pid, status) pairs for children
/// that changed state.
pub fn try_reap() -> Vec<(i32, ReapedState)> {
    let mut out = Vec::new();
    loop {
        match waitpid(
            Pid::from_raw(-1),
            Some(WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED),
        ) {
            Ok(WaitStatus::Exited(pid, code)) => {
                out.push((pid.as_raw(), ReapedState::Done(code)));
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) => {
                out.push((pid.as_raw(), ReapedState::Done(128 + sig as i32)));
            }
            Ok(WaitStatus::Stopped(pid, _)) => {
                out.push((pid.as_raw(), ReapedState::Stopped));
            }
            Ok(WaitStatus::StillAlive) => return out,
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(_) => return out,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapedState {
    Done(i32),
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_codes() {
        assert_eq!(WaitOutcome::Done(0).code(), 0);
        assert_eq!(WaitOutcome::Done(137).code(), 137);
        // SIGTSTP is 20: a stopped job reports 148
        assert_eq!(WaitOutcome::Stopped(20).code(), 148);
    }
}
