//! Process Launch Primitive
//!
//! Every fork in the shell flows through [`launch`]: pipeline members,
//! subshells, command and process substitution children, and external
//! commands. This is the single point enforcing process-group, signal and
//! sync-pipe discipline; a fork anywhere else would reintroduce the
//! Ctrl-C and job-control bugs this exists to prevent.
//!
//! Child sequence, in order: ignore SIGTTOU, set the process group, reset
//! all catchable signals to default, re-ignore SIGTTOU for shell-code
//! children, run the I/O setup callback, signal readiness on the sync
//! pipe, run the payload, `_exit`.

use crate::io::fd;
use crate::io::RedirError;
use crate::process::signals::{ignore_sigttou, reset_child_signals};
use nix::unistd::{fork, setpgid, ForkResult, Pid};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchRole {
    /// Subshell, substitution child, single external command
    Single,
    /// First pipeline member: creates the pipeline's process group
    PipelineLeader,
    /// Later pipeline members: join the leader's group
    PipelineMember,
}

#[derive(Debug, Clone, Copy)]
pub struct LaunchConfig {
    pub role: LaunchRole,
    /// Target process group for members; leaders create their own
    pub pgid: Option<i32>,
    /// Hand the terminal to the child's group after launch
    pub foreground: bool,
    /// The child runs shell code (subshell/substitution) rather than exec
    pub is_shell_process: bool,
    /// Single-role children only: start a fresh process group
    pub new_group: bool,
}

impl LaunchConfig {
    pub fn single() -> Self {
        LaunchConfig {
            role: LaunchRole::Single,
            pgid: None,
            foreground: false,
            is_shell_process: false,
            new_group: false,
        }
    }

    pub fn shell_child() -> Self {
        LaunchConfig {
            is_shell_process: true,
            ..Self::single()
        }
    }

    pub fn pipeline_leader(foreground: bool) -> Self {
        LaunchConfig {
            role: LaunchRole::PipelineLeader,
            pgid: None,
            foreground,
            is_shell_process: false,
            new_group: true,
        }
    }

    pub fn pipeline_member(pgid: i32) -> Self {
        LaunchConfig {
            role: LaunchRole::PipelineMember,
            pgid: Some(pgid),
            foreground: false,
            is_shell_process: false,
            new_group: false,
        }
    }
}

/// A launched child as the parent sees it.
#[derive(Debug, Clone, Copy)]
pub struct Child {
    pub pid: i32,
    pub pgid: i32,
}

#[derive(Debug, Clone, Error)]
pub enum LaunchError {
    #[error("psh: fork: {0}")]
    Fork(String),

    #[error("psh: launch: {0}")]
    Sys(String),
}

/// Fork a child. `io_setup` runs in the child after signal setup; a setup
/// failure is reported on the child's stderr and exits 1. `payload` is the
/// child's body; its return value becomes the exit code. The parent blocks
/// on the sync pipe until the child's setup is complete.
pub fn launch<S, P>(config: &LaunchConfig, io_setup: S, payload: P) -> Result<Child, LaunchError>
where
    S: FnOnce() -> Result<(), RedirError>,
    P: FnOnce() -> i32,
{
    let (sync_read, sync_write) =
        fd::make_pipe().map_err(|e| LaunchError::Sys(e.to_string()))?;

    match unsafe { fork() } {
        Err(err) => {
            fd::close_quietly(sync_read);
            fd::close_quietly(sync_write);
            Err(LaunchError::Fork(err.to_string()))
        }
        Ok(ForkResult::Child) => {
            fd::close_quietly(sync_read);
            let code = child_body(config, sync_write, io_setup, payload);
            unsafe { libc::_exit(code) }
        }
        Ok(ForkResult::Parent { child }) => {
            fd::close_quietly(sync_write);
            let pid = child.as_raw();
            let pgid = parent_side_pgid(config, pid);

            // Mirror the child's setpgid to close the race either way
            if pgid != 0 {
                let _ = setpgid(Pid::from_raw(pid), Pid::from_raw(pgid));
            }

            // Wait until the child finished its setup sequence
            let _ = fd::read_byte(sync_read);
            fd::close_quietly(sync_read);

            if config.foreground && unsafe { libc::isatty(0) } == 1 && pgid != 0 {
                unsafe {
                    libc::tcsetpgrp(0, pgid);
                }
            }

            Ok(Child {
                pid,
                pgid: if pgid == 0 { pid } else { pgid },
            })
        }
    }
}

fn parent_side_pgid(config: &LaunchConfig, child_pid: i32) -> i32 {
    match config.role {
        LaunchRole::PipelineLeader => child_pid,
        LaunchRole::PipelineMember => config.pgid.unwrap_or(child_pid),
        LaunchRole::Single => {
            if config.new_group {
                child_pid
            } else {
                0
            }
        }
    }
}

fn child_body<S, P>(config: &LaunchConfig, sync_write: i32, io_setup: S, payload: P) -> i32
where
    S: FnOnce() -> Result<(), RedirError>,
    P: FnOnce() -> i32,
{
    // 1. SIGTTOU off while we shuffle process groups
    ignore_sigttou();

    // 2. process group membership
    match config.role {
        LaunchRole::PipelineLeader => {
            let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
        }
        LaunchRole::PipelineMember => {
            if let Some(pgid) = config.pgid {
                let _ = setpgid(Pid::from_raw(0), Pid::from_raw(pgid));
            }
        }
        LaunchRole::Single => {
            if config.new_group {
                let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
            }
        }
    }

    // 3. default dispositions for everything catchable
    reset_child_signals();

    // 4. shell-code children keep SIGTTOU ignored so they can manage the
    //    terminal without being stopped
    if config.is_shell_process {
        ignore_sigttou();
    }

    // 5. redirections
    if let Err(err) = io_setup() {
        let message = format!("{err}\n");
        let _ = fd::write_all(2, message.as_bytes());
        fd::close_quietly(sync_write);
        return 1;
    }

    // 6. tell the parent we are ready
    let _ = fd::write_all(sync_write, b"\0");
    fd::close_quietly(sync_write);

    // 7. the payload is the child's whole remaining life
    payload()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::wait::wait_for;

    #[test]
    fn child_exit_code_propagates() {
        let child = launch(&LaunchConfig::single(), || Ok(()), || 42).unwrap();
        assert_eq!(wait_for(child.pid).code(), 42);
    }

    #[test]
    fn io_setup_failure_exits_one() {
        let child = launch(
            &LaunchConfig::single(),
            || {
                Err(RedirError::BadFd(99))
            },
            || 0,
        )
        .unwrap();
        assert_eq!(wait_for(child.pid).code(), 1);
    }

    #[test]
    fn pipeline_leader_owns_its_group() {
        let child = launch(&LaunchConfig::pipeline_leader(false), || Ok(()), || 0).unwrap();
        assert_eq!(child.pgid, child.pid);
        assert_eq!(wait_for(child.pid).code(), 0);
    }

    #[test]
    fn member_joins_leader_group() {
        let leader = launch(
            &LaunchConfig::pipeline_leader(false),
            || Ok(()),
            || {
                std::thread::sleep(std::time::Duration::from_millis(100));
                0
            },
        )
        .unwrap();
        let member = launch(
            &LaunchConfig::pipeline_member(leader.pgid),
            || Ok(()),
            || 0,
        )
        .unwrap();
        assert_eq!(member.pgid, leader.pgid);
        assert_eq!(wait_for(member.pid).code(), 0);
        assert_eq!(wait_for(leader.pid).code(), 0);
    }
}
