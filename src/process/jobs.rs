//! Job Table
//!
//! Background and stopped pipelines, tracked by the process-launch layer.
//! Jobs are numbered from 1; the table backs `wait`, `$!` and completion
//! notices in the interactive loop.

use crate::io::fd;
use crate::process::wait::{try_reap, wait_for, ReapedState, WaitOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Done(i32),
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    pub pid: i32,
    pub pgid: i32,
    pub command: String,
    pub state: JobState,
    /// Completion already shown to the user
    pub notified: bool,
}

#[derive(Debug, Clone, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_id: usize,
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, pid: i32, pgid: i32, command: impl Into<String>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.jobs.push(Job {
            id,
            pid,
            pgid,
            command: command.into(),
            state: JobState::Running,
            notified: false,
        });
        id
    }

    /// A foreground child the user suspended: park it here as a stopped
    /// job and tell the user where it went.
    pub fn register_stopped(&mut self, pid: i32, pgid: i32, command: impl Into<String>) -> usize {
        let id = self.add(pid, pgid, command);
        if let Some(job) = self.jobs.iter_mut().find(|j| j.pid == pid) {
            job.state = JobState::Stopped;
            let _ = fd::write_all(
                2,
                format!("[{}] stopped {}\n", id, job.command).as_bytes(),
            );
        }
        id
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn find_by_pid(&self, pid: i32) -> Option<&Job> {
        self.jobs.iter().find(|j| j.pid == pid)
    }

    /// Reap any children that changed state and record the results.
    pub fn update(&mut self) {
        for (pid, state) in try_reap() {
            if let Some(job) = self.jobs.iter_mut().find(|j| j.pid == pid) {
                job.state = match state {
                    ReapedState::Done(code) => JobState::Done(code),
                    ReapedState::Stopped => JobState::Stopped,
                };
            }
        }
    }

    /// Completed jobs not yet reported; marks them notified and drops them.
    pub fn take_finished(&mut self) -> Vec<Job> {
        let mut finished = Vec::new();
        self.jobs.retain(|job| {
            if matches!(job.state, JobState::Done(_)) {
                finished.push(job.clone());
                false
            } else {
                true
            }
        });
        finished
    }

    /// Exit code of `pid` once it finishes; blocks via the wait layer. A
    /// job that stops instead stays in the table as stopped and reports
    /// 128+N, matching the `wait` builtin's convention.
    pub fn wait_pid(&mut self, pid: i32) -> i32 {
        if let Some(job) = self.find_by_pid(pid) {
            if let JobState::Done(code) = job.state {
                self.jobs.retain(|j| j.pid != pid);
                return code;
            }
        }
        match wait_for(pid) {
            WaitOutcome::Done(code) => {
                self.jobs.retain(|j| j.pid != pid);
                code
            }
            WaitOutcome::Stopped(sig) => {
                if let Some(job) = self.jobs.iter_mut().find(|j| j.pid == pid) {
                    job.state = JobState::Stopped;
                }
                128 + sig
            }
        }
    }

    /// Wait for every remaining job (the bare `wait` builtin).
    pub fn wait_all(&mut self) {
        let pids: Vec<i32> = self
            .jobs
            .iter()
            .filter(|j| matches!(j.state, JobState::Running))
            .map(|j| j.pid)
            .collect();
        for pid in pids {
            self.wait_pid(pid);
        }
        self.jobs
            .retain(|j| !matches!(j.state, JobState::Done(_)));
    }
}
