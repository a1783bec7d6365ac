//! Pipeline Execution
//!
//! N-1 real pipes, N forked children. The first child becomes the pipeline
//! leader (its own process group); later children join the leader's group.
//! Children close every pipe end they do not use, the parent closes them
//! all, and children are waited in order. With `pipefail` the exit code is
//! the rightmost non-zero member; otherwise the last member's.

use crate::ast::types::Pipeline;
use crate::executor::context::ExecContext;
use crate::executor::engine::{finish_child, Executor};
use crate::executor::errors::ExecResult;
use crate::io::fd;
use crate::process::launcher::{launch, LaunchConfig};
use crate::process::wait::{wait_for, WaitOutcome};
use crate::state::ShellState;
use std::os::unix::io::RawFd;

pub fn run_pipeline(
    executor: &mut Executor,
    state: &mut ShellState,
    pipeline: &Pipeline,
    ctx: &ExecContext,
) -> ExecResult {
    let code = if pipeline.commands.len() == 1 {
        // A single command runs in-process; only real pipelines fork
        let cctx = if pipeline.negated {
            ctx.enter_condition()
        } else {
            ctx.clone()
        };
        run_single(executor, state, pipeline, &cctx)?
    } else {
        run_multi(executor, state, pipeline, ctx)?
    };

    Ok(if pipeline.negated {
        i32::from(code == 0)
    } else {
        code
    })
}

fn run_single(
    executor: &mut Executor,
    state: &mut ShellState,
    pipeline: &Pipeline,
    ctx: &ExecContext,
) -> ExecResult {
    executor.run_command(state, &pipeline.commands[0], ctx)
}

fn run_multi(
    executor: &mut Executor,
    state: &mut ShellState,
    pipeline: &Pipeline,
    ctx: &ExecContext,
) -> ExecResult {
    let count = pipeline.commands.len();
    let mut pipes: Vec<(RawFd, RawFd)> = Vec::with_capacity(count - 1);
    for _ in 0..count - 1 {
        pipes.push(fd::make_pipe()?);
    }

    let foreground = state.interactive
        && state.options.monitor
        && !ctx.background_job
        && !pipeline.background;

    let mut pids = Vec::with_capacity(count);
    let mut leader_pgid: Option<i32> = None;

    for (i, command) in pipeline.commands.iter().enumerate() {
        let config = match leader_pgid {
            None => LaunchConfig {
                is_shell_process: true,
                ..LaunchConfig::pipeline_leader(foreground)
            },
            Some(pgid) => LaunchConfig {
                is_shell_process: true,
                ..LaunchConfig::pipeline_member(pgid)
            },
        };

        let stdin_from = if i > 0 { Some(pipes[i - 1].0) } else { None };
        let stdout_to = if i < count - 1 { Some(pipes[i].1) } else { None };
        let all_pipes = pipes.clone();
        let cctx = ctx.enter_pipeline().fork_to_subshell();

        let child = launch(
            &config,
            move || {
                if let Some(read_end) = stdin_from {
                    fd::dup2(read_end, 0)?;
                }
                if let Some(write_end) = stdout_to {
                    fd::dup2(write_end, 1)?;
                }
                // every pipe end is now either duplicated or unused
                for (r, w) in all_pipes {
                    fd::close_quietly(r);
                    fd::close_quietly(w);
                }
                Ok(())
            },
            || {
                let mut snapshot = state.snapshot_for_subshell();
                finish_child(executor.run_command(&mut snapshot, command, &cctx))
            },
        )?;

        pids.push(child.pid);
        if leader_pgid.is_none() {
            leader_pgid = Some(child.pgid);
            if foreground {
                state.foreground_pgid = Some(child.pgid);
            }
        }
    }

    for (r, w) in &pipes {
        fd::close_quietly(*r);
        fd::close_quietly(*w);
    }

    // Wait in order; the overall code follows the pipefail rule
    let mut last_code = 0;
    let mut rightmost_failure = 0;
    let mut any_stopped = false;
    for pid in &pids {
        let code = match wait_for(*pid) {
            WaitOutcome::Done(code) => code,
            WaitOutcome::Stopped(sig) => {
                any_stopped = true;
                128 + sig
            }
        };
        last_code = code;
        if code != 0 {
            rightmost_failure = code;
        }
    }
    if any_stopped {
        // The whole pipeline shares one process group; track it as a
        // single stopped job keyed by the leader
        let pgid = leader_pgid.unwrap_or(pids[0]);
        executor.jobs.register_stopped(pids[0], pgid, "pipeline");
    }

    if foreground {
        crate::executor::command::reclaim_terminal(state);
    }

    Ok(if state.options.pipefail {
        rightmost_failure
    } else {
        last_code
    })
}
