//! Subshells and Brace Groups
//!
//! `( ... )` always forks through the launcher; the child runs on a state
//! snapshot and nothing propagates back. `{ ...; }` runs in the current
//! process, so assignments and directory changes leak into the enclosing
//! shell; only a background brace group forks.

use crate::ast::types::{BraceGroup, SubshellGroup};
use crate::executor::context::ExecContext;
use crate::executor::engine::{finish_child, Executor};
use crate::executor::errors::{ExecError, ExecResult};
use crate::io::redirect::{apply_redirects, ApplyMode};
use crate::process::launcher::{launch, LaunchConfig};
use crate::process::wait::{wait_for, WaitOutcome};
use crate::state::ShellState;

pub fn run_subshell(
    executor: &mut Executor,
    state: &mut ShellState,
    group: &SubshellGroup,
    ctx: &ExecContext,
) -> ExecResult {
    let background = group.background || ctx.background_job;
    let cctx = ctx.fork_to_subshell();

    let child = launch(
        &LaunchConfig::shell_child(),
        || Ok(()),
        || {
            let mut snapshot = state.snapshot_for_subshell();
            let setup = apply_redirects(&mut snapshot, executor, &group.redirects, ApplyMode::Child);
            if let Err(err) = setup {
                let _ = crate::io::fd::write_all(2, format!("{err}\n").as_bytes());
                return 1;
            }
            finish_child(executor.run_statements(&mut snapshot, &group.body, &cctx))
        },
    )?;

    if background {
        executor.jobs.add(child.pid, child.pgid, "subshell");
        state.last_background_pid = Some(child.pid);
        return Ok(0);
    }
    match wait_for(child.pid) {
        WaitOutcome::Done(code) => Ok(code),
        WaitOutcome::Stopped(sig) => {
            executor.jobs.register_stopped(child.pid, child.pgid, "subshell");
            Ok(128 + sig)
        }
    }
}

pub fn run_brace_group(
    executor: &mut Executor,
    state: &mut ShellState,
    group: &BraceGroup,
    ctx: &ExecContext,
) -> ExecResult {
    if group.background || ctx.background_job {
        let body = group.body.clone();
        let redirects = group.redirects.clone();
        let cctx = ctx.fork_to_subshell();
        return executor.run_in_background(state, move |exec, st| {
            let setup = apply_redirects(st, exec, &redirects, ApplyMode::Child);
            if let Err(err) = setup {
                let _ = crate::io::fd::write_all(2, format!("{err}\n").as_bytes());
                return Ok(1);
            }
            exec.run_statements(st, &body, &cctx)
        });
    }

    let mut scope = apply_redirects(state, executor, &group.redirects, ApplyMode::Temporary)?;
    let result = executor.run_statements(state, &group.body, ctx);
    scope.restore().map_err(ExecError::Redirect)?;
    result
}
