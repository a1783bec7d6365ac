//! Execution Engine
//!
//! The AST visitor's top level: statement lists, and-or lists with
//! short-circuiting, background jobs, traps and the errexit check. The
//! engine also implements [`ExpansionHost`], forking children for command
//! and process substitution through the unified launcher.

use crate::ast::types::{
    AndOrList, AndOrOperator, Command, ExecutionContext, Program, ProcessSubDirection, Statement,
};
use crate::executor::command::run_simple_command;
use crate::executor::context::ExecContext;
use crate::executor::control_flow::run_control;
use crate::executor::errors::{ExecError, ExecResult};
use crate::executor::pipeline::run_pipeline;
use crate::executor::subshell::{run_brace_group, run_subshell};
use crate::expansion::command_sub::substitute_output;
use crate::expansion::{ExpansionError, ExpansionHost};
use crate::io::fd;
use crate::io::process_sub::ProcSubTracker;
use crate::parser::Parser;
use crate::process::jobs::JobTable;
use crate::process::launcher::{launch, LaunchConfig};
use crate::process::wait::wait_for;
use crate::state::ShellState;
use std::collections::HashSet;

pub struct Executor {
    pub jobs: JobTable,
    pub proc_subs: ProcSubTracker,
    /// Alias names currently being expanded (recursion guard)
    pub(crate) expanding_aliases: HashSet<String>,
    /// Suppresses ERR-trap recursion
    running_trap: bool,
    pub debug_exec: bool,
    pub debug_expansion: bool,
}

/// Outcome of an and-or list: the exit code plus whether errexit may
/// consider it (the final pipeline actually ran and was not negated).
struct ListOutcome {
    code: i32,
    errexit_eligible: bool,
}

impl Executor {
    pub fn new() -> Self {
        Executor {
            jobs: JobTable::new(),
            proc_subs: ProcSubTracker::new(),
            expanding_aliases: HashSet::new(),
            running_trap: false,
            debug_exec: false,
            debug_expansion: false,
        }
    }

    pub fn run_program(
        &mut self,
        state: &mut ShellState,
        program: &Program,
        ctx: &ExecContext,
    ) -> ExecResult {
        self.run_statements(state, &program.statements, ctx)
    }

    /// Statement-list visitor. The errexit check lives here: it runs after
    /// every statement and before advancing to the next.
    pub fn run_statements(
        &mut self,
        state: &mut ShellState,
        statements: &[Statement],
        ctx: &ExecContext,
    ) -> ExecResult {
        let mut code = 0;
        for statement in statements {
            code = self.run_statement(state, statement, ctx)?;
        }
        Ok(code)
    }

    fn run_statement(
        &mut self,
        state: &mut ShellState,
        statement: &Statement,
        ctx: &ExecContext,
    ) -> ExecResult {
        let outcome = match statement {
            Statement::FunctionDef(def) => {
                state.functions.insert(def.name.clone(), def.clone());
                ListOutcome {
                    code: 0,
                    errexit_eligible: false,
                }
            }
            Statement::Control(ctrl) => {
                if ctrl.background {
                    let ctrl = ctrl.clone();
                    let code = self.run_in_background(state, move |exec, st| {
                        run_control(exec, st, &ctrl, &ExecContext::new().fork_to_subshell())
                    })?;
                    ListOutcome {
                        code,
                        errexit_eligible: false,
                    }
                } else {
                    let code = run_control(self, state, ctrl, ctx)?;
                    ListOutcome {
                        code,
                        errexit_eligible: true,
                    }
                }
            }
            Statement::AndOr(list) => {
                if list.background {
                    let list = list.clone();
                    let code = self.run_in_background(state, move |exec, st| {
                        exec.run_and_or(st, &list, &ExecContext::new().fork_to_subshell())
                            .map(|o| o.code)
                    })?;
                    ListOutcome {
                        code,
                        errexit_eligible: false,
                    }
                } else {
                    self.run_and_or(state, list, ctx)?
                }
            }
        };

        state.set_exit_code(outcome.code);

        if outcome.code != 0 && !ctx.in_condition {
            self.run_err_trap(state);
        }
        if outcome.code != 0
            && outcome.errexit_eligible
            && state.options.errexit
            && !ctx.in_condition
        {
            return Err(ExecError::Errexit(outcome.code));
        }
        Ok(outcome.code)
    }

    fn run_and_or(
        &mut self,
        state: &mut ShellState,
        list: &AndOrList,
        ctx: &ExecContext,
    ) -> Result<ListOutcome, ExecError> {
        let mut code = 0;
        let mut last_ran = 0usize;
        let mut last_negated = false;
        let final_index = list.pipelines.len() - 1;

        for (i, pipeline) in list.pipelines.iter().enumerate() {
            if i > 0 {
                let take = match list.operators[i - 1] {
                    AndOrOperator::And => code == 0,
                    AndOrOperator::Or => code != 0,
                };
                if !take {
                    continue;
                }
            }
            // Every pipeline but the final one sits in a checked position
            let pctx = if i < final_index {
                ctx.enter_condition()
            } else {
                ctx.clone()
            };
            code = run_pipeline(self, state, pipeline, &pctx)?;
            state.set_exit_code(code);
            last_ran = i;
            last_negated = pipeline.negated;
        }

        Ok(ListOutcome {
            code,
            errexit_eligible: last_ran == final_index && !last_negated,
        })
    }

    /// One pipeline component.
    pub fn run_command(
        &mut self,
        state: &mut ShellState,
        command: &Command,
        ctx: &ExecContext,
    ) -> ExecResult {
        match command {
            Command::Simple(cmd) => run_simple_command(self, state, cmd, ctx),
            Command::Subshell(group) => run_subshell(self, state, group, ctx),
            Command::BraceGroup(group) => run_brace_group(self, state, group, ctx),
            Command::Control(ctrl) => {
                debug_assert!(
                    ctrl.execution_context == ExecutionContext::Statement || ctx.in_pipeline
                );
                run_control(self, state, ctrl, ctx)
            }
        }
    }

    /// Fork a background child running `body`; registers the job and
    /// records `$!`.
    pub fn run_in_background<F>(&mut self, state: &mut ShellState, body: F) -> ExecResult
    where
        F: FnOnce(&mut Executor, &mut ShellState) -> ExecResult,
    {
        let config = LaunchConfig::shell_child();
        let child = launch(
            &config,
            || Ok(()),
            || {
                let mut snapshot = state.snapshot_for_subshell();
                finish_child(body(self, &mut snapshot))
            },
        )?;
        self.jobs.add(child.pid, child.pgid, "background job");
        state.last_background_pid = Some(child.pid);
        Ok(0)
    }

    // --- traps ---

    /// Run the handler bound to `name`; its own exit code is discarded and
    /// `$?` is preserved.
    pub fn run_trap(&mut self, state: &mut ShellState, name: &str) {
        if self.running_trap {
            return;
        }
        let Some(body) = state.traps.get(name).map(str::to_string) else {
            return;
        };
        let Ok(program) = Parser::new().parse(&body) else {
            return;
        };
        self.running_trap = true;
        let saved_code = state.last_exit_code;
        let _ = self.run_statements(state, &program.statements, &ExecContext::new());
        state.set_exit_code(saved_code);
        self.running_trap = false;
    }

    pub fn run_err_trap(&mut self, state: &mut ShellState) {
        self.run_trap(state, "ERR");
    }

    pub fn run_debug_trap(&mut self, state: &mut ShellState) {
        self.run_trap(state, "DEBUG");
    }

    /// Main-loop follow-up for pending self-pipe signals: run trap bodies
    /// and reap background children.
    pub fn handle_pending_signals(&mut self, state: &mut ShellState, signals: &[i32]) {
        for sig in signals {
            if *sig == libc::SIGCHLD {
                self.jobs.update();
                continue;
            }
            if let Some(name) = crate::state::traps::signal_name_from_number(*sig) {
                let name = name.to_string();
                self.run_trap(state, &name);
            }
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a child's execution result into its `_exit` code, reporting
/// non-control errors on stderr.
pub fn finish_child(result: ExecResult) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            if !err.is_control_flow() {
                let _ = fd::write_all(2, format!("{err}\n").as_bytes());
            }
            err.final_code()
        }
    }
}

impl ExpansionHost for Executor {
    /// `$(cmd)`: fork a child shell with stdout on a pipe, run the command
    /// text, capture, and record the child's exit code in `$?`.
    fn command_substitution(
        &mut self,
        state: &mut ShellState,
        command: &str,
    ) -> Result<String, ExpansionError> {
        let program = Parser::new()
            .parse(command)
            .map_err(|e| ExpansionError::CommandSub(e.to_string()))?;

        let (read_end, write_end) =
            fd::make_pipe().map_err(|e| ExpansionError::CommandSub(e.to_string()))?;

        let child = launch(
            &LaunchConfig::shell_child(),
            || {
                fd::dup2(write_end, 1)?;
                fd::close_quietly(write_end);
                fd::close_quietly(read_end);
                Ok(())
            },
            || {
                let mut snapshot = state.snapshot_for_subshell();
                finish_child(self.run_statements(
                    &mut snapshot,
                    &program.statements,
                    &ExecContext::new().fork_to_subshell(),
                ))
            },
        )
        .map_err(|e| ExpansionError::CommandSub(e.to_string()))?;

        fd::close_quietly(write_end);
        let output = fd::read_to_end(read_end);
        fd::close_quietly(read_end);
        // A substitution child has no job-control identity; a stop still
        // yields the 128+N status
        let code = wait_for(child.pid).code();
        state.set_exit_code(code);

        Ok(substitute_output(&output))
    }

    /// `<(cmd)` / `>(cmd)`: spawn the child wired to a pipe and hand back a
    /// `/dev/fd/N` path. The pipe end and child are tracked and cleaned up
    /// after the owning command finishes.
    fn process_substitution(
        &mut self,
        state: &mut ShellState,
        command: &str,
        direction: ProcessSubDirection,
    ) -> Result<String, ExpansionError> {
        let program = Parser::new()
            .parse(command)
            .map_err(|e| ExpansionError::CommandSub(e.to_string()))?;

        let (read_end, write_end) =
            fd::make_pipe().map_err(|e| ExpansionError::CommandSub(e.to_string()))?;

        let child = launch(
            &LaunchConfig::shell_child(),
            || {
                match direction {
                    ProcessSubDirection::Read => {
                        // child writes; parent reads through /dev/fd
                        fd::dup2(write_end, 1)?;
                    }
                    ProcessSubDirection::Write => {
                        fd::dup2(read_end, 0)?;
                    }
                }
                fd::close_quietly(read_end);
                fd::close_quietly(write_end);
                Ok(())
            },
            || {
                let mut snapshot = state.snapshot_for_subshell();
                finish_child(self.run_statements(
                    &mut snapshot,
                    &program.statements,
                    &ExecContext::new().fork_to_subshell(),
                ))
            },
        )
        .map_err(|e| ExpansionError::CommandSub(e.to_string()))?;

        let kept = match direction {
            ProcessSubDirection::Read => {
                fd::close_quietly(write_end);
                read_end
            }
            ProcessSubDirection::Write => {
                fd::close_quietly(read_end);
                write_end
            }
        };
        Ok(self.proc_subs.adopt(kept, child.pid))
    }
}
