//! Simple Command Execution
//!
//! Strategy chain, first match wins: POSIX special builtin, regular
//! builtin, user function, alias, external program. Assignment prefixes
//! persist for special builtins and assignment-only commands; every other
//! path applies them temporarily and restores on the way out.

use crate::ast::types::SimpleCommand;
use crate::builtins;
use crate::executor::context::ExecContext;
use crate::executor::engine::{finish_child, Executor};
use crate::executor::errors::{ExecError, ExecResult};
use crate::executor::functions::run_function;
use crate::expansion::assignment::apply_assignment;
use crate::expansion::expander::expand_words;
use crate::io::fd;
use crate::io::redirect::{apply_redirects, ApplyMode};
use crate::parser::Parser;
use crate::process::launcher::{launch, LaunchConfig};
use crate::process::wait::{wait_for, WaitOutcome};
use crate::state::{ShellState, VarAttrs, Variable};
use std::ffi::CString;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

pub fn run_simple_command(
    executor: &mut Executor,
    state: &mut ShellState,
    cmd: &SimpleCommand,
    ctx: &ExecContext,
) -> ExecResult {
    state.current_line = cmd.line;
    executor.run_debug_trap(state);

    // Full expansion first; assignments apply afterwards, so `x=2 echo $x`
    // sees the old value of x
    let argv = expand_words(state, executor, &cmd.words)?;

    if executor.debug_expansion && !cmd.words.is_empty() {
        let _ = fd::write_all(2, format!("psh: expand: {argv:?}\n").as_bytes());
    }
    if executor.debug_exec {
        if let Some(name) = argv.first() {
            let _ = fd::write_all(2, format!("psh: exec: dispatch {name}\n").as_bytes());
        }
    }
    if state.options.xtrace && !argv.is_empty() {
        write_xtrace(state, &argv);
    }

    let result = dispatch(executor, state, cmd, &argv, ctx);
    executor.proc_subs.cleanup();
    result
}

fn dispatch(
    executor: &mut Executor,
    state: &mut ShellState,
    cmd: &SimpleCommand,
    argv: &[String],
    ctx: &ExecContext,
) -> ExecResult {
    // Assignment-only command: assignments are permanent
    let Some(name) = argv.first() else {
        let mut scope =
            apply_redirects(state, executor, &cmd.redirects, ApplyMode::Temporary)?;
        let result = apply_assignments_permanent(executor, state, cmd);
        scope.restore().map_err(ExecError::Redirect)?;
        return result;
    };
    let name = name.clone();
    let args = &argv[1..];

    // `exec` with no command makes its redirections permanent
    if name == "exec" && args.is_empty() {
        apply_assignments_permanent(executor, state, cmd)?;
        apply_redirects(state, executor, &cmd.redirects, ApplyMode::Permanent)?;
        return Ok(0);
    }

    // 1. POSIX special builtin: assignment prefixes persist
    if builtins::is_special_builtin(&name) {
        apply_assignments_permanent(executor, state, cmd)?;
        let builtin = builtins::lookup_special(&name).expect("special set is closed");
        let mut scope = apply_redirects(state, executor, &cmd.redirects, ApplyMode::Builtin)?;
        let result = builtin(executor, state, ctx, args);
        scope.restore().map_err(ExecError::Redirect)?;
        return result;
    }

    // 2. Regular builtin
    if let Some(builtin) = builtins::lookup_regular(&name) {
        let temp = TempAssignments::apply(executor, state, cmd)?;
        let mut scope = apply_redirects(state, executor, &cmd.redirects, ApplyMode::Builtin)?;
        let result = builtin(executor, state, ctx, args);
        scope.restore().map_err(ExecError::Redirect)?;
        temp.restore(state);
        return result;
    }

    // 3. User-defined function (skipped under the `command` builtin)
    if !ctx.suppress_function_lookup && state.functions.contains_key(&name) {
        let temp = TempAssignments::apply(executor, state, cmd)?;
        let mut scope = apply_redirects(state, executor, &cmd.redirects, ApplyMode::Temporary)?;
        let result = run_function(executor, state, &name, args, ctx);
        scope.restore().map_err(ExecError::Redirect)?;
        temp.restore(state);
        return result;
    }

    // 4. Alias: re-parse with the alias text spliced in, unless this name
    //    is already being expanded or the word was escaped/quoted
    if let Some(result) = try_alias(executor, state, cmd, &name, args, ctx)? {
        return Ok(result);
    }

    // 5. External program
    run_external(executor, state, cmd, &name, argv, ctx)
}

fn apply_assignments_permanent(
    executor: &mut Executor,
    state: &mut ShellState,
    cmd: &SimpleCommand,
) -> ExecResult {
    for assignment in &cmd.assignments {
        apply_assignment(state, executor, assignment)?;
    }
    Ok(0)
}

/// Temporary assignment prefix: applied exported, restored afterwards.
struct TempAssignments {
    saved: Vec<(String, Option<Variable>)>,
}

impl TempAssignments {
    fn apply(
        executor: &mut Executor,
        state: &mut ShellState,
        cmd: &SimpleCommand,
    ) -> Result<Self, ExecError> {
        let mut saved = Vec::new();
        for assignment in &cmd.assignments {
            let name = state.resolve_name(&assignment.name);
            saved.push((name.clone(), state.scopes.get(&name).cloned()));
            apply_assignment(state, executor, assignment)?;
            state
                .scopes
                .modify_attrs(&name, VarAttrs::EXPORTED, VarAttrs::empty())?;
        }
        Ok(TempAssignments { saved })
    }

    fn restore(self, state: &mut ShellState) {
        for (name, previous) in self.saved.into_iter().rev() {
            state.scopes.replace(&name, previous);
        }
    }
}

/// Alias lookup. Aliases re-enter the parser: the alias body replaces the
/// command word and the remaining arguments are appended verbatim.
fn try_alias(
    executor: &mut Executor,
    state: &mut ShellState,
    cmd: &SimpleCommand,
    name: &str,
    args: &[String],
    ctx: &ExecContext,
) -> Result<Option<i32>, ExecError> {
    if executor.expanding_aliases.contains(name) {
        return Ok(None);
    }
    // A quoted or escaped command word suppresses alias lookup
    let plain = cmd
        .words
        .first()
        .is_some_and(|w| !w.parts.iter().any(|p| match p {
            crate::ast::types::WordPart::Literal(l) => l.quoted,
            crate::ast::types::WordPart::Expansion(_) => false,
        }));
    if !plain {
        return Ok(None);
    }
    let Some(body) = state.aliases.get(name).cloned() else {
        return Ok(None);
    };

    let mut source = body;
    for arg in args {
        source.push(' ');
        source.push_str(&quote_argument(arg));
    }
    let program = Parser::new().parse(&source)?;

    executor.expanding_aliases.insert(name.to_string());
    let result = executor.run_statements(state, &program.statements, ctx);
    executor.expanding_aliases.remove(name);
    result.map(Some)
}

/// Single-quote an argument so it survives the alias re-parse unchanged.
fn quote_argument(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('\'');
    for c in arg.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

fn run_external(
    executor: &mut Executor,
    state: &mut ShellState,
    cmd: &SimpleCommand,
    name: &str,
    argv: &[String],
    ctx: &ExecContext,
) -> ExecResult {
    let temp = TempAssignments::apply(executor, state, cmd)?;
    let result = spawn_external(executor, state, name, argv, &cmd.redirects, ctx);
    temp.restore(state);
    result
}

/// Re-dispatch an already-expanded argv (the `command` builtin). No
/// redirections or assignment prefixes apply at this level.
pub fn run_command_argv(
    executor: &mut Executor,
    state: &mut ShellState,
    argv: &[String],
    ctx: &ExecContext,
) -> ExecResult {
    let Some(name) = argv.first() else {
        return Ok(0);
    };
    let args = &argv[1..];
    if let Some(builtin) = builtins::lookup_special(name) {
        return builtin(executor, state, ctx, args);
    }
    if let Some(builtin) = builtins::lookup_regular(name) {
        return builtin(executor, state, ctx, args);
    }
    if !ctx.suppress_function_lookup && state.functions.contains_key(name) {
        return run_function(executor, state, name, args, ctx);
    }
    spawn_external(executor, state, name, argv, &[], ctx)
}

fn spawn_external(
    executor: &mut Executor,
    state: &mut ShellState,
    name: &str,
    argv: &[String],
    redirects: &[crate::ast::types::Redirect],
    ctx: &ExecContext,
) -> ExecResult {
    let Some(path) = find_executable(state, name) else {
        let _ = fd::write_all(2, format!("psh: {name}: command not found\n").as_bytes());
        return Ok(127);
    };
    if !is_executable(&path) {
        let _ = fd::write_all(
            2,
            format!("psh: {name}: permission denied\n").as_bytes(),
        );
        return Ok(126);
    }

    let foreground = state.interactive
        && state.options.monitor
        && !ctx.background_job
        && !ctx.in_pipeline;
    let config = LaunchConfig {
        foreground,
        new_group: foreground,
        ..LaunchConfig::single()
    };
    let redirects = redirects.to_vec();
    let path_string = path.to_string_lossy().into_owned();
    let argv_owned: Vec<String> = argv.to_vec();

    let child = launch(
        &config,
        || Ok(()),
        || {
            let mut snapshot = state.snapshot_for_subshell();
            if let Err(err) =
                apply_redirects(&mut snapshot, executor, &redirects, ApplyMode::Child)
            {
                let _ = fd::write_all(2, format!("{err}\n").as_bytes());
                return 1;
            }
            finish_child(Ok(exec_program(&path_string, &argv_owned, &snapshot)))
        },
    );

    match child {
        Ok(child) => {
            let code = match wait_for(child.pid) {
                WaitOutcome::Done(code) => code,
                WaitOutcome::Stopped(sig) => {
                    // Suspended by the user (Ctrl-Z): park it in the job
                    // table and take the prompt back
                    executor.jobs.register_stopped(child.pid, child.pgid, name);
                    128 + sig
                }
            };
            if foreground {
                reclaim_terminal(state);
            }
            Ok(code)
        }
        Err(err) => Err(ExecError::Launch(err)),
    }
}

/// In the child: replace the process image. Only returns on failure.
pub fn exec_program(path: &str, argv: &[String], state: &ShellState) -> i32 {
    let Ok(c_path) = CString::new(path) else {
        return 126;
    };
    let c_argv: Vec<CString> = argv
        .iter()
        .filter_map(|a| CString::new(a.as_str()).ok())
        .collect();
    let c_env: Vec<CString> = state
        .environment()
        .into_iter()
        .filter_map(|(k, v)| CString::new(format!("{k}={v}")).ok())
        .collect();

    let _ = nix::unistd::execve(&c_path, &c_argv, &c_env);
    let _ = fd::write_all(2, format!("psh: {path}: cannot execute\n").as_bytes());
    126
}

/// Take the terminal back after a foreground child finishes.
pub fn reclaim_terminal(state: &mut ShellState) {
    unsafe {
        let pgid = libc::getpgrp();
        libc::tcsetpgrp(0, pgid);
    }
    state.foreground_pgid = None;
}

/// PATH lookup. A name containing `/` is used as-is.
pub fn find_executable(state: &ShellState, name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return path.is_file().then_some(path);
    }
    let search_path = state.lookup("PATH").unwrap_or_default();
    for dir in search_path.split(':') {
        if dir.is_empty() {
            continue;
        }
        let candidate = PathBuf::from(dir).join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

pub fn is_executable(path: &PathBuf) -> bool {
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn write_xtrace(state: &ShellState, argv: &[String]) {
    let ps4 = state.lookup("PS4").unwrap_or_else(|| "+ ".to_string());
    let line = format!("{}{}\n", ps4, argv.join(" "));
    let _ = fd::write_all(2, line.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_lookup_finds_binaries() {
        let mut state = ShellState::new();
        state.assign("PATH", "/usr/bin:/bin").unwrap();
        let found = find_executable(&state, "sh");
        assert!(found.is_some());
        assert!(find_executable(&state, "definitely-not-a-command-zzz").is_none());
    }

    #[test]
    fn slash_names_bypass_path() {
        let state = ShellState::new();
        assert!(find_executable(&state, "/bin/sh").is_some());
        assert!(find_executable(&state, "./no-such-file-zzz").is_none());
    }

    #[test]
    fn argument_quoting_for_alias_reparse() {
        assert_eq!(quote_argument("plain"), "'plain'");
        assert_eq!(quote_argument("a b"), "'a b'");
        assert_eq!(quote_argument("it's"), "'it'\\''s'");
    }
}
