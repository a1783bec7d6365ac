//! POSIX Special Builtins
//!
//! `:`, `eval`, `exec`, `exit`, `export`, `readonly`, `return`, `set`,
//! `shift`, `trap`, `unset`. Control-flow builtins raise the corresponding
//! executor signal instead of returning a code.

use crate::executor::command::{exec_program, find_executable};
use crate::executor::context::ExecContext;
use crate::executor::engine::Executor;
use crate::executor::errors::{ExecError, ExecResult};
use crate::io::fd;
use crate::parser::Parser;
use crate::state::{ShellState, TrapTable, VarAttrs, ShellOptions};

fn fail(message: impl AsRef<str>) -> ExecResult {
    let _ = fd::write_all(2, format!("psh: {}\n", message.as_ref()).as_bytes());
    Ok(1)
}

fn usage_error(message: impl AsRef<str>) -> ExecResult {
    let _ = fd::write_all(2, format!("psh: {}\n", message.as_ref()).as_bytes());
    Ok(2)
}

pub fn colon(
    _executor: &mut Executor,
    _state: &mut ShellState,
    _ctx: &ExecContext,
    _args: &[String],
) -> ExecResult {
    Ok(0)
}

pub fn eval(
    executor: &mut Executor,
    state: &mut ShellState,
    ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    let source = args.join(" ");
    if source.trim().is_empty() {
        return Ok(0);
    }
    match Parser::new().parse(&source) {
        Ok(program) => executor.run_statements(state, &program.statements, ctx),
        Err(err) => {
            let _ = fd::write_all(2, format!("{err}\n").as_bytes());
            Ok(2)
        }
    }
}

/// `exec cmd args...` replaces the shell. Redirection-only `exec` is
/// handled upstream in the command dispatcher (Permanent path).
pub fn exec(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    let Some(name) = args.first() else {
        return Ok(0);
    };
    let Some(path) = find_executable(state, name) else {
        let _ = fd::write_all(2, format!("psh: exec: {name}: not found\n").as_bytes());
        return Err(ExecError::ExitShell(127));
    };
    let code = exec_program(&path.to_string_lossy(), args, state);
    // exec only returns on failure; a non-interactive shell exits
    if state.interactive {
        Ok(code)
    } else {
        Err(ExecError::ExitShell(code))
    }
}

pub fn exit(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    let code = match args.first() {
        None => state.last_exit_code,
        Some(arg) => match arg.parse::<i32>() {
            Ok(n) => n & 0xff,
            Err(_) => {
                let _ = fd::write_all(
                    2,
                    format!("psh: exit: {arg}: numeric argument required\n").as_bytes(),
                );
                2
            }
        },
    };
    Err(ExecError::ExitShell(code))
}

pub fn export(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    if args.is_empty() {
        let mut names: Vec<String> = state
            .scopes
            .visible()
            .iter()
            .filter(|(_, v)| v.is_exported())
            .map(|(n, v)| format!("export {}={}", n, v.as_string()))
            .collect();
        names.sort();
        for line in names {
            let _ = fd::write_all(1, format!("{line}\n").as_bytes());
        }
        return Ok(0);
    }

    let removing = args[0] == "-n";
    let names = if removing { &args[1..] } else { args };
    for arg in names {
        let (name, value) = split_assignment_arg(arg);
        if let Some(value) = value {
            if let Err(err) = state.assign(name, value) {
                return fail(err.to_string());
            }
        }
        let result = if removing {
            state
                .scopes
                .modify_attrs(name, VarAttrs::empty(), VarAttrs::EXPORTED)
        } else {
            state
                .scopes
                .modify_attrs(name, VarAttrs::EXPORTED, VarAttrs::empty())
        };
        if let Err(err) = result {
            return fail(err.to_string());
        }
    }
    Ok(0)
}

pub fn readonly(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    if args.is_empty() {
        let mut lines: Vec<String> = state
            .scopes
            .visible()
            .iter()
            .filter(|(_, v)| v.is_readonly())
            .map(|(n, v)| format!("readonly {}={}", n, v.as_string()))
            .collect();
        lines.sort();
        for line in lines {
            let _ = fd::write_all(1, format!("{line}\n").as_bytes());
        }
        return Ok(0);
    }
    for arg in args {
        let (name, value) = split_assignment_arg(arg);
        if let Some(value) = value {
            if let Err(err) = state.assign(name, value) {
                return fail(err.to_string());
            }
        }
        if let Err(err) = state
            .scopes
            .modify_attrs(name, VarAttrs::READONLY, VarAttrs::empty())
        {
            return fail(err.to_string());
        }
    }
    Ok(0)
}

pub fn return_(
    _executor: &mut Executor,
    state: &mut ShellState,
    ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    if !ctx.in_function() {
        return fail("return: can only `return' from a function or sourced script");
    }
    let code = match args.first() {
        None => state.last_exit_code,
        Some(arg) => match arg.parse::<i32>() {
            Ok(n) => n & 0xff,
            Err(_) => return usage_error(format!("return: {arg}: numeric argument required")),
        },
    };
    Err(ExecError::FunctionReturn(code))
}

pub fn set(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    if args.is_empty() {
        let mut lines: Vec<String> = state
            .scopes
            .visible()
            .iter()
            .map(|(n, v)| format!("{}={}", n, v.as_string()))
            .collect();
        lines.sort();
        for line in lines {
            let _ = fd::write_all(1, format!("{line}\n").as_bytes());
        }
        return Ok(0);
    }

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--" => {
                state.positional.params = args[i + 1..].to_vec();
                return Ok(0);
            }
            "-o" | "+o" => {
                let enable = arg.starts_with('-');
                match args.get(i + 1) {
                    Some(name) => {
                        if let Err(err) = state.options.set_by_name(name, enable) {
                            return usage_error(err.to_string());
                        }
                        i += 2;
                    }
                    None => {
                        print_option_listing(&state.options);
                        i += 1;
                    }
                }
            }
            _ if arg.starts_with('-') || arg.starts_with('+') => {
                let enable = arg.starts_with('-');
                for letter in arg.chars().skip(1) {
                    if let Err(err) = state.options.set_by_letter(letter, enable) {
                        return usage_error(err.to_string());
                    }
                }
                i += 1;
            }
            _ => {
                // first non-option word: the rest replace the positionals
                state.positional.params = args[i..].to_vec();
                return Ok(0);
            }
        }
    }
    Ok(0)
}

fn print_option_listing(options: &ShellOptions) {
    for name in [
        "allexport",
        "braceexpand",
        "errexit",
        "noclobber",
        "noexec",
        "noglob",
        "nounset",
        "pipefail",
        "posix",
        "verbose",
        "xtrace",
    ] {
        let on = options.get_by_name(name).unwrap_or(false);
        let _ = fd::write_all(
            1,
            format!("{name}\t{}\n", if on { "on" } else { "off" }).as_bytes(),
        );
    }
}

pub fn shift(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    let n = match args.first() {
        None => 1,
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) => n,
            Err(_) => return usage_error(format!("shift: {arg}: numeric argument required")),
        },
    };
    if state.positional.shift(n).is_err() {
        return fail("shift: shift count out of range");
    }
    Ok(0)
}

pub fn trap(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    if args.is_empty() {
        let mut lines: Vec<String> = state
            .traps
            .iter()
            .map(|(name, body)| format!("trap -- '{body}' {name}"))
            .collect();
        lines.sort();
        for line in lines {
            let _ = fd::write_all(1, format!("{line}\n").as_bytes());
        }
        return Ok(0);
    }

    let rest: &[String] = if args[0] == "--" { &args[1..] } else { args };
    if rest.is_empty() {
        return usage_error("trap: usage: trap [action] signal ...");
    }
    let (action, specs) = if rest[0] == "-" {
        (None, &rest[1..])
    } else {
        (Some(rest[0].clone()), &rest[1..])
    };

    if specs.is_empty() {
        return usage_error("trap: usage: trap [action] signal ...");
    }
    for spec in specs {
        let Some(name) = TrapTable::canonical_name(spec) else {
            return fail(format!("trap: {spec}: invalid signal specification"));
        };
        match &action {
            None => {
                state.traps.remove(&name);
            }
            Some(body) => {
                state.traps.set(&name, body.clone());
            }
        }
    }
    Ok(0)
}

pub fn unset(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    let mut unset_functions = false;
    let mut names = args;
    if let Some(first) = args.first() {
        match first.as_str() {
            "-f" => {
                unset_functions = true;
                names = &args[1..];
            }
            "-v" => names = &args[1..],
            _ => {}
        }
    }
    for name in names {
        if unset_functions {
            state.functions.remove(name);
        } else if let Err(err) = state.scopes.unset(name) {
            return fail(err.to_string());
        }
    }
    Ok(0)
}

/// Split `NAME=value` arguments given to export/readonly.
fn split_assignment_arg(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (arg, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecContext;
    use crate::parser::Parser;

    fn run(src: &str, state: &mut ShellState) -> Result<i32, ExecError> {
        let program = Parser::new().parse(src).unwrap();
        Executor::new().run_program(state, &program, &ExecContext::new())
    }

    #[test]
    fn exit_carries_code() {
        let mut s = ShellState::new();
        match run("exit 3", &mut s) {
            Err(ExecError::ExitShell(3)) => {}
            other => panic!("expected ExitShell(3), got {other:?}"),
        }
    }

    #[test]
    fn exit_without_args_uses_last_code() {
        let mut s = ShellState::new();
        match run("false; exit", &mut s) {
            Err(ExecError::ExitShell(1)) => {}
            other => panic!("expected ExitShell(1), got {other:?}"),
        }
    }

    #[test]
    fn export_marks_variables() {
        let mut s = ShellState::new();
        run("export FOO=bar", &mut s).unwrap();
        assert!(s.environment().iter().any(|(n, v)| n == "FOO" && v == "bar"));
    }

    #[test]
    fn readonly_blocks_reassignment() {
        let mut s = ShellState::new();
        let code = run("readonly X=1; X=2", &mut s).unwrap();
        assert_eq!(code, 1);
        assert_eq!(s.lookup("X").as_deref(), Some("1"));
    }

    #[test]
    fn set_options_and_positionals() {
        let mut s = ShellState::new();
        run("set -eu", &mut s).unwrap();
        assert!(s.options.errexit);
        assert!(s.options.nounset);
        run("set +e", &mut s).unwrap();
        assert!(!s.options.errexit);

        run("set -o pipefail", &mut s).unwrap();
        assert!(s.options.pipefail);

        run("set -- a 'b c' d", &mut s).unwrap();
        assert_eq!(s.positional.params, vec!["a", "b c", "d"]);
    }

    #[test]
    fn shift_moves_positionals() {
        let mut s = ShellState::new();
        run("set -- a b c; shift 2", &mut s).unwrap();
        assert_eq!(s.positional.params, vec!["c"]);
        // out of range
        assert_eq!(run("shift 5", &mut s).unwrap(), 1);
    }

    #[test]
    fn trap_sets_and_clears() {
        let mut s = ShellState::new();
        run("trap 'echo bye' EXIT INT", &mut s).unwrap();
        assert_eq!(s.traps.get("EXIT"), Some("echo bye"));
        assert_eq!(s.traps.get("INT"), Some("echo bye"));
        run("trap - INT", &mut s).unwrap();
        assert_eq!(s.traps.get("INT"), None);
        assert_eq!(s.traps.get("EXIT"), Some("echo bye"));
    }

    #[test]
    fn unset_variables_and_functions() {
        let mut s = ShellState::new();
        run("x=1; unset x", &mut s).unwrap();
        assert!(s.lookup("x").is_none());
        run("f() { :; }; unset -f f", &mut s).unwrap();
        assert!(!s.functions.contains_key("f"));
    }

    #[test]
    fn eval_runs_in_current_shell() {
        let mut s = ShellState::new();
        run("eval 'x=from-eval'", &mut s).unwrap();
        assert_eq!(s.lookup("x").as_deref(), Some("from-eval"));
    }

    #[test]
    fn eval_syntax_error_is_code_two() {
        let mut s = ShellState::new();
        assert_eq!(run("eval 'if true'", &mut s).unwrap(), 2);
    }

    #[test]
    fn return_outside_function_fails() {
        let mut s = ShellState::new();
        assert_eq!(run("return", &mut s).unwrap(), 1);
    }
}
