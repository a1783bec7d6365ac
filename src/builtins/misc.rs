//! Miscellaneous Builtins: `source`/`.`, `wait`, `alias`, `unalias`,
//! `command`

use crate::executor::command::run_command_argv;
use crate::executor::context::ExecContext;
use crate::executor::engine::Executor;
use crate::executor::errors::{ExecError, ExecResult};
use crate::io::fd;
use crate::parser::Parser;
use crate::state::ShellState;

/// `source file [args...]`: run the file's contents in the current shell.
/// Extra arguments become the positional parameters for the duration.
pub fn source(
    executor: &mut Executor,
    state: &mut ShellState,
    ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    let Some(path) = args.first() else {
        let _ = fd::write_all(2, b"psh: source: filename argument required\n");
        return Ok(2);
    };
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            let _ = fd::write_all(2, format!("psh: source: {path}: {err}\n").as_bytes());
            return Ok(1);
        }
    };
    let program = match Parser::new().parse(&text) {
        Ok(program) => program,
        Err(err) => {
            let _ = fd::write_all(2, format!("{err}\n").as_bytes());
            return Ok(2);
        }
    };

    let replaced = if args.len() > 1 {
        Some(std::mem::replace(
            &mut state.positional.params,
            args[1..].to_vec(),
        ))
    } else {
        None
    };

    let result = executor.run_statements(state, &program.statements, ctx);

    if let Some(saved) = replaced {
        state.positional.params = saved;
    }
    // `return` inside a sourced file stops the file, not the shell
    match result {
        Err(ExecError::FunctionReturn(code)) => Ok(code),
        other => other,
    }
}

/// `wait [pid]`: block on one job, or all of them.
pub fn wait(
    executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    match args.first() {
        None => {
            executor.jobs.wait_all();
            Ok(0)
        }
        Some(arg) => match arg.parse::<i32>() {
            Ok(pid) => {
                let code = executor.jobs.wait_pid(pid);
                state.set_exit_code(code);
                Ok(code)
            }
            Err(_) => {
                let _ = fd::write_all(
                    2,
                    format!("psh: wait: {arg}: not a valid pid\n").as_bytes(),
                );
                Ok(2)
            }
        },
    }
}

pub fn alias(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    if args.is_empty() {
        let mut lines: Vec<String> = state
            .aliases
            .iter()
            .map(|(name, body)| format!("alias {name}='{body}'"))
            .collect();
        lines.sort();
        for line in lines {
            let _ = fd::write_all(1, format!("{line}\n").as_bytes());
        }
        return Ok(0);
    }

    let mut code = 0;
    for arg in args {
        match arg.split_once('=') {
            Some((name, body)) => {
                state.aliases.insert(name.to_string(), body.to_string());
            }
            None => match state.aliases.get(arg) {
                Some(body) => {
                    let _ = fd::write_all(1, format!("alias {arg}='{body}'\n").as_bytes());
                }
                None => {
                    let _ = fd::write_all(
                        2,
                        format!("psh: alias: {arg}: not found\n").as_bytes(),
                    );
                    code = 1;
                }
            },
        }
    }
    Ok(code)
}

pub fn unalias(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    if args.first().map(|s| s.as_str()) == Some("-a") {
        state.aliases.clear();
        return Ok(0);
    }
    let mut code = 0;
    for name in args {
        if state.aliases.remove(name).is_none() {
            let _ = fd::write_all(
                2,
                format!("psh: unalias: {name}: not found\n").as_bytes(),
            );
            code = 1;
        }
    }
    Ok(code)
}

/// `command cmd args...`: run with function lookup suppressed.
pub fn command(
    executor: &mut Executor,
    state: &mut ShellState,
    ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    let args = match args.first().map(|s| s.as_str()) {
        // -p: default PATH; -v/-V: description modes are not carried
        Some("-p") | Some("--") => &args[1..],
        _ => args,
    };
    if args.is_empty() {
        return Ok(0);
    }
    run_command_argv(executor, state, args, &ctx.without_functions())
}
