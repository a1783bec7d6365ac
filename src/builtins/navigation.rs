//! Directory Builtins: `cd` and `pwd`

use crate::executor::context::ExecContext;
use crate::executor::engine::Executor;
use crate::executor::errors::ExecResult;
use crate::io::fd;
use crate::state::ShellState;
use std::path::{Path, PathBuf};

pub fn cd(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    let target = match args.first().map(|s| s.as_str()) {
        None | Some("") => match state.lookup("HOME") {
            Some(home) => home,
            None => {
                let _ = fd::write_all(2, b"psh: cd: HOME not set\n");
                return Ok(1);
            }
        },
        Some("-") => match state.lookup("OLDPWD") {
            Some(oldpwd) => {
                // `cd -` prints the directory it lands in
                let _ = fd::write_all(1, format!("{oldpwd}\n").as_bytes());
                oldpwd
            }
            None => {
                let _ = fd::write_all(2, b"psh: cd: OLDPWD not set\n");
                return Ok(1);
            }
        },
        Some(dir) => resolve_against_cdpath(state, dir),
    };

    let previous = std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Err(err) = std::env::set_current_dir(&target) {
        let _ = fd::write_all(
            2,
            format!("psh: cd: {target}: {err}\n").as_bytes(),
        );
        return Ok(1);
    }

    let now = std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or(target);
    let _ = state.assign("OLDPWD", previous);
    let _ = state.assign("PWD", now);
    Ok(0)
}

/// Relative targets search CDPATH; the working directory always wins.
fn resolve_against_cdpath(state: &ShellState, dir: &str) -> String {
    if dir.starts_with('/') || dir.starts_with('.') || Path::new(dir).is_dir() {
        return dir.to_string();
    }
    let cdpath = state.lookup("CDPATH").unwrap_or_default();
    for base in cdpath.split(':') {
        if base.is_empty() {
            continue;
        }
        let candidate = PathBuf::from(base).join(dir);
        if candidate.is_dir() {
            return candidate.to_string_lossy().into_owned();
        }
    }
    dir.to_string()
}

pub fn pwd(
    _executor: &mut Executor,
    _state: &mut ShellState,
    _ctx: &ExecContext,
    _args: &[String],
) -> ExecResult {
    match std::env::current_dir() {
        Ok(dir) => {
            let _ = fd::write_all(1, format!("{}\n", dir.display()).as_bytes());
            Ok(0)
        }
        Err(err) => {
            let _ = fd::write_all(2, format!("psh: pwd: {err}\n").as_bytes());
            Ok(1)
        }
    }
}
