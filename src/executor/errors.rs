//! Executor Errors and Control-Flow Signals
//!
//! `break`, `continue`, `return` and `exit` are unwinding tokens, not
//! failures: they travel as dedicated variants of the executor error enum
//! and are consumed by the frame that owns them (the innermost loop, the
//! function call, the shell driver). Everything else is a real error that
//! aborts the current command.

use crate::expansion::ExpansionError;
use crate::io::RedirError;
use crate::parser::ParseError;
use crate::process::LaunchError;
use crate::state::{OptionError, VarError};
use thiserror::Error;

/// Execution result: the command's exit code, or an unwinding signal/error.
pub type ExecResult = Result<i32, ExecError>;

#[derive(Debug, Clone, Error)]
pub enum ExecError {
    // --- control-flow signals ---
    #[error("psh: break: {0}")]
    Break(u32),

    #[error("psh: continue: {0}")]
    Continue(u32),

    #[error("psh: return: {0}")]
    FunctionReturn(i32),

    #[error("psh: exit: {0}")]
    ExitShell(i32),

    /// `set -e` fired: terminate with the failing command's code
    #[error("psh: errexit: {0}")]
    Errexit(i32),

    // --- real errors ---
    #[error(transparent)]
    Expansion(#[from] ExpansionError),

    #[error(transparent)]
    Arith(#[from] crate::arithmetic::ArithError),

    #[error(transparent)]
    Redirect(#[from] RedirError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Var(#[from] VarError),

    #[error(transparent)]
    Option(#[from] OptionError),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("psh: {0}")]
    Builtin(String),
}

impl ExecError {
    /// True for the unwinding tokens; false for genuine errors.
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            ExecError::Break(_)
                | ExecError::Continue(_)
                | ExecError::FunctionReturn(_)
                | ExecError::ExitShell(_)
                | ExecError::Errexit(_)
        )
    }

    /// The exit code this error implies when it reaches a process boundary
    /// (a forked child, or the shell's top level).
    pub fn final_code(&self) -> i32 {
        match self {
            ExecError::Break(_) | ExecError::Continue(_) => 0,
            ExecError::FunctionReturn(code)
            | ExecError::ExitShell(code)
            | ExecError::Errexit(code) => *code,
            ExecError::Expansion(e) => e.exit_code(),
            ExecError::Parse(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_flow_classification() {
        assert!(ExecError::Break(1).is_control_flow());
        assert!(ExecError::ExitShell(0).is_control_flow());
        assert!(!ExecError::Builtin("x".into()).is_control_flow());
    }

    #[test]
    fn final_codes() {
        assert_eq!(ExecError::ExitShell(3).final_code(), 3);
        assert_eq!(ExecError::Errexit(2).final_code(), 2);
        assert_eq!(ExecError::Builtin("x".into()).final_code(), 1);
    }
}
