//! Expander: the POSIX expansion pipeline.
//!
//! Per word, in strict order: tilde expansion, variable/parameter
//! expansion, command substitution, arithmetic expansion, word splitting,
//! pathname expansion, quote removal. Command and process substitution need
//! to fork and run shell code, which the executor provides through the
//! [`ExpansionHost`] trait.

pub mod assignment;
pub mod command_sub;
pub mod expander;
pub mod parameter_ops;
pub mod pathname;
pub mod pattern;
pub mod tilde;
pub mod variable;
pub mod word_split;

pub use expander::{expand_word_fields, expand_word_to_pattern, expand_word_to_string, expand_words};

use crate::arithmetic::ArithError;
use crate::ast::types::ProcessSubDirection;
use crate::state::{ShellState, VarError};
use thiserror::Error;

/// Errors raised during expansion. In a subshell context these terminate
/// the subshell; otherwise they abort the current command with exit code 1.
#[derive(Debug, Clone, Error)]
pub enum ExpansionError {
    #[error("psh: {name}: {message}")]
    ParameterError { name: String, message: String },

    #[error("psh: {0}: unbound variable")]
    Unbound(String),

    #[error("psh: bad substitution: `{0}`")]
    BadSubstitution(String),

    #[error("psh: command substitution: {0}")]
    CommandSub(String),

    #[error("psh: no match: {0}")]
    NoMatch(String),

    #[error(transparent)]
    Arith(#[from] ArithError),

    #[error(transparent)]
    Var(#[from] VarError),
}

impl ExpansionError {
    /// The exit code the failing command reports.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Fork-and-capture services the expander borrows from the executor.
pub trait ExpansionHost {
    /// Run `command` in a child shell and capture its stdout, with
    /// trailing newlines stripped and NUL bytes removed.
    fn command_substitution(
        &mut self,
        state: &mut ShellState,
        command: &str,
    ) -> Result<String, ExpansionError>;

    /// Spawn `command` wired to a pipe and return the `/dev/fd/N` path.
    fn process_substitution(
        &mut self,
        state: &mut ShellState,
        command: &str,
        direction: ProcessSubDirection,
    ) -> Result<String, ExpansionError>;
}

/// Host for contexts where substitution is unavailable (pure expansion in
/// tests and validation mode).
pub struct NoSubstitution;

impl ExpansionHost for NoSubstitution {
    fn command_substitution(
        &mut self,
        _state: &mut ShellState,
        command: &str,
    ) -> Result<String, ExpansionError> {
        Err(ExpansionError::CommandSub(format!(
            "substitution not available here: $({command})"
        )))
    }

    fn process_substitution(
        &mut self,
        _state: &mut ShellState,
        command: &str,
        _direction: ProcessSubDirection,
    ) -> Result<String, ExpansionError> {
        Err(ExpansionError::CommandSub(format!(
            "substitution not available here: <({command})"
        )))
    }
}
