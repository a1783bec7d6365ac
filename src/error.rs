//! Top-Level Error Taxonomy
//!
//! Syntax errors abort the current top-level statement; execution errors
//! carry their exit-code conventions. Messages format as
//! `psh: <component>: <message>` on stderr.

use crate::executor::ExecError;
use crate::lexer::LexerError;
use crate::parser::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Lex(#[from] LexerError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl ShellError {
    /// Exit code when the error reaches the shell's top level.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShellError::Lex(_) | ShellError::Parse(_) => 2,
            ShellError::Exec(e) => e.final_code(),
        }
    }
}
