//! Arithmetic evaluation for `$(( ))`, `(( ))`, array subscripts and
//! substring offsets: a string expression plus shell state in, an `i64` out.

pub mod eval;
pub mod lexer;

pub use eval::{eval, eval_condition};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ArithError {
    #[error("psh: arithmetic: division by zero")]
    DivisionByZero,

    #[error("psh: arithmetic: exponent less than 0")]
    NegativeExponent,

    #[error("psh: arithmetic: invalid number `{0}`")]
    BadNumber(String),

    #[error("psh: arithmetic: invalid arithmetic base {0}")]
    BadBase(u32),

    #[error("psh: arithmetic: syntax error: {0}")]
    Syntax(String),

    #[error("psh: arithmetic: {0}")]
    Assignment(String),
}
