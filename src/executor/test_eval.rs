//! Conditional Expression Evaluation ([[ ]])
//!
//! Word comparisons treat the right side as a shell pattern; `=~` compiles
//! it as a regex. Numeric comparisons evaluate both sides arithmetically.
//! The file-test helpers are shared with the `test` builtin.

use crate::arithmetic;
use crate::ast::types::{TestBinaryOp, TestExpr, TestUnaryOp, Word};
use crate::executor::engine::Executor;
use crate::executor::errors::ExecError;
use crate::expansion::expander::{expand_word_to_pattern, expand_word_to_string};
use crate::expansion::pattern::{matches_pattern, PatternOptions};
use crate::state::ShellState;
use regex_lite::Regex;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::fs::MetadataExt;
use std::os::unix::fs::PermissionsExt;

pub fn eval_test_expr(
    executor: &mut Executor,
    state: &mut ShellState,
    expr: &TestExpr,
) -> Result<bool, ExecError> {
    match expr {
        TestExpr::And(lhs, rhs) => {
            Ok(eval_test_expr(executor, state, lhs)? && eval_test_expr(executor, state, rhs)?)
        }
        TestExpr::Or(lhs, rhs) => {
            Ok(eval_test_expr(executor, state, lhs)? || eval_test_expr(executor, state, rhs)?)
        }
        TestExpr::Not(inner) => Ok(!eval_test_expr(executor, state, inner)?),
        TestExpr::Group(inner) => eval_test_expr(executor, state, inner),
        TestExpr::Word(word) => {
            let value = expand_word_to_string(state, executor, word)?;
            Ok(!value.is_empty())
        }
        TestExpr::Unary(unary) => {
            let operand = expand_word_to_string(state, executor, &unary.operand)?;
            Ok(eval_unary(state, unary.op, &operand))
        }
        TestExpr::Binary(binary) => eval_binary(executor, state, binary.op, &binary.left, &binary.right),
    }
}

fn eval_binary(
    executor: &mut Executor,
    state: &mut ShellState,
    op: TestBinaryOp,
    left: &Word,
    right: &Word,
) -> Result<bool, ExecError> {
    let lhs = expand_word_to_string(state, executor, left)?;
    match op {
        TestBinaryOp::Eq | TestBinaryOp::Ne => {
            let pattern = expand_word_to_pattern(state, executor, right)?;
            let opts = PatternOptions {
                extglob: state.options.extglob,
                case_insensitive: state.options.nocasematch,
            };
            let matched = matches_pattern(&lhs, &pattern, opts);
            Ok(if op == TestBinaryOp::Eq { matched } else { !matched })
        }
        TestBinaryOp::Match => {
            let pattern = expand_word_to_string(state, executor, right)?;
            let re = Regex::new(&pattern)
                .map_err(|e| ExecError::Builtin(format!("invalid regex: {e}")))?;
            Ok(re.is_match(&lhs))
        }
        TestBinaryOp::Lt | TestBinaryOp::Gt => {
            let rhs = expand_word_to_string(state, executor, right)?;
            Ok(if op == TestBinaryOp::Lt {
                lhs < rhs
            } else {
                lhs > rhs
            })
        }
        TestBinaryOp::NumEq
        | TestBinaryOp::NumNe
        | TestBinaryOp::NumLt
        | TestBinaryOp::NumLe
        | TestBinaryOp::NumGt
        | TestBinaryOp::NumGe => {
            let rhs = expand_word_to_string(state, executor, right)?;
            let a = arithmetic::eval(&lhs, state)?;
            let b = arithmetic::eval(&rhs, state)?;
            Ok(match op {
                TestBinaryOp::NumEq => a == b,
                TestBinaryOp::NumNe => a != b,
                TestBinaryOp::NumLt => a < b,
                TestBinaryOp::NumLe => a <= b,
                TestBinaryOp::NumGt => a > b,
                TestBinaryOp::NumGe => a >= b,
                _ => unreachable!(),
            })
        }
        TestBinaryOp::NewerThan | TestBinaryOp::OlderThan => {
            let rhs = expand_word_to_string(state, executor, right)?;
            let lm = mtime(&lhs);
            let rm = mtime(&rhs);
            Ok(match (lm, rm, op) {
                (Some(a), Some(b), TestBinaryOp::NewerThan) => a > b,
                (Some(a), Some(b), TestBinaryOp::OlderThan) => a < b,
                (Some(_), None, TestBinaryOp::NewerThan) => true,
                (None, Some(_), TestBinaryOp::OlderThan) => true,
                _ => false,
            })
        }
        TestBinaryOp::SameFile => {
            let rhs = expand_word_to_string(state, executor, right)?;
            Ok(same_file(&lhs, &rhs))
        }
    }
}

fn mtime(path: &str) -> Option<i64> {
    std::fs::metadata(path).ok().map(|m| m.mtime())
}

fn same_file(a: &str, b: &str) -> bool {
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

/// Unary operators, shared with the `test` builtin via [`file_test`].
pub fn eval_unary(state: &ShellState, op: TestUnaryOp, operand: &str) -> bool {
    match op {
        TestUnaryOp::NonEmptyString => !operand.is_empty(),
        TestUnaryOp::EmptyString => operand.is_empty(),
        TestUnaryOp::VarSet => state.lookup(operand).is_some(),
        TestUnaryOp::Tty => {
            let fd: i32 = operand.parse().unwrap_or(-1);
            unsafe { libc::isatty(fd) == 1 }
        }
        other => file_test(other, operand),
    }
}

/// File-shaped unary tests.
pub fn file_test(op: TestUnaryOp, path: &str) -> bool {
    use std::fs;
    match op {
        TestUnaryOp::Exists => fs::symlink_metadata(path).is_ok(),
        TestUnaryOp::RegularFile => fs::metadata(path).map(|m| m.is_file()).unwrap_or(false),
        TestUnaryOp::Directory => fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false),
        TestUnaryOp::Symlink => fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false),
        TestUnaryOp::NonEmptyFile => fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false),
        TestUnaryOp::Readable => unsafe {
            std::ffi::CString::new(path)
                .map(|p| libc::access(p.as_ptr(), libc::R_OK) == 0)
                .unwrap_or(false)
        },
        TestUnaryOp::Writable => unsafe {
            std::ffi::CString::new(path)
                .map(|p| libc::access(p.as_ptr(), libc::W_OK) == 0)
                .unwrap_or(false)
        },
        TestUnaryOp::Executable => unsafe {
            std::ffi::CString::new(path)
                .map(|p| libc::access(p.as_ptr(), libc::X_OK) == 0)
                .unwrap_or(false)
        },
        TestUnaryOp::Pipe => fs::metadata(path)
            .map(|m| m.file_type().is_fifo())
            .unwrap_or(false),
        TestUnaryOp::BlockSpecial => fs::metadata(path)
            .map(|m| m.file_type().is_block_device())
            .unwrap_or(false),
        TestUnaryOp::CharSpecial => fs::metadata(path)
            .map(|m| m.file_type().is_char_device())
            .unwrap_or(false),
        TestUnaryOp::SetUid => fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o4000 != 0)
            .unwrap_or(false),
        TestUnaryOp::SetGid => fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o2000 != 0)
            .unwrap_or(false),
        // string/fd operators never reach here
        _ => false,
    }
}
