//! The `test` / `[` Builtin
//!
//! POSIX test over an argument list: unary operators, binary string and
//! integer comparisons, `!` negation, `-a`/`-o` connectives and
//! parenthesised groups. Unlike `[[ ]]`, string equality here is literal,
//! not a pattern match.

use crate::ast::types::TestUnaryOp;
use crate::executor::context::ExecContext;
use crate::executor::engine::Executor;
use crate::executor::errors::ExecResult;
use crate::executor::test_eval::eval_unary;
use crate::io::fd;
use crate::state::ShellState;

pub fn test(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    evaluate(state, args)
}

/// `[` requires a closing `]` argument.
pub fn bracket(
    executor: &mut Executor,
    state: &mut ShellState,
    ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    match args.last().map(|s| s.as_str()) {
        Some("]") => test(executor, state, ctx, &args[..args.len() - 1]),
        _ => {
            let _ = fd::write_all(2, b"psh: [: missing `]'\n");
            Ok(2)
        }
    }
}

fn evaluate(state: &ShellState, args: &[String]) -> ExecResult {
    if args.is_empty() {
        return Ok(1);
    }
    let mut parser = ArgTest { state, args, pos: 0 };
    match parser.or_expr() {
        Ok(truth) => {
            if parser.pos != args.len() {
                let _ = fd::write_all(2, b"psh: test: too many arguments\n");
                return Ok(2);
            }
            Ok(i32::from(!truth))
        }
        Err(message) => {
            let _ = fd::write_all(2, format!("psh: test: {message}\n").as_bytes());
            Ok(2)
        }
    }
}

struct ArgTest<'a> {
    state: &'a ShellState,
    args: &'a [String],
    pos: usize,
}

impl<'a> ArgTest<'a> {
    fn peek(&self) -> Option<&str> {
        self.args.get(self.pos).map(|s| s.as_str())
    }

    fn bump(&mut self) -> Option<&'a str> {
        let arg = self.args.get(self.pos).map(|s| s.as_str());
        if arg.is_some() {
            self.pos += 1;
        }
        arg
    }

    fn or_expr(&mut self) -> Result<bool, String> {
        let mut value = self.and_expr()?;
        while self.peek() == Some("-o") {
            self.pos += 1;
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<bool, String> {
        let mut value = self.primary()?;
        while self.peek() == Some("-a") {
            self.pos += 1;
            let rhs = self.primary()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn primary(&mut self) -> Result<bool, String> {
        match self.peek() {
            None => Err("argument expected".to_string()),
            Some("!") => {
                self.pos += 1;
                Ok(!self.primary()?)
            }
            Some("(") => {
                self.pos += 1;
                let inner = self.or_expr()?;
                if self.bump() != Some(")") {
                    return Err("missing `)'".to_string());
                }
                Ok(inner)
            }
            Some(op) if unary_op(op).is_some() && self.args.len() - self.pos >= 2 => {
                let op = unary_op(op).expect("checked above");
                self.pos += 1;
                let operand = self.bump().expect("operand present");
                Ok(eval_unary(self.state, op, operand))
            }
            Some(_) => {
                let left = self.bump().expect("argument present");
                match self.peek().and_then(binary_kind) {
                    Some(kind) if self.args.len() - self.pos >= 2 => {
                        self.pos += 1;
                        let right = self.bump().expect("operand present");
                        self.binary(kind, left, right)
                    }
                    _ => Ok(!left.is_empty()),
                }
            }
        }
    }

    fn binary(&self, kind: BinaryKind, left: &str, right: &str) -> Result<bool, String> {
        match kind {
            BinaryKind::StrEq => Ok(left == right),
            BinaryKind::StrNe => Ok(left != right),
            BinaryKind::IntCompare(op) => {
                let a = parse_int(left)?;
                let b = parse_int(right)?;
                Ok(match op {
                    "-eq" => a == b,
                    "-ne" => a != b,
                    "-lt" => a < b,
                    "-le" => a <= b,
                    "-gt" => a > b,
                    "-ge" => a >= b,
                    _ => unreachable!(),
                })
            }
        }
    }
}

#[derive(Clone, Copy)]
enum BinaryKind {
    StrEq,
    StrNe,
    IntCompare(&'static str),
}

fn binary_kind(op: &str) -> Option<BinaryKind> {
    match op {
        "=" | "==" => Some(BinaryKind::StrEq),
        "!=" => Some(BinaryKind::StrNe),
        "-eq" => Some(BinaryKind::IntCompare("-eq")),
        "-ne" => Some(BinaryKind::IntCompare("-ne")),
        "-lt" => Some(BinaryKind::IntCompare("-lt")),
        "-le" => Some(BinaryKind::IntCompare("-le")),
        "-gt" => Some(BinaryKind::IntCompare("-gt")),
        "-ge" => Some(BinaryKind::IntCompare("-ge")),
        _ => None,
    }
}

fn parse_int(text: &str) -> Result<i64, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("{text}: integer expression expected"))
}

fn unary_op(text: &str) -> Option<TestUnaryOp> {
    Some(match text {
        "-b" => TestUnaryOp::BlockSpecial,
        "-c" => TestUnaryOp::CharSpecial,
        "-d" => TestUnaryOp::Directory,
        "-e" => TestUnaryOp::Exists,
        "-f" => TestUnaryOp::RegularFile,
        "-g" => TestUnaryOp::SetGid,
        "-h" | "-L" => TestUnaryOp::Symlink,
        "-p" => TestUnaryOp::Pipe,
        "-r" => TestUnaryOp::Readable,
        "-s" => TestUnaryOp::NonEmptyFile,
        "-t" => TestUnaryOp::Tty,
        "-u" => TestUnaryOp::SetUid,
        "-w" => TestUnaryOp::Writable,
        "-x" => TestUnaryOp::Executable,
        "-n" => TestUnaryOp::NonEmptyString,
        "-z" => TestUnaryOp::EmptyString,
        "-v" => TestUnaryOp::VarSet,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(args: &[&str]) -> i32 {
        let state = ShellState::new();
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        evaluate(&state, &args).unwrap()
    }

    #[test]
    fn empty_and_single_arg() {
        assert_eq!(t(&[]), 1);
        assert_eq!(t(&["nonempty"]), 0);
        assert_eq!(t(&[""]), 1);
    }

    #[test]
    fn string_comparisons_are_literal() {
        assert_eq!(t(&["abc", "=", "abc"]), 0);
        assert_eq!(t(&["abc", "=", "a*"]), 1);
        assert_eq!(t(&["abc", "!=", "abd"]), 0);
    }

    #[test]
    fn integer_comparisons() {
        assert_eq!(t(&["3", "-lt", "5"]), 0);
        assert_eq!(t(&["5", "-le", "3"]), 1);
        assert_eq!(t(&["7", "-eq", "7"]), 0);
        // non-integers are usage errors
        assert_eq!(t(&["x", "-eq", "7"]), 2);
    }

    #[test]
    fn negation_and_connectives() {
        assert_eq!(t(&["!", ""]), 0);
        assert_eq!(t(&["-n", "a", "-a", "-n", "b"]), 0);
        assert_eq!(t(&["-z", "a", "-o", "-n", "b"]), 0);
        assert_eq!(t(&["(", "-z", "a", ")", "-o", "-n", "b"]), 0);
    }

    #[test]
    fn string_length_ops() {
        assert_eq!(t(&["-n", "x"]), 0);
        assert_eq!(t(&["-z", "x"]), 1);
        assert_eq!(t(&["-z", ""]), 0);
    }

    #[test]
    fn trailing_garbage_is_usage_error() {
        assert_eq!(t(&["a", "=", "a", "extra"]), 2);
    }
}
