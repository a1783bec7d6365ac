//! Conditional Expression Parsing ([[ ]])
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    := or
//! or      := and ( '||' and )*
//! and     := primary ( '&&' primary )*
//! primary := '!' primary | '(' expr ')' | unary | binary | word
//! ```
//!
//! Word comparisons (`=`, `==`, `!=`, `=~`, `<`, `>`) treat the right side
//! as a pattern; numeric comparisons use `-eq` and friends.

use crate::ast::types::{TestBinary, TestBinaryOp, TestCommand, TestExpr, TestUnary, TestUnaryOp};
use crate::lexer::token::TokenKind;
use crate::parser::types::{ParseError, ParserContext};
use crate::parser::word_builder::build_word;

/// Parse `[[ ... ]]` starting at the opening fence.
pub fn parse_test_command(ctx: &mut ParserContext) -> Result<TestCommand, ParseError> {
    let open = ctx.expect(TokenKind::DBrackOpen)?;
    ctx.flags.in_test_expr = true;
    ctx.conditional_depth += 1;
    let result = parse_or(ctx);
    ctx.conditional_depth -= 1;
    ctx.flags.in_test_expr = false;
    let expression = result?;
    ctx.expect(TokenKind::DBrackClose)?;
    Ok(TestCommand {
        expression,
        line: open.line,
    })
}

fn parse_or(ctx: &mut ParserContext) -> Result<TestExpr, ParseError> {
    let mut left = parse_and(ctx)?;
    loop {
        ctx.skip_newlines();
        if ctx.eat(TokenKind::OrOr) {
            ctx.skip_newlines();
            let right = parse_and(ctx)?;
            left = TestExpr::Or(Box::new(left), Box::new(right));
        } else {
            return Ok(left);
        }
    }
}

fn parse_and(ctx: &mut ParserContext) -> Result<TestExpr, ParseError> {
    let mut left = parse_primary(ctx)?;
    loop {
        ctx.skip_newlines();
        if ctx.eat(TokenKind::AndAnd) {
            ctx.skip_newlines();
            let right = parse_primary(ctx)?;
            left = TestExpr::And(Box::new(left), Box::new(right));
        } else {
            return Ok(left);
        }
    }
}

fn parse_primary(ctx: &mut ParserContext) -> Result<TestExpr, ParseError> {
    ctx.skip_newlines();

    if ctx.eat(TokenKind::Bang) {
        let operand = parse_primary(ctx)?;
        return Ok(TestExpr::Not(Box::new(operand)));
    }
    if ctx.eat(TokenKind::LParen) {
        let inner = parse_or(ctx)?;
        ctx.expect(TokenKind::RParen)?;
        return Ok(TestExpr::Group(Box::new(inner)));
    }

    if !ctx.peek_kind().is_word_like() {
        return Err(ctx.error_at_current("expected expression in [[ ]]"));
    }

    // Unary operator followed by an operand word
    if let Some(op) = unary_op(&ctx.peek().text) {
        if ctx.peek_at(1).kind.is_word_like() {
            ctx.advance();
            let operand_token = ctx.advance();
            return Ok(TestExpr::Unary(TestUnary {
                op,
                operand: build_word(&operand_token)?,
            }));
        }
    }

    let left_token = ctx.advance();
    let left = build_word(&left_token)?;

    let op = match ctx.peek_kind() {
        TokenKind::Less => Some(TestBinaryOp::Lt),
        TokenKind::Great => Some(TestBinaryOp::Gt),
        kind if kind.is_word_like() => binary_op(&ctx.peek().text),
        _ => None,
    };

    match op {
        Some(op) => {
            ctx.advance();
            if !ctx.peek_kind().is_word_like() {
                return Err(ctx.error_at_current("expected right operand in [[ ]]"));
            }
            let right_token = ctx.advance();
            Ok(TestExpr::Binary(TestBinary {
                op,
                left,
                right: build_word(&right_token)?,
            }))
        }
        None => Ok(TestExpr::Word(left)),
    }
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

fn binary_op(text: &str) -> Option<TestBinaryOp> {
    Some(match text {
        "=" | "==" => TestBinaryOp::Eq,
        "!=" => TestBinaryOp::Ne,
        "=~" => TestBinaryOp::Match,
        "-eq" => TestBinaryOp::NumEq,
        "-ne" => TestBinaryOp::NumNe,
        "-lt" => TestBinaryOp::NumLt,
        "-le" => TestBinaryOp::NumLe,
        "-gt" => TestBinaryOp::NumGt,
        "-ge" => TestBinaryOp::NumGe,
        "-nt" => TestBinaryOp::NewerThan,
        "-ot" => TestBinaryOp::OlderThan,
        "-ef" => TestBinaryOp::SameFile,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> TestExpr {
        let out = Lexer::new(src).tokenize().unwrap();
        let mut ctx = ParserContext::new(out.tokens, out.heredocs, out.source);
        parse_test_command(&mut ctx).unwrap().expression
    }

    #[test]
    fn unary_file_test() {
        let e = parse("[[ -f /etc/passwd ]]");
        assert!(matches!(
            e,
            TestExpr::Unary(TestUnary {
                op: TestUnaryOp::RegularFile,
                ..
            })
        ));
    }

    #[test]
    fn binary_string_compare() {
        let e = parse("[[ $x == foo* ]]");
        assert!(matches!(
            e,
            TestExpr::Binary(TestBinary {
                op: TestBinaryOp::Eq,
                ..
            })
        ));
    }

    #[test]
    fn numeric_compare() {
        let e = parse("[[ 3 -lt 5 ]]");
        assert!(matches!(
            e,
            TestExpr::Binary(TestBinary {
                op: TestBinaryOp::NumLt,
                ..
            })
        ));
    }

    #[test]
    fn negation_and_grouping() {
        let e = parse("[[ ! ( -z $a || -z $b ) ]]");
        match e {
            TestExpr::Not(inner) => assert!(matches!(*inner, TestExpr::Group(_))),
            other => panic!("expected Not, got {other:?}"),
        }
    }

    #[test]
    fn and_or_precedence() {
        // a && b || c parses as (a && b) || c
        let e = parse("[[ -n $a && -n $b || -n $c ]]");
        assert!(matches!(e, TestExpr::Or(lhs, _) if matches!(*lhs, TestExpr::And(..))));
    }

    #[test]
    fn bare_word_is_nonempty_test() {
        let e = parse("[[ $x ]]");
        assert!(matches!(e, TestExpr::Word(_)));
    }

    #[test]
    fn regex_match() {
        let e = parse("[[ $x =~ ^[0-9]+$ ]]");
        assert!(matches!(
            e,
            TestExpr::Binary(TestBinary {
                op: TestBinaryOp::Match,
                ..
            })
        ));
    }

    #[test]
    fn missing_close_is_an_error() {
        let out = Lexer::new("[[ -f x").tokenize().unwrap();
        let mut ctx = ParserContext::new(out.tokens, out.heredocs, out.source);
        assert!(parse_test_command(&mut ctx).is_err());
    }
}
