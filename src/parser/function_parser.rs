//! Function Definition Parsing
//!
//! Accepts `name() compound`, `function name compound` and
//! `function name() compound`. Detection requires lookahead past the `()`
//! to a compound command; a simple command body is a syntax error.

use crate::ast::types::{Command, FunctionDef};
use crate::lexer::token::TokenKind;
use crate::parser::redirection_parser::parse_redirect_list;
use crate::parser::statement_parser::parse_command;
use crate::parser::types::{ErrorCode, ParseError, ParserContext};

/// True when the stream is positioned at a function definition.
pub fn at_function_def(ctx: &ParserContext) -> bool {
    if ctx.check(TokenKind::Function) {
        return true;
    }
    ctx.check(TokenKind::Word)
        && ctx.peek_at(1).kind == TokenKind::LParen
        && ctx.peek_at(2).kind == TokenKind::RParen
}

pub fn parse_function_def(ctx: &mut ParserContext) -> Result<FunctionDef, ParseError> {
    let keyword_form = ctx.eat(TokenKind::Function);

    let name_token = ctx.expect(TokenKind::Word)?;
    let name = name_token.text;

    if ctx.eat(TokenKind::LParen) {
        ctx.expect(TokenKind::RParen)?;
    } else if !keyword_form {
        return Err(ctx
            .error_at_current("expected `()` in function definition")
            .code(ErrorCode::BadFunctionDef));
    }
    ctx.skip_newlines();

    ctx.flags.in_function_body = true;
    ctx.function_depth += 1;
    let body = parse_command(ctx);
    ctx.function_depth -= 1;
    ctx.flags.in_function_body = false;
    let body = body?;

    if matches!(body, Command::Simple(_)) {
        return Err(ctx
            .error_at_current("function body must be a compound command")
            .code(ErrorCode::BadFunctionDef));
    }

    Ok(FunctionDef {
        name,
        body: Box::new(body),
        redirects: parse_redirect_list(ctx)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn ctx(src: &str) -> ParserContext {
        let out = Lexer::new(src).tokenize().unwrap();
        ParserContext::new(out.tokens, out.heredocs, out.source)
    }

    #[test]
    fn paren_form() {
        let mut c = ctx("greet() { echo hi; }");
        assert!(at_function_def(&c));
        let f = parse_function_def(&mut c).unwrap();
        assert_eq!(f.name, "greet");
        assert!(matches!(*f.body, Command::BraceGroup(_)));
    }

    #[test]
    fn keyword_form_without_parens() {
        let mut c = ctx("function greet { echo hi; }");
        assert!(at_function_def(&c));
        let f = parse_function_def(&mut c).unwrap();
        assert_eq!(f.name, "greet");
    }

    #[test]
    fn keyword_form_with_parens() {
        let f = parse_function_def(&mut ctx("function greet() { echo hi; }")).unwrap();
        assert_eq!(f.name, "greet");
    }

    #[test]
    fn subshell_body() {
        let f = parse_function_def(&mut ctx("isolated() (echo hi)")).unwrap();
        assert!(matches!(*f.body, Command::Subshell(_)));
    }

    #[test]
    fn body_on_next_line() {
        let f = parse_function_def(&mut ctx("f()\n{ echo hi; }")).unwrap();
        assert_eq!(f.name, "f");
    }

    #[test]
    fn simple_command_body_rejected() {
        assert!(parse_function_def(&mut ctx("f() echo hi")).is_err());
    }

    #[test]
    fn call_is_not_a_definition() {
        let c = ctx("greet arg");
        assert!(!at_function_def(&c));
    }
}
