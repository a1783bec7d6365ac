//! Control Structure Parsing
//!
//! Each control structure has a canonical syntax; the parsers here consume
//! the whole construct including trailing redirections. Bodies are statement
//! lists terminated by the structure's closing keyword.

use crate::ast::types::{
    ArithmeticEvaluation, BraceGroup, BreakStatement, CStyleForLoop, CaseConditional, CaseItem,
    CaseTerminator, ContinueStatement, ControlKind, ControlStructure, ExecutionContext,
    ForLoop, IfConditional, SelectLoop, Statement, SubshellGroup, UntilLoop, WhileLoop,
};
use crate::lexer::token::TokenKind;
use crate::parser::conditional_parser::parse_test_command;
use crate::parser::parser::parse_statement;
use crate::parser::redirection_parser::parse_redirect_list;
use crate::parser::types::{ParseError, ParserContext};
use crate::parser::word_builder::build_word;

/// Parse statements until one of `terminators` (or EOF) is at the front.
/// The terminator is not consumed.
pub fn parse_body(
    ctx: &mut ParserContext,
    terminators: &[TokenKind],
) -> Result<Vec<Statement>, ParseError> {
    let mut body = Vec::new();
    loop {
        ctx.skip_separators();
        if ctx.at_end() || terminators.contains(&ctx.peek_kind()) {
            return Ok(body);
        }
        body.push(parse_statement(ctx)?);
    }
}

/// Dispatch on the leading token of a control structure.
pub fn parse_control(ctx: &mut ParserContext) -> Result<ControlStructure, ParseError> {
    ctx.nesting_depth += 1;
    let kind = match ctx.peek_kind() {
        TokenKind::If => parse_if(ctx),
        TokenKind::While => parse_while(ctx),
        TokenKind::Until => parse_until(ctx),
        TokenKind::For => parse_for(ctx),
        TokenKind::Case => parse_case(ctx),
        TokenKind::Select => parse_select(ctx),
        TokenKind::DParenOpen => parse_arithmetic_eval(ctx),
        TokenKind::DBrackOpen => parse_test_command(ctx).map(ControlKind::Test),
        TokenKind::Word if ctx.peek().text == "break" => parse_break(ctx),
        TokenKind::Word if ctx.peek().text == "continue" => parse_continue(ctx),
        _ => Err(ctx.error_at_current("expected control structure")),
    };
    ctx.nesting_depth -= 1;

    Ok(ControlStructure {
        kind: kind?,
        redirects: parse_redirect_list(ctx)?,
        background: false,
        execution_context: ExecutionContext::Statement,
    })
}

fn parse_if(ctx: &mut ParserContext) -> Result<ControlKind, ParseError> {
    ctx.expect(TokenKind::If)?;
    let condition = parse_body(ctx, &[TokenKind::Then])?;
    ctx.expect(TokenKind::Then)?;
    let body = parse_body(ctx, &[TokenKind::Elif, TokenKind::Else, TokenKind::Fi])?;
    let mut clauses = vec![(condition, body)];

    while ctx.eat(TokenKind::Elif) {
        let cond = parse_body(ctx, &[TokenKind::Then])?;
        ctx.expect(TokenKind::Then)?;
        let body = parse_body(ctx, &[TokenKind::Elif, TokenKind::Else, TokenKind::Fi])?;
        clauses.push((cond, body));
    }

    let else_body = if ctx.eat(TokenKind::Else) {
        Some(parse_body(ctx, &[TokenKind::Fi])?)
    } else {
        None
    };
    ctx.expect(TokenKind::Fi)?;
    Ok(ControlKind::If(IfConditional { clauses, else_body }))
}

fn parse_while(ctx: &mut ParserContext) -> Result<ControlKind, ParseError> {
    ctx.expect(TokenKind::While)?;
    let condition = parse_body(ctx, &[TokenKind::Do])?;
    let body = parse_loop_body(ctx)?;
    Ok(ControlKind::While(WhileLoop { condition, body }))
}

fn parse_until(ctx: &mut ParserContext) -> Result<ControlKind, ParseError> {
    ctx.expect(TokenKind::Until)?;
    let condition = parse_body(ctx, &[TokenKind::Do])?;
    let body = parse_loop_body(ctx)?;
    Ok(ControlKind::Until(UntilLoop { condition, body }))
}

/// `do body done`, shared by every loop form.
fn parse_loop_body(ctx: &mut ParserContext) -> Result<Vec<Statement>, ParseError> {
    ctx.skip_separators();
    ctx.expect(TokenKind::Do)?;
    ctx.loop_depth += 1;
    let body = parse_body(ctx, &[TokenKind::Done]);
    ctx.loop_depth -= 1;
    let body = body?;
    ctx.expect(TokenKind::Done)?;
    Ok(body)
}

fn parse_for(ctx: &mut ParserContext) -> Result<ControlKind, ParseError> {
    ctx.expect(TokenKind::For)?;

    // C-style: for ((init; cond; update))
    if ctx.check(TokenKind::DParenOpen) {
        ctx.advance();
        let expr_token = ctx.expect(TokenKind::String)?;
        ctx.expect(TokenKind::DParenClose)?;
        let sections: Vec<&str> = expr_token.text.split(';').collect();
        if sections.len() != 3 {
            return Err(ctx
                .error_at_current("expected `((init; cond; update))` in for loop"));
        }
        let part = |s: &str| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        };
        let body = parse_loop_body(ctx)?;
        return Ok(ControlKind::CStyleFor(CStyleForLoop {
            init: part(sections[0]),
            condition: part(sections[1]),
            update: part(sections[2]),
            body,
        }));
    }

    let variable = parse_loop_variable(ctx)?;
    let words = parse_in_words(ctx)?;
    let body = parse_loop_body(ctx)?;
    Ok(ControlKind::For(ForLoop {
        variable,
        words,
        body,
    }))
}

fn parse_select(ctx: &mut ParserContext) -> Result<ControlKind, ParseError> {
    ctx.expect(TokenKind::Select)?;
    let variable = parse_loop_variable(ctx)?;
    let words = parse_in_words(ctx)?;
    let body = parse_loop_body(ctx)?;
    Ok(ControlKind::Select(SelectLoop {
        variable,
        words,
        body,
    }))
}

fn parse_loop_variable(ctx: &mut ParserContext) -> Result<String, ParseError> {
    let tok = ctx.expect(TokenKind::Word)?;
    let valid = tok
        .text
        .chars()
        .enumerate()
        .all(|(i, c)| if i == 0 { c.is_ascii_alphabetic() || c == '_' } else { c.is_ascii_alphanumeric() || c == '_' });
    if tok.text.is_empty() || !valid {
        return Err(ctx.error_at_current(&format!("`{}` is not a valid identifier", tok.text)));
    }
    Ok(tok.text)
}

/// `in word...` — absent `in` means iterate the positional parameters.
fn parse_in_words(
    ctx: &mut ParserContext,
) -> Result<Option<Vec<crate::ast::types::Word>>, ParseError> {
    if !ctx.eat(TokenKind::In) {
        return Ok(None);
    }
    let mut words = Vec::new();
    while ctx.peek_kind().is_word_like() {
        let tok = ctx.advance();
        words.push(build_word(&tok)?);
    }
    Ok(Some(words))
}

fn parse_case(ctx: &mut ParserContext) -> Result<ControlKind, ParseError> {
    ctx.expect(TokenKind::Case)?;
    if !ctx.peek_kind().is_word_like() {
        return Err(ctx.error_at_current("expected word after `case`"));
    }
    let subject_token = ctx.advance();
    let subject = build_word(&subject_token)?;
    ctx.skip_newlines();
    ctx.expect(TokenKind::In)?;

    let mut items = Vec::new();
    loop {
        ctx.skip_separators();
        if ctx.eat(TokenKind::Esac) {
            return Ok(ControlKind::Case(CaseConditional { subject, items }));
        }
        if ctx.at_end() {
            ctx.expect(TokenKind::Esac)?;
        }
        items.push(parse_case_item(ctx)?);
    }
}

fn parse_case_item(ctx: &mut ParserContext) -> Result<CaseItem, ParseError> {
    ctx.flags.in_case_pattern = true;
    ctx.eat(TokenKind::LParen);
    let mut patterns = Vec::new();
    loop {
        if !ctx.peek_kind().is_word_like() {
            ctx.flags.in_case_pattern = false;
            return Err(ctx.error_at_current("expected pattern in case item"));
        }
        let tok = ctx.advance();
        patterns.push(build_word(&tok)?);
        if !ctx.eat(TokenKind::Pipe) {
            break;
        }
    }
    ctx.flags.in_case_pattern = false;
    ctx.expect(TokenKind::RParen)?;

    let body = parse_body(
        ctx,
        &[
            TokenKind::DSemi,
            TokenKind::SemiAnd,
            TokenKind::DSemiAnd,
            TokenKind::Esac,
        ],
    )?;

    let terminator = match ctx.peek_kind() {
        TokenKind::DSemi => {
            ctx.advance();
            CaseTerminator::Break
        }
        TokenKind::SemiAnd => {
            ctx.advance();
            CaseTerminator::FallThrough
        }
        TokenKind::DSemiAnd => {
            ctx.advance();
            CaseTerminator::ContinueMatching
        }
        // last item may omit the terminator before `esac`
        _ => CaseTerminator::Break,
    };

    Ok(CaseItem {
        patterns,
        body,
        terminator,
    })
}

fn parse_arithmetic_eval(ctx: &mut ParserContext) -> Result<ControlKind, ParseError> {
    let open = ctx.expect(TokenKind::DParenOpen)?;
    let expr_token = ctx.expect(TokenKind::String)?;
    ctx.expect(TokenKind::DParenClose)?;
    Ok(ControlKind::ArithmeticEval(ArithmeticEvaluation {
        expression: expr_token.text,
        line: open.line,
    }))
}

fn parse_break(ctx: &mut ParserContext) -> Result<ControlKind, ParseError> {
    ctx.advance(); // `break`
    Ok(ControlKind::Break(BreakStatement {
        level: parse_level(ctx),
    }))
}

fn parse_continue(ctx: &mut ParserContext) -> Result<ControlKind, ParseError> {
    ctx.advance(); // `continue`
    Ok(ControlKind::Continue(ContinueStatement {
        level: parse_level(ctx),
    }))
}

/// Optional numeric level argument; validation happens at execution time.
fn parse_level(ctx: &mut ParserContext) -> u32 {
    if ctx.peek_kind().is_word_like() {
        if let Ok(n) = ctx.peek().text.parse::<u32>() {
            ctx.advance();
            return n;
        }
    }
    1
}

/// `( body )` — runs in a forked child.
pub fn parse_subshell(ctx: &mut ParserContext) -> Result<SubshellGroup, ParseError> {
    ctx.expect(TokenKind::LParen)?;
    let body = parse_body(ctx, &[TokenKind::RParen])?;
    ctx.expect(TokenKind::RParen)?;
    Ok(SubshellGroup {
        body,
        redirects: parse_redirect_list(ctx)?,
        background: false,
    })
}

/// `{ body; }` — runs in the current process.
pub fn parse_brace_group(ctx: &mut ParserContext) -> Result<BraceGroup, ParseError> {
    ctx.expect(TokenKind::LBrace)?;
    let body = parse_body(ctx, &[TokenKind::RBrace])?;
    ctx.expect(TokenKind::RBrace)?;
    Ok(BraceGroup {
        body,
        redirects: parse_redirect_list(ctx)?,
        background: false,
    })
}
