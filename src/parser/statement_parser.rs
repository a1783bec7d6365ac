//! Statements, And-Or Lists and Pipelines
//!
//! Precedence from tightest to loosest: command, pipeline (`|`), and-or
//! list (`&&`/`||`), statement list (`;`/newline). Control structures plug
//! in at the command level and are tagged with their execution context when
//! they sit inside a multi-command pipeline.

use crate::ast::types::{AndOrList, AndOrOperator, Command, ExecutionContext, Pipeline};
use crate::lexer::token::TokenKind;
use crate::parser::command_parser::parse_simple_command;
use crate::parser::compound_parser::{parse_brace_group, parse_control, parse_subshell};
use crate::parser::types::{ParseError, ParserContext};

/// One pipeline component.
pub fn parse_command(ctx: &mut ParserContext) -> Result<Command, ParseError> {
    match ctx.peek_kind() {
        TokenKind::LParen => Ok(Command::Subshell(parse_subshell(ctx)?)),
        TokenKind::LBrace => Ok(Command::BraceGroup(parse_brace_group(ctx)?)),
        TokenKind::If
        | TokenKind::While
        | TokenKind::Until
        | TokenKind::For
        | TokenKind::Case
        | TokenKind::Select
        | TokenKind::DParenOpen
        | TokenKind::DBrackOpen => Ok(Command::Control(parse_control(ctx)?)),
        TokenKind::Word if matches!(ctx.peek().text.as_str(), "break" | "continue") => {
            Ok(Command::Control(parse_control(ctx)?))
        }
        _ => Ok(Command::Simple(parse_simple_command(ctx)?)),
    }
}

/// `[!] command (| command)*`
pub fn parse_pipeline(ctx: &mut ParserContext) -> Result<Pipeline, ParseError> {
    let negated = ctx.eat(TokenKind::Bang);
    let mut commands = vec![parse_command(ctx)?];

    while ctx.eat(TokenKind::Pipe) {
        ctx.skip_newlines();
        commands.push(parse_command(ctx)?);
    }

    // Control structures inside a real pipeline need the fork strategy tag
    if commands.len() > 1 {
        for command in &mut commands {
            if let Command::Control(ctrl) = command {
                ctrl.execution_context = ExecutionContext::Pipeline;
            }
        }
    }

    Ok(Pipeline {
        commands,
        negated,
        background: false,
    })
}

/// `pipeline ((&& | ||) pipeline)*`
pub fn parse_and_or(ctx: &mut ParserContext) -> Result<AndOrList, ParseError> {
    let mut pipelines = vec![parse_pipeline(ctx)?];
    let mut operators = Vec::new();

    loop {
        let op = match ctx.peek_kind() {
            TokenKind::AndAnd => AndOrOperator::And,
            TokenKind::OrOr => AndOrOperator::Or,
            _ => break,
        };
        ctx.advance();
        ctx.skip_newlines();
        operators.push(op);
        pipelines.push(parse_pipeline(ctx)?);
    }

    Ok(AndOrList {
        pipelines,
        operators,
        background: false,
    })
}
