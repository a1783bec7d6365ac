//! Simple Command Parsing
//!
//! A simple command is a run of assignment words, command words and
//! redirections, in any interleaving, ending at a control operator. The
//! assignment prefix only extends until the first non-assignment word.

use crate::ast::types::SimpleCommand;
use crate::lexer::token::TokenKind;
use crate::parser::array_parser::{parse_assignment, try_parse_split_array_assignment};
use crate::parser::redirection_parser::try_parse_redirect;
use crate::parser::types::{ParseError, ParserContext};
use crate::parser::word_builder::build_word;

pub fn parse_simple_command(ctx: &mut ParserContext) -> Result<SimpleCommand, ParseError> {
    let mut command = SimpleCommand {
        assignments: Vec::new(),
        words: Vec::new(),
        redirects: Vec::new(),
        background: false,
        line: ctx.peek().line,
    };

    loop {
        if let Some(redirect) = try_parse_redirect(ctx)? {
            command.redirects.push(redirect);
            continue;
        }

        match ctx.peek_kind() {
            TokenKind::AssignmentWord if command.words.is_empty() => {
                let tok = ctx.advance();
                command.assignments.push(parse_assignment(ctx, &tok)?);
            }
            TokenKind::Word if command.words.is_empty() => {
                // Accept the split tokenisation `arr[0]` `=v` before falling
                // back to a plain word
                if let Some(assignment) = try_parse_split_array_assignment(ctx)? {
                    command.assignments.push(assignment);
                    continue;
                }
                let tok = ctx.advance();
                command.words.push(build_word(&tok)?);
            }
            kind if kind.is_word_like() => {
                let tok = ctx.advance();
                command.words.push(build_word(&tok)?);
            }
            // `in` and other keywords lose their special meaning as
            // arguments but end the command when they lead it
            TokenKind::In if !command.words.is_empty() => {
                let tok = ctx.advance();
                command.words.push(build_word(&tok)?);
            }
            _ => break,
        }
    }

    if command.words.is_empty() && command.assignments.is_empty() && command.redirects.is_empty()
    {
        return Err(ctx.error_at_current(&format!(
            "expected command, found `{}`",
            if ctx.at_end() { "end of input" } else { &ctx.peek().text }
        )));
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> SimpleCommand {
        let out = Lexer::new(src).tokenize().unwrap();
        let mut ctx = ParserContext::new(out.tokens, out.heredocs, out.source);
        parse_simple_command(&mut ctx).unwrap()
    }

    #[test]
    fn words_and_args() {
        let cmd = parse("echo hello world");
        assert_eq!(cmd.words.len(), 3);
        assert_eq!(cmd.words[0].as_literal().as_deref(), Some("echo"));
    }

    #[test]
    fn assignment_prefix() {
        let cmd = parse("FOO=bar BAZ=qux env");
        assert_eq!(cmd.assignments.len(), 2);
        assert_eq!(cmd.words.len(), 1);
    }

    #[test]
    fn assignment_only() {
        let cmd = parse("X=1");
        assert!(cmd.words.is_empty());
        assert_eq!(cmd.assignments.len(), 1);
    }

    #[test]
    fn assignment_after_word_is_an_argument() {
        let cmd = parse("env FOO=bar");
        assert!(cmd.assignments.is_empty());
        assert_eq!(cmd.words.len(), 2);
    }

    #[test]
    fn interleaved_redirects() {
        let cmd = parse("> out echo hi 2>&1");
        assert_eq!(cmd.redirects.len(), 2);
        assert_eq!(cmd.words.len(), 2);
    }

    #[test]
    fn stops_at_control_operator() {
        let out = Lexer::new("echo a; echo b").tokenize().unwrap();
        let mut ctx = ParserContext::new(out.tokens, out.heredocs, out.source);
        let cmd = parse_simple_command(&mut ctx).unwrap();
        assert_eq!(cmd.words.len(), 2);
        assert_eq!(ctx.peek_kind(), TokenKind::Semi);
    }

    #[test]
    fn empty_input_is_an_error() {
        let out = Lexer::new(";").tokenize().unwrap();
        let mut ctx = ParserContext::new(out.tokens, out.heredocs, out.source);
        assert!(parse_simple_command(&mut ctx).is_err());
    }
}
