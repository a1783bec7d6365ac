//! Redirection Parsing
//!
//! Parses `[n]op target` forms. Heredoc operators pull their pre-collected
//! body from the lexer's heredoc queue and attach it to the node; the
//! delimiter word is consumed as the syntactic target.

use crate::ast::types::{Redirect, RedirectKind, RedirectTarget};
use crate::lexer::token::TokenKind;
use crate::parser::types::{ErrorCode, ParseError, ParserContext};
use crate::parser::word_builder::build_word;

/// Parse one redirection if the stream is positioned at one.
pub fn try_parse_redirect(ctx: &mut ParserContext) -> Result<Option<Redirect>, ParseError> {
    let (source_fd, op_offset) = if ctx.check(TokenKind::Number)
        && ctx.peek_at(1).kind.is_redirect()
        && ctx.peek_at(1).adjacent_to_previous
    {
        let fd: i32 = ctx.peek().text.parse().map_err(|_| {
            ctx.error_at_current("file descriptor out of range")
                .code(ErrorCode::BadRedirect)
        })?;
        (Some(fd), 1)
    } else {
        (None, 0)
    };

    let kind = match ctx.peek_at(op_offset).kind {
        TokenKind::Less => RedirectKind::Input,
        TokenKind::Great => RedirectKind::Output,
        TokenKind::Clobber => RedirectKind::OutputClobber,
        TokenKind::DGreat => RedirectKind::Append,
        TokenKind::LessGreat => RedirectKind::ReadWrite,
        TokenKind::DLess => RedirectKind::HereDoc { strip_tabs: false },
        TokenKind::DLessDash => RedirectKind::HereDoc { strip_tabs: true },
        TokenKind::TLess => RedirectKind::HereString,
        TokenKind::LessAnd => RedirectKind::DupInput,
        TokenKind::GreatAnd => RedirectKind::DupOutput,
        _ => return Ok(None),
    };

    if op_offset == 1 {
        ctx.advance(); // the fd number
    }
    ctx.advance(); // the operator

    if !ctx.peek_kind().is_word_like() {
        return Err(ctx
            .error_at_current(&format!("expected redirection target after `{kind}`"))
            .code(ErrorCode::BadRedirect));
    }
    let target_token = ctx.advance();
    let quote_type = target_token.quote_type;
    let word = build_word(&target_token)?;

    let mut redirect = Redirect {
        kind,
        source_fd,
        target: RedirectTarget::Word(word),
        heredoc_content: None,
        heredoc_quoted: false,
        quote_type,
    };

    match kind {
        RedirectKind::HereDoc { .. } => {
            let doc = ctx.heredocs.pop_front().ok_or_else(|| {
                ctx.error_at_current("heredoc body missing")
                    .code(ErrorCode::BadRedirect)
            })?;
            redirect.heredoc_quoted = doc.quoted;
            redirect.heredoc_content = Some(doc.content);
        }
        RedirectKind::DupInput | RedirectKind::DupOutput => {
            // `>&N` duplicates, `>&-` closes; anything else must expand to
            // a descriptor number at apply time
            if let RedirectTarget::Word(w) = &redirect.target {
                if let Some(text) = w.as_literal() {
                    if text == "-" {
                        redirect.target = RedirectTarget::Close;
                    } else if let Ok(n) = text.parse::<i32>() {
                        redirect.target = RedirectTarget::Fd(n);
                    }
                }
            }
        }
        _ => {}
    }

    Ok(Some(redirect))
}

/// Collect a run of redirections (e.g. after `done` or `fi`).
pub fn parse_redirect_list(ctx: &mut ParserContext) -> Result<Vec<Redirect>, ParseError> {
    let mut redirects = Vec::new();
    while let Some(r) = try_parse_redirect(ctx)? {
        redirects.push(r);
    }
    Ok(redirects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::types::ParserContext;

    fn ctx(src: &str) -> ParserContext {
        let out = Lexer::new(src).tokenize().unwrap();
        ParserContext::new(out.tokens, out.heredocs, out.source)
    }

    #[test]
    fn output_with_default_fd() {
        let mut c = ctx("> out.txt");
        let r = try_parse_redirect(&mut c).unwrap().unwrap();
        assert_eq!(r.kind, RedirectKind::Output);
        assert_eq!(r.source_fd, None);
        assert!(matches!(r.target, RedirectTarget::Word(_)));
    }

    #[test]
    fn fd_prefix() {
        let mut c = ctx("2>> log");
        let r = try_parse_redirect(&mut c).unwrap().unwrap();
        assert_eq!(r.kind, RedirectKind::Append);
        assert_eq!(r.source_fd, Some(2));
    }

    #[test]
    fn dup_and_close_targets() {
        let mut c = ctx("2>&1");
        let r = try_parse_redirect(&mut c).unwrap().unwrap();
        assert_eq!(r.kind, RedirectKind::DupOutput);
        assert_eq!(r.target, RedirectTarget::Fd(1));

        let mut c = ctx(">&-");
        let r = try_parse_redirect(&mut c).unwrap().unwrap();
        assert_eq!(r.target, RedirectTarget::Close);
    }

    #[test]
    fn herestring() {
        let mut c = ctx("<<< \"hi there\"");
        let r = try_parse_redirect(&mut c).unwrap().unwrap();
        assert_eq!(r.kind, RedirectKind::HereString);
    }

    #[test]
    fn missing_target_is_an_error() {
        let mut c = ctx("> ;");
        assert!(try_parse_redirect(&mut c).is_err());
    }

    #[test]
    fn not_a_redirect() {
        let mut c = ctx("echo hi");
        assert!(try_parse_redirect(&mut c).unwrap().is_none());
    }
}
