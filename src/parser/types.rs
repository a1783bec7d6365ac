//! Parser Context and Errors
//!
//! All sub-parsers share a `ParserContext`: the token stream with a cursor,
//! parsing flags, depth counters, the heredoc queue and an error list. Error
//! handling runs in one of three modes: strict (raise on first error),
//! collect (accumulate up to `max_errors`), recover (collect and skip to the
//! next statement boundary).

use crate::lexer::heredoc::HeredocDoc;
use crate::lexer::token::{Token, TokenKind};
use std::collections::VecDeque;
use std::fmt;

/// How the parser reacts to syntax errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    #[default]
    Strict,
    Collect,
    Recover,
}

/// Flags describing what grammar region the parser is inside.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserFlags {
    pub in_function_body: bool,
    pub in_arithmetic: bool,
    pub in_test_expr: bool,
    pub in_case_pattern: bool,
    pub in_command_substitution: bool,
}

/// Structured context attached to every parse error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    pub line: usize,
    pub column: usize,
    /// Token texts around the failure point
    pub surrounding: Vec<String>,
    pub expected: Vec<String>,
    pub suggestion: Option<String>,
    pub code: ErrorCode,
    /// The offending source line, for caret display
    pub source_line: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorCode {
    #[default]
    UnexpectedToken,
    UnexpectedEof,
    MissingKeyword,
    BadSubstitution,
    BadRedirect,
    BadFunctionDef,
}

/// A syntax error with display context.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub context: ErrorContext,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestion = Some(suggestion.into());
        self
    }

    pub fn code(mut self, code: ErrorCode) -> Self {
        self.context.code = code;
        self
    }

    fn render(&self) -> String {
        let mut out = format!(
            "psh: parser: {} (line {}, column {})",
            self.message, self.context.line, self.context.column
        );
        if let Some(line) = &self.context.source_line {
            out.push('\n');
            out.push_str(line);
            out.push('\n');
            let caret_col = self.context.column.saturating_sub(1);
            out.push_str(&" ".repeat(caret_col));
            out.push('^');
        }
        if let Some(hint) = &self.context.suggestion {
            out.push_str("\nhint: ");
            out.push_str(hint);
        }
        out
    }
}

impl fmt::Display for ParserFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fn={} arith={} test={} case={} cmdsub={}",
            self.in_function_body,
            self.in_arithmetic,
            self.in_test_expr,
            self.in_case_pattern,
            self.in_command_substitution
        )
    }
}

/// Shared state for all sub-parsers.
#[derive(Debug)]
pub struct ParserContext {
    tokens: Vec<Token>,
    pos: usize,
    pub heredocs: VecDeque<HeredocDoc>,
    /// The (brace-expanded) source, for error display
    pub source: String,
    pub flags: ParserFlags,
    pub loop_depth: u32,
    pub function_depth: u32,
    pub conditional_depth: u32,
    pub nesting_depth: u32,
    pub errors: Vec<ParseError>,
    pub mode: ErrorMode,
    pub max_errors: usize,
}

impl ParserContext {
    pub fn new(tokens: Vec<Token>, heredocs: VecDeque<HeredocDoc>, source: String) -> Self {
        ParserContext {
            tokens,
            pos: 0,
            heredocs,
            source,
            flags: ParserFlags::default(),
            loop_depth: 0,
            function_depth: 0,
            conditional_depth: 0,
            nesting_depth: 0,
            errors: Vec::new(),
            mode: ErrorMode::Strict,
            max_errors: 10,
        }
    }

    pub fn with_mode(mut self, mode: ErrorMode) -> Self {
        self.mode = mode;
        self
    }

    // --- cursor ---

    pub fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    pub fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    pub fn at_end(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    pub fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    pub fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let err = self
                .error_at_current(&format!(
                    "expected `{}`, found `{}`",
                    kind.as_str(),
                    self.describe_current()
                ))
                .code(if self.at_end() {
                    ErrorCode::UnexpectedEof
                } else {
                    ErrorCode::UnexpectedToken
                });
            Err(self.attach_hint(err, kind))
        }
    }

    /// Position save/restore for bounded lookahead.
    pub fn save(&self) -> usize {
        self.pos
    }

    pub fn restore(&mut self, saved: usize) {
        self.pos = saved;
    }

    /// Skip newline tokens (statement separators inside compound commands).
    pub fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Skip `;` and newline separators.
    pub fn skip_separators(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semi) {
            self.advance();
        }
    }

    // --- errors ---

    fn describe_current(&self) -> String {
        if self.at_end() {
            "end of input".to_string()
        } else {
            self.peek().text.clone()
        }
    }

    pub fn error_at_current(&self, message: &str) -> ParseError {
        let tok = self.peek();
        let lo = self.pos.saturating_sub(2);
        let hi = (self.pos + 3).min(self.tokens.len());
        let surrounding = self.tokens[lo..hi].iter().map(|t| t.text.clone()).collect();
        let source_line = self
            .source
            .lines()
            .nth(tok.line.saturating_sub(1))
            .map(|s| s.to_string());
        ParseError::new(message).with_context(ErrorContext {
            line: tok.line,
            column: tok.column,
            surrounding,
            expected: Vec::new(),
            suggestion: None,
            code: ErrorCode::UnexpectedToken,
            source_line,
        })
    }

    /// Common-mistake hints for missing structural keywords.
    fn attach_hint(&self, err: ParseError, expected: TokenKind) -> ParseError {
        let hint = match expected {
            TokenKind::Then => Some("missing `;` or newline before `then`"),
            TokenKind::Do => Some("missing `;` or newline before `do`"),
            TokenKind::Fi => Some("unterminated `if`: add `fi`"),
            TokenKind::Done => Some("unterminated loop: add `done`"),
            TokenKind::Esac => Some("unterminated `case`: add `esac`"),
            TokenKind::RParen => Some("unbalanced `(`"),
            TokenKind::RBrace => Some("unterminated group: add `}`"),
            TokenKind::DBrackClose => Some("unterminated `[[`: add `]]`"),
            _ => None,
        };
        match hint {
            Some(h) => err.with_suggestion(h),
            None => err,
        }
    }

    /// Record or raise an error per the active mode. Returns Err when the
    /// caller must abort (strict mode, or max_errors reached).
    pub fn report(&mut self, err: ParseError) -> Result<(), ParseError> {
        match self.mode {
            ErrorMode::Strict => Err(err),
            ErrorMode::Collect | ErrorMode::Recover => {
                self.errors.push(err.clone());
                if self.errors.len() >= self.max_errors {
                    Err(err)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Recover mode: advance past the current statement boundary.
    pub fn skip_to_statement_boundary(&mut self) {
        while !self.at_end() {
            let kind = self.peek_kind();
            self.advance();
            if matches!(kind, TokenKind::Semi | TokenKind::Newline) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::Token;

    fn ctx_of(kinds: &[(TokenKind, &str)]) -> ParserContext {
        let mut tokens: Vec<Token> = kinds
            .iter()
            .map(|(k, t)| Token::new(*k, *t, 0, t.len()))
            .collect();
        tokens.push(Token::eof(0));
        ParserContext::new(tokens, VecDeque::new(), String::new())
    }

    #[test]
    fn cursor_basics() {
        let mut ctx = ctx_of(&[(TokenKind::Word, "echo"), (TokenKind::Word, "hi")]);
        assert_eq!(ctx.peek().text, "echo");
        ctx.advance();
        assert_eq!(ctx.peek().text, "hi");
        ctx.advance();
        assert!(ctx.at_end());
        // advancing past the end stays on EOF
        ctx.advance();
        assert!(ctx.at_end());
    }

    #[test]
    fn save_restore() {
        let mut ctx = ctx_of(&[(TokenKind::Word, "a"), (TokenKind::Word, "b")]);
        let mark = ctx.save();
        ctx.advance();
        ctx.restore(mark);
        assert_eq!(ctx.peek().text, "a");
    }

    #[test]
    fn expect_failure_has_hint() {
        let mut ctx = ctx_of(&[(TokenKind::Word, "echo")]);
        let err = ctx.expect(TokenKind::Then).unwrap_err();
        assert!(err.context.suggestion.as_deref().unwrap().contains("then"));
    }

    #[test]
    fn collect_mode_accumulates() {
        let mut ctx =
            ctx_of(&[(TokenKind::Word, "x")]).with_mode(ErrorMode::Collect);
        assert!(ctx.report(ParseError::new("one")).is_ok());
        assert!(ctx.report(ParseError::new("two")).is_ok());
        assert_eq!(ctx.errors.len(), 2);
    }
}
