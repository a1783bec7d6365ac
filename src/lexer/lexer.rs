//! Lexer Driver
//!
//! Runs the tokenisation pipeline over a source string:
//!
//! 1. brace expansion (non-fatal pre-pass on the raw text)
//! 2. recogniser-driven tokenisation with heredoc collection
//! 3. keyword normalisation and context validation
//!
//! Every token records its byte span plus line/column through the position
//! tracker. In interactive mode an unclosed construct is reported as
//! "needs more input" so the caller can keep reading lines.

use crate::lexer::brace::expand_braces;
use crate::lexer::heredoc::{collect_body, HeredocDoc, PendingHeredoc};
use crate::lexer::keywords::normalize_keywords;
use crate::lexer::position::PositionTracker;
use crate::lexer::recognizers::default_registry;
use crate::lexer::token::{Token, TokenKind};
use crate::lexer::LexerError;
use std::collections::VecDeque;

/// Shared lexer state visible to recognisers.
#[derive(Debug, Default)]
pub struct LexerState {
    pub paren_depth: i32,
    pub bracket_depth: i32,
    pub brace_depth: i32,
    pub command_position: bool,
    pub posix_mode: bool,
    pub line: usize,
    /// Kind of the last significant token (drives `((` after `for`)
    pub last_kind: Option<TokenKind>,
    /// Tokens queued by a recogniser that produced more than one
    pending_tokens: VecDeque<Token>,
}

impl LexerState {
    pub fn queue_token(&mut self, token: Token) {
        self.pending_tokens.push_back(token);
    }

    /// `((` opens arithmetic at command position or right after `for`.
    pub fn at_arith_start(&self) -> bool {
        self.command_position || self.last_kind == Some(TokenKind::For)
    }
}

/// Tokenisation result: the token list plus heredoc bodies in source order.
#[derive(Debug)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub heredocs: VecDeque<HeredocDoc>,
    /// The brace-expanded source the spans refer to
    pub source: String,
}

/// The lexer. Construct with [`Lexer::new`], then call [`Lexer::tokenize`].
pub struct Lexer {
    source: String,
    interactive: bool,
    posix_mode: bool,
}

impl Lexer {
    pub fn new(source: impl Into<String>) -> Self {
        Lexer {
            source: source.into(),
            interactive: false,
            posix_mode: false,
        }
    }

    /// Interactive mode: unclosed constructs ask for more input instead of
    /// failing hard.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn posix_mode(mut self, posix: bool) -> Self {
        self.posix_mode = posix;
        self
    }

    pub fn tokenize(self) -> Result<LexOutput, LexerError> {
        let source = expand_braces(&self.source);
        let registry = default_registry();

        let mut state = LexerState {
            command_position: true,
            posix_mode: self.posix_mode,
            line: 1,
            ..Default::default()
        };
        let mut tracker = PositionTracker::new();
        let mut tokens: Vec<Token> = Vec::new();
        let mut heredocs: VecDeque<HeredocDoc> = VecDeque::new();
        let mut pending_heredocs: Vec<PendingHeredoc> = Vec::new();
        let mut awaiting_delimiter: Option<bool> = None; // strip_tabs of the << just seen
        let mut pos = 0;
        let mut gap_before = false; // whitespace consumed since last token

        while pos < source.len() {
            // Drain tokens queued by a multi-token recogniser first
            if let Some(tok) = state.pending_tokens.pop_front() {
                Self::note_token(&mut state, &tok);
                tokens.push(tok);
                continue;
            }

            tracker.advance_to(&source, pos);
            state.line = tracker.line();

            let recognizer = registry
                .iter()
                .find(|r| r.can_recognize(&source, pos, &state));
            let Some(recognizer) = recognizer else {
                let ch = source[pos..].chars().next().unwrap_or('\0');
                return Err(self.wrap(LexerError::invalid(
                    &format!("unexpected character `{ch}`"),
                    state.line,
                )));
            };

            let (token, new_pos) = match recognizer.recognize(&source, pos, &mut state) {
                Ok(result) => result,
                Err(err) => return Err(self.wrap(err)),
            };
            if new_pos <= pos && token.is_none() {
                return Err(LexerError::internal("lexer failed to advance", state.line));
            }

            let Some(mut token) = token else {
                gap_before = true;
                pos = new_pos;
                continue;
            };

            token.line = tracker.line();
            token.column = tracker.column();
            token.adjacent_to_previous = !gap_before && !tokens.is_empty();
            gap_before = false;
            pos = new_pos;

            // Heredoc bookkeeping: the word after << / <<- is the delimiter;
            // bodies are consumed after the newline ending the command line
            if let Some(strip_tabs) = awaiting_delimiter.take() {
                if token.kind.is_word_like() {
                    let delimiter: String =
                        token.parts.iter().map(|p| p.text.as_str()).collect();
                    let quoted = token
                        .parts
                        .iter()
                        .any(|p| p.quote_type.is_quoted());
                    pending_heredocs.push(PendingHeredoc {
                        delimiter,
                        strip_tabs,
                        quoted,
                    });
                } else {
                    return Err(self.wrap(LexerError::invalid(
                        "expected heredoc delimiter",
                        state.line,
                    )));
                }
            }
            match token.kind {
                TokenKind::DLess => awaiting_delimiter = Some(false),
                TokenKind::DLessDash => awaiting_delimiter = Some(true),
                _ => {}
            }

            let collect_now =
                token.kind == TokenKind::Newline && !pending_heredocs.is_empty();
            Self::note_token(&mut state, &token);
            tokens.push(token);

            if collect_now {
                for pending in pending_heredocs.drain(..) {
                    let (doc, next) = match collect_body(&source, pos, &pending, state.line) {
                        Ok(result) => result,
                        Err(err) => return Err(self.wrap(err)),
                    };
                    heredocs.push_back(doc);
                    pos = next;
                }
            }
        }

        // Tokens queued by the last recogniser (e.g. a trailing `(( ))`)
        while let Some(tok) = state.pending_tokens.pop_front() {
            Self::note_token(&mut state, &tok);
            tokens.push(tok);
        }

        // A trailing heredoc with no final newline still needs its body
        if !pending_heredocs.is_empty() {
            let line = state.line;
            return Err(self.wrap(LexerError::unclosed("heredoc", line)));
        }

        tokens.push(Token::eof(source.len()).at(tracker.line(), tracker.column()));
        let tokens = normalize_keywords(tokens)?;

        Ok(LexOutput {
            tokens,
            heredocs,
            source,
        })
    }

    fn note_token(state: &mut LexerState, token: &Token) {
        state.command_position = token.kind.starts_command();
        state.last_kind = Some(token.kind);
    }

    /// In interactive mode, unclosed constructs become NeedMoreInput.
    fn wrap(&self, err: LexerError) -> LexerError {
        if self.interactive && err.is_unclosed() {
            LexerError::NeedMoreInput {
                construct: err.construct_name(),
            }
        } else {
            err
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::QuoteType;
    use crate::lexer::token::TokenPartKind;

    fn lex(src: &str) -> LexOutput {
        Lexer::new(src).tokenize().unwrap()
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn simple_command() {
        assert_eq!(
            kinds("echo hello"),
            vec![TokenKind::Word, TokenKind::Word, TokenKind::Eof]
        );
    }

    #[test]
    fn operators_longest_match() {
        assert_eq!(
            kinds("a && b || c"),
            vec![
                TokenKind::Word,
                TokenKind::AndAnd,
                TokenKind::Word,
                TokenKind::OrOr,
                TokenKind::Word,
                TokenKind::Eof
            ]
        );
        let k = kinds("cat <<< hi");
        assert_eq!(k[1], TokenKind::TLess);
    }

    #[test]
    fn pipeline_tokens() {
        let k = kinds("echo hi | tr a b");
        assert_eq!(k[2], TokenKind::Pipe);
    }

    #[test]
    fn redirect_with_fd_number() {
        let k = lex("cmd 2>&1");
        assert_eq!(k.tokens[1].kind, TokenKind::Number);
        assert_eq!(k.tokens[2].kind, TokenKind::GreatAnd);
        assert_eq!(k.tokens[3].kind, TokenKind::Word);
        assert!(k.tokens[2].adjacent_to_previous);
    }

    #[test]
    fn composite_word_parts() {
        let out = lex("echo \"Hello $USER\"'!'x");
        let tok = &out.tokens[1];
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.parts.len(), 4);
        assert_eq!(tok.parts[0].quote_type, QuoteType::Double);
        assert!(matches!(tok.parts[1].kind, TokenPartKind::Expansion));
        assert_eq!(tok.parts[2].quote_type, QuoteType::Single);
        assert_eq!(tok.parts[2].text, "!");
        assert_eq!(tok.parts[3].quote_type, QuoteType::None);
    }

    #[test]
    fn heredoc_collection() {
        let out = lex("cat <<EOF\nhello $USER\nEOF\necho done");
        assert_eq!(out.heredocs.len(), 1);
        let doc = &out.heredocs[0];
        assert_eq!(doc.content, "hello $USER\n");
        assert!(!doc.quoted);
        // tokens continue after the heredoc body
        assert!(out.tokens.iter().any(|t| t.text == "done"));
    }

    #[test]
    fn quoted_heredoc_delimiter() {
        let out = lex("cat <<'EOF'\nhello $USER\nEOF\n");
        assert!(out.heredocs[0].quoted);
    }

    #[test]
    fn heredoc_strip_tabs() {
        let out = lex("cat <<-EOF\n\thello\n\tEOF\n");
        assert_eq!(out.heredocs[0].content, "hello\n");
        assert!(out.heredocs[0].strip_tabs);
    }

    #[test]
    fn two_heredocs_on_one_line() {
        let out = lex("cat <<A <<B\none\nA\ntwo\nB\n");
        assert_eq!(out.heredocs.len(), 2);
        assert_eq!(out.heredocs[0].content, "one\n");
        assert_eq!(out.heredocs[1].content, "two\n");
    }

    #[test]
    fn brace_expansion_pre_pass() {
        let out = lex("echo {a,b}");
        let words: Vec<&str> = out
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Word)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(words, vec!["echo", "a", "b"]);
    }

    #[test]
    fn arithmetic_command_fences() {
        let k = kinds("(( x + 1 ))");
        assert_eq!(
            k,
            vec![
                TokenKind::DParenOpen,
                TokenKind::String,
                TokenKind::DParenClose,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn double_bracket_fences() {
        let k = kinds("[[ -f x ]]");
        assert_eq!(k[0], TokenKind::DBrackOpen);
        assert_eq!(*k.last().unwrap(), TokenKind::Eof);
        assert_eq!(k[k.len() - 2], TokenKind::DBrackClose);
    }

    #[test]
    fn process_substitution_token() {
        let out = lex("diff <(sort a) <(sort b)");
        let tok = &out.tokens[1];
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.parts[0].text, "<(sort a)");
    }

    #[test]
    fn assignment_word_at_command_position() {
        let out = lex("X=1 cmd Y=2");
        assert_eq!(out.tokens[0].kind, TokenKind::AssignmentWord);
        // Y=2 is an argument, not an assignment
        assert_eq!(out.tokens[2].kind, TokenKind::Word);
    }

    #[test]
    fn comments_consumed_silently() {
        assert_eq!(
            kinds("echo hi # trailing"),
            vec![TokenKind::Word, TokenKind::Word, TokenKind::Eof]
        );
    }

    #[test]
    fn line_continuation_glues_words() {
        let out = lex("echo ab\\\ncd");
        assert_eq!(out.tokens[1].text, "ab\\\ncd");
        let joined: String = out.tokens[1].parts.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(joined, "abcd");
    }

    #[test]
    fn interactive_unclosed_quote_needs_more_input() {
        let err = Lexer::new("echo 'abc")
            .interactive(true)
            .tokenize()
            .unwrap_err();
        assert!(matches!(err, LexerError::NeedMoreInput { .. }));
    }

    #[test]
    fn script_unclosed_quote_is_fatal() {
        let err = Lexer::new("echo 'abc").tokenize().unwrap_err();
        assert!(err.is_unclosed());
    }

    #[test]
    fn positions_recorded() {
        let out = lex("echo hi\necho ho");
        let second_echo = &out.tokens[3];
        assert_eq!(second_echo.line, 2);
        assert_eq!(second_echo.column, 1);
    }

    #[test]
    fn lex_round_trip_reconstruction() {
        // Token texts plus separators reproduce the source
        let src = "echo \"a b\" 'c' | cat";
        let out = lex(src);
        let mut rebuilt = String::new();
        for tok in &out.tokens {
            if tok.kind == TokenKind::Eof {
                break;
            }
            if !tok.adjacent_to_previous && !rebuilt.is_empty() {
                rebuilt.push(' ');
            }
            rebuilt.push_str(&tok.text);
        }
        assert_eq!(rebuilt, src);
    }
}
