//! Recogniser Registry
//!
//! Tokenisation walks a prioritised list of recognisers. Each recogniser
//! reports whether it can handle the input at the current position and, if
//! so, consumes it — producing a token or consuming silently (whitespace,
//! comments). Quotes and `$`-expansions are not recognisers themselves; the
//! literal recogniser dispatches into the quote parser and the expansion
//! scanner while building composite words.

use crate::ast::types::QuoteType;
use crate::lexer::expansion::{is_name_char, is_name_start, scan_dollar_or_backquote};
use crate::lexer::quotes::{parse_quoted, rule_at};
use crate::lexer::token::{Token, TokenKind, TokenPart, TokenPartKind};
use crate::lexer::{LexerError, LexerState};

pub const PRIORITY_PROCESS_SUB: u32 = 160;
pub const PRIORITY_OPERATOR: u32 = 150;
pub const PRIORITY_LITERAL: u32 = 70;
pub const PRIORITY_COMMENT: u32 = 60;
pub const PRIORITY_WHITESPACE: u32 = 30;

/// One pluggable tokenisation rule.
pub trait Recognizer {
    fn priority(&self) -> u32;
    fn can_recognize(&self, input: &str, pos: usize, state: &LexerState) -> bool;
    /// Consume input at `pos`. `None` for the token consumes silently.
    fn recognize(
        &self,
        input: &str,
        pos: usize,
        state: &mut LexerState,
    ) -> Result<(Option<Token>, usize), LexerError>;
}

/// The default recogniser set, sorted by descending priority.
pub fn default_registry() -> Vec<Box<dyn Recognizer>> {
    let mut registry: Vec<Box<dyn Recognizer>> = vec![
        Box::new(ProcessSubRecognizer),
        Box::new(OperatorRecognizer),
        Box::new(LiteralRecognizer),
        Box::new(CommentRecognizer),
        Box::new(WhitespaceRecognizer),
    ];
    registry.sort_by(|a, b| b.priority().cmp(&a.priority()));
    registry
}

fn char_at(input: &str, pos: usize) -> Option<char> {
    input[pos..].chars().next()
}

fn is_metachar(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>')
}

// =============================================================================
// PROCESS SUBSTITUTION — <(cmd) / >(cmd)
// =============================================================================

pub struct ProcessSubRecognizer;

impl Recognizer for ProcessSubRecognizer {
    fn priority(&self) -> u32 {
        PRIORITY_PROCESS_SUB
    }

    fn can_recognize(&self, input: &str, pos: usize, _state: &LexerState) -> bool {
        let bytes = input.as_bytes();
        matches!(bytes.get(pos), Some(b'<') | Some(b'>')) && bytes.get(pos + 1) == Some(&b'(')
    }

    fn recognize(
        &self,
        input: &str,
        pos: usize,
        state: &mut LexerState,
    ) -> Result<(Option<Token>, usize), LexerError> {
        let bytes = input.as_bytes();
        let mut depth = 0;
        let mut i = pos + 1;
        let mut in_single = false;
        let mut in_double = false;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if !in_single => {
                    i += 2;
                    continue;
                }
                b'\'' if !in_double => in_single = !in_single,
                b'"' if !in_single => in_double = !in_double,
                b'(' if !in_single && !in_double => depth += 1,
                b')' if !in_single && !in_double => {
                    depth -= 1;
                    if depth == 0 {
                        let end = i + 1;
                        let raw = &input[pos..end];
                        let token = Token::new(TokenKind::String, raw, pos, end)
                            .with_parts(vec![TokenPart::expansion(raw, QuoteType::None)]);
                        return Ok((Some(token), end));
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Err(LexerError::unclosed("process substitution", state.line))
    }
}

// =============================================================================
// OPERATORS
// =============================================================================

pub struct OperatorRecognizer;

/// Multi-character operators, longest first so prefixes never shadow them.
const OPERATORS: &[(&str, TokenKind)] = &[
    (";;&", TokenKind::DSemiAnd),
    ("<<<", TokenKind::TLess),
    ("<<-", TokenKind::DLessDash),
    (";;", TokenKind::DSemi),
    (";&", TokenKind::SemiAnd),
    ("&&", TokenKind::AndAnd),
    ("||", TokenKind::OrOr),
    ("<<", TokenKind::DLess),
    (">>", TokenKind::DGreat),
    ("<&", TokenKind::LessAnd),
    (">&", TokenKind::GreatAnd),
    ("<>", TokenKind::LessGreat),
    (">|", TokenKind::Clobber),
    (";", TokenKind::Semi),
    ("&", TokenKind::Amp),
    ("|", TokenKind::Pipe),
    ("<", TokenKind::Less),
    (">", TokenKind::Great),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("\n", TokenKind::Newline),
];

impl OperatorRecognizer {
    fn fence_at(&self, input: &str, pos: usize, state: &LexerState) -> Option<TokenKind> {
        let rest = &input[pos..];
        if rest.starts_with("((") && state.at_arith_start() {
            return Some(TokenKind::DParenOpen);
        }
        if rest.starts_with("[[") && state.command_position && standalone_after(input, pos + 2) {
            return Some(TokenKind::DBrackOpen);
        }
        if rest.starts_with("]]") && state.bracket_depth > 0 && standalone_after(input, pos + 2) {
            return Some(TokenKind::DBrackClose);
        }
        if rest.starts_with('!')
            && (state.command_position || state.bracket_depth > 0)
            && matches!(char_at(input, pos + 1), None | Some(' ') | Some('\t') | Some('\n') | Some('('))
        {
            return Some(TokenKind::Bang);
        }
        None
    }
}

/// True when the operator at `end` is delimited like a standalone word.
fn standalone_after(input: &str, end: usize) -> bool {
    matches!(
        char_at(input, end),
        None | Some(' ') | Some('\t') | Some('\n') | Some(';') | Some('&') | Some('|') | Some(')')
    )
}

impl Recognizer for OperatorRecognizer {
    fn priority(&self) -> u32 {
        PRIORITY_OPERATOR
    }

    fn can_recognize(&self, input: &str, pos: usize, state: &LexerState) -> bool {
        if self.fence_at(input, pos, state).is_some() {
            return true;
        }
        let rest = &input[pos..];
        OPERATORS.iter().any(|(lit, _)| rest.starts_with(lit))
    }

    fn recognize(
        &self,
        input: &str,
        pos: usize,
        state: &mut LexerState,
    ) -> Result<(Option<Token>, usize), LexerError> {
        if let Some(kind) = self.fence_at(input, pos, state) {
            return match kind {
                TokenKind::DParenOpen => self.recognize_arith(input, pos, state),
                TokenKind::DBrackOpen => {
                    state.bracket_depth += 1;
                    Ok((Some(Token::new(kind, "[[", pos, pos + 2)), pos + 2))
                }
                TokenKind::DBrackClose => {
                    state.bracket_depth -= 1;
                    Ok((Some(Token::new(kind, "]]", pos, pos + 2)), pos + 2))
                }
                TokenKind::Bang => Ok((Some(Token::new(kind, "!", pos, pos + 1)), pos + 1)),
                _ => unreachable!(),
            };
        }

        let rest = &input[pos..];
        for (lit, kind) in OPERATORS {
            if rest.starts_with(lit) {
                match kind {
                    TokenKind::LParen => state.paren_depth += 1,
                    TokenKind::RParen => state.paren_depth -= 1,
                    _ => {}
                }
                let end = pos + lit.len();
                return Ok((Some(Token::new(*kind, *lit, pos, end)), end));
            }
        }
        Err(LexerError::internal("operator vanished", state.line))
    }
}

impl OperatorRecognizer {
    /// `(( expr ))` — consume the whole construct; the expression text and
    /// the closing fence are queued behind the opening token.
    fn recognize_arith(
        &self,
        input: &str,
        pos: usize,
        state: &mut LexerState,
    ) -> Result<(Option<Token>, usize), LexerError> {
        let bytes = input.as_bytes();
        let mut depth = 0;
        let mut i = pos;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        if bytes.get(i.wrapping_sub(1)) != Some(&b')') {
                            break;
                        }
                        let expr = &input[pos + 2..i - 1];
                        let expr_tok = Token::new(TokenKind::String, expr, pos + 2, i - 1)
                            .with_parts(vec![TokenPart::literal(expr, QuoteType::None)]);
                        state.queue_token(expr_tok);
                        state.queue_token(Token::new(TokenKind::DParenClose, "))", i - 1, i + 1));
                        return Ok((
                            Some(Token::new(TokenKind::DParenOpen, "((", pos, pos + 2)),
                            i + 1,
                        ));
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Err(LexerError::unclosed("((", state.line))
    }
}

// =============================================================================
// LITERALS (words, composite strings, assignment words)
// =============================================================================

pub struct LiteralRecognizer;

impl Recognizer for LiteralRecognizer {
    fn priority(&self) -> u32 {
        PRIORITY_LITERAL
    }

    fn can_recognize(&self, input: &str, pos: usize, _state: &LexerState) -> bool {
        match char_at(input, pos) {
            None => false,
            Some('#') => false,
            Some(c) => !is_metachar(c),
        }
    }

    fn recognize(
        &self,
        input: &str,
        pos: usize,
        state: &mut LexerState,
    ) -> Result<(Option<Token>, usize), LexerError> {
        let mut parts: Vec<TokenPart> = Vec::new();
        let mut literal = String::new();
        let mut i = pos;

        let flush = |literal: &mut String, parts: &mut Vec<TokenPart>| {
            if !literal.is_empty() {
                parts.push(TokenPart::literal(std::mem::take(literal), QuoteType::None));
            }
        };

        while let Some(c) = char_at(input, i) {
            if is_metachar(c) {
                break;
            }
            if c == '\\' {
                match char_at(input, i + 1) {
                    // Line continuation glues the word across the newline
                    Some('\n') => {
                        i += 2;
                        continue;
                    }
                    Some(esc) => {
                        // A backslash-escaped character behaves like a
                        // single-quoted character downstream
                        flush(&mut literal, &mut parts);
                        parts.push(TokenPart::literal(esc.to_string(), QuoteType::Single));
                        i += 1 + 1 + esc.len_utf8();
                        continue;
                    }
                    None => {
                        literal.push('\\');
                        i += 1;
                        break;
                    }
                }
            }
            if rule_at(input, i).is_some() && (c != '$' || input[i..].starts_with("$'")) {
                flush(&mut literal, &mut parts);
                let seg = parse_quoted(input, i, state.line)?;
                parts.extend(seg.parts);
                i = seg.end;
                continue;
            }
            if c == '$' || c == '`' {
                match scan_dollar_or_backquote(input, i, state.line)? {
                    Some((raw, end)) => {
                        flush(&mut literal, &mut parts);
                        parts.push(TokenPart::expansion(raw, QuoteType::None));
                        i = end;
                        continue;
                    }
                    None => {
                        literal.push(c);
                        i += c.len_utf8();
                        continue;
                    }
                }
            }
            literal.push(c);
            i += c.len_utf8();
        }
        flush(&mut literal, &mut parts);

        if parts.is_empty() {
            return Err(LexerError::internal("empty word", state.line));
        }

        let text = &input[pos..i];
        let kind = classify_word(input, i, &parts, state);
        let quote_type = if parts.len() == 1 {
            parts[0].quote_type
        } else {
            QuoteType::None
        };
        let mut token = Token::new(kind, text, pos, i).with_parts(parts);
        token.quote_type = quote_type;
        Ok((Some(token), i))
    }
}

/// Decide Word / String / Number / AssignmentWord for a completed scan.
fn classify_word(input: &str, end: usize, parts: &[TokenPart], state: &LexerState) -> TokenKind {
    let plain_single = parts.len() == 1
        && parts[0].quote_type == QuoteType::None
        && matches!(parts[0].kind, TokenPartKind::Literal);

    if plain_single {
        let text = &parts[0].text;
        if !text.is_empty()
            && text.bytes().all(|b| b.is_ascii_digit())
            && matches!(char_at(input, end), Some('<') | Some('>'))
        {
            return TokenKind::Number;
        }
    }

    // Assignment words are only meaningful at command position, and the
    // NAME= prefix must come from unquoted literal text
    if state.command_position {
        if let Some(TokenPart {
            kind: TokenPartKind::Literal,
            text,
            quote_type: QuoteType::None,
        }) = parts.first()
        {
            if is_assignment_prefix(text) {
                return TokenKind::AssignmentWord;
            }
        }
    }

    if plain_single {
        TokenKind::Word
    } else {
        TokenKind::String
    }
}

/// NAME=, NAME+=, NAME[subscript]= with a valid identifier.
pub fn is_assignment_prefix(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || !is_name_start(chars[0]) {
        return false;
    }
    let mut i = 1;
    while i < chars.len() && is_name_char(chars[i]) {
        i += 1;
    }
    if i < chars.len() && chars[i] == '[' {
        let mut depth = 1;
        i += 1;
        while i < chars.len() && depth > 0 {
            match chars[i] {
                '[' => depth += 1,
                ']' => depth -= 1,
                _ => {}
            }
            i += 1;
        }
        if depth != 0 {
            return false;
        }
    }
    if i < chars.len() && chars[i] == '+' {
        i += 1;
    }
    i < chars.len() && chars[i] == '='
}

// =============================================================================
// COMMENTS
// =============================================================================

pub struct CommentRecognizer;

impl Recognizer for CommentRecognizer {
    fn priority(&self) -> u32 {
        PRIORITY_COMMENT
    }

    fn can_recognize(&self, input: &str, pos: usize, _state: &LexerState) -> bool {
        char_at(input, pos) == Some('#')
    }

    fn recognize(
        &self,
        input: &str,
        pos: usize,
        _state: &mut LexerState,
    ) -> Result<(Option<Token>, usize), LexerError> {
        let end = input[pos..]
            .find('\n')
            .map(|rel| pos + rel)
            .unwrap_or(input.len());
        Ok((None, end))
    }
}

// =============================================================================
// WHITESPACE
// =============================================================================

pub struct WhitespaceRecognizer;

impl Recognizer for WhitespaceRecognizer {
    fn priority(&self) -> u32 {
        PRIORITY_WHITESPACE
    }

    fn can_recognize(&self, input: &str, pos: usize, _state: &LexerState) -> bool {
        match char_at(input, pos) {
            Some(' ') | Some('\t') => true,
            Some('\\') => char_at(input, pos + 1) == Some('\n'),
            _ => false,
        }
    }

    fn recognize(
        &self,
        input: &str,
        pos: usize,
        _state: &mut LexerState,
    ) -> Result<(Option<Token>, usize), LexerError> {
        let mut i = pos;
        loop {
            match char_at(input, i) {
                Some(' ') | Some('\t') => i += 1,
                Some('\\') if char_at(input, i + 1) == Some('\n') => i += 2,
                _ => break,
            }
        }
        Ok((None, i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_prefixes() {
        assert!(is_assignment_prefix("X=1"));
        assert!(is_assignment_prefix("X+=1"));
        assert!(is_assignment_prefix("arr[0]=v"));
        assert!(is_assignment_prefix("arr[i+1]=v"));
        assert!(!is_assignment_prefix("=x"));
        assert!(!is_assignment_prefix("1X=2"));
        assert!(!is_assignment_prefix("X"));
        assert!(!is_assignment_prefix("a-b=1"));
    }

    #[test]
    fn registry_sorted_by_priority() {
        let reg = default_registry();
        let prios: Vec<u32> = reg.iter().map(|r| r.priority()).collect();
        let mut sorted = prios.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(prios, sorted);
    }
}
