//! Unified Quote Parser
//!
//! Quote handling is rule-table driven: one row per quote character with
//! flags for expansion processing and the set of escapable characters.
//! `'...'` is fully literal, `"..."` processes `\$ \` \\ \" \<newline>` and
//! allows embedded expansions, `$'...'` processes ANSI-C escape sequences
//! and allows nothing else.

use crate::ast::types::QuoteType;
use crate::lexer::expansion::scan_dollar_or_backquote;
use crate::lexer::token::TokenPart;
use crate::lexer::LexerError;

/// One row of the quote rule table.
#[derive(Debug, Clone, Copy)]
pub struct QuoteRule {
    pub quote_type: QuoteType,
    /// `$` and backquote start expansions inside this context
    pub allows_expansions: bool,
    /// Backslash escapes are processed inside this context
    pub allows_escapes: bool,
    /// Characters a backslash escapes (others keep the backslash)
    pub escapable: &'static [char],
}

pub const SINGLE_QUOTE_RULE: QuoteRule = QuoteRule {
    quote_type: QuoteType::Single,
    allows_expansions: false,
    allows_escapes: false,
    escapable: &[],
};

pub const DOUBLE_QUOTE_RULE: QuoteRule = QuoteRule {
    quote_type: QuoteType::Double,
    allows_expansions: true,
    allows_escapes: true,
    escapable: &['$', '`', '"', '\\', '\n'],
};

pub const ANSI_QUOTE_RULE: QuoteRule = QuoteRule {
    quote_type: QuoteType::Ansi,
    allows_expansions: false,
    allows_escapes: true,
    escapable: &[], // handled by the ANSI-C escape table below
};

/// Result of parsing one quoted segment.
#[derive(Debug, Clone)]
pub struct QuotedSegment {
    pub parts: Vec<TokenPart>,
    /// Byte position just past the closing quote
    pub end: usize,
}

/// Look up the rule for the quote construct starting at `pos`.
/// Returns the rule and the position of the first content character.
pub fn rule_at(input: &str, pos: usize) -> Option<(QuoteRule, usize)> {
    let bytes = input.as_bytes();
    match bytes.get(pos)? {
        b'\'' => Some((SINGLE_QUOTE_RULE, pos + 1)),
        b'"' => Some((DOUBLE_QUOTE_RULE, pos + 1)),
        b'$' if bytes.get(pos + 1) == Some(&b'\'') => Some((ANSI_QUOTE_RULE, pos + 2)),
        _ => None,
    }
}

/// Parse the quoted segment starting at `pos` (at the opening quote).
pub fn parse_quoted(input: &str, pos: usize, line: usize) -> Result<QuotedSegment, LexerError> {
    let (rule, content_start) =
        rule_at(input, pos).ok_or_else(|| LexerError::internal("not a quote", line))?;
    match rule.quote_type {
        QuoteType::Single => parse_single(input, content_start, line),
        QuoteType::Double => parse_double(input, content_start, line),
        QuoteType::Ansi => parse_ansi(input, content_start, line),
        QuoteType::None => unreachable!(),
    }
}

fn parse_single(input: &str, start: usize, line: usize) -> Result<QuotedSegment, LexerError> {
    match input[start..].find('\'') {
        Some(rel) => {
            let end = start + rel;
            Ok(QuotedSegment {
                parts: vec![TokenPart::literal(&input[start..end], QuoteType::Single)],
                end: end + 1,
            })
        }
        None => Err(LexerError::unclosed("'", line)),
    }
}

fn parse_double(input: &str, start: usize, line: usize) -> Result<QuotedSegment, LexerError> {
    let rule = DOUBLE_QUOTE_RULE;
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = start;
    let bytes = input.as_bytes();

    loop {
        let Some(&b) = bytes.get(i) else {
            return Err(LexerError::unclosed("\"", line));
        };
        match b {
            b'"' => {
                // An empty "" still contributes an (empty) quoted part so the
                // word is known to be quoted
                if !literal.is_empty() || parts.is_empty() {
                    parts.push(TokenPart::literal(literal, QuoteType::Double));
                }
                return Ok(QuotedSegment { parts, end: i + 1 });
            }
            b'\\' if rule.allows_escapes => {
                match bytes.get(i + 1) {
                    Some(&next) if rule.escapable.contains(&(next as char)) => {
                        if next != b'\n' {
                            literal.push(next as char);
                        }
                        i += 2;
                    }
                    Some(_) => {
                        literal.push('\\');
                        i += 1;
                    }
                    None => return Err(LexerError::unclosed("\"", line)),
                }
            }
            b'$' | b'`' if rule.allows_expansions => {
                if let Some((raw, end)) = scan_dollar_or_backquote(input, i, line)? {
                    if !literal.is_empty() {
                        parts.push(TokenPart::literal(std::mem::take(&mut literal), QuoteType::Double));
                    }
                    parts.push(TokenPart::expansion(raw, QuoteType::Double));
                    i = end;
                } else {
                    literal.push(b as char);
                    i += 1;
                }
            }
            _ => {
                // Copy the full UTF-8 character
                let ch = input[i..].chars().next().unwrap();
                literal.push(ch);
                i += ch.len_utf8();
            }
        }
    }
}

fn parse_ansi(input: &str, start: usize, line: usize) -> Result<QuotedSegment, LexerError> {
    let mut value = String::new();
    let chars: Vec<char> = input[start..].chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // Convert back from char index to byte offset
            let consumed: usize = chars[..i].iter().map(|c| c.len_utf8()).sum();
            return Ok(QuotedSegment {
                parts: vec![TokenPart::literal(value, QuoteType::Ansi)],
                end: start + consumed + 1,
            });
        }
        if c != '\\' {
            value.push(c);
            i += 1;
            continue;
        }
        // Escape sequence
        let Some(&next) = chars.get(i + 1) else {
            return Err(LexerError::unclosed("$'", line));
        };
        i += 2;
        match next {
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            'a' => value.push('\u{07}'),
            'b' => value.push('\u{08}'),
            'e' | 'E' => value.push('\u{1b}'),
            'f' => value.push('\u{0c}'),
            'v' => value.push('\u{0b}'),
            '\\' => value.push('\\'),
            '\'' => value.push('\''),
            '"' => value.push('"'),
            'x' => {
                let (ch, used) = read_hex(&chars[i..], 2);
                if let Some(ch) = ch {
                    value.push(ch);
                }
                i += used;
            }
            'u' => {
                let (ch, used) = read_hex(&chars[i..], 4);
                if let Some(ch) = ch {
                    value.push(ch);
                }
                i += used;
            }
            'U' => {
                let (ch, used) = read_hex(&chars[i..], 8);
                if let Some(ch) = ch {
                    value.push(ch);
                }
                i += used;
            }
            '0'..='7' => {
                // Octal: up to three digits including the one just read
                let mut n = next.to_digit(8).unwrap();
                let mut used = 0;
                while used < 2 {
                    match chars.get(i + used).and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            n = n * 8 + d;
                            used += 1;
                        }
                        None => break,
                    }
                }
                i += used;
                if let Some(ch) = char::from_u32(n) {
                    value.push(ch);
                }
            }
            other => {
                value.push('\\');
                value.push(other);
            }
        }
    }
    Err(LexerError::unclosed("$'", line))
}

/// Read up to `max` hex digits; returns the decoded char and digits consumed.
fn read_hex(chars: &[char], max: usize) -> (Option<char>, usize) {
    let mut n: u32 = 0;
    let mut used = 0;
    while used < max {
        match chars.get(used).and_then(|c| c.to_digit(16)) {
            Some(d) => {
                n = n * 16 + d;
                used += 1;
            }
            None => break,
        }
    }
    if used == 0 {
        (None, 0)
    } else {
        (char::from_u32(n), used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_quotes_are_literal() {
        let seg = parse_quoted("'a $b `c`'", 0, 1).unwrap();
        assert_eq!(seg.parts.len(), 1);
        assert_eq!(seg.parts[0].text, "a $b `c`");
        assert_eq!(seg.end, 10);
    }

    #[test]
    fn unclosed_single_quote_errors() {
        assert!(parse_quoted("'abc", 0, 1).is_err());
    }

    #[test]
    fn double_quotes_process_escapes() {
        let seg = parse_quoted(r#""a\$b\\c\"d""#, 0, 1).unwrap();
        assert_eq!(seg.parts[0].text, "a$b\\c\"d");
    }

    #[test]
    fn double_quotes_keep_unknown_escapes() {
        let seg = parse_quoted(r#""a\nb""#, 0, 1).unwrap();
        assert_eq!(seg.parts[0].text, "a\\nb");
    }

    #[test]
    fn double_quotes_split_around_expansions() {
        let seg = parse_quoted("\"Hello $USER!\"", 0, 1).unwrap();
        assert_eq!(seg.parts.len(), 3);
        assert_eq!(seg.parts[0].text, "Hello ");
        assert_eq!(seg.parts[1].text, "$USER");
        assert_eq!(seg.parts[2].text, "!");
    }

    #[test]
    fn ansi_escapes() {
        let seg = parse_quoted(r"$'a\tb\n\x41é'", 0, 1).unwrap();
        assert_eq!(seg.parts[0].text, "a\tb\nA\u{e9}");
        assert_eq!(seg.parts[0].quote_type, QuoteType::Ansi);
    }

    #[test]
    fn ansi_octal() {
        let seg = parse_quoted(r"$'\101\0'", 0, 1).unwrap();
        assert_eq!(seg.parts[0].text, "A\u{0}");
    }

    #[test]
    fn empty_double_quotes_make_a_part() {
        let seg = parse_quoted("\"\"", 0, 1).unwrap();
        assert_eq!(seg.parts.len(), 1);
        assert_eq!(seg.parts[0].text, "");
    }
}
