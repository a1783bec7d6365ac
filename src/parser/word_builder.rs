//! Word Construction
//!
//! Converts composite tokens into `Word` AST nodes. The lexer's token parts
//! carry raw expansion spellings (`$x`, `${v:-d}`, `$(cmd)`); this module
//! decomposes them into expansion nodes at parse time so nothing downstream
//! re-parses strings. Parameter expansions decompose into (name, operator,
//! operand-Word) triples.

use crate::ast::types::{
    ArithmeticExpansion, CommandSubstitution, Expansion, ParameterExpansion, ParameterOp,
    ProcessSubDirection, ProcessSubstitution, QuoteType, ReplaceAnchor, VariableExpansion, Word,
    WordPart,
};
use crate::lexer::expansion::{is_name_char, is_name_start, is_special_param_char, scan_dollar_or_backquote};
use crate::lexer::quotes::{parse_quoted, rule_at};
use crate::lexer::token::{Token, TokenPart, TokenPartKind};
use crate::parser::types::{ErrorCode, ParseError};

/// Build a `Word` from a word-shaped token.
pub fn build_word(token: &Token) -> Result<Word, ParseError> {
    let mut word = build_word_from_parts(&token.parts)?;
    word.quote_type = token.quote_type;
    Ok(word)
}

pub fn build_word_from_parts(parts: &[TokenPart]) -> Result<Word, ParseError> {
    let mut out = Vec::new();
    for part in parts {
        match part.kind {
            TokenPartKind::Literal => {
                out.push(WordPart::Literal(crate::ast::types::LiteralPart {
                    text: part.text.clone(),
                    quoted: part.quote_type.is_quoted(),
                    quote_char: part.quote_type,
                }));
            }
            TokenPartKind::Expansion => {
                let node = decompose_expansion(&part.text)?;
                out.push(WordPart::expansion(node, part.quote_type.is_quoted()));
            }
        }
    }
    Ok(Word {
        parts: out,
        quote_type: QuoteType::None,
    })
}

/// Scan free text into a `Word`, honouring quotes and embedded expansions.
/// Used for parameter-operand words, patterns and replacements, where
/// whitespace does not end the word.
pub fn word_from_text(text: &str) -> Result<Word, ParseError> {
    let mut parts: Vec<WordPart> = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    let flush = |literal: &mut String, parts: &mut Vec<WordPart>| {
        if !literal.is_empty() {
            parts.push(WordPart::literal(std::mem::take(literal)));
        }
    };

    while let Some(c) = text[i..].chars().next() {
        if c == '\\' {
            match text[i + 1..].chars().next() {
                Some(esc) => {
                    flush(&mut literal, &mut parts);
                    parts.push(WordPart::quoted_literal(esc.to_string(), QuoteType::Single));
                    i += 1 + esc.len_utf8();
                }
                None => {
                    literal.push('\\');
                    i += 1;
                }
            }
            continue;
        }
        if rule_at(text, i).is_some() && (c != '$' || text[i..].starts_with("$'")) {
            flush(&mut literal, &mut parts);
            let seg = parse_quoted(text, i, 0)
                .map_err(|e| ParseError::new(format!("in word: {e}")))?;
            for p in seg.parts {
                match p.kind {
                    TokenPartKind::Literal => parts.push(WordPart::Literal(
                        crate::ast::types::LiteralPart {
                            text: p.text,
                            quoted: true,
                            quote_char: p.quote_type,
                        },
                    )),
                    TokenPartKind::Expansion => {
                        let node = decompose_expansion(&p.text)?;
                        parts.push(WordPart::expansion(node, true));
                    }
                }
            }
            i = seg.end;
            continue;
        }
        if c == '$' || c == '`' {
            match scan_dollar_or_backquote(text, i, 0)
                .map_err(|e| ParseError::new(format!("in word: {e}")))?
            {
                Some((raw, end)) => {
                    flush(&mut literal, &mut parts);
                    let node = decompose_expansion(&raw)?;
                    parts.push(WordPart::expansion(node, false));
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
    Ok(Word {
        parts,
        quote_type: QuoteType::None,
    })
}

/// Decompose one raw expansion spelling into its AST node.
pub fn decompose_expansion(raw: &str) -> Result<Expansion, ParseError> {
    if let Some(inner) = raw.strip_prefix("$((").and_then(|r| r.strip_suffix("))")) {
        return Ok(Expansion::ArithmeticSub(ArithmeticExpansion {
            expression: inner.to_string(),
        }));
    }
    if let Some(inner) = raw.strip_prefix("$(").and_then(|r| r.strip_suffix(')')) {
        return Ok(Expansion::CommandSub(CommandSubstitution {
            command: inner.to_string(),
            backquoted: false,
        }));
    }
    if let Some(inner) = raw.strip_prefix('`').and_then(|r| r.strip_suffix('`')) {
        return Ok(Expansion::CommandSub(CommandSubstitution {
            command: unescape_backquoted(inner),
            backquoted: true,
        }));
    }
    if let Some(inner) = raw.strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
        return parse_braced(inner);
    }
    if let Some(inner) = raw.strip_prefix("<(").and_then(|r| r.strip_suffix(')')) {
        return Ok(Expansion::ProcessSub(ProcessSubstitution {
            command: inner.to_string(),
            direction: ProcessSubDirection::Read,
        }));
    }
    if let Some(inner) = raw.strip_prefix(">(").and_then(|r| r.strip_suffix(')')) {
        return Ok(Expansion::ProcessSub(ProcessSubstitution {
            command: inner.to_string(),
            direction: ProcessSubDirection::Write,
        }));
    }
    if let Some(name) = raw.strip_prefix('$') {
        return Ok(Expansion::Variable(VariableExpansion {
            name: name.to_string(),
            index: None,
        }));
    }
    Err(bad_substitution(raw))
}

fn bad_substitution(text: &str) -> ParseError {
    ParseError::new(format!("bad substitution: `{text}`")).code(ErrorCode::BadSubstitution)
}

/// Within backquotes, `\$`, `` \` `` and `\\` lose their backslash.
fn unescape_backquoted(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(n @ ('$' | '`' | '\\')) => out.push(n),
                Some(n) => {
                    out.push('\\');
                    out.push(n);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse the interior of `${...}`.
fn parse_braced(inner: &str) -> Result<Expansion, ParseError> {
    if inner.is_empty() {
        return Err(bad_substitution("${}"));
    }

    // ${#} is $#; ${#name} is the length operator
    if let Some(rest) = inner.strip_prefix('#') {
        if rest.is_empty() {
            return Ok(Expansion::Variable(VariableExpansion {
                name: "#".to_string(),
                index: None,
            }));
        }
        let (name, index, tail) = split_name(rest).ok_or_else(|| bad_substitution(inner))?;
        if !tail.is_empty() {
            return Err(bad_substitution(inner));
        }
        return Ok(Expansion::Parameter(ParameterExpansion {
            name,
            index,
            op: ParameterOp::Length,
        }));
    }

    // ${!prefix*} / ${!prefix@} list variable names
    if let Some(rest) = inner.strip_prefix('!') {
        if let Some(prefix) = rest.strip_suffix('*') {
            return Ok(Expansion::Parameter(ParameterExpansion {
                name: prefix.to_string(),
                index: None,
                op: ParameterOp::Names { star: true },
            }));
        }
        if let Some(prefix) = rest.strip_suffix('@') {
            return Ok(Expansion::Parameter(ParameterExpansion {
                name: prefix.to_string(),
                index: None,
                op: ParameterOp::Names { star: false },
            }));
        }
        return Err(bad_substitution(inner));
    }

    let (name, index, rest) = split_name(inner).ok_or_else(|| bad_substitution(inner))?;
    if rest.is_empty() {
        return Ok(Expansion::Variable(VariableExpansion { name, index }));
    }

    let op = parse_operator(rest).ok_or_else(|| bad_substitution(inner))?;
    Ok(Expansion::Parameter(ParameterExpansion { name, index, op }))
}

/// Split `name[index]rest`. Names are identifiers, digits, or a single
/// special parameter character.
fn split_name(text: &str) -> Option<(String, Option<String>, &str)> {
    let mut chars = text.char_indices();
    let (_, first) = chars.next()?;

    let name_end = if is_name_start(first) {
        let mut end = first.len_utf8();
        for (idx, c) in chars {
            if is_name_char(c) {
                end = idx + c.len_utf8();
            } else {
                break;
            }
        }
        end
    } else if first.is_ascii_digit() {
        let mut end = 1;
        for (idx, c) in chars {
            if c.is_ascii_digit() {
                end = idx + 1;
            } else {
                break;
            }
        }
        end
    } else if is_special_param_char(first) {
        first.len_utf8()
    } else {
        return None;
    };

    let name = text[..name_end].to_string();
    let rest = &text[name_end..];

    // Optional [subscript] with balanced brackets
    if let Some(after_open) = rest.strip_prefix('[') {
        let mut depth = 1;
        for (idx, c) in after_open.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        let index = after_open[..idx].to_string();
                        return Some((name, Some(index), &after_open[idx + 1..]));
                    }
                }
                _ => {}
            }
        }
        return None;
    }
    Some((name, None, rest))
}

/// Parse the operator suffix of a braced expansion.
fn parse_operator(rest: &str) -> Option<ParameterOp> {
    // Colon-qualified value operators take precedence over bare `:`
    if let Some(operand) = rest.strip_prefix(":-") {
        return Some(ParameterOp::UseDefault {
            word: word_from_text(operand).ok()?,
            check_null: true,
        });
    }
    if let Some(operand) = rest.strip_prefix(":=") {
        return Some(ParameterOp::AssignDefault {
            word: word_from_text(operand).ok()?,
            check_null: true,
        });
    }
    if let Some(operand) = rest.strip_prefix(":+") {
        return Some(ParameterOp::UseAlternate {
            word: word_from_text(operand).ok()?,
            check_null: true,
        });
    }
    if let Some(operand) = rest.strip_prefix(":?") {
        let word = if operand.is_empty() {
            None
        } else {
            Some(word_from_text(operand).ok()?)
        };
        return Some(ParameterOp::ErrorIfUnset {
            word,
            check_null: true,
        });
    }
    if let Some(operand) = rest.strip_prefix('-') {
        return Some(ParameterOp::UseDefault {
            word: word_from_text(operand).ok()?,
            check_null: false,
        });
    }
    if let Some(operand) = rest.strip_prefix('=') {
        return Some(ParameterOp::AssignDefault {
            word: word_from_text(operand).ok()?,
            check_null: false,
        });
    }
    if let Some(operand) = rest.strip_prefix('+') {
        return Some(ParameterOp::UseAlternate {
            word: word_from_text(operand).ok()?,
            check_null: false,
        });
    }
    if let Some(operand) = rest.strip_prefix('?') {
        let word = if operand.is_empty() {
            None
        } else {
            Some(word_from_text(operand).ok()?)
        };
        return Some(ParameterOp::ErrorIfUnset {
            word,
            check_null: false,
        });
    }
    if let Some(pattern) = rest.strip_prefix("##") {
        return Some(ParameterOp::RemovePrefix {
            pattern: word_from_text(pattern).ok()?,
            longest: true,
        });
    }
    if let Some(pattern) = rest.strip_prefix('#') {
        return Some(ParameterOp::RemovePrefix {
            pattern: word_from_text(pattern).ok()?,
            longest: false,
        });
    }
    if let Some(pattern) = rest.strip_prefix("%%") {
        return Some(ParameterOp::RemoveSuffix {
            pattern: word_from_text(pattern).ok()?,
            longest: true,
        });
    }
    if let Some(pattern) = rest.strip_prefix('%') {
        return Some(ParameterOp::RemoveSuffix {
            pattern: word_from_text(pattern).ok()?,
            longest: false,
        });
    }
    if let Some(body) = rest.strip_prefix('/') {
        return parse_replace(body);
    }
    if let Some(pattern) = rest.strip_prefix("^^") {
        return Some(ParameterOp::Uppercase {
            pattern: optional_word(pattern)?,
            all: true,
        });
    }
    if let Some(pattern) = rest.strip_prefix('^') {
        return Some(ParameterOp::Uppercase {
            pattern: optional_word(pattern)?,
            all: false,
        });
    }
    if let Some(pattern) = rest.strip_prefix(",,") {
        return Some(ParameterOp::Lowercase {
            pattern: optional_word(pattern)?,
            all: true,
        });
    }
    if let Some(pattern) = rest.strip_prefix(',') {
        return Some(ParameterOp::Lowercase {
            pattern: optional_word(pattern)?,
            all: false,
        });
    }
    if let Some(spec) = rest.strip_prefix(':') {
        // Substring: ${v:off} or ${v:off:len}
        let (offset, length) = match split_top_level_colon(spec) {
            Some((off, len)) => (off.to_string(), Some(len.to_string())),
            None => (spec.to_string(), None),
        };
        return Some(ParameterOp::Substring { offset, length });
    }
    None
}

fn optional_word(pattern: &str) -> Option<Option<Word>> {
    if pattern.is_empty() {
        Some(None)
    } else {
        Some(Some(word_from_text(pattern).ok()?))
    }
}

/// `${v/pattern/replacement}` family; the body here is everything after the
/// first `/`.
fn parse_replace(body: &str) -> Option<ParameterOp> {
    let (body, all, anchor) = if let Some(b) = body.strip_prefix('/') {
        (b, true, None)
    } else if let Some(b) = body.strip_prefix('#') {
        (b, false, Some(ReplaceAnchor::Prefix))
    } else if let Some(b) = body.strip_prefix('%') {
        (b, false, Some(ReplaceAnchor::Suffix))
    } else {
        (body, false, None)
    };

    let (pattern_text, replacement_text) = match find_unescaped_slash(body) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };

    Some(ParameterOp::Replace {
        pattern: word_from_text(pattern_text).ok()?,
        replacement: match replacement_text {
            Some(r) => Some(word_from_text(r).ok()?),
            None => None,
        },
        all,
        anchor,
    })
}

fn find_unescaped_slash(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    let mut in_single = false;
    let mut in_double = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'/' if !in_single && !in_double => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split `off:len` at the first top-level colon (parens guard ternaries in
/// arithmetic offsets).
fn split_top_level_colon(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            '?' => depth += 1, // `a ? b : c` — skip the ternary's colon
            ':' if depth == 0 => return Some((&text[..idx], &text[idx + 1..])),
            _ => {}
        }
    }
    None
}
