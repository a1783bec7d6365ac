//! Assignment and Array Parsing
//!
//! Decomposes ASSIGNMENT_WORD tokens into `Assignment` nodes and handles the
//! `arr=(a b c)` initialiser form. The lexer emits one canonical tokenisation
//! for `arr[i]=v`; a bounded two-token lookahead additionally accepts the
//! `arr[i]` `=v` split that adjacent expansion results can produce.

use crate::ast::types::{Assignment, Word};
use crate::lexer::token::{Token, TokenKind, TokenPart, TokenPartKind};
use crate::parser::types::{ParseError, ParserContext};
use crate::parser::word_builder::{build_word, build_word_from_parts};

/// Parse the assignment carried by an ASSIGNMENT_WORD token (already
/// consumed by the caller). Consumes a following `( ... )` initialiser when
/// the token ends at the `=`.
pub fn parse_assignment(
    ctx: &mut ParserContext,
    token: &Token,
) -> Result<Assignment, ParseError> {
    let first = match token.parts.first() {
        Some(TokenPart {
            kind: TokenPartKind::Literal,
            text,
            ..
        }) => text.as_str(),
        _ => {
            return Err(ctx.error_at_current("malformed assignment"));
        }
    };

    let (name, index, append, value_offset) = split_assignment_prefix(first)
        .ok_or_else(|| ctx.error_at_current("malformed assignment"))?;

    // Rebuild the value from the remainder of the first part plus all
    // following parts
    let mut value_parts: Vec<TokenPart> = Vec::new();
    let value_text = &first[value_offset..];
    if !value_text.is_empty() {
        value_parts.push(TokenPart::literal(value_text, token.parts[0].quote_type));
    }
    value_parts.extend(token.parts.iter().skip(1).cloned());

    // `arr=( ... )`: the initialiser follows as separate tokens
    if value_parts.is_empty()
        && ctx.check(TokenKind::LParen)
        && ctx.peek().adjacent_to_previous
    {
        ctx.advance(); // (
        let array = parse_array_elements(ctx)?;
        return Ok(Assignment {
            name,
            index,
            value: None,
            append,
            array: Some(array),
        });
    }

    let value = if value_parts.is_empty() {
        None
    } else {
        Some(build_word_from_parts(&value_parts)?)
    };

    Ok(Assignment {
        name,
        index,
        value,
        append,
        array: None,
    })
}

/// Collect initialiser words up to the closing paren; newlines separate
/// elements like whitespace does.
fn parse_array_elements(ctx: &mut ParserContext) -> Result<Vec<Word>, ParseError> {
    let mut elements = Vec::new();
    loop {
        ctx.skip_newlines();
        if ctx.eat(TokenKind::RParen) {
            return Ok(elements);
        }
        if ctx.at_end() {
            return Err(ctx.error_at_current("unterminated array initialiser"));
        }
        if !ctx.peek_kind().is_word_like() {
            return Err(ctx.error_at_current("expected word in array initialiser"));
        }
        let tok = ctx.advance();
        elements.push(build_word(&tok)?);
    }
}

/// Split `name=`, `name+=`, `name[idx]=` prefixes. Returns the name, the
/// optional subscript, the append flag, and the byte offset of the value.
fn split_assignment_prefix(text: &str) -> Option<(String, Option<String>, bool, usize)> {
    let eq = find_assignment_eq(text)?;
    let mut prefix_end = eq;
    let append = text[..eq].ends_with('+');
    if append {
        prefix_end -= 1;
    }
    let prefix = &text[..prefix_end];
    match prefix.find('[') {
        Some(open) => {
            let close = prefix.rfind(']')?;
            Some((
                prefix[..open].to_string(),
                Some(prefix[open + 1..close].to_string()),
                append,
                eq + 1,
            ))
        }
        None => Some((prefix.to_string(), None, append, eq + 1)),
    }
}

/// Find the `=` that terminates the assignment prefix, skipping any
/// subscript (which may itself contain `=` inside arithmetic).
fn find_assignment_eq(text: &str) -> Option<usize> {
    let mut depth = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            '=' if depth == 0 => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Bounded lookahead for the split form `arr[0]` `=v` (two adjacent word
/// tokens). Restores the cursor when the shape does not match.
pub fn try_parse_split_array_assignment(
    ctx: &mut ParserContext,
) -> Result<Option<Assignment>, ParseError> {
    let mark = ctx.save();
    if ctx.peek_kind() != TokenKind::Word {
        return Ok(None);
    }
    let head = ctx.peek().text.clone();
    let Some((name, index)) = split_subscripted_name(&head) else {
        return Ok(None);
    };
    let next = ctx.peek_at(1);
    if !next.adjacent_to_previous
        || !next.kind.is_word_like()
        || !next.text.starts_with('=')
    {
        return Ok(None);
    }
    ctx.advance();
    let value_token = ctx.advance();

    // Drop the leading `=` from the value token's first part
    let mut parts = value_token.parts.clone();
    if let Some(first) = parts.first_mut() {
        if matches!(first.kind, TokenPartKind::Literal) && first.text.starts_with('=') {
            first.text.remove(0);
        } else {
            ctx.restore(mark);
            return Ok(None);
        }
    }
    let parts: Vec<TokenPart> = parts.into_iter().filter(|p| !p.text.is_empty() || p.quote_type.is_quoted()).collect();
    let value = if parts.is_empty() {
        None
    } else {
        Some(build_word_from_parts(&parts)?)
    };

    Ok(Some(Assignment {
        name,
        index: Some(index),
        value,
        append: false,
        array: None,
    }))
}

/// `name[subscript]` with nothing trailing.
fn split_subscripted_name(text: &str) -> Option<(String, String)> {
    let open = text.find('[')?;
    if !text.ends_with(']') || open == 0 {
        return None;
    }
    let name = &text[..open];
    if !name
        .chars()
        .enumerate()
        .all(|(i, c)| if i == 0 { c.is_ascii_alphabetic() || c == '_' } else { c.is_ascii_alphanumeric() || c == '_' })
    {
        return None;
    }
    Some((name.to_string(), text[open + 1..text.len() - 1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn ctx(src: &str) -> ParserContext {
        let out = Lexer::new(src).tokenize().unwrap();
        ParserContext::new(out.tokens, out.heredocs, out.source)
    }

    fn first_assignment(src: &str) -> Assignment {
        let mut c = ctx(src);
        let tok = c.advance();
        assert_eq!(tok.kind, TokenKind::AssignmentWord, "src: {src}");
        parse_assignment(&mut c, &tok).unwrap()
    }

    #[test]
    fn scalar_assignment() {
        let a = first_assignment("X=hello");
        assert_eq!(a.name, "X");
        assert_eq!(a.value.unwrap().as_literal().as_deref(), Some("hello"));
        assert!(!a.append);
    }

    #[test]
    fn empty_value() {
        let a = first_assignment("X=");
        assert_eq!(a.value, None);
    }

    #[test]
    fn append_assignment() {
        let a = first_assignment("PATH+=:/usr/local/bin");
        assert!(a.append);
        assert_eq!(a.name, "PATH");
    }

    #[test]
    fn subscripted_assignment() {
        let a = first_assignment("arr[3]=x");
        assert_eq!(a.name, "arr");
        assert_eq!(a.index.as_deref(), Some("3"));
    }

    #[test]
    fn quoted_value_stays_quoted() {
        let a = first_assignment("X='a b'");
        let word = a.value.unwrap();
        assert!(word.is_fully_quoted());
    }

    #[test]
    fn array_initialiser() {
        let a = first_assignment("arr=(one two three)");
        let items = a.array.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].as_literal().as_deref(), Some("two"));
    }

    #[test]
    fn empty_array() {
        let a = first_assignment("arr=()");
        assert!(a.array.unwrap().is_empty());
    }

    #[test]
    fn prefix_splitting() {
        assert_eq!(
            split_assignment_prefix("a[i+1]=v"),
            Some(("a".into(), Some("i+1".into()), false, 7))
        );
        assert_eq!(
            split_assignment_prefix("x+=y"),
            Some(("x".into(), None, true, 3))
        );
        assert_eq!(split_assignment_prefix("noeq"), None);
    }
}
