//! Expansion Scanning
//!
//! Finds the extent of `$`-forms and backquoted command substitutions inside
//! words. The scanner dispatches on the character following `$`:
//!
//! - `$name`, `$1`, `$?`, `$@`, ... simple variable references
//! - `${...}` parameter expansions (balanced braces, quote-aware)
//! - `$(...)` command substitutions (balanced parens, quote-aware)
//! - `$((...))` arithmetic expansions
//! - `` `...` `` legacy command substitutions
//!
//! The raw spelling is preserved; decomposition into AST expansion nodes
//! happens later in the parser's word builder.

use crate::lexer::LexerError;

/// Special single-character parameters: `$?`, `$$`, `$!`, `$#`, `$@`, `$*`,
/// `$-`, `$0`..`$9`.
pub fn is_special_param_char(c: char) -> bool {
    matches!(c, '?' | '$' | '!' | '#' | '@' | '*' | '-') || c.is_ascii_digit()
}

pub fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Scan the expansion starting at `pos` (at `$` or a backquote). Returns the
/// raw text and the position just past it, or None when the `$` is literal
/// (e.g. `$ `, `$"` or a trailing `$`).
pub fn scan_dollar_or_backquote(
    input: &str,
    pos: usize,
    line: usize,
) -> Result<Option<(String, usize)>, LexerError> {
    let chars: Vec<char> = input[pos..].chars().collect();
    match chars.first() {
        Some('`') => {
            let end = scan_backquote(input, pos, line)?;
            Ok(Some((input[pos..end].to_string(), end)))
        }
        Some('$') => match chars.get(1) {
            Some('{') => {
                let end = scan_braced(input, pos, line)?;
                Ok(Some((input[pos..end].to_string(), end)))
            }
            Some('(') => {
                if chars.get(2) == Some(&'(') {
                    // Prefer arithmetic; fall back to command substitution
                    // when no matching `))` closes it
                    if let Some(end) = scan_double_paren(input, pos) {
                        return Ok(Some((input[pos..end].to_string(), end)));
                    }
                }
                let end = scan_paren(input, pos, line)?;
                Ok(Some((input[pos..end].to_string(), end)))
            }
            Some(&c) if is_name_start(c) => {
                let mut len = 1;
                while chars.get(1 + len).is_some_and(|&c| is_name_char(c)) {
                    len += 1;
                }
                let byte_len: usize = chars[..1 + len].iter().map(|c| c.len_utf8()).sum();
                Ok(Some((input[pos..pos + byte_len].to_string(), pos + byte_len)))
            }
            Some(&c) if is_special_param_char(c) => {
                Ok(Some((input[pos..pos + 1 + c.len_utf8()].to_string(), pos + 1 + c.len_utf8())))
            }
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Scan `${...}` with balanced braces; quotes inside are honoured.
fn scan_braced(input: &str, pos: usize, line: usize) -> Result<usize, LexerError> {
    let bytes = input.as_bytes();
    let mut depth = 0;
    let mut i = pos + 1; // at '{'
    let mut in_single = false;
    let mut in_double = false;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\\' if !in_single => {
                i += 2;
                continue;
            }
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'{' if !in_single && !in_double => depth += 1,
            b'}' if !in_single && !in_double => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(LexerError::unclosed("${", line))
}

/// Scan `$(...)` with balanced parens; nested substitutions and quotes are
/// honoured.
fn scan_paren(input: &str, pos: usize, line: usize) -> Result<usize, LexerError> {
    let bytes = input.as_bytes();
    let mut depth = 0;
    let mut i = pos + 1; // at '('
    let mut in_single = false;
    let mut in_double = false;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\\' if !in_single => {
                i += 2;
                continue;
            }
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'#' if !in_single && !in_double => {
                // Comment inside command substitution runs to end of line
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'(' if !in_single && !in_double => depth += 1,
            b')' if !in_single && !in_double => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(LexerError::unclosed("$(", line))
}

/// Scan `$((...))`. Returns None when the construct is not closed by `))`
/// (the caller then re-scans it as a command substitution).
fn scan_double_paren(input: &str, pos: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut depth = 0;
    let mut i = pos + 1; // at first '('
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    // Must close with `))` to be arithmetic
                    if i >= 1 && bytes[i - 1] == b')' {
                        return Some(i + 1);
                    }
                    return None;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Scan a backquoted command substitution; `\`` escapes the delimiter.
fn scan_backquote(input: &str, pos: usize, line: usize) -> Result<usize, LexerError> {
    let bytes = input.as_bytes();
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(LexerError::unclosed("`", line))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(input: &str) -> Option<(String, usize)> {
        scan_dollar_or_backquote(input, 0, 1).unwrap()
    }

    #[test]
    fn simple_variable() {
        assert_eq!(scan("$USER rest"), Some(("$USER".into(), 5)));
        assert_eq!(scan("$x7_y!"), Some(("$x7_y".into(), 5)));
    }

    #[test]
    fn special_params() {
        assert_eq!(scan("$?"), Some(("$?".into(), 2)));
        assert_eq!(scan("$@x"), Some(("$@".into(), 2)));
        assert_eq!(scan("$1abc"), Some(("$1".into(), 2)));
    }

    #[test]
    fn literal_dollar() {
        assert_eq!(scan("$ x"), None);
        assert_eq!(scan("$"), None);
    }

    #[test]
    fn braced() {
        assert_eq!(scan("${v:-x}rest"), Some(("${v:-x}".into(), 7)));
        assert_eq!(scan("${v:-{a}}"), Some(("${v:-{a}}".into(), 9)));
    }

    #[test]
    fn command_substitution() {
        assert_eq!(scan("$(echo hi)"), Some(("$(echo hi)".into(), 10)));
        assert_eq!(scan("$(a $(b))"), Some(("$(a $(b))".into(), 9)));
    }

    #[test]
    fn arithmetic() {
        assert_eq!(scan("$((1+2))"), Some(("$((1+2))".into(), 8)));
        assert_eq!(scan("$(( (1+2)*3 ))"), Some(("$(( (1+2)*3 ))".into(), 14)));
    }

    #[test]
    fn subshell_in_command_position_is_not_arith() {
        // $( (echo a); (echo b) ) — closes with `)` not `))`
        let (raw, _) = scan("$( (echo a) )x").unwrap();
        assert_eq!(raw, "$( (echo a) )");
    }

    #[test]
    fn backquotes() {
        assert_eq!(scan("`echo hi` x"), Some(("`echo hi`".into(), 9)));
        assert_eq!(scan(r"`a \` b`"), Some((r"`a \` b`".into(), 8)));
    }

    #[test]
    fn unclosed_errors() {
        assert!(scan_dollar_or_backquote("${v", 0, 1).is_err());
        assert!(scan_dollar_or_backquote("$(x", 0, 1).is_err());
        assert!(scan_dollar_or_backquote("`x", 0, 1).is_err());
    }
}
