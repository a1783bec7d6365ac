//! Shell Pattern Matching
//!
//! Converts shell glob patterns to anchored regexes for parameter-expansion
//! operators, `case` matching and `[[ == ]]`. With `extglob` enabled the
//! extended forms `?(p|q) *(p|q) +(p|q) @(p|q) !(p|q)` are recognised.

use regex_lite::Regex;

#[derive(Debug, Clone, Copy, Default)]
pub struct PatternOptions {
    pub extglob: bool,
    pub case_insensitive: bool,
}

/// Convert a shell pattern to a regex fragment (no anchors).
pub fn pattern_to_regex_str(pattern: &str, opts: PatternOptions) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    convert(&chars, &mut 0, &mut out, opts, None);
    out
}

/// Compile a pattern as a full-string match.
pub fn compile_pattern(pattern: &str, opts: PatternOptions) -> Option<Regex> {
    let body = pattern_to_regex_str(pattern, opts);
    let prefix = if opts.case_insensitive { "(?i)" } else { "" };
    Regex::new(&format!("^{prefix}{body}$")).ok()
}

/// Does `text` match `pattern` in full?
pub fn matches_pattern(text: &str, pattern: &str, opts: PatternOptions) -> bool {
    match compile_pattern(pattern, opts) {
        Some(re) => re.is_match(text),
        None => text == pattern,
    }
}

/// True when the string contains unescaped glob metacharacters.
pub fn has_glob_chars(text: &str, extglob: bool) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'*' | b'?' | b'[' => return true,
            b'+' | b'@' | b'!' if extglob && bytes.get(i + 1) == Some(&b'(') => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

/// Escape a string so it matches literally inside a pattern.
pub fn escape_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\' | '(' | ')' | '|' | '+' | '@' | '!') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Recursive worker. `stop` is a character that ends the current group
/// (for extglob sub-patterns).
fn convert(
    chars: &[char],
    i: &mut usize,
    out: &mut String,
    opts: PatternOptions,
    stop: Option<char>,
) {
    while *i < chars.len() {
        let c = chars[*i];
        if Some(c) == stop {
            return;
        }
        // extglob operators win over the plain `*` and `?` meanings
        if opts.extglob
            && matches!(c, '?' | '*' | '+' | '@' | '!')
            && chars.get(*i + 1) == Some(&'(')
        {
            *i += 2;
            let group = convert_group(chars, i, opts);
            push_extglob(out, c, &group);
            continue;
        }
        match c {
            '*' => {
                *i += 1;
                out.push_str(".*");
            }
            '?' => {
                *i += 1;
                out.push('.');
            }
            '\\' => {
                *i += 1;
                if *i < chars.len() {
                    push_literal(out, chars[*i]);
                    *i += 1;
                } else {
                    out.push_str("\\\\");
                }
            }
            '[' => {
                convert_class(chars, i, out);
            }
            _ => {
                push_literal(out, c);
                *i += 1;
            }
        }
    }
}

fn push_extglob(out: &mut String, op: char, group: &str) {
    match op {
        '?' => out.push_str(&format!("(?:{group})?")),
        '*' => out.push_str(&format!("(?:{group})*")),
        '+' => out.push_str(&format!("(?:{group})+")),
        '@' => out.push_str(&format!("(?:{group})")),
        // Negation: any string that is not exactly the group
        '!' => out.push_str(&format!("(?:(?!(?:{group})$).*)")),
        _ => unreachable!(),
    }
}

/// `( a | b )` body of an extglob operator; consumes through `)`.
fn convert_group(chars: &[char], i: &mut usize, opts: PatternOptions) -> String {
    let mut alternatives = Vec::new();
    let mut current = String::new();
    loop {
        if *i >= chars.len() {
            break;
        }
        match chars[*i] {
            ')' => {
                *i += 1;
                break;
            }
            '|' => {
                *i += 1;
                alternatives.push(std::mem::take(&mut current));
            }
            _ => {
                let mut sub = String::new();
                let start = *i;
                // Convert a single pattern char (or nested construct)
                convert_single(chars, i, &mut sub, opts);
                if *i == start {
                    // no progress; bail out
                    *i += 1;
                }
                current.push_str(&sub);
            }
        }
    }
    alternatives.push(current);
    alternatives.join("|")
}

fn convert_single(chars: &[char], i: &mut usize, out: &mut String, opts: PatternOptions) {
    if *i >= chars.len() {
        return;
    }
    let c = chars[*i];
    if opts.extglob
        && matches!(c, '?' | '*' | '+' | '@' | '!')
        && chars.get(*i + 1) == Some(&'(')
    {
        *i += 2;
        let group = convert_group(chars, i, opts);
        push_extglob(out, c, &group);
        return;
    }
    match c {
        '*' => {
            *i += 1;
            out.push_str(".*");
        }
        '?' => {
            *i += 1;
            out.push('.');
        }
        '[' => convert_class(chars, i, out),
        '\\' => {
            *i += 1;
            if *i < chars.len() {
                push_literal(out, chars[*i]);
                *i += 1;
            }
        }
        _ => {
            push_literal(out, c);
            *i += 1;
        }
    }
}

/// `[...]` character class; `!` or `^` negates.
fn convert_class(chars: &[char], i: &mut usize, out: &mut String) {
    let start = *i;
    *i += 1; // '['
    let mut body = String::new();
    let negated = matches!(chars.get(*i), Some('!') | Some('^'));
    if negated {
        *i += 1;
    }
    // a leading ']' is literal
    if chars.get(*i) == Some(&']') {
        body.push_str("\\]");
        *i += 1;
    }
    let mut closed = false;
    while *i < chars.len() {
        let c = chars[*i];
        if c == ']' {
            *i += 1;
            closed = true;
            break;
        }
        if matches!(c, '\\' | '^') {
            body.push('\\');
        }
        body.push(c);
        *i += 1;
    }
    if !closed {
        // Unterminated class: treat `[` literally and rewind
        *i = start + 1;
        out.push_str("\\[");
        return;
    }
    out.push('[');
    if negated {
        out.push('^');
    }
    out.push_str(&body);
    out.push(']');
}

fn push_literal(out: &mut String, c: char) {
    if matches!(
        c,
        '.' | '+' | '(' | ')' | '|' | '^' | '$' | '{' | '}' | '[' | ']' | '\\' | '*' | '?'
    ) {
        out.push('\\');
    }
    out.push(c);
}
