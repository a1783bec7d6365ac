//! Brace Expansion
//!
//! A pre-tokenisation pass that rewrites the raw source string:
//! `{a,b,c}` becomes three copies of the surrounding word, `{1..5}` and
//! `{1..9..2}` expand numeric ranges, `{a..f}` expands character ranges.
//! Nested braces expand inside-out via recursion. Any malformed brace
//! expression leaves the original text untouched; this pass never fails.

/// Rewrite `source`, expanding unquoted brace expressions word by word.
pub fn expand_braces(source: &str) -> String {
    let mut out = String::new();
    let bytes: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < bytes.len() {
        let ch = bytes[i];
        if is_word_break(ch) {
            out.push(ch);
            i += 1;
            continue;
        }
        if ch == '#' {
            // Comment: copy to end of line untouched
            while i < bytes.len() && bytes[i] != '\n' {
                out.push(bytes[i]);
                i += 1;
            }
            continue;
        }
        // Collect one word (quotes keep word breaks literal)
        let start = i;
        let mut in_single = false;
        let mut in_double = false;
        while i < bytes.len() {
            let c = bytes[i];
            if c == '\\' && !in_single && i + 1 < bytes.len() {
                i += 2;
                continue;
            }
            match c {
                '\'' if !in_double => in_single = !in_single,
                '"' if !in_single => in_double = !in_double,
                _ if !in_single && !in_double && is_word_break(c) => break,
                _ => {}
            }
            i += 1;
        }
        let word: String = bytes[start..i].iter().collect();
        let expanded = expand_word(&word);
        out.push_str(&expanded.join(" "));
    }
    out
}

fn is_word_break(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>')
}

/// Expand one word. A word without a valid brace expression expands to
/// itself; otherwise the first expression multiplies the surrounding text
/// and the results are expanded recursively.
pub fn expand_word(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let Some((open, close)) = find_brace_pair(&chars) else {
        return vec![word.to_string()];
    };

    let preamble: String = chars[..open].iter().collect();
    let body: String = chars[open + 1..close].iter().collect();
    let postscript: String = chars[close + 1..].iter().collect();

    let alternatives = match split_alternatives(&body) {
        Some(alts) => alts,
        None => match expand_range(&body) {
            Some(items) => items,
            // `{x}` with neither comma nor range stays literal
            None => return vec![word.to_string()],
        },
    };

    let mut results = Vec::new();
    for alt in &alternatives {
        let candidate = format!("{preamble}{alt}{postscript}");
        results.extend(expand_word(&candidate));
    }
    results
}

/// Find the first expandable `{ ... }` pair, skipping quoted text and `${`.
fn find_brace_pair(chars: &[char]) -> Option<(usize, usize)> {
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if !in_single => {
                i += 2;
                continue;
            }
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '$' if !in_single => {
                // Skip ${...} parameter expansions entirely
                if i + 1 < chars.len() && chars[i + 1] == '{' {
                    let mut depth = 0;
                    let mut j = i + 1;
                    while j < chars.len() {
                        match chars[j] {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        j += 1;
                    }
                    i = j + 1;
                    continue;
                }
            }
            '{' if !in_single && !in_double => {
                if let Some(close) = find_matching_close(chars, i) {
                    return Some((i, close));
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn find_matching_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut i = open;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if !in_single => {
                i += 2;
                continue;
            }
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '{' if !in_single && !in_double => depth += 1,
            '}' if !in_single && !in_double => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split a brace body on top-level commas. Returns None when there is no
/// top-level comma (the body may still be a range).
fn split_alternatives(body: &str) -> Option<Vec<String>> {
    let chars: Vec<char> = body.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    let mut found_comma = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if i + 1 < chars.len() => {
                current.push(c);
                current.push(chars[i + 1]);
                i += 2;
                continue;
            }
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                found_comma = true;
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
        i += 1;
    }
    parts.push(current);
    if found_comma {
        Some(parts)
    } else {
        None
    }
}

/// Expand `1..5`, `1..9..2`, `a..f` style ranges. Returns None for bodies
/// that are not well-formed ranges.
fn expand_range(body: &str) -> Option<Vec<String>> {
    let pieces: Vec<&str> = body.split("..").collect();
    if pieces.len() != 2 && pieces.len() != 3 {
        return None;
    }
    let step: i64 = if pieces.len() == 3 {
        let s = pieces[2].parse::<i64>().ok()?;
        if s == 0 {
            return None;
        }
        s.abs()
    } else {
        1
    };

    // Numeric range, with zero-padding preserved from the endpoints
    if let (Ok(start), Ok(end)) = (pieces[0].parse::<i64>(), pieces[1].parse::<i64>()) {
        let width = if has_leading_zero(pieces[0]) || has_leading_zero(pieces[1]) {
            pieces[0].trim_start_matches('-').len().max(pieces[1].trim_start_matches('-').len())
        } else {
            0
        };
        let mut items = Vec::new();
        let mut n = start;
        if start <= end {
            while n <= end {
                items.push(format_padded(n, width));
                n += step;
            }
        } else {
            while n >= end {
                items.push(format_padded(n, width));
                n -= step;
            }
        }
        return Some(items);
    }

    // Single-character range
    let sc: Vec<char> = pieces[0].chars().collect();
    let ec: Vec<char> = pieces[1].chars().collect();
    if sc.len() == 1 && ec.len() == 1 && sc[0].is_ascii_alphabetic() && ec[0].is_ascii_alphabetic()
    {
        let (s, e) = (sc[0] as u32, ec[0] as u32);
        let mut items = Vec::new();
        if s <= e {
            let mut c = s;
            while c <= e {
                items.push(char::from_u32(c)?.to_string());
                c += step as u32;
            }
        } else {
            let mut c = s as i64;
            while c >= e as i64 {
                items.push(char::from_u32(c as u32)?.to_string());
                c -= step;
            }
        }
        return Some(items);
    }
    None
}

fn has_leading_zero(s: &str) -> bool {
    let t = s.trim_start_matches('-');
    t.len() > 1 && t.starts_with('0')
}

fn format_padded(n: i64, width: usize) -> String {
    if width == 0 {
        n.to_string()
    } else if n < 0 {
        format!("-{:0width$}", -n, width = width.saturating_sub(1))
    } else {
        format!("{n:0width$}")
    }
}
