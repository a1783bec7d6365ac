//! Parameter Expansion Operators
//!
//! Implements the `${v...}` operator family over resolved values: defaults,
//! alternates, required values, length, prefix/suffix removal, replacement,
//! substring, name listing and case modification. Patterns here are shell
//! globs converted through the pattern module.

use crate::arithmetic;
use crate::ast::types::{ParameterExpansion, ParameterOp, ReplaceAnchor, Word};
use crate::expansion::expander::{expand_word_to_pattern, expand_word_to_string};
use crate::expansion::pattern::{compile_pattern, matches_pattern, pattern_to_regex_str, PatternOptions};
use crate::expansion::variable::{array_len, resolve_variable, star_join, Resolved};
use crate::expansion::{ExpansionError, ExpansionHost};
use crate::state::ShellState;
use regex_lite::Regex;

pub fn apply_parameter_op(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    pe: &ParameterExpansion,
    quoted: bool,
) -> Result<Resolved, ExpansionError> {
    let name = pe.name.as_str();
    let index = pe.index.as_deref();
    let current = resolve_variable(state, name, index, quoted)?;

    match &pe.op {
        ParameterOp::UseDefault { word, check_null } => {
            if is_unset_or_null(&current, *check_null) {
                Ok(Resolved::Single(expand_word_to_string(state, host, word)?))
            } else {
                Ok(current)
            }
        }
        ParameterOp::AssignDefault { word, check_null } => {
            if is_unset_or_null(&current, *check_null) {
                let value = expand_word_to_string(state, host, word)?;
                state.assign(name, value.clone())?;
                Ok(Resolved::Single(value))
            } else {
                Ok(current)
            }
        }
        ParameterOp::UseAlternate { word, check_null } => {
            if is_unset_or_null(&current, *check_null) {
                Ok(Resolved::Single(String::new()))
            } else {
                Ok(Resolved::Single(expand_word_to_string(state, host, word)?))
            }
        }
        ParameterOp::ErrorIfUnset { word, check_null } => {
            if is_unset_or_null(&current, *check_null) {
                let message = match word {
                    Some(w) => expand_word_to_string(state, host, w)?,
                    None => "parameter null or not set".to_string(),
                };
                Err(ExpansionError::ParameterError {
                    name: name.to_string(),
                    message,
                })
            } else {
                Ok(current)
            }
        }
        ParameterOp::Length => length_of(state, name, index, &current),
        ParameterOp::RemovePrefix { pattern, longest } => {
            let value = required_value(state, name, current)?;
            let pat = expand_word_to_pattern(state, host, pattern)?;
            Ok(Resolved::Single(remove_prefix(
                &value,
                &pat,
                *longest,
                pattern_opts(state),
            )))
        }
        ParameterOp::RemoveSuffix { pattern, longest } => {
            let value = required_value(state, name, current)?;
            let pat = expand_word_to_pattern(state, host, pattern)?;
            Ok(Resolved::Single(remove_suffix(
                &value,
                &pat,
                *longest,
                pattern_opts(state),
            )))
        }
        ParameterOp::Replace {
            pattern,
            replacement,
            all,
            anchor,
        } => {
            let value = required_value(state, name, current)?;
            let pat = expand_word_to_pattern(state, host, pattern)?;
            let rep = match replacement {
                Some(w) => expand_word_to_string(state, host, w)?,
                None => String::new(),
            };
            Ok(Resolved::Single(replace(
                &value,
                &pat,
                &rep,
                *all,
                *anchor,
                pattern_opts(state),
            )))
        }
        ParameterOp::Substring { offset, length } => {
            let value = required_value(state, name, current)?;
            let off = arithmetic::eval(offset, state)?;
            let len = match length {
                Some(expr) => Some(arithmetic::eval(expr, state)?),
                None => None,
            };
            Ok(Resolved::Single(substring(&value, off, len)))
        }
        ParameterOp::Names { star } => {
            let names = state.scopes.names_with_prefix(name);
            if *star || !quoted {
                let join = if quoted { star_join(state) } else { " ".to_string() };
                Ok(Resolved::Single(names.join(&join)))
            } else {
                Ok(Resolved::Fields(names))
            }
        }
        ParameterOp::Uppercase { pattern, all } => {
            let value = required_value(state, name, current)?;
            let pat = expand_optional_pattern(state, host, pattern)?;
            Ok(Resolved::Single(fold_case(
                &value,
                pat.as_deref(),
                *all,
                true,
                pattern_opts(state),
            )))
        }
        ParameterOp::Lowercase { pattern, all } => {
            let value = required_value(state, name, current)?;
            let pat = expand_optional_pattern(state, host, pattern)?;
            Ok(Resolved::Single(fold_case(
                &value,
                pat.as_deref(),
                *all,
                false,
                pattern_opts(state),
            )))
        }
    }
}

fn pattern_opts(state: &ShellState) -> PatternOptions {
    PatternOptions {
        extglob: state.options.extglob,
        case_insensitive: state.options.nocasematch,
    }
}

fn expand_optional_pattern(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    pattern: &Option<Word>,
) -> Result<Option<String>, ExpansionError> {
    match pattern {
        Some(w) => {
            let p = expand_word_to_pattern(state, host, w)?;
            if p.is_empty() {
                Ok(None)
            } else {
                Ok(Some(p))
            }
        }
        None => Ok(None),
    }
}

fn is_unset_or_null(value: &Resolved, check_null: bool) -> bool {
    match value {
        Resolved::Unset => true,
        Resolved::Single(s) => check_null && s.is_empty(),
        Resolved::Fields(fs) => check_null && fs.is_empty(),
    }
}

/// Value for a transforming operator; unset is an error under `nounset`,
/// empty otherwise.
fn required_value(
    state: &ShellState,
    name: &str,
    value: Resolved,
) -> Result<String, ExpansionError> {
    match value {
        Resolved::Unset => {
            if state.options.nounset {
                Err(ExpansionError::Unbound(name.to_string()))
            } else {
                Ok(String::new())
            }
        }
        other => Ok(other.into_single(" ").unwrap_or_default()),
    }
}

/// `${#...}`: element count for `@`/`*` forms, character length otherwise.
fn length_of(
    state: &ShellState,
    name: &str,
    index: Option<&str>,
    current: &Resolved,
) -> Result<Resolved, ExpansionError> {
    if name == "@" || name == "*" {
        return Ok(Resolved::Single(state.positional.count().to_string()));
    }
    if matches!(index, Some("@") | Some("*")) {
        let count = match state.get_var(&state.resolve_name(name)) {
            Some(var) => array_len(&var.value),
            None => 0,
        };
        return Ok(Resolved::Single(count.to_string()));
    }
    match current {
        Resolved::Unset => {
            if state.options.nounset {
                Err(ExpansionError::Unbound(name.to_string()))
            } else {
                Ok(Resolved::Single("0".to_string()))
            }
        }
        Resolved::Single(s) => Ok(Resolved::Single(s.chars().count().to_string())),
        Resolved::Fields(fs) => Ok(Resolved::Single(fs.len().to_string())),
    }
}

/// `${v#p}` / `${v##p}`.
pub fn remove_prefix(value: &str, pattern: &str, longest: bool, opts: PatternOptions) -> String {
    let boundaries: Vec<usize> = char_boundaries(value);
    let candidates: Box<dyn Iterator<Item = &usize>> = if longest {
        Box::new(boundaries.iter().rev())
    } else {
        Box::new(boundaries.iter())
    };
    for &end in candidates {
        if matches_pattern(&value[..end], pattern, opts) {
            return value[end..].to_string();
        }
    }
    value.to_string()
}

/// `${v%p}` / `${v%%p}`.
pub fn remove_suffix(value: &str, pattern: &str, longest: bool, opts: PatternOptions) -> String {
    let boundaries: Vec<usize> = char_boundaries(value);
    let candidates: Box<dyn Iterator<Item = &usize>> = if longest {
        Box::new(boundaries.iter())
    } else {
        Box::new(boundaries.iter().rev())
    };
    for &start in candidates {
        if matches_pattern(&value[start..], pattern, opts) {
            return value[..start].to_string();
        }
    }
    value.to_string()
}

fn char_boundaries(value: &str) -> Vec<usize> {
    let mut b: Vec<usize> = value.char_indices().map(|(i, _)| i).collect();
    b.push(value.len());
    b
}

/// `${v/p/r}` family.
pub fn replace(
    value: &str,
    pattern: &str,
    replacement: &str,
    all: bool,
    anchor: Option<ReplaceAnchor>,
    opts: PatternOptions,
) -> String {
    let body = pattern_to_regex_str(pattern, opts);
    let prefix = if opts.case_insensitive { "(?i)" } else { "" };
    let anchored = match anchor {
        Some(ReplaceAnchor::Prefix) => format!("^{prefix}{body}"),
        Some(ReplaceAnchor::Suffix) => format!("{prefix}{body}$"),
        None => format!("{prefix}{body}"),
    };
    let Ok(re) = Regex::new(&anchored) else {
        return value.to_string();
    };
    // `$` is literal in shell replacement text
    let literal = replacement.replace('$', "$$");
    if all && anchor.is_none() {
        re.replace_all(value, literal.as_str()).into_owned()
    } else {
        re.replace(value, literal.as_str()).into_owned()
    }
}

/// `${v:off}` / `${v:off:len}` in characters; negative offsets count from
/// the end, a negative length leaves that many characters off the end.
pub fn substring(value: &str, offset: i64, length: Option<i64>) -> String {
    let chars: Vec<char> = value.chars().collect();
    let n = chars.len() as i64;
    let start = if offset < 0 {
        (n + offset).max(0)
    } else {
        offset.min(n)
    };
    let end = match length {
        None => n,
        Some(l) if l < 0 => (n + l).max(start),
        Some(l) => (start + l).min(n),
    };
    chars[start as usize..end as usize].iter().collect()
}

/// `${v^p}` / `${v^^p}` / `${v,p}` / `${v,,p}`. With no pattern every
/// character is eligible; otherwise only characters matching the
/// single-character pattern convert.
pub fn fold_case(
    value: &str,
    pattern: Option<&str>,
    all: bool,
    upper: bool,
    opts: PatternOptions,
) -> String {
    let matcher = pattern.and_then(|p| compile_pattern(p, opts));
    let eligible = |c: char| match &matcher {
        Some(re) => re.is_match(&c.to_string()),
        None => true,
    };
    let convert = |c: char| -> String {
        if upper {
            c.to_uppercase().collect()
        } else {
            c.to_lowercase().collect()
        }
    };

    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        if (all || i == 0) && eligible(c) {
            out.push_str(&convert(c));
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTS: PatternOptions = PatternOptions {
        extglob: false,
        case_insensitive: false,
    };

    #[test]
    fn prefix_removal() {
        assert_eq!(remove_prefix("a/b/c", "*/", false, OPTS), "b/c");
        assert_eq!(remove_prefix("a/b/c", "*/", true, OPTS), "c");
        assert_eq!(remove_prefix("abc", "x", false, OPTS), "abc");
    }

    #[test]
    fn suffix_removal() {
        assert_eq!(remove_suffix("file.tar.gz", ".*", true, OPTS), "file");
        assert_eq!(remove_suffix("file.tar.gz", ".*", false, OPTS), "file.tar");
    }

    #[test]
    fn replacement() {
        assert_eq!(replace("aaa", "a", "b", false, None, OPTS), "baa");
        assert_eq!(replace("aaa", "a", "b", true, None, OPTS), "bbb");
        assert_eq!(
            replace("aab", "a*b", "X", false, None, OPTS),
            "X"
        );
        assert_eq!(
            replace("hello", "h", "H", false, Some(ReplaceAnchor::Prefix), OPTS),
            "Hello"
        );
        assert_eq!(
            replace("oho", "o", "0", false, Some(ReplaceAnchor::Suffix), OPTS),
            "oh0"
        );
        // deletion when replacement is empty
        assert_eq!(replace("a-b-c", "-", "", true, None, OPTS), "abc");
    }

    #[test]
    fn replacement_with_dollar_is_literal() {
        assert_eq!(replace("x", "x", "$1", false, None, OPTS), "$1");
    }

    #[test]
    fn substrings() {
        assert_eq!(substring("hello", 1, Some(3)), "ell");
        assert_eq!(substring("hello", 1, None), "ello");
        assert_eq!(substring("hello", -3, None), "llo");
        assert_eq!(substring("hello", 0, Some(-2)), "hel");
        assert_eq!(substring("hello", 99, None), "");
        assert_eq!(substring("héllo", 1, Some(2)), "él");
    }

    #[test]
    fn case_folding() {
        assert_eq!(fold_case("hello", None, true, true, OPTS), "HELLO");
        assert_eq!(fold_case("hello", None, false, true, OPTS), "Hello");
        assert_eq!(fold_case("HELLO", None, true, false, OPTS), "hello");
        assert_eq!(fold_case("hello", Some("[aeiou]"), true, true, OPTS), "hEllO");
        // first char does not match the pattern: unchanged
        assert_eq!(fold_case("hello", Some("[aeiou]"), false, true, OPTS), "hello");
    }
}
