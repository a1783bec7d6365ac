//! Expansion Orchestrator
//!
//! Drives the per-word pipeline in POSIX order. Words expand into segments
//! carrying splittability and quoting, the splitter turns segments into
//! fields, and unquoted glob characters trigger pathname expansion. Quote
//! removal is implicit: segment text already has quotes stripped.

use crate::arithmetic;
use crate::ast::types::{Expansion, Word, WordPart};
use crate::expansion::parameter_ops::apply_parameter_op;
use crate::expansion::pathname::expand_pathnames;
use crate::expansion::pattern::escape_pattern;
use crate::expansion::tilde::{expand_tilde, expand_tilde_in_assignment};
use crate::expansion::variable::{resolve_variable, Resolved};
use crate::expansion::word_split::{split_segments, Segment};
use crate::expansion::{ExpansionError, ExpansionHost};
use crate::lexer::expansion::scan_dollar_or_backquote;
use crate::parser::word_builder::decompose_expansion;
use crate::state::ShellState;

/// How tilde expansion applies to literal parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TildeMode {
    /// Expand a leading unquoted `~` only
    Word,
    /// Assignment value: expand after `=` and each `:` as well
    Assignment,
    /// No tilde processing
    Skip,
}

/// Expand a command's words into its final argument list.
pub fn expand_words(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    words: &[Word],
) -> Result<Vec<String>, ExpansionError> {
    let mut fields = Vec::new();
    for word in words {
        fields.extend(expand_word_fields(state, host, word)?);
    }
    Ok(fields)
}

/// Expand one word into zero or more fields (splitting + globbing apply).
pub fn expand_word_fields(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    word: &Word,
) -> Result<Vec<String>, ExpansionError> {
    let Some(segments) = word_segments(state, host, word, TildeMode::Word)? else {
        return Ok(Vec::new());
    };
    let ifs = state.ifs();
    let text_fields = split_segments(&segments, &ifs);
    if state.options.noglob {
        return Ok(text_fields);
    }

    let pattern_segments = to_pattern_segments(&segments);
    let pattern_fields = split_segments(&pattern_segments, &ifs);
    if pattern_fields.len() != text_fields.len() {
        return Ok(text_fields);
    }

    let mut out = Vec::new();
    for (text, pattern) in text_fields.iter().zip(pattern_fields.iter()) {
        out.extend(expand_pathnames(state, text, pattern)?);
    }
    Ok(out)
}

/// Expand a word to a single string: no splitting, no globbing. Used for
/// assignment values, redirect targets and parameter operands.
pub fn expand_word_to_string(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    word: &Word,
) -> Result<String, ExpansionError> {
    expand_word_joined(state, host, word, TildeMode::Word, false)
}

/// Like [`expand_word_to_string`] but quoted parts come out escaped so the
/// result can be used as a shell pattern (`case`, `[[ == ]]`, `${v#p}`).
pub fn expand_word_to_pattern(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    word: &Word,
) -> Result<String, ExpansionError> {
    expand_word_joined(state, host, word, TildeMode::Skip, true)
}

/// Assignment-value expansion (`VAR=value`): tilde after `=`/`:`, full
/// substitution, no splitting or globbing.
pub fn expand_assignment_value(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    word: &Word,
) -> Result<String, ExpansionError> {
    expand_word_joined(state, host, word, TildeMode::Assignment, false)
}

fn expand_word_joined(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    word: &Word,
    tilde: TildeMode,
    as_pattern: bool,
) -> Result<String, ExpansionError> {
    let Some(segments) = word_segments(state, host, word, tilde)? else {
        return Ok(String::new());
    };
    let mut out = String::new();
    for segment in &segments {
        if segment.field_break {
            out.push(' ');
        } else if as_pattern && segment.quoted {
            out.push_str(&escape_pattern(&segment.text));
        } else {
            out.push_str(&segment.text);
        }
    }
    Ok(out)
}

/// Expand a word into segments. `None` means the word vanishes entirely
/// (a quoted `$@` or `${arr[@]}` with no elements).
fn word_segments(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    word: &Word,
    tilde: TildeMode,
) -> Result<Option<Vec<Segment>>, ExpansionError> {
    let mut segments = Vec::new();

    for (idx, part) in word.parts.iter().enumerate() {
        match part {
            WordPart::Literal(lit) => {
                let mut text = lit.text.clone();
                if !lit.quoted {
                    match tilde {
                        TildeMode::Word if idx == 0 => text = expand_tilde(state, &text),
                        TildeMode::Assignment => {
                            text = expand_tilde_in_assignment(state, &text)
                        }
                        _ => {}
                    }
                }
                segments.push(Segment::literal(text, lit.quoted));
            }
            WordPart::Expansion(exp) => {
                if expand_node(state, host, &exp.node, exp.quoted, &mut segments)? {
                    return Ok(None);
                }
            }
        }
    }
    Ok(Some(segments))
}

/// Append the segments one expansion node produces. Returns true when the
/// whole word must vanish.
fn expand_node(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    node: &Expansion,
    quoted: bool,
    segments: &mut Vec<Segment>,
) -> Result<bool, ExpansionError> {
    match node {
        Expansion::Variable(v) => {
            let resolved = resolve_variable(state, &v.name, v.index.as_deref(), quoted)?;
            push_resolved(state, resolved, quoted, &v.name, true, segments)
        }
        Expansion::Parameter(p) => {
            let resolved = apply_parameter_op(state, host, p, quoted)?;
            push_resolved(state, resolved, quoted, &p.name, false, segments)
        }
        Expansion::CommandSub(cs) => {
            let output = host.command_substitution(state, &cs.command)?;
            segments.push(Segment::expansion(output, !quoted, quoted));
            Ok(false)
        }
        Expansion::ArithmeticSub(arith) => {
            let expr = pre_expand_text(state, host, &arith.expression)?;
            let value = arithmetic::eval(&expr, state)?;
            segments.push(Segment::expansion(value.to_string(), !quoted, quoted));
            Ok(false)
        }
        Expansion::ProcessSub(ps) => {
            let path = host.process_substitution(state, &ps.command, ps.direction)?;
            segments.push(Segment::literal(path, false));
            Ok(false)
        }
    }
}

fn push_resolved(
    state: &ShellState,
    resolved: Resolved,
    quoted: bool,
    name: &str,
    check_nounset: bool,
    segments: &mut Vec<Segment>,
) -> Result<bool, ExpansionError> {
    match resolved {
        Resolved::Unset => {
            if check_nounset && state.options.nounset {
                return Err(ExpansionError::Unbound(name.to_string()));
            }
            if quoted {
                segments.push(Segment::literal("", true));
            } else {
                segments.push(Segment::expansion("", true, false));
            }
            Ok(false)
        }
        Resolved::Single(s) => {
            segments.push(Segment::expansion(s, !quoted, quoted));
            Ok(false)
        }
        Resolved::Fields(fields) => {
            if fields.is_empty() {
                // `"$@"` with no parameters: the word disappears
                return Ok(true);
            }
            for (i, field) in fields.into_iter().enumerate() {
                if i > 0 {
                    segments.push(Segment::field_break());
                }
                segments.push(Segment::literal(field, true));
            }
            Ok(false)
        }
    }
}

fn to_pattern_segments(segments: &[Segment]) -> Vec<Segment> {
    segments
        .iter()
        .map(|s| {
            if s.field_break || !s.quoted {
                s.clone()
            } else {
                Segment {
                    text: escape_pattern(&s.text),
                    ..s.clone()
                }
            }
        })
        .collect()
}

/// Textually expand `$`-forms inside free text (arithmetic expression
/// bodies) before handing it to the evaluator.
pub fn pre_expand_text(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    text: &str,
) -> Result<String, ExpansionError> {
    let mut out = String::new();
    let mut i = 0;
    while let Some(c) = text[i..].chars().next() {
        if c == '$' || c == '`' {
            let scanned = scan_dollar_or_backquote(text, i, 0)
                .map_err(|e| ExpansionError::BadSubstitution(e.to_string()))?;
            if let Some((raw, end)) = scanned {
                let node = decompose_expansion(&raw)
                    .map_err(|e| ExpansionError::BadSubstitution(e.to_string()))?;
                let mut segments = Vec::new();
                expand_node(state, host, &node, false, &mut segments)?;
                for seg in &segments {
                    out.push_str(&seg.text);
                }
                i = end;
                continue;
            }
        }
        out.push(c);
        i += c.len_utf8();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expansion::NoSubstitution;
    use crate::parser::word_builder::build_word;
    use crate::lexer::Lexer;

    /// Lex a single word token and build its AST word.
    fn word(src: &str) -> Word {
        let out = Lexer::new(src).tokenize().unwrap();
        assert!(out.tokens[0].kind.is_word_like(), "src: {src}");
        build_word(&out.tokens[0]).unwrap()
    }

    fn fields(state: &mut ShellState, src: &str) -> Vec<String> {
        expand_word_fields(state, &mut NoSubstitution, &word(src)).unwrap()
    }

    #[test]
    fn quoted_constant_expands_to_itself() {
        let mut s = ShellState::new();
        assert_eq!(fields(&mut s, "\"foo\""), vec!["foo"]);
    }

    #[test]
    fn unquoted_variable_splits() {
        let mut s = ShellState::new();
        s.assign("x", "hello world").unwrap();
        assert_eq!(fields(&mut s, "$x"), vec!["hello", "world"]);
    }

    #[test]
    fn quoted_variable_does_not_split() {
        let mut s = ShellState::new();
        s.assign("x", "hello world").unwrap();
        assert_eq!(fields(&mut s, "\"$x\""), vec!["hello world"]);
    }

    #[test]
    fn unset_variable_unquoted_produces_nothing() {
        let mut s = ShellState::new();
        assert!(fields(&mut s, "$missing").is_empty());
    }

    #[test]
    fn unset_variable_quoted_produces_empty_field() {
        let mut s = ShellState::new();
        assert_eq!(fields(&mut s, "\"$missing\""), vec![""]);
    }

    #[test]
    fn nounset_errors_on_unset() {
        let mut s = ShellState::new();
        s.options.nounset = true;
        let err = expand_word_fields(&mut s, &mut NoSubstitution, &word("$missing"));
        assert!(matches!(err, Err(ExpansionError::Unbound(_))));
    }

    #[test]
    fn at_preserves_word_boundaries() {
        let mut s = ShellState::new();
        s.positional.params = vec!["a".into(), "b c".into(), "d".into()];
        assert_eq!(fields(&mut s, "\"$@\""), vec!["a", "b c", "d"]);
    }

    #[test]
    fn at_with_affixes() {
        let mut s = ShellState::new();
        s.positional.params = vec!["a".into(), "b".into()];
        assert_eq!(fields(&mut s, "\"x$@y\""), vec!["xa", "by"]);
    }

    #[test]
    fn empty_at_vanishes() {
        let mut s = ShellState::new();
        assert!(fields(&mut s, "\"$@\"").is_empty());
        assert!(fields(&mut s, "\"x$@y\"").is_empty());
    }

    #[test]
    fn default_operator() {
        let mut s = ShellState::new();
        assert_eq!(fields(&mut s, "${x:-default}"), vec!["default"]);
        assert!(s.lookup("x").is_none());
        assert_eq!(fields(&mut s, "${x:=default}"), vec!["default"]);
        assert_eq!(s.lookup("x").as_deref(), Some("default"));
    }

    #[test]
    fn arithmetic_expansion() {
        let mut s = ShellState::new();
        s.assign("n", "4").unwrap();
        assert_eq!(fields(&mut s, "$((n * 2 + 1))"), vec!["9"]);
        // $-form variables pre-expand textually
        assert_eq!(fields(&mut s, "$(($n + 1))"), vec!["5"]);
    }

    #[test]
    fn tilde_expansion_applies_to_leading_literal() {
        let mut s = ShellState::new();
        s.assign("HOME", "/home/t").unwrap();
        assert_eq!(fields(&mut s, "~/x"), vec!["/home/t/x"]);
        assert_eq!(fields(&mut s, "\"~/x\""), vec!["~/x"]);
    }

    #[test]
    fn assignment_value_expansion() {
        let mut s = ShellState::new();
        s.assign("HOME", "/h").unwrap();
        let v =
            expand_assignment_value(&mut s, &mut NoSubstitution, &word("~/a:~/b")).unwrap();
        assert_eq!(v, "/h/a:/h/b");
    }

    #[test]
    fn mixed_quoting_concatenates() {
        let mut s = ShellState::new();
        s.assign("USER", "alice").unwrap();
        assert_eq!(fields(&mut s, "\"Hello $USER\"'!'"), vec!["Hello alice!"]);
    }

    #[test]
    fn quoted_glob_chars_stay_literal() {
        let mut s = ShellState::new();
        // no file named * exists under a fresh tempdir; quoted stays literal
        let dir = tempfile::tempdir().unwrap();
        std::env::set_current_dir(dir.path()).ok();
        assert_eq!(fields(&mut s, "'*'"), vec!["*"]);
    }

    #[test]
    fn ifs_empty_disables_splitting() {
        let mut s = ShellState::new();
        s.assign("IFS", "").unwrap();
        s.assign("x", "a b").unwrap();
        assert_eq!(fields(&mut s, "$x"), vec!["a b"]);
    }

    #[test]
    fn custom_ifs_preserves_empty_fields() {
        let mut s = ShellState::new();
        s.assign("IFS", ":").unwrap();
        s.assign("x", "a::b").unwrap();
        assert_eq!(fields(&mut s, "$x"), vec!["a", "", "b"]);
    }

    #[test]
    fn pattern_expansion_escapes_quoted() {
        let mut s = ShellState::new();
        let p = expand_word_to_pattern(&mut s, &mut NoSubstitution, &word("'*'x*")).unwrap();
        assert_eq!(p, "\\*x*");
    }
}
