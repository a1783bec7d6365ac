//! Assignment Application
//!
//! Expands and applies `VAR=value` words: tilde after `=`/`:`, variable,
//! command and arithmetic expansion, but no word splitting or globbing.
//! Handles append mode, array element assignment, array initialisers and
//! the integer attribute.

use crate::arithmetic;
use crate::ast::types::Assignment;
use crate::expansion::expander::{expand_assignment_value, expand_word_fields};
use crate::expansion::{ExpansionError, ExpansionHost};
use crate::state::{ShellState, VarAttrs, VarValue};
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Expand and apply one assignment to the shell state.
pub fn apply_assignment(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    assignment: &Assignment,
) -> Result<(), ExpansionError> {
    let name = state.resolve_name(&assignment.name);

    if let Some(initialiser) = &assignment.array {
        return apply_array_init(state, host, &name, initialiser, assignment.append);
    }

    let mut value = match &assignment.value {
        Some(word) => expand_assignment_value(state, host, word)?,
        None => String::new(),
    };

    let attrs = state
        .get_var(&name)
        .map(|v| v.attrs)
        .unwrap_or_default();
    if attrs.contains(VarAttrs::INTEGER) {
        value = arithmetic::eval(&value, state)?.to_string();
    }

    match &assignment.index {
        Some(index) => apply_element(state, &name, index, value, assignment.append),
        None => {
            if assignment.append {
                let old = state.lookup(&name).unwrap_or_default();
                let combined = if attrs.contains(VarAttrs::INTEGER) {
                    let lhs: i64 = old.parse().unwrap_or(0);
                    let rhs: i64 = value.parse().unwrap_or(0);
                    (lhs + rhs).to_string()
                } else {
                    format!("{old}{value}")
                };
                state.assign(&name, combined)?;
            } else {
                state.assign(&name, value)?;
            }
            Ok(())
        }
    }
}

/// `arr[i]=v` / `arr[i]+=v`.
fn apply_element(
    state: &mut ShellState,
    name: &str,
    index: &str,
    value: String,
    append: bool,
) -> Result<(), ExpansionError> {
    let existing = state.get_var(name).map(|v| v.value.clone());

    if let Some(VarValue::Assoc(map)) = existing {
        let mut map = map;
        let key = index.trim_matches(|c| c == '\'' || c == '"').to_string();
        let entry = map.entry(key).or_default();
        if append {
            entry.push_str(&value);
        } else {
            *entry = value;
        }
        state.scopes.set(name, VarValue::Assoc(map))?;
        return Ok(());
    }

    let idx = arithmetic::eval(index, state)?;
    let mut map = match existing {
        Some(VarValue::Indexed(map)) => map,
        Some(VarValue::Scalar(s)) => {
            let mut m = BTreeMap::new();
            if !s.is_empty() {
                m.insert(0, s);
            }
            m
        }
        _ => BTreeMap::new(),
    };
    let entry = map.entry(idx).or_default();
    if append {
        entry.push_str(&value);
    } else {
        *entry = value;
    }
    state.scopes.set(name, VarValue::Indexed(map))?;
    state
        .scopes
        .modify_attrs(name, VarAttrs::INDEXED_ARRAY, VarAttrs::empty())?;
    Ok(())
}

/// `arr=(a b c)` / `arr+=(d)`; `[k]=v` elements target keys explicitly.
fn apply_array_init(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    name: &str,
    initialiser: &[crate::ast::types::Word],
    append: bool,
) -> Result<(), ExpansionError> {
    let is_assoc = state
        .get_var(name)
        .is_some_and(|v| v.attrs.contains(VarAttrs::ASSOC_ARRAY));

    if is_assoc {
        let mut map = match state.get_var(name).map(|v| v.value.clone()) {
            Some(VarValue::Assoc(map)) if append => map,
            _ => IndexMap::new(),
        };
        for word in initialiser {
            for field in expand_word_fields(state, host, word)? {
                if let Some((key, value)) = split_keyed_element(&field) {
                    map.insert(key.to_string(), value.to_string());
                }
            }
        }
        state.scopes.set(name, VarValue::Assoc(map))?;
        return Ok(());
    }

    let mut map = match state.get_var(name).map(|v| v.value.clone()) {
        Some(VarValue::Indexed(map)) if append => map,
        _ => BTreeMap::new(),
    };
    let mut next = map.keys().next_back().map(|k| k + 1).unwrap_or(0);
    for word in initialiser {
        for field in expand_word_fields(state, host, word)? {
            if let Some((key, value)) = split_keyed_element(&field) {
                if let Ok(idx) = key.parse::<i64>() {
                    map.insert(idx, value.to_string());
                    next = idx + 1;
                    continue;
                }
            }
            map.insert(next, field);
            next += 1;
        }
    }
    state.scopes.set(name, VarValue::Indexed(map))?;
    state
        .scopes
        .modify_attrs(name, VarAttrs::INDEXED_ARRAY, VarAttrs::empty())?;
    Ok(())
}

/// `[key]=value` element form inside an initialiser.
fn split_keyed_element(field: &str) -> Option<(&str, &str)> {
    let rest = field.strip_prefix('[')?;
    let close = rest.find("]=")?;
    Some((&rest[..close], &rest[close + 2..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expansion::NoSubstitution;
    use crate::lexer::Lexer;
    use crate::parser::word_builder::build_word;

    fn assignment(name: &str, value: Option<&str>, append: bool) -> Assignment {
        Assignment {
            name: name.to_string(),
            index: None,
            value: value.map(|v| {
                let out = Lexer::new(v).tokenize().unwrap();
                build_word(&out.tokens[0]).unwrap()
            }),
            append,
            array: None,
        }
    }

    #[test]
    fn scalar_assignment() {
        let mut s = ShellState::new();
        apply_assignment(&mut s, &mut NoSubstitution, &assignment("x", Some("v"), false))
            .unwrap();
        assert_eq!(s.lookup("x").as_deref(), Some("v"));
    }

    #[test]
    fn append_concatenates() {
        let mut s = ShellState::new();
        s.assign("x", "ab").unwrap();
        apply_assignment(&mut s, &mut NoSubstitution, &assignment("x", Some("cd"), true))
            .unwrap();
        assert_eq!(s.lookup("x").as_deref(), Some("abcd"));
    }

    #[test]
    fn integer_attribute_evaluates() {
        let mut s = ShellState::new();
        s.scopes
            .modify_attrs("n", VarAttrs::INTEGER, VarAttrs::empty())
            .unwrap();
        apply_assignment(
            &mut s,
            &mut NoSubstitution,
            &assignment("n", Some("2+3"), false),
        )
        .unwrap();
        assert_eq!(s.lookup("n").as_deref(), Some("5"));
        // += adds for integer variables
        apply_assignment(&mut s, &mut NoSubstitution, &assignment("n", Some("10"), true))
            .unwrap();
        assert_eq!(s.lookup("n").as_deref(), Some("15"));
    }

    #[test]
    fn element_assignment() {
        let mut s = ShellState::new();
        let a = Assignment {
            name: "arr".into(),
            index: Some("3".into()),
            value: Some(crate::ast::types::Word::literal("x")),
            append: false,
            array: None,
        };
        apply_assignment(&mut s, &mut NoSubstitution, &a).unwrap();
        match &s.get_var("arr").unwrap().value {
            VarValue::Indexed(map) => assert_eq!(map.get(&3).map(|s| s.as_str()), Some("x")),
            other => panic!("expected indexed array, got {other:?}"),
        }
    }

    #[test]
    fn array_initialiser_with_keyed_elements() {
        let mut s = ShellState::new();
        let words = vec![
            crate::ast::types::Word::literal("a"),
            crate::ast::types::Word::literal("[5]=f"),
            crate::ast::types::Word::literal("g"),
        ];
        let a = Assignment {
            name: "arr".into(),
            index: None,
            value: None,
            append: false,
            array: Some(words),
        };
        apply_assignment(&mut s, &mut NoSubstitution, &a).unwrap();
        match &s.get_var("arr").unwrap().value {
            VarValue::Indexed(map) => {
                assert_eq!(map.get(&0).map(|s| s.as_str()), Some("a"));
                assert_eq!(map.get(&5).map(|s| s.as_str()), Some("f"));
                assert_eq!(map.get(&6).map(|s| s.as_str()), Some("g"));
            }
            other => panic!("expected indexed array, got {other:?}"),
        }
    }

    #[test]
    fn readonly_assignment_fails() {
        let mut s = ShellState::new();
        s.assign("x", "1").unwrap();
        s.scopes
            .modify_attrs("x", VarAttrs::READONLY, VarAttrs::empty())
            .unwrap();
        let err =
            apply_assignment(&mut s, &mut NoSubstitution, &assignment("x", Some("2"), false));
        assert!(err.is_err());
    }
}
