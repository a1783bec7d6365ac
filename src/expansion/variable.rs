//! Variable Resolution
//!
//! Resolves `$name`, `${name}` and array references to their values,
//! including the `$@` / `$*` / `${arr[@]}` multi-field forms whose quoting
//! behaviour differs from every other expansion.

use crate::arithmetic;
use crate::expansion::ExpansionError;
use crate::state::{ShellState, VarValue};

/// A resolved variable reference before splitting.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Unset,
    Single(String),
    /// One entry per field, preserving boundaries (quoted `"$@"` rules)
    Fields(Vec<String>),
}

impl Resolved {
    pub fn into_single(self, join: &str) -> Option<String> {
        match self {
            Resolved::Unset => None,
            Resolved::Single(s) => Some(s),
            Resolved::Fields(fs) => Some(fs.join(join)),
        }
    }
}

/// The join character `"$*"` uses: first char of IFS, space when IFS is
/// unset, empty when IFS is empty.
pub fn star_join(state: &ShellState) -> String {
    if !state.ifs_is_set() {
        return " ".to_string();
    }
    match state.ifs().chars().next() {
        Some(c) => c.to_string(),
        None => String::new(),
    }
}

/// Resolve a variable reference. `quoted` selects between the `"$@"` field
/// semantics and the joined forms.
pub fn resolve_variable(
    state: &mut ShellState,
    name: &str,
    index: Option<&str>,
    quoted: bool,
) -> Result<Resolved, ExpansionError> {
    if let Some(index) = index {
        return resolve_array_element(state, name, index, quoted);
    }
    match name {
        "@" => {
            let params = state.positional.params.clone();
            if quoted {
                Ok(Resolved::Fields(params))
            } else {
                Ok(Resolved::Single(params.join(" ")))
            }
        }
        "*" => {
            let join = if quoted {
                star_join(state)
            } else {
                " ".to_string()
            };
            Ok(Resolved::Single(state.positional.params.join(&join)))
        }
        _ => match state.lookup(name) {
            Some(value) => Ok(Resolved::Single(value)),
            None => Ok(Resolved::Unset),
        },
    }
}

/// `${arr[i]}`, `${arr[@]}`, `${arr[*]}`; scalars act as one-element arrays.
fn resolve_array_element(
    state: &mut ShellState,
    name: &str,
    index: &str,
    quoted: bool,
) -> Result<Resolved, ExpansionError> {
    let resolved_name = state.resolve_name(name);
    let value = match state.get_var(&resolved_name) {
        Some(var) => var.value.clone(),
        None => return Ok(Resolved::Unset),
    };

    match index {
        "@" => {
            let items = array_values(&value);
            if quoted {
                Ok(Resolved::Fields(items))
            } else {
                Ok(Resolved::Single(items.join(" ")))
            }
        }
        "*" => {
            let join = if quoted {
                star_join(state)
            } else {
                " ".to_string()
            };
            Ok(Resolved::Single(array_values(&value).join(&join)))
        }
        _ => match &value {
            VarValue::Indexed(map) => {
                let idx = arithmetic::eval(index, state)?;
                let idx = if idx < 0 {
                    // Negative subscripts count back from the highest index
                    match map.keys().next_back() {
                        Some(max) => max + 1 + idx,
                        None => idx,
                    }
                } else {
                    idx
                };
                match map.get(&idx) {
                    Some(v) => Ok(Resolved::Single(v.clone())),
                    None => Ok(Resolved::Unset),
                }
            }
            VarValue::Assoc(map) => {
                let key = strip_key_quotes(index);
                match map.get(key) {
                    Some(v) => Ok(Resolved::Single(v.clone())),
                    None => Ok(Resolved::Unset),
                }
            }
            VarValue::Scalar(s) => {
                let idx = arithmetic::eval(index, state)?;
                if idx == 0 {
                    Ok(Resolved::Single(s.clone()))
                } else {
                    Ok(Resolved::Unset)
                }
            }
        },
    }
}

pub fn array_values(value: &VarValue) -> Vec<String> {
    match value {
        VarValue::Scalar(s) => vec![s.clone()],
        VarValue::Indexed(map) => map.values().cloned().collect(),
        VarValue::Assoc(map) => map.values().cloned().collect(),
    }
}

pub fn array_len(value: &VarValue) -> usize {
    match value {
        VarValue::Scalar(_) => 1,
        VarValue::Indexed(map) => map.len(),
        VarValue::Assoc(map) => map.len(),
    }
}

fn strip_key_quotes(key: &str) -> &str {
    let k = key.strip_prefix('\'').and_then(|k| k.strip_suffix('\''));
    if let Some(k) = k {
        return k;
    }
    let k = key.strip_prefix('"').and_then(|k| k.strip_suffix('"'));
    k.unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::collections::BTreeMap;

    fn state_with_params(params: &[&str]) -> ShellState {
        let mut s = ShellState::new();
        s.positional.params = params.iter().map(|p| p.to_string()).collect();
        s
    }

    #[test]
    fn quoted_at_preserves_fields() {
        let mut s = state_with_params(&["a", "b c", "d"]);
        let r = resolve_variable(&mut s, "@", None, true).unwrap();
        assert_eq!(
            r,
            Resolved::Fields(vec!["a".into(), "b c".into(), "d".into()])
        );
    }

    #[test]
    fn quoted_star_joins_with_ifs_head() {
        let mut s = state_with_params(&["a", "b"]);
        s.assign("IFS", ":x").unwrap();
        let r = resolve_variable(&mut s, "*", None, true).unwrap();
        assert_eq!(r, Resolved::Single("a:b".into()));
    }

    #[test]
    fn star_with_unset_ifs_joins_with_space() {
        let mut s = state_with_params(&["a", "b"]);
        let r = resolve_variable(&mut s, "*", None, true).unwrap();
        assert_eq!(r, Resolved::Single("a b".into()));
    }

    #[test]
    fn indexed_array_access() {
        let mut s = ShellState::new();
        let mut map = BTreeMap::new();
        map.insert(0, "zero".to_string());
        map.insert(2, "two".to_string());
        s.scopes.set("arr", VarValue::Indexed(map)).unwrap();

        let r = resolve_variable(&mut s, "arr", Some("2"), false).unwrap();
        assert_eq!(r, Resolved::Single("two".into()));
        let r = resolve_variable(&mut s, "arr", Some("1"), false).unwrap();
        assert_eq!(r, Resolved::Unset);
        // arithmetic in the subscript
        let r = resolve_variable(&mut s, "arr", Some("1+1"), false).unwrap();
        assert_eq!(r, Resolved::Single("two".into()));
        // negative index counts from the end
        let r = resolve_variable(&mut s, "arr", Some("-1"), false).unwrap();
        assert_eq!(r, Resolved::Single("two".into()));
    }

    #[test]
    fn array_at_subscript() {
        let mut s = ShellState::new();
        let mut map = BTreeMap::new();
        map.insert(0, "x".to_string());
        map.insert(1, "y z".to_string());
        s.scopes.set("arr", VarValue::Indexed(map)).unwrap();
        let r = resolve_variable(&mut s, "arr", Some("@"), true).unwrap();
        assert_eq!(r, Resolved::Fields(vec!["x".into(), "y z".into()]));
    }

    #[test]
    fn assoc_array_keys() {
        let mut s = ShellState::new();
        let mut map = IndexMap::new();
        map.insert("k1".to_string(), "v1".to_string());
        s.scopes.set("h", VarValue::Assoc(map)).unwrap();
        let r = resolve_variable(&mut s, "h", Some("k1"), false).unwrap();
        assert_eq!(r, Resolved::Single("v1".into()));
        let r = resolve_variable(&mut s, "h", Some("'k1'"), false).unwrap();
        assert_eq!(r, Resolved::Single("v1".into()));
    }

    #[test]
    fn scalar_with_zero_subscript() {
        let mut s = ShellState::new();
        s.assign("x", "v").unwrap();
        let r = resolve_variable(&mut s, "x", Some("0"), false).unwrap();
        assert_eq!(r, Resolved::Single("v".into()));
    }
}
