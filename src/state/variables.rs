//! Variables and Scopes
//!
//! A variable is a value (scalar, sparse indexed array, or insertion-ordered
//! associative array) plus an attribute bit-set. Scopes stack: global at the
//! bottom, one frame per function call. Lookup walks innermost-out and stops
//! at a tombstone (a variable unset in an inner scope masks the outer one).
//! Plain assignment updates the variable in its original scope, or creates
//! it in the global scope; `local` creates it in the current frame.

use bitflags::bitflags;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VarAttrs: u16 {
        const READONLY      = 1 << 0;
        const EXPORTED      = 1 << 1;
        const INTEGER       = 1 << 2;
        const LOWERCASE     = 1 << 3;
        const UPPERCASE     = 1 << 4;
        const INDEXED_ARRAY = 1 << 5;
        const ASSOC_ARRAY   = 1 << 6;
        const NAMEREF       = 1 << 7;
        const TRACE         = 1 << 8;
        /// Unset marker masking a same-named variable in an outer scope
        const TOMBSTONE     = 1 << 9;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    Scalar(String),
    /// Sparse int-indexed array
    Indexed(BTreeMap<i64, String>),
    /// String-keyed array preserving insertion order
    Assoc(IndexMap<String, String>),
}

impl VarValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        VarValue::Scalar(value.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub value: VarValue,
    pub attrs: VarAttrs,
}

impl Variable {
    pub fn scalar(value: impl Into<String>) -> Self {
        Variable {
            value: VarValue::scalar(value),
            attrs: VarAttrs::empty(),
        }
    }

    pub fn tombstone() -> Self {
        Variable {
            value: VarValue::Scalar(String::new()),
            attrs: VarAttrs::TOMBSTONE,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.attrs.contains(VarAttrs::TOMBSTONE)
    }

    pub fn is_readonly(&self) -> bool {
        self.attrs.contains(VarAttrs::READONLY)
    }

    pub fn is_exported(&self) -> bool {
        self.attrs.contains(VarAttrs::EXPORTED)
    }

    /// The value `$name` expands to: the scalar itself, or element zero
    /// (first element for associative arrays).
    pub fn as_string(&self) -> String {
        match &self.value {
            VarValue::Scalar(s) => s.clone(),
            VarValue::Indexed(map) => map.get(&0).cloned().unwrap_or_default(),
            VarValue::Assoc(map) => map.values().next().cloned().unwrap_or_default(),
        }
    }

    /// Apply the case-folding attributes to a new scalar value.
    pub fn fold_case(&self, value: String) -> String {
        if self.attrs.contains(VarAttrs::LOWERCASE) {
            value.to_lowercase()
        } else if self.attrs.contains(VarAttrs::UPPERCASE) {
            value.to_uppercase()
        } else {
            value
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum VarError {
    #[error("psh: {0}: readonly variable")]
    Readonly(String),
    #[error("psh: {0}: nameref loop")]
    NamerefLoop(String),
}

type Scope = HashMap<String, Variable>;

/// The scope stack. Global scope is index 0 and is never popped.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack {
            scopes: vec![Scope::new()],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Innermost-out lookup; a tombstone hides outer definitions.
    pub fn get(&self, name: &str) -> Option<&Variable> {
        for scope in self.scopes.iter().rev() {
            if let Some(var) = scope.get(name) {
                if var.is_tombstone() {
                    return None;
                }
                return Some(var);
            }
        }
        None
    }

    fn owning_scope_index(&self, name: &str) -> Option<usize> {
        for (idx, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(name) {
                return Some(idx);
            }
        }
        None
    }

    /// Assign without `local`: update the variable where it lives (a
    /// tombstoned slot is re-used in place), otherwise create it globally.
    pub fn set(&mut self, name: &str, value: VarValue) -> Result<(), VarError> {
        let idx = self.owning_scope_index(name).unwrap_or(0);
        let scope = &mut self.scopes[idx];
        match scope.get_mut(name) {
            Some(var) if var.is_readonly() => Err(VarError::Readonly(name.to_string())),
            Some(var) => {
                var.attrs.remove(VarAttrs::TOMBSTONE);
                if let VarValue::Scalar(s) = value {
                    let folded = var.fold_case(s);
                    var.value = VarValue::Scalar(folded);
                } else {
                    var.value = value;
                }
                Ok(())
            }
            None => {
                scope.insert(
                    name.to_string(),
                    Variable {
                        value,
                        attrs: VarAttrs::empty(),
                    },
                );
                Ok(())
            }
        }
    }

    /// `local` assignment into the current frame.
    pub fn set_local(&mut self, name: &str, variable: Variable) -> Result<(), VarError> {
        let scope = self.scopes.last_mut().expect("global scope always exists");
        if let Some(existing) = scope.get(name) {
            if existing.is_readonly() && !variable.is_tombstone() {
                return Err(VarError::Readonly(name.to_string()));
            }
        }
        scope.insert(name.to_string(), variable);
        Ok(())
    }

    /// Mutate attributes wherever the variable lives (creating it globally
    /// when absent, as `export X` and `readonly X` do).
    pub fn modify_attrs(
        &mut self,
        name: &str,
        add: VarAttrs,
        remove: VarAttrs,
    ) -> Result<(), VarError> {
        let idx = self.owning_scope_index(name).unwrap_or(0);
        let scope = &mut self.scopes[idx];
        match scope.get_mut(name) {
            Some(var) => {
                if var.is_readonly() && remove.contains(VarAttrs::READONLY) {
                    return Err(VarError::Readonly(name.to_string()));
                }
                var.attrs.insert(add);
                var.attrs.remove(remove);
                Ok(())
            }
            None => {
                let mut var = Variable::scalar("");
                var.attrs = add;
                // An attribute-only declaration leaves the variable unset
                var.attrs.insert(VarAttrs::TOMBSTONE);
                scope.insert(name.to_string(), var);
                Ok(())
            }
        }
    }

    /// Put back a previously captured variable state (temporary-assignment
    /// restore). `None` removes the variable from its owning scope.
    pub fn replace(&mut self, name: &str, var: Option<Variable>) {
        let idx = self.owning_scope_index(name).unwrap_or(0);
        match var {
            Some(v) => {
                self.scopes[idx].insert(name.to_string(), v);
            }
            None => {
                self.scopes[idx].remove(name);
            }
        }
    }

    /// Unset a variable. In an inner scope this leaves a tombstone masking
    /// any outer definition; at global scope the variable is removed.
    pub fn unset(&mut self, name: &str) -> Result<(), VarError> {
        if let Some(var) = self.get(name) {
            if var.is_readonly() {
                return Err(VarError::Readonly(name.to_string()));
            }
        }
        if self.scopes.len() > 1 {
            let top = self.scopes.last_mut().expect("scope stack is non-empty");
            top.insert(name.to_string(), Variable::tombstone());
        } else {
            self.scopes[0].remove(name);
        }
        Ok(())
    }

    /// All visible (name, variable) pairs, innermost definition winning.
    pub fn visible(&self) -> HashMap<&str, &Variable> {
        let mut seen: HashMap<&str, &Variable> = HashMap::new();
        for scope in self.scopes.iter().rev() {
            for (name, var) in scope {
                seen.entry(name.as_str()).or_insert(var);
            }
        }
        seen.retain(|_, v| !v.is_tombstone());
        seen
    }

    /// Names with the given prefix, sorted (for `${!prefix*}`).
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .visible()
            .keys()
            .filter(|n| n.starts_with(prefix))
            .map(|n| n.to_string())
            .collect();
        names.sort();
        names
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_set_and_get() {
        let mut s = ScopeStack::new();
        s.set("x", VarValue::scalar("1")).unwrap();
        assert_eq!(s.get("x").unwrap().as_string(), "1");
    }

    #[test]
    fn function_scope_masks_and_restores() {
        let mut s = ScopeStack::new();
        s.set("x", VarValue::scalar("outer")).unwrap();
        s.push_scope();
        s.set_local("x", Variable::scalar("inner")).unwrap();
        assert_eq!(s.get("x").unwrap().as_string(), "inner");
        s.pop_scope();
        assert_eq!(s.get("x").unwrap().as_string(), "outer");
    }

    #[test]
    fn plain_assignment_updates_original_scope() {
        let mut s = ScopeStack::new();
        s.set("x", VarValue::scalar("1")).unwrap();
        s.push_scope();
        s.set("x", VarValue::scalar("2")).unwrap();
        s.pop_scope();
        assert_eq!(s.get("x").unwrap().as_string(), "2");
    }

    #[test]
    fn assignment_without_local_creates_global() {
        let mut s = ScopeStack::new();
        s.push_scope();
        s.set("fresh", VarValue::scalar("v")).unwrap();
        s.pop_scope();
        assert_eq!(s.get("fresh").unwrap().as_string(), "v");
    }

    #[test]
    fn tombstone_masks_outer() {
        let mut s = ScopeStack::new();
        s.set("x", VarValue::scalar("outer")).unwrap();
        s.push_scope();
        s.unset("x").unwrap();
        assert!(s.get("x").is_none());
        s.pop_scope();
        assert_eq!(s.get("x").unwrap().as_string(), "outer");
    }

    #[test]
    fn global_unset_removes() {
        let mut s = ScopeStack::new();
        s.set("x", VarValue::scalar("1")).unwrap();
        s.unset("x").unwrap();
        assert!(s.get("x").is_none());
    }

    #[test]
    fn readonly_rejected() {
        let mut s = ScopeStack::new();
        s.set("x", VarValue::scalar("1")).unwrap();
        s.modify_attrs("x", VarAttrs::READONLY, VarAttrs::empty()).unwrap();
        assert_eq!(
            s.set("x", VarValue::scalar("2")),
            Err(VarError::Readonly("x".into()))
        );
    }

    #[test]
    fn case_folding_attribute() {
        let mut s = ScopeStack::new();
        s.set("x", VarValue::scalar("seed")).unwrap();
        s.modify_attrs("x", VarAttrs::UPPERCASE, VarAttrs::empty()).unwrap();
        s.set("x", VarValue::scalar("loud")).unwrap();
        assert_eq!(s.get("x").unwrap().as_string(), "LOUD");
    }

    #[test]
    fn indexed_array_element_zero() {
        let mut map = BTreeMap::new();
        map.insert(0, "a".to_string());
        map.insert(5, "b".to_string());
        let var = Variable {
            value: VarValue::Indexed(map),
            attrs: VarAttrs::INDEXED_ARRAY,
        };
        assert_eq!(var.as_string(), "a");
    }

    #[test]
    fn prefix_listing() {
        let mut s = ScopeStack::new();
        s.set("PS1", VarValue::scalar("$")).unwrap();
        s.set("PS2", VarValue::scalar(">")).unwrap();
        s.set("PATH", VarValue::scalar("/bin")).unwrap();
        assert_eq!(s.names_with_prefix("PS"), vec!["PS1", "PS2"]);
    }
}
