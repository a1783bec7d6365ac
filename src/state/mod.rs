//! Shell State
//!
//! The process-wide mutable container every subsystem reads and writes:
//! scoped variables, options, positional parameters, the function and trap
//! tables, and execution bookkeeping (last exit code, background pid,
//! foreground process group). The whole state is `Clone`: a subshell fork
//! snapshots it, and changes in the child never propagate back.

pub mod options;
pub mod traps;
pub mod variables;

pub use options::{OptionError, ShellOptions};
pub use traps::TrapTable;
pub use variables::{ScopeStack, VarAttrs, VarError, VarValue, Variable};

use crate::ast::types::FunctionDef;
use rand::Rng;
use std::collections::HashMap;
use std::time::Instant;

pub const DEFAULT_IFS: &str = " \t\n";

/// Positional parameters: `$0` plus `$1..$N`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionalParams {
    pub script_name: String,
    pub params: Vec<String>,
}

impl PositionalParams {
    pub fn get(&self, n: usize) -> Option<&str> {
        if n == 0 {
            Some(&self.script_name)
        } else {
            self.params.get(n - 1).map(|s| s.as_str())
        }
    }

    pub fn count(&self) -> usize {
        self.params.len()
    }

    /// `shift [n]`; fails when n exceeds the parameter count.
    pub fn shift(&mut self, n: usize) -> Result<(), ()> {
        if n > self.params.len() {
            return Err(());
        }
        self.params.drain(..n);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ShellState {
    pub scopes: ScopeStack,
    pub options: ShellOptions,
    pub positional: PositionalParams,
    pub functions: HashMap<String, FunctionDef>,
    pub aliases: HashMap<String, String>,
    pub traps: TrapTable,

    pub last_exit_code: i32,
    pub last_background_pid: Option<i32>,
    pub foreground_pgid: Option<i32>,
    pub in_forked_child: bool,
    pub interactive: bool,

    pub shell_pid: i32,
    /// Current source line, backing `$LINENO`
    pub current_line: usize,
    start_time: Instant,
}

impl ShellState {
    pub fn new() -> Self {
        ShellState {
            scopes: ScopeStack::new(),
            options: ShellOptions::default(),
            positional: PositionalParams::default(),
            functions: HashMap::new(),
            aliases: HashMap::new(),
            traps: TrapTable::new(),
            last_exit_code: 0,
            last_background_pid: None,
            foreground_pgid: None,
            in_forked_child: false,
            interactive: false,
            shell_pid: std::process::id() as i32,
            current_line: 0,
            start_time: Instant::now(),
        }
    }

    /// A state seeded from the process environment; imported variables are
    /// marked exported so they flow on to children.
    pub fn from_env() -> Self {
        let mut state = Self::new();
        for (name, value) in std::env::vars() {
            let mut var = Variable::scalar(value);
            var.attrs.insert(VarAttrs::EXPORTED);
            let _ = state.scopes.set_local(&name, var);
        }
        state
    }

    // --- variable access ---

    /// Look up a variable by name, following nameref chains.
    pub fn get_var(&self, name: &str) -> Option<&Variable> {
        let mut current = name;
        for _ in 0..10 {
            let var = self.scopes.get(current)?;
            if var.attrs.contains(VarAttrs::NAMEREF) {
                match &var.value {
                    VarValue::Scalar(target) if !target.is_empty() => current = target,
                    _ => return Some(var),
                }
            } else {
                return Some(var);
            }
        }
        None
    }

    /// The string a `$name` reference expands to, covering special
    /// parameters, positionals and ordinary variables.
    pub fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "?" => Some(self.last_exit_code.to_string()),
            "$" => Some(self.shell_pid.to_string()),
            "!" => self.last_background_pid.map(|p| p.to_string()),
            "#" => Some(self.positional.count().to_string()),
            "-" => Some(self.options.flag_string(self.interactive)),
            "0" => Some(self.positional.script_name.clone()),
            "RANDOM" => Some(rand::thread_rng().gen_range(0..32768).to_string()),
            "LINENO" => Some(self.current_line.to_string()),
            "SECONDS" => Some(self.start_time.elapsed().as_secs().to_string()),
            _ => {
                if let Ok(n) = name.parse::<usize>() {
                    return self.positional.get(n).map(|s| s.to_string());
                }
                self.get_var(name).map(|v| v.as_string())
            }
        }
    }

    /// Resolve a nameref chain to the final variable name.
    pub fn resolve_name(&self, name: &str) -> String {
        let mut current = name.to_string();
        for _ in 0..10 {
            match self.scopes.get(&current) {
                Some(var) if var.attrs.contains(VarAttrs::NAMEREF) => match &var.value {
                    VarValue::Scalar(target) if !target.is_empty() => current = target.clone(),
                    _ => break,
                },
                _ => break,
            }
        }
        current
    }

    /// Scalar assignment honouring namerefs and `allexport`.
    pub fn assign(&mut self, name: &str, value: impl Into<String>) -> Result<(), VarError> {
        let target = self.resolve_name(name);
        self.scopes.set(&target, VarValue::scalar(value))?;
        if self.options.allexport {
            self.scopes
                .modify_attrs(&target, VarAttrs::EXPORTED, VarAttrs::empty())?;
        }
        Ok(())
    }

    pub fn ifs(&self) -> String {
        match self.scopes.get("IFS") {
            Some(var) => var.as_string(),
            None => DEFAULT_IFS.to_string(),
        }
    }

    pub fn ifs_is_set(&self) -> bool {
        self.scopes.get("IFS").is_some()
    }

    /// Exported variables as an environment block for `exec`.
    pub fn environment(&self) -> Vec<(String, String)> {
        self.scopes
            .visible()
            .into_iter()
            .filter(|(_, var)| var.is_exported())
            .map(|(name, var)| (name.to_string(), var.as_string()))
            .collect()
    }

    /// Record a command's exit code (invariant: `$?` always equals the last
    /// command's code).
    pub fn set_exit_code(&mut self, code: i32) {
        self.last_exit_code = code;
    }

    /// Snapshot for a forked child. The copy is deep; the child may mutate
    /// it freely without affecting the parent.
    pub fn snapshot_for_subshell(&self) -> Self {
        let mut child = self.clone();
        child.in_forked_child = true;
        child
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_parameters() {
        let mut state = ShellState::new();
        state.set_exit_code(42);
        assert_eq!(state.lookup("?").as_deref(), Some("42"));
        assert_eq!(state.lookup("#").as_deref(), Some("0"));
        assert_eq!(state.lookup("$").unwrap(), state.shell_pid.to_string());
        assert_eq!(state.lookup("!"), None);
    }

    #[test]
    fn positionals() {
        let mut state = ShellState::new();
        state.positional.script_name = "script.sh".into();
        state.positional.params = vec!["a".into(), "b c".into()];
        assert_eq!(state.lookup("0").as_deref(), Some("script.sh"));
        assert_eq!(state.lookup("1").as_deref(), Some("a"));
        assert_eq!(state.lookup("2").as_deref(), Some("b c"));
        assert_eq!(state.lookup("3"), None);
        assert_eq!(state.lookup("#").as_deref(), Some("2"));
    }

    #[test]
    fn shift_bounds() {
        let mut p = PositionalParams {
            script_name: "s".into(),
            params: vec!["a".into(), "b".into()],
        };
        assert!(p.shift(1).is_ok());
        assert_eq!(p.params, vec!["b"]);
        assert!(p.shift(2).is_err());
    }

    #[test]
    fn ifs_defaults() {
        let mut state = ShellState::new();
        assert_eq!(state.ifs(), " \t\n");
        assert!(!state.ifs_is_set());
        state.assign("IFS", ":").unwrap();
        assert_eq!(state.ifs(), ":");
    }

    #[test]
    fn subshell_snapshot_is_isolated() {
        let mut parent = ShellState::new();
        parent.assign("x", "1").unwrap();
        let mut child = parent.snapshot_for_subshell();
        child.assign("x", "2").unwrap();
        assert!(child.in_forked_child);
        assert_eq!(parent.lookup("x").as_deref(), Some("1"));
        assert_eq!(child.lookup("x").as_deref(), Some("2"));
    }

    #[test]
    fn nameref_resolution() {
        let mut state = ShellState::new();
        state.assign("real", "value").unwrap();
        state
            .scopes
            .set("ref", VarValue::scalar("real"))
            .unwrap();
        state
            .scopes
            .modify_attrs("ref", VarAttrs::NAMEREF, VarAttrs::empty())
            .unwrap();
        assert_eq!(state.lookup("ref").as_deref(), Some("value"));
        state.assign("ref", "updated").unwrap();
        assert_eq!(state.lookup("real").as_deref(), Some("updated"));
    }

    #[test]
    fn allexport_marks_new_variables() {
        let mut state = ShellState::new();
        state.options.allexport = true;
        state.assign("NEWVAR", "v").unwrap();
        let env = state.environment();
        assert!(env.iter().any(|(n, v)| n == "NEWVAR" && v == "v"));
    }

    #[test]
    fn random_is_in_range() {
        let state = ShellState::new();
        let n: i32 = state.lookup("RANDOM").unwrap().parse().unwrap();
        assert!((0..32768).contains(&n));
    }
}
