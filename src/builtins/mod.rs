//! Builtin Commands
//!
//! Dispatch contract: the executor consults the special-builtin set first
//! (assignment prefixes persist across those), then the regular registry.
//! Builtins write through the current descriptors, so applied redirections
//! affect their output.

pub mod misc;
pub mod navigation;
pub mod output;
pub mod read_cmd;
pub mod special;
pub mod test_cmd;
pub mod variables;

use crate::executor::context::ExecContext;
use crate::executor::engine::Executor;
use crate::executor::errors::ExecResult;
use crate::state::ShellState;
use std::collections::HashMap;

pub type BuiltinFn =
    fn(&mut Executor, &mut ShellState, &ExecContext, &[String]) -> ExecResult;

/// The closed POSIX special-builtin set. These take precedence over
/// functions in lookup order and their assignment prefixes persist.
pub const SPECIAL_BUILTINS: &[&str] = &[
    ":", "break", "continue", "eval", "exec", "exit", "export", "readonly", "return", "set",
    "shift", "trap", "unset",
];

pub fn is_special_builtin(name: &str) -> bool {
    SPECIAL_BUILTINS.contains(&name)
}

lazy_static::lazy_static! {
    static ref SPECIAL: HashMap<&'static str, BuiltinFn> = {
        let mut m: HashMap<&'static str, BuiltinFn> = HashMap::new();
        m.insert(":", special::colon as BuiltinFn);
        m.insert("eval", special::eval);
        m.insert("exec", special::exec);
        m.insert("exit", special::exit);
        m.insert("export", special::export);
        m.insert("readonly", special::readonly);
        m.insert("return", special::return_);
        m.insert("set", special::set);
        m.insert("shift", special::shift);
        m.insert("trap", special::trap);
        m.insert("unset", special::unset);
        // break/continue parse as control structures; the names stay in the
        // special set for classification only
        m
    };

    static ref REGULAR: HashMap<&'static str, BuiltinFn> = {
        let mut m: HashMap<&'static str, BuiltinFn> = HashMap::new();
        m.insert("cd", navigation::cd as BuiltinFn);
        m.insert("pwd", navigation::pwd);
        m.insert("echo", output::echo);
        m.insert("true", output::true_);
        m.insert("false", output::false_);
        m.insert("read", read_cmd::read);
        m.insert("test", test_cmd::test);
        m.insert("[", test_cmd::bracket);
        m.insert("local", variables::local);
        m.insert("source", misc::source);
        m.insert(".", misc::source);
        m.insert("wait", misc::wait);
        m.insert("alias", misc::alias);
        m.insert("unalias", misc::unalias);
        m.insert("command", misc::command);
        m
    };
}

pub fn lookup_special(name: &str) -> Option<BuiltinFn> {
    SPECIAL.get(name).copied()
}

pub fn lookup_regular(name: &str) -> Option<BuiltinFn> {
    REGULAR.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_set_is_closed() {
        assert!(is_special_builtin(":"));
        assert!(is_special_builtin("exec"));
        assert!(is_special_builtin("trap"));
        assert!(!is_special_builtin("cd"));
        assert!(!is_special_builtin("echo"));
    }

    #[test]
    fn lookup_partitions() {
        assert!(lookup_special("exit").is_some());
        assert!(lookup_special("cd").is_none());
        assert!(lookup_regular("cd").is_some());
        assert!(lookup_regular("exit").is_none());
    }
}
