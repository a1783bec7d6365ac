//! Execution Context
//!
//! An immutable record passed down the execution call chain. Scope changes
//! never mutate a context in place; the factory methods derive a new record,
//! so state cannot leak across nested scopes.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecContext {
    pub in_pipeline: bool,
    pub in_subshell: bool,
    pub in_forked_child: bool,
    pub loop_depth: u32,
    /// Condition slot of if/while/until or a `!`-negated pipeline:
    /// errexit does not fire here
    pub in_condition: bool,
    pub current_function: Option<String>,
    pub background_job: bool,
    /// Set by the `command` builtin: skip function lookup
    pub suppress_function_lookup: bool,
    /// `exec cmd`: replace the shell instead of forking
    pub exec_mode: bool,
}

impl ExecContext {
    pub fn new() -> Self {
        ExecContext::default()
    }

    pub fn enter_loop(&self) -> Self {
        ExecContext {
            loop_depth: self.loop_depth + 1,
            ..self.clone()
        }
    }

    pub fn enter_function(&self, name: &str) -> Self {
        ExecContext {
            current_function: Some(name.to_string()),
            ..self.clone()
        }
    }

    pub fn enter_pipeline(&self) -> Self {
        ExecContext {
            in_pipeline: true,
            ..self.clone()
        }
    }

    pub fn enter_condition(&self) -> Self {
        ExecContext {
            in_condition: true,
            ..self.clone()
        }
    }

    pub fn fork_to_subshell(&self) -> Self {
        ExecContext {
            in_subshell: true,
            in_forked_child: true,
            // loop control does not cross the process boundary
            loop_depth: 0,
            ..self.clone()
        }
    }

    pub fn background(&self) -> Self {
        ExecContext {
            background_job: true,
            ..self.clone()
        }
    }

    pub fn without_functions(&self) -> Self {
        ExecContext {
            suppress_function_lookup: true,
            ..self.clone()
        }
    }

    pub fn in_function(&self) -> bool {
        self.current_function.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_does_not_mutate_parent() {
        let base = ExecContext::new();
        let looped = base.enter_loop();
        assert_eq!(base.loop_depth, 0);
        assert_eq!(looped.loop_depth, 1);

        let cond = looped.enter_condition();
        assert!(cond.in_condition);
        assert!(!looped.in_condition);
    }

    #[test]
    fn subshell_resets_loop_depth() {
        let ctx = ExecContext::new().enter_loop().enter_loop();
        let sub = ctx.fork_to_subshell();
        assert_eq!(sub.loop_depth, 0);
        assert!(sub.in_subshell);
        assert!(sub.in_forked_child);
    }

    #[test]
    fn function_context_carries_name() {
        let ctx = ExecContext::new().enter_function("greet");
        assert!(ctx.in_function());
        assert_eq!(ctx.current_function.as_deref(), Some("greet"));
    }
}
