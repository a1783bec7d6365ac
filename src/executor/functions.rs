//! Function Calls
//!
//! Calling a function pushes a variable scope, swaps the positional
//! parameters for the arguments, runs the body, and catches the
//! `FunctionReturn` signal. Positional parameters and the scope stack are
//! restored on every exit path, so the scope stack after a call always
//! equals its pre-call state.

use crate::executor::context::ExecContext;
use crate::executor::engine::Executor;
use crate::executor::errors::{ExecError, ExecResult};
use crate::state::ShellState;

pub fn run_function(
    executor: &mut Executor,
    state: &mut ShellState,
    name: &str,
    args: &[String],
    ctx: &ExecContext,
) -> ExecResult {
    let Some(def) = state.functions.get(name).cloned() else {
        return Err(ExecError::Builtin(format!("{name}: not a function")));
    };

    let fctx = ctx.enter_function(name);
    state.scopes.push_scope();
    let saved_params = std::mem::replace(&mut state.positional.params, args.to_vec());

    let result = executor.run_command(state, &def.body, &fctx);

    // Restore before interpreting the result so every path unwinds the same
    state.positional.params = saved_params;
    state.scopes.pop_scope();

    match result {
        Err(ExecError::FunctionReturn(code)) => Ok(code),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use crate::executor::context::ExecContext;
    use crate::executor::engine::Executor;
    use crate::parser::Parser;
    use crate::state::ShellState;

    fn run(src: &str, state: &mut ShellState) -> i32 {
        let program = Parser::new().parse(src).unwrap();
        Executor::new()
            .run_program(state, &program, &ExecContext::new())
            .unwrap()
    }

    #[test]
    fn arguments_bind_as_positionals() {
        let mut s = ShellState::new();
        run("f() { captured=$1:$2; }; f one two", &mut s);
        assert_eq!(s.lookup("captured").as_deref(), Some("one:two"));
    }

    #[test]
    fn positionals_restored_after_call() {
        let mut s = ShellState::new();
        s.positional.params = vec!["outer".into()];
        run("f() { inner=$1; }; f replaced", &mut s);
        assert_eq!(s.lookup("inner").as_deref(), Some("replaced"));
        assert_eq!(s.positional.params, vec!["outer".to_string()]);
    }

    #[test]
    fn return_sets_exit_code() {
        let mut s = ShellState::new();
        let code = run("f() { return 5; }; f", &mut s);
        assert_eq!(code, 5);
    }

    #[test]
    fn return_stops_body() {
        let mut s = ShellState::new();
        run("f() { x=before; return; x=after; }; f", &mut s);
        assert_eq!(s.lookup("x").as_deref(), Some("before"));
    }

    #[test]
    fn scope_stack_restored_on_every_path() {
        let mut s = ShellState::new();
        let depth_before = s.scopes.depth();
        run("f() { local v=1; return 3; }; f", &mut s);
        assert_eq!(s.scopes.depth(), depth_before);
        assert!(s.lookup("v").is_none());
    }

    #[test]
    fn dynamic_scoping_inner_sees_callers_local() {
        let mut s = ShellState::new();
        run(
            "g() { seen=$x; }; f() { local x=1; g; }; x=0; f",
            &mut s,
        );
        assert_eq!(s.lookup("seen").as_deref(), Some("1"));
        // the global x is untouched
        assert_eq!(s.lookup("x").as_deref(), Some("0"));
    }

    #[test]
    fn function_updates_global_without_local() {
        let mut s = ShellState::new();
        run("f() { x=changed; }; x=orig; f", &mut s);
        assert_eq!(s.lookup("x").as_deref(), Some("changed"));
    }

    #[test]
    fn recursive_function_with_base_case() {
        let mut s = ShellState::new();
        run(
            "count() { if [ $1 = 0 ]; then return; fi; acc=$acc$1; count $(($1 - 1)); }; acc=''; count 3",
            &mut s,
        );
        assert_eq!(s.lookup("acc").as_deref(), Some("321"));
    }
}
