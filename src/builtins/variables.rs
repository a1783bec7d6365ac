//! Variable Builtins: `local`

use crate::executor::context::ExecContext;
use crate::executor::engine::Executor;
use crate::executor::errors::ExecResult;
use crate::io::fd;
use crate::state::{ShellState, Variable};

/// `local name[=value]...` — declares variables in the current function
/// scope. Outside a function it is an error.
pub fn local(
    _executor: &mut Executor,
    state: &mut ShellState,
    ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    if !ctx.in_function() {
        let _ = fd::write_all(2, b"psh: local: can only be used in a function\n");
        return Ok(1);
    }
    for arg in args {
        let (name, value) = match arg.split_once('=') {
            Some((name, value)) => (name, value.to_string()),
            None => (arg.as_str(), String::new()),
        };
        if !is_identifier(name) {
            let _ = fd::write_all(
                2,
                format!("psh: local: `{name}': not a valid identifier\n").as_bytes(),
            );
            return Ok(1);
        }
        if let Err(err) = state.scopes.set_local(name, Variable::scalar(value)) {
            let _ = fd::write_all(2, format!("{err}\n").as_bytes());
            return Ok(1);
        }
    }
    Ok(0)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecContext;
    use crate::parser::Parser;

    fn run(src: &str, state: &mut ShellState) -> i32 {
        let program = Parser::new().parse(src).unwrap();
        Executor::new()
            .run_program(state, &program, &ExecContext::new())
            .unwrap()
    }

    #[test]
    fn local_shadows_and_restores() {
        let mut s = ShellState::new();
        run("x=global; f() { local x=local; inner=$x; }; f", &mut s);
        assert_eq!(s.lookup("inner").as_deref(), Some("local"));
        assert_eq!(s.lookup("x").as_deref(), Some("global"));
    }

    #[test]
    fn local_outside_function_fails() {
        let mut s = ShellState::new();
        assert_eq!(run("local x=1", &mut s), 1);
    }

    #[test]
    fn identifier_validation() {
        assert!(is_identifier("abc"));
        assert!(is_identifier("_a1"));
        assert!(!is_identifier("1a"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }
}
