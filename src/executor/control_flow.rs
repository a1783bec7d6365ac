//! Control Flow Execution
//!
//! if/while/until/for/case/select, the c-style for loop, `(( ))` and
//! `[[ ]]` commands, and the break/continue signals. Loops catch the
//! structured break/continue errors, decrement the level and either
//! consume them or re-raise for an outer loop.

use crate::arithmetic;
use crate::ast::types::{
    CaseConditional, CaseTerminator, ControlKind, ControlStructure, CStyleForLoop, ForLoop,
    IfConditional, SelectLoop, Statement, UntilLoop, WhileLoop,
};
use crate::executor::context::ExecContext;
use crate::executor::engine::Executor;
use crate::executor::errors::{ExecError, ExecResult};
use crate::executor::test_eval::eval_test_expr;
use crate::expansion::expander::{expand_word_to_pattern, expand_words, pre_expand_text};
use crate::expansion::pattern::{matches_pattern, PatternOptions};
use crate::io::fd;
use crate::io::redirect::{apply_redirects, ApplyMode};
use crate::state::ShellState;

pub fn run_control(
    executor: &mut Executor,
    state: &mut ShellState,
    ctrl: &ControlStructure,
    ctx: &ExecContext,
) -> ExecResult {
    let mut scope = apply_redirects(state, executor, &ctrl.redirects, ApplyMode::Temporary)?;
    let result = run_kind(executor, state, &ctrl.kind, ctx);
    scope.restore().map_err(ExecError::Redirect)?;
    result
}

fn run_kind(
    executor: &mut Executor,
    state: &mut ShellState,
    kind: &ControlKind,
    ctx: &ExecContext,
) -> ExecResult {
    match kind {
        ControlKind::If(node) => run_if(executor, state, node, ctx),
        ControlKind::While(node) => run_while(executor, state, node, ctx),
        ControlKind::Until(node) => run_until(executor, state, node, ctx),
        ControlKind::For(node) => run_for(executor, state, node, ctx),
        ControlKind::CStyleFor(node) => run_cstyle_for(executor, state, node, ctx),
        ControlKind::Case(node) => run_case(executor, state, node, ctx),
        ControlKind::Select(node) => run_select(executor, state, node, ctx),
        ControlKind::ArithmeticEval(node) => {
            let expr = pre_expand_text(state, executor, &node.expression)?;
            let value = arithmetic::eval(&expr, state)?;
            Ok(i32::from(value == 0))
        }
        ControlKind::Test(node) => {
            let truth = eval_test_expr(executor, state, &node.expression)?;
            Ok(i32::from(!truth))
        }
        ControlKind::Break(node) => {
            if ctx.loop_depth == 0 {
                let _ = fd::write_all(2, b"psh: break: only meaningful in a loop\n");
                return Ok(1);
            }
            if node.level == 0 {
                let _ = fd::write_all(2, b"psh: break: loop count out of range\n");
                return Ok(1);
            }
            Err(ExecError::Break(node.level))
        }
        ControlKind::Continue(node) => {
            if ctx.loop_depth == 0 {
                let _ = fd::write_all(2, b"psh: continue: only meaningful in a loop\n");
                return Ok(1);
            }
            if node.level == 0 {
                let _ = fd::write_all(2, b"psh: continue: loop count out of range\n");
                return Ok(1);
            }
            Err(ExecError::Continue(node.level))
        }
    }
}

fn run_if(
    executor: &mut Executor,
    state: &mut ShellState,
    node: &IfConditional,
    ctx: &ExecContext,
) -> ExecResult {
    for (condition, body) in &node.clauses {
        let cond_code = executor.run_statements(state, condition, &ctx.enter_condition())?;
        if cond_code == 0 {
            return executor.run_statements(state, body, ctx);
        }
    }
    match &node.else_body {
        Some(body) => executor.run_statements(state, body, ctx),
        None => Ok(0),
    }
}

/// What a loop body iteration asked for.
enum LoopStep {
    Normal(i32),
    Break,
}

/// Run one loop body, consuming break/continue aimed at this loop and
/// re-raising ones aimed further out.
fn loop_body_step(
    executor: &mut Executor,
    state: &mut ShellState,
    body: &[Statement],
    ctx: &ExecContext,
) -> Result<LoopStep, ExecError> {
    match executor.run_statements(state, body, ctx) {
        Ok(code) => Ok(LoopStep::Normal(code)),
        Err(ExecError::Break(level)) => {
            if level > 1 {
                Err(ExecError::Break(level - 1))
            } else {
                Ok(LoopStep::Break)
            }
        }
        Err(ExecError::Continue(level)) => {
            if level > 1 {
                Err(ExecError::Continue(level - 1))
            } else {
                // continue: finish this iteration normally
                Ok(LoopStep::Normal(state.last_exit_code))
            }
        }
        Err(other) => Err(other),
    }
}

fn run_while(
    executor: &mut Executor,
    state: &mut ShellState,
    node: &WhileLoop,
    ctx: &ExecContext,
) -> ExecResult {
    let body_ctx = ctx.enter_loop();
    let mut last = 0;
    loop {
        let cond = executor.run_statements(state, &node.condition, &ctx.enter_condition())?;
        if cond != 0 {
            return Ok(last);
        }
        match loop_body_step(executor, state, &node.body, &body_ctx)? {
            LoopStep::Normal(code) => last = code,
            LoopStep::Break => return Ok(last),
        }
    }
}

fn run_until(
    executor: &mut Executor,
    state: &mut ShellState,
    node: &UntilLoop,
    ctx: &ExecContext,
) -> ExecResult {
    let body_ctx = ctx.enter_loop();
    let mut last = 0;
    loop {
        let cond = executor.run_statements(state, &node.condition, &ctx.enter_condition())?;
        if cond == 0 {
            return Ok(last);
        }
        match loop_body_step(executor, state, &node.body, &body_ctx)? {
            LoopStep::Normal(code) => last = code,
            LoopStep::Break => return Ok(last),
        }
    }
}

fn run_for(
    executor: &mut Executor,
    state: &mut ShellState,
    node: &ForLoop,
    ctx: &ExecContext,
) -> ExecResult {
    let items = match &node.words {
        Some(words) => expand_words(state, executor, words)?,
        None => state.positional.params.clone(),
    };

    let body_ctx = ctx.enter_loop();
    let mut last = 0;
    for item in items {
        state.assign(&node.variable, item)?;
        match loop_body_step(executor, state, &node.body, &body_ctx)? {
            LoopStep::Normal(code) => last = code,
            LoopStep::Break => return Ok(last),
        }
    }
    Ok(last)
}

fn run_cstyle_for(
    executor: &mut Executor,
    state: &mut ShellState,
    node: &CStyleForLoop,
    ctx: &ExecContext,
) -> ExecResult {
    if let Some(init) = &node.init {
        let expr = pre_expand_text(state, executor, init)?;
        arithmetic::eval(&expr, state)?;
    }
    let body_ctx = ctx.enter_loop();
    let mut last = 0;
    loop {
        if let Some(cond) = &node.condition {
            let expr = pre_expand_text(state, executor, cond)?;
            if arithmetic::eval(&expr, state)? == 0 {
                return Ok(last);
            }
        }
        match loop_body_step(executor, state, &node.body, &body_ctx)? {
            LoopStep::Normal(code) => last = code,
            LoopStep::Break => return Ok(last),
        }
        if let Some(update) = &node.update {
            let expr = pre_expand_text(state, executor, update)?;
            arithmetic::eval(&expr, state)?;
        }
    }
}

fn run_case(
    executor: &mut Executor,
    state: &mut ShellState,
    node: &CaseConditional,
    ctx: &ExecContext,
) -> ExecResult {
    let subject =
        crate::expansion::expander::expand_word_to_string(state, executor, &node.subject)?;
    let opts = PatternOptions {
        extglob: state.options.extglob,
        case_insensitive: state.options.nocasematch,
    };

    let mut last = 0;
    let mut fall_through = false;
    for item in &node.items {
        let matched = fall_through
            || matches_any_pattern(executor, state, &subject, &item.patterns, opts)?;
        if !matched {
            continue;
        }
        last = executor.run_statements(state, &item.body, ctx)?;
        match item.terminator {
            CaseTerminator::Break => return Ok(last),
            CaseTerminator::FallThrough => {
                fall_through = true;
            }
            CaseTerminator::ContinueMatching => {
                fall_through = false;
            }
        }
    }
    Ok(last)
}

fn matches_any_pattern(
    executor: &mut Executor,
    state: &mut ShellState,
    subject: &str,
    patterns: &[crate::ast::types::Word],
    opts: PatternOptions,
) -> Result<bool, ExecError> {
    for pattern_word in patterns {
        let pattern = expand_word_to_pattern(state, executor, pattern_word)?;
        if matches_pattern(subject, &pattern, opts) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Interactive menu loop: print the items to stderr, read a selection from
/// stdin, bind the variable, repeat until EOF or `break`.
fn run_select(
    executor: &mut Executor,
    state: &mut ShellState,
    node: &SelectLoop,
    ctx: &ExecContext,
) -> ExecResult {
    let items = match &node.words {
        Some(words) => expand_words(state, executor, words)?,
        None => state.positional.params.clone(),
    };
    if items.is_empty() {
        return Ok(0);
    }

    let prompt = state.lookup("PS3").unwrap_or_else(|| "#? ".to_string());
    let body_ctx = ctx.enter_loop();
    let mut last = 0;

    loop {
        for (i, item) in items.iter().enumerate() {
            let _ = fd::write_all(2, format!("{}) {}\n", i + 1, item).as_bytes());
        }
        let _ = fd::write_all(2, prompt.as_bytes());

        let Some(line) = read_line_fd0() else {
            return Ok(last);
        };
        let reply = line.trim().to_string();
        if reply.is_empty() {
            continue;
        }
        state.assign("REPLY", reply.clone())?;
        let chosen = reply
            .parse::<usize>()
            .ok()
            .and_then(|n| items.get(n.wrapping_sub(1)))
            .cloned()
            .unwrap_or_default();
        state.assign(&node.variable, chosen)?;

        match loop_body_step(executor, state, &node.body, &body_ctx)? {
            LoopStep::Normal(code) => last = code,
            LoopStep::Break => return Ok(last),
        }
    }
}

/// Read one line from fd 0, byte at a time. None at EOF.
pub fn read_line_fd0() -> Option<String> {
    let mut line = Vec::new();
    loop {
        match fd::read_byte(0) {
            Some(b'\n') => return Some(String::from_utf8_lossy(&line).into_owned()),
            Some(b) => line.push(b),
            None => {
                if line.is_empty() {
                    return None;
                }
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn run(src: &str, state: &mut ShellState) -> ExecResult {
        let program = Parser::new().parse(src).unwrap();
        Executor::new().run_program(state, &program, &ExecContext::new())
    }

    #[test]
    fn if_branches() {
        let mut s = ShellState::new();
        assert_eq!(run("if true; then x=then; else x=else; fi", &mut s).unwrap(), 0);
        assert_eq!(s.lookup("x").as_deref(), Some("then"));
        run("if false; then x=then; else x=else; fi", &mut s).unwrap();
        assert_eq!(s.lookup("x").as_deref(), Some("else"));
    }

    #[test]
    fn elif_chain() {
        let mut s = ShellState::new();
        run("if false; then x=a; elif true; then x=b; else x=c; fi", &mut s).unwrap();
        assert_eq!(s.lookup("x").as_deref(), Some("b"));
    }

    #[test]
    fn for_binds_each_item() {
        let mut s = ShellState::new();
        run("acc=''; for i in 1 2 3; do acc=$acc$i; done", &mut s).unwrap();
        assert_eq!(s.lookup("acc").as_deref(), Some("123"));
        // the loop variable keeps its last value
        assert_eq!(s.lookup("i").as_deref(), Some("3"));
    }

    #[test]
    fn for_without_in_uses_positionals() {
        let mut s = ShellState::new();
        s.positional.params = vec!["p".into(), "q".into()];
        run("acc=''; for x; do acc=$acc$x; done", &mut s).unwrap();
        assert_eq!(s.lookup("acc").as_deref(), Some("pq"));
    }

    #[test]
    fn while_and_break_level() {
        let mut s = ShellState::new();
        run(
            "n=0; while true; do n=$((n+1)); if [ $n = 3 ]; then break; fi; done",
            &mut s,
        )
        .unwrap();
        assert_eq!(s.lookup("n").as_deref(), Some("3"));
    }

    #[test]
    fn nested_break_two_levels() {
        let mut s = ShellState::new();
        run(
            "hits=0; for a in 1 2; do for b in 1 2; do hits=$((hits+1)); break 2; done; done",
            &mut s,
        )
        .unwrap();
        assert_eq!(s.lookup("hits").as_deref(), Some("1"));
    }

    #[test]
    fn continue_skips_rest_of_iteration() {
        let mut s = ShellState::new();
        run(
            "acc=''; for i in 1 2 3; do if [ $i = 2 ]; then continue; fi; acc=$acc$i; done",
            &mut s,
        )
        .unwrap();
        assert_eq!(s.lookup("acc").as_deref(), Some("13"));
    }

    #[test]
    fn break_outside_loop_is_an_error_code() {
        let mut s = ShellState::new();
        assert_eq!(run("break", &mut s).unwrap(), 1);
    }

    #[test]
    fn cstyle_for_counts() {
        let mut s = ShellState::new();
        run("acc=''; for ((i=0; i<3; i++)); do acc=$acc$i; done", &mut s).unwrap();
        assert_eq!(s.lookup("acc").as_deref(), Some("012"));
    }

    #[test]
    fn until_loop() {
        let mut s = ShellState::new();
        run("n=0; until [ $n = 2 ]; do n=$((n+1)); done", &mut s).unwrap();
        assert_eq!(s.lookup("n").as_deref(), Some("2"));
    }

    #[test]
    fn case_terminators() {
        let mut s = ShellState::new();
        // ;& falls through unconditionally, ;;& keeps matching
        run(
            "acc=''; case b in a) acc=${acc}a;; b) acc=${acc}b;& c) acc=${acc}c;;& b*) acc=${acc}d;; x) acc=${acc}x;; esac",
            &mut s,
        )
        .unwrap();
        assert_eq!(s.lookup("acc").as_deref(), Some("bcd"));
    }

    #[test]
    fn case_glob_patterns() {
        let mut s = ShellState::new();
        run("case hello.txt in *.txt) kind=text;; *) kind=other;; esac", &mut s).unwrap();
        assert_eq!(s.lookup("kind").as_deref(), Some("text"));
    }

    #[test]
    fn case_quoted_subject_pattern() {
        let mut s = ShellState::new();
        s.assign("x", "*").unwrap();
        // quoted pattern is literal
        run("case '*' in '*') y=literal;; *) y=glob;; esac", &mut s).unwrap();
        assert_eq!(s.lookup("y").as_deref(), Some("literal"));
    }

    #[test]
    fn arithmetic_command_exit_codes() {
        let mut s = ShellState::new();
        assert_eq!(run("((1+1))", &mut s).unwrap(), 0);
        assert_eq!(run("((0))", &mut s).unwrap(), 1);
    }
}
