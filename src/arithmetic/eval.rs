//! Arithmetic Evaluation
//!
//! A precedence-climbing evaluator over the arithmetic token stream. Values
//! are `i64` with wrapping overflow, matching the shell convention. The
//! evaluator reads and writes shell variables directly, so `x=5`, `x++` and
//! `arr[i]+=2` all take effect. Short-circuited branches parse but do not
//! evaluate, so `0 && x++` leaves `x` untouched.

use crate::arithmetic::lexer::{parse_number, tokenize, ArithToken};
use crate::arithmetic::ArithError;
use crate::state::{ShellState, VarValue};

/// Evaluate an expression against shell state. An empty expression is 0.
pub fn eval(expr: &str, state: &mut ShellState) -> Result<i64, ArithError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Ok(0);
    }
    let mut ev = Evaluator {
        tokens,
        pos: 0,
        state,
    };
    let value = ev.comma(true)?;
    if ev.pos != ev.tokens.len() {
        return Err(ArithError::Syntax("trailing tokens".to_string()));
    }
    Ok(value)
}

/// Evaluate for a truth test: non-zero is true.
pub fn eval_condition(expr: &str, state: &mut ShellState) -> Result<bool, ArithError> {
    Ok(eval(expr, state)? != 0)
}

struct Evaluator<'a> {
    tokens: Vec<ArithToken>,
    pos: usize,
    state: &'a mut ShellState,
}

/// An assignable location: a variable or an array element.
#[derive(Debug, Clone)]
struct Lvalue {
    name: String,
    index: Option<i64>,
}

impl<'a> Evaluator<'a> {
    fn peek(&self) -> Option<&ArithToken> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<ArithToken> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &ArithToken) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &ArithToken) -> Result<(), ArithError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(ArithError::Syntax(format!("expected {tok:?}")))
        }
    }

    // --- variable plumbing ---

    fn read_lvalue(&mut self, lv: &Lvalue) -> Result<i64, ArithError> {
        match lv.index {
            None => self.read_var(&lv.name, 0),
            Some(idx) => {
                let name = self.state.resolve_name(&lv.name);
                let text = match self.state.get_var(&name).map(|v| &v.value) {
                    Some(VarValue::Indexed(map)) => map.get(&idx).cloned().unwrap_or_default(),
                    Some(VarValue::Assoc(map)) => {
                        map.get(&idx.to_string()).cloned().unwrap_or_default()
                    }
                    Some(VarValue::Scalar(s)) if idx == 0 => s.clone(),
                    _ => String::new(),
                };
                self.value_of_text(&text, 0)
            }
        }
    }

    fn read_var(&mut self, name: &str, depth: u8) -> Result<i64, ArithError> {
        if depth > 8 {
            return Err(ArithError::Syntax(format!("`{name}`: expression recursion")));
        }
        match self.state.lookup(name) {
            None => Ok(0),
            Some(text) => self.value_of_text(&text, depth),
        }
    }

    /// A variable's text is a number, another variable name, or (recursively)
    /// an expression-shaped value.
    fn value_of_text(&mut self, text: &str, depth: u8) -> Result<i64, ArithError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        if let Ok(n) = parse_number(trimmed) {
            return Ok(n);
        }
        if trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && trimmed.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            return self.read_var(trimmed, depth + 1);
        }
        Err(ArithError::BadNumber(trimmed.to_string()))
    }

    fn write_lvalue(&mut self, lv: &Lvalue, value: i64) -> Result<(), ArithError> {
        let name = self.state.resolve_name(&lv.name);
        match lv.index {
            None => self
                .state
                .assign(&name, value.to_string())
                .map_err(|e| ArithError::Assignment(e.to_string())),
            Some(idx) => {
                let mut map = match self.state.get_var(&name).map(|v| &v.value) {
                    Some(VarValue::Indexed(map)) => map.clone(),
                    Some(VarValue::Scalar(s)) => {
                        let mut m = std::collections::BTreeMap::new();
                        if !s.is_empty() {
                            m.insert(0, s.clone());
                        }
                        m
                    }
                    _ => std::collections::BTreeMap::new(),
                };
                map.insert(idx, value.to_string());
                self.state
                    .scopes
                    .set(&name, VarValue::Indexed(map))
                    .map_err(|e| ArithError::Assignment(e.to_string()))
            }
        }
    }

    // --- precedence levels, loosest first ---

    fn comma(&mut self, active: bool) -> Result<i64, ArithError> {
        let mut value = self.assignment(active)?;
        while self.eat(&ArithToken::Comma) {
            value = self.assignment(active)?;
        }
        Ok(value)
    }

    fn assignment(&mut self, active: bool) -> Result<i64, ArithError> {
        // Lookahead: NAME [ '[' ... ']' ] assign-op
        let mark = self.pos;
        if let Some(lv) = self.try_lvalue()? {
            let op = self.peek().cloned();
            let apply: Option<fn(i64, i64) -> Result<i64, ArithError>> = match op {
                Some(ArithToken::Assign) => Some(|_, b| Ok(b)),
                Some(ArithToken::PlusAssign) => Some(|a, b| Ok(a.wrapping_add(b))),
                Some(ArithToken::MinusAssign) => Some(|a, b| Ok(a.wrapping_sub(b))),
                Some(ArithToken::StarAssign) => Some(|a, b| Ok(a.wrapping_mul(b))),
                Some(ArithToken::SlashAssign) => Some(checked_div),
                Some(ArithToken::PercentAssign) => Some(checked_rem),
                Some(ArithToken::ShlAssign) => Some(|a, b| Ok(a.wrapping_shl(b as u32))),
                Some(ArithToken::ShrAssign) => Some(|a, b| Ok(a.wrapping_shr(b as u32))),
                Some(ArithToken::AmpAssign) => Some(|a, b| Ok(a & b)),
                Some(ArithToken::PipeAssign) => Some(|a, b| Ok(a | b)),
                Some(ArithToken::CaretAssign) => Some(|a, b| Ok(a ^ b)),
                _ => None,
            };
            if let Some(apply) = apply {
                self.bump();
                let rhs = self.assignment(active)?;
                if active {
                    let current = self.read_lvalue(&lv)?;
                    let next = apply(current, rhs)?;
                    self.write_lvalue(&lv, next)?;
                    return Ok(next);
                }
                return Ok(0);
            }
        }
        self.pos = mark;
        self.ternary(active)
    }

    fn try_lvalue(&mut self) -> Result<Option<Lvalue>, ArithError> {
        let mark = self.pos;
        let Some(ArithToken::Name(name)) = self.peek().cloned() else {
            return Ok(None);
        };
        self.bump();
        if self.eat(&ArithToken::LBracket) {
            let idx = self.comma(true)?;
            self.expect(&ArithToken::RBracket)?;
            // Only a valid lvalue if an assignment operator follows; caller
            // rewinds otherwise
            if is_assign_op(self.peek()) {
                return Ok(Some(Lvalue {
                    name,
                    index: Some(idx),
                }));
            }
            self.pos = mark;
            return Ok(None);
        }
        if is_assign_op(self.peek()) {
            return Ok(Some(Lvalue { name, index: None }));
        }
        self.pos = mark;
        Ok(None)
    }

    fn ternary(&mut self, active: bool) -> Result<i64, ArithError> {
        let cond = self.logical_or(active)?;
        if !self.eat(&ArithToken::Question) {
            return Ok(cond);
        }
        let take_then = cond != 0;
        let then_val = self.assignment(active && take_then)?;
        self.expect(&ArithToken::Colon)?;
        let else_val = self.assignment(active && !take_then)?;
        Ok(if take_then { then_val } else { else_val })
    }

    fn logical_or(&mut self, active: bool) -> Result<i64, ArithError> {
        let mut value = self.logical_and(active)?;
        while self.eat(&ArithToken::PipePipe) {
            let rhs_active = active && value == 0;
            let rhs = self.logical_and(rhs_active)?;
            value = i64::from(value != 0 || rhs != 0);
        }
        Ok(value)
    }

    fn logical_and(&mut self, active: bool) -> Result<i64, ArithError> {
        let mut value = self.bit_or(active)?;
        while self.eat(&ArithToken::AmpAmp) {
            let rhs_active = active && value != 0;
            let rhs = self.bit_or(rhs_active)?;
            value = i64::from(value != 0 && rhs != 0);
        }
        Ok(value)
    }

    fn bit_or(&mut self, active: bool) -> Result<i64, ArithError> {
        let mut value = self.bit_xor(active)?;
        while self.eat(&ArithToken::Pipe) {
            value |= self.bit_xor(active)?;
        }
        Ok(value)
    }

    fn bit_xor(&mut self, active: bool) -> Result<i64, ArithError> {
        let mut value = self.bit_and(active)?;
        while self.eat(&ArithToken::Caret) {
            value ^= self.bit_and(active)?;
        }
        Ok(value)
    }

    fn bit_and(&mut self, active: bool) -> Result<i64, ArithError> {
        let mut value = self.equality(active)?;
        while self.eat(&ArithToken::Amp) {
            value &= self.equality(active)?;
        }
        Ok(value)
    }

    fn equality(&mut self, active: bool) -> Result<i64, ArithError> {
        let mut value = self.relational(active)?;
        loop {
            if self.eat(&ArithToken::EqEq) {
                value = i64::from(value == self.relational(active)?);
            } else if self.eat(&ArithToken::NotEq) {
                value = i64::from(value != self.relational(active)?);
            } else {
                return Ok(value);
            }
        }
    }

    fn relational(&mut self, active: bool) -> Result<i64, ArithError> {
        let mut value = self.shift(active)?;
        loop {
            if self.eat(&ArithToken::Le) {
                value = i64::from(value <= self.shift(active)?);
            } else if self.eat(&ArithToken::Ge) {
                value = i64::from(value >= self.shift(active)?);
            } else if self.eat(&ArithToken::Lt) {
                value = i64::from(value < self.shift(active)?);
            } else if self.eat(&ArithToken::Gt) {
                value = i64::from(value > self.shift(active)?);
            } else {
                return Ok(value);
            }
        }
    }

    fn shift(&mut self, active: bool) -> Result<i64, ArithError> {
        let mut value = self.additive(active)?;
        loop {
            if self.eat(&ArithToken::Shl) {
                value = value.wrapping_shl(self.additive(active)? as u32);
            } else if self.eat(&ArithToken::Shr) {
                value = value.wrapping_shr(self.additive(active)? as u32);
            } else {
                return Ok(value);
            }
        }
    }

    fn additive(&mut self, active: bool) -> Result<i64, ArithError> {
        let mut value = self.multiplicative(active)?;
        loop {
            if self.eat(&ArithToken::Plus) {
                value = value.wrapping_add(self.multiplicative(active)?);
            } else if self.eat(&ArithToken::Minus) {
                value = value.wrapping_sub(self.multiplicative(active)?);
            } else {
                return Ok(value);
            }
        }
    }

    fn multiplicative(&mut self, active: bool) -> Result<i64, ArithError> {
        let mut value = self.power(active)?;
        loop {
            if self.eat(&ArithToken::Star) {
                value = value.wrapping_mul(self.power(active)?);
            } else if self.eat(&ArithToken::Slash) {
                let rhs = self.power(active)?;
                value = if active { checked_div(value, rhs)? } else { 0 };
            } else if self.eat(&ArithToken::Percent) {
                let rhs = self.power(active)?;
                value = if active { checked_rem(value, rhs)? } else { 0 };
            } else {
                return Ok(value);
            }
        }
    }

    fn power(&mut self, active: bool) -> Result<i64, ArithError> {
        let base = self.unary(active)?;
        if self.eat(&ArithToken::StarStar) {
            // right-associative
            let exp = self.power(active)?;
            if exp < 0 {
                return Err(ArithError::NegativeExponent);
            }
            return Ok(base.wrapping_pow(exp.min(u32::MAX as i64) as u32));
        }
        Ok(base)
    }

    fn unary(&mut self, active: bool) -> Result<i64, ArithError> {
        if self.eat(&ArithToken::Bang) {
            return Ok(i64::from(self.unary(active)? == 0));
        }
        if self.eat(&ArithToken::Tilde) {
            return Ok(!self.unary(active)?);
        }
        if self.eat(&ArithToken::Plus) {
            return self.unary(active);
        }
        if self.eat(&ArithToken::Minus) {
            return Ok(self.unary(active)?.wrapping_neg());
        }
        if self.eat(&ArithToken::PlusPlus) {
            return self.prefix_incdec(active, 1);
        }
        if self.eat(&ArithToken::MinusMinus) {
            return self.prefix_incdec(active, -1);
        }
        self.primary(active)
    }

    fn prefix_incdec(&mut self, active: bool, delta: i64) -> Result<i64, ArithError> {
        let lv = self.name_operand()?;
        if !active {
            return Ok(0);
        }
        let value = self.read_lvalue(&lv)?.wrapping_add(delta);
        self.write_lvalue(&lv, value)?;
        Ok(value)
    }

    fn name_operand(&mut self) -> Result<Lvalue, ArithError> {
        match self.bump() {
            Some(ArithToken::Name(name)) => {
                if self.eat(&ArithToken::LBracket) {
                    let idx = self.comma(true)?;
                    self.expect(&ArithToken::RBracket)?;
                    Ok(Lvalue {
                        name,
                        index: Some(idx),
                    })
                } else {
                    Ok(Lvalue { name, index: None })
                }
            }
            _ => Err(ArithError::Syntax("expected variable name".to_string())),
        }
    }

    fn primary(&mut self, active: bool) -> Result<i64, ArithError> {
        match self.bump() {
            Some(ArithToken::Num(n)) => Ok(n),
            Some(ArithToken::Name(name)) => {
                let lv = if self.eat(&ArithToken::LBracket) {
                    let idx = self.comma(true)?;
                    self.expect(&ArithToken::RBracket)?;
                    Lvalue {
                        name,
                        index: Some(idx),
                    }
                } else {
                    Lvalue { name, index: None }
                };
                // postfix increment/decrement binds tighter than any
                // binary operator
                let delta = if self.eat(&ArithToken::PlusPlus) {
                    Some(1)
                } else if self.eat(&ArithToken::MinusMinus) {
                    Some(-1)
                } else {
                    None
                };
                if !active {
                    return Ok(0);
                }
                let value = self.read_lvalue(&lv)?;
                if let Some(delta) = delta {
                    self.write_lvalue(&lv, value.wrapping_add(delta))?;
                }
                Ok(value)
            }
            Some(ArithToken::LParen) => {
                let value = self.comma(active)?;
                self.expect(&ArithToken::RParen)?;
                Ok(value)
            }
            other => Err(ArithError::Syntax(format!(
                "unexpected token {other:?}"
            ))),
        }
    }
}

fn is_assign_op(tok: Option<&ArithToken>) -> bool {
    matches!(
        tok,
        Some(
            ArithToken::Assign
                | ArithToken::PlusAssign
                | ArithToken::MinusAssign
                | ArithToken::StarAssign
                | ArithToken::SlashAssign
                | ArithToken::PercentAssign
                | ArithToken::ShlAssign
                | ArithToken::ShrAssign
                | ArithToken::AmpAssign
                | ArithToken::PipeAssign
                | ArithToken::CaretAssign
        )
    )
}

fn checked_div(a: i64, b: i64) -> Result<i64, ArithError> {
    if b == 0 {
        Err(ArithError::DivisionByZero)
    } else {
        Ok(a.wrapping_div(b))
    }
}

fn checked_rem(a: i64, b: i64) -> Result<i64, ArithError> {
    if b == 0 {
        Err(ArithError::DivisionByZero)
    } else {
        Ok(a.wrapping_rem(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ShellState {
        ShellState::new()
    }

    fn ev(expr: &str, state: &mut ShellState) -> i64 {
        eval(expr, state).unwrap()
    }

    #[test]
    fn precedence() {
        let mut s = state();
        assert_eq!(ev("1+2*3", &mut s), 7);
        assert_eq!(ev("(1+2)*3", &mut s), 9);
        assert_eq!(ev("2**3**2", &mut s), 512); // right assoc
        assert_eq!(ev("7%3", &mut s), 1);
        assert_eq!(ev("1<<4|1", &mut s), 17);
    }

    #[test]
    fn comparisons_and_logic() {
        let mut s = state();
        assert_eq!(ev("3<5", &mut s), 1);
        assert_eq!(ev("3>=5", &mut s), 0);
        assert_eq!(ev("1&&0", &mut s), 0);
        assert_eq!(ev("1||0", &mut s), 1);
        assert_eq!(ev("!5", &mut s), 0);
        assert_eq!(ev("~0", &mut s), -1);
    }

    #[test]
    fn ternary() {
        let mut s = state();
        assert_eq!(ev("1 ? 10 : 20", &mut s), 10);
        assert_eq!(ev("0 ? 10 : 20", &mut s), 20);
    }

    #[test]
    fn variables_default_to_zero() {
        let mut s = state();
        assert_eq!(ev("missing+1", &mut s), 1);
    }

    #[test]
    fn variable_values_resolve() {
        let mut s = state();
        s.assign("x", "5").unwrap();
        assert_eq!(ev("x*2", &mut s), 10);
        // a variable naming another variable resolves recursively
        s.assign("y", "x").unwrap();
        assert_eq!(ev("y+1", &mut s), 6);
    }

    #[test]
    fn assignment_writes_state() {
        let mut s = state();
        assert_eq!(ev("x=4", &mut s), 4);
        assert_eq!(s.lookup("x").as_deref(), Some("4"));
        assert_eq!(ev("x+=2", &mut s), 6);
        assert_eq!(s.lookup("x").as_deref(), Some("6"));
    }

    #[test]
    fn increments() {
        let mut s = state();
        s.assign("i", "5").unwrap();
        assert_eq!(ev("i++", &mut s), 5);
        assert_eq!(s.lookup("i").as_deref(), Some("6"));
        assert_eq!(ev("++i", &mut s), 7);
        assert_eq!(ev("i--", &mut s), 7);
        assert_eq!(s.lookup("i").as_deref(), Some("6"));
    }

    #[test]
    fn short_circuit_suppresses_side_effects() {
        let mut s = state();
        s.assign("x", "1").unwrap();
        assert_eq!(ev("0 && (x=99)", &mut s), 0);
        assert_eq!(s.lookup("x").as_deref(), Some("1"));
        assert_eq!(ev("1 || (x=99)", &mut s), 1);
        assert_eq!(s.lookup("x").as_deref(), Some("1"));
        assert_eq!(ev("0 ? x=50 : 7", &mut s), 7);
        assert_eq!(s.lookup("x").as_deref(), Some("1"));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let mut s = state();
        assert_eq!(eval("1/0", &mut s), Err(ArithError::DivisionByZero));
        assert_eq!(eval("1%0", &mut s), Err(ArithError::DivisionByZero));
        // short-circuited division is never evaluated
        assert_eq!(ev("0 && 1/0", &mut s), 0);
    }

    #[test]
    fn comma_sequences() {
        let mut s = state();
        assert_eq!(ev("x=1, x+9", &mut s), 10);
    }

    #[test]
    fn array_elements() {
        let mut s = state();
        assert_eq!(ev("a[2]=7", &mut s), 7);
        assert_eq!(ev("a[2]+1", &mut s), 8);
        assert_eq!(ev("a[1+1]", &mut s), 7);
    }

    #[test]
    fn empty_expression_is_zero() {
        let mut s = state();
        assert_eq!(ev("", &mut s), 0);
        assert_eq!(ev("  ", &mut s), 0);
    }
}
