//! Arithmetic Tokeniser
//!
//! Scans `$(( ))` / `(( ))` expression text into operator and operand
//! tokens. `<<` and `>>` are shift operators here — heredoc meaning only
//! exists outside arithmetic mode.

use crate::arithmetic::ArithError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArithToken {
    Num(i64),
    Name(String),
    // grouping
    LParen,
    RParen,
    LBracket,
    RBracket,
    // operators
    PlusPlus,
    MinusMinus,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    Tilde,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    Question,
    Colon,
    Comma,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    ShlAssign,
    ShrAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
}

pub fn tokenize(expr: &str) -> Result<Vec<ArithToken>, ArithError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '#') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(ArithToken::Num(parse_number(&text)?));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(ArithToken::Name(chars[start..i].iter().collect()));
            continue;
        }

        let rest: String = chars[i..].iter().take(3).collect();
        let (tok, len) = match_operator(&rest)
            .ok_or_else(|| ArithError::Syntax(format!("unexpected character `{c}`")))?;
        tokens.push(tok);
        i += len;
    }
    Ok(tokens)
}

fn match_operator(rest: &str) -> Option<(ArithToken, usize)> {
    const TABLE: &[(&str, ArithToken)] = &[
        ("<<=", ArithToken::ShlAssign),
        (">>=", ArithToken::ShrAssign),
        ("**", ArithToken::StarStar),
        ("++", ArithToken::PlusPlus),
        ("--", ArithToken::MinusMinus),
        ("<<", ArithToken::Shl),
        (">>", ArithToken::Shr),
        ("<=", ArithToken::Le),
        (">=", ArithToken::Ge),
        ("==", ArithToken::EqEq),
        ("!=", ArithToken::NotEq),
        ("&&", ArithToken::AmpAmp),
        ("||", ArithToken::PipePipe),
        ("+=", ArithToken::PlusAssign),
        ("-=", ArithToken::MinusAssign),
        ("*=", ArithToken::StarAssign),
        ("/=", ArithToken::SlashAssign),
        ("%=", ArithToken::PercentAssign),
        ("&=", ArithToken::AmpAssign),
        ("|=", ArithToken::PipeAssign),
        ("^=", ArithToken::CaretAssign),
        ("(", ArithToken::LParen),
        (")", ArithToken::RParen),
        ("[", ArithToken::LBracket),
        ("]", ArithToken::RBracket),
        ("+", ArithToken::Plus),
        ("-", ArithToken::Minus),
        ("*", ArithToken::Star),
        ("/", ArithToken::Slash),
        ("%", ArithToken::Percent),
        ("!", ArithToken::Bang),
        ("~", ArithToken::Tilde),
        ("<", ArithToken::Lt),
        (">", ArithToken::Gt),
        ("&", ArithToken::Amp),
        ("|", ArithToken::Pipe),
        ("^", ArithToken::Caret),
        ("?", ArithToken::Question),
        (":", ArithToken::Colon),
        (",", ArithToken::Comma),
        ("=", ArithToken::Assign),
    ];
    for (lit, tok) in TABLE {
        if rest.starts_with(lit) {
            return Some((tok.clone(), lit.len()));
        }
    }
    None
}

/// Decimal, `0` octal, `0x` hex, and explicit `base#digits` (base 2..=64).
pub fn parse_number(text: &str) -> Result<i64, ArithError> {
    if let Some((base, digits)) = text.split_once('#') {
        let base: u32 = base
            .parse()
            .map_err(|_| ArithError::BadNumber(text.to_string()))?;
        if !(2..=64).contains(&base) {
            return Err(ArithError::BadBase(base));
        }
        return parse_in_base(digits, base).ok_or_else(|| ArithError::BadNumber(text.to_string()));
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_err(|_| ArithError::BadNumber(text.to_string()));
    }
    if text.len() > 1 && text.starts_with('0') {
        return i64::from_str_radix(&text[1..], 8)
            .map_err(|_| ArithError::BadNumber(text.to_string()));
    }
    text.parse()
        .map_err(|_| ArithError::BadNumber(text.to_string()))
}

/// Bases above 36 use lowercase, uppercase, `@`, `_` (bash convention).
fn parse_in_base(digits: &str, base: u32) -> Option<i64> {
    let mut value: i64 = 0;
    for c in digits.chars() {
        let d = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'a'..='z' => c as u32 - 'a' as u32 + 10,
            'A'..='Z' => {
                if base <= 36 {
                    c as u32 - 'A' as u32 + 10
                } else {
                    c as u32 - 'A' as u32 + 36
                }
            }
            '@' => 62,
            '_' => 63,
            _ => return None,
        };
        if d >= base {
            return None;
        }
        value = value.checked_mul(base as i64)?.checked_add(d as i64)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(parse_number("42").unwrap(), 42);
        assert_eq!(parse_number("0x1f").unwrap(), 31);
        assert_eq!(parse_number("010").unwrap(), 8);
        assert_eq!(parse_number("2#1010").unwrap(), 10);
        assert_eq!(parse_number("16#ff").unwrap(), 255);
        assert!(parse_number("1#0").is_err());
        assert!(parse_number("2#2").is_err());
    }

    #[test]
    fn operators_longest_match() {
        let toks = tokenize("a<<=2").unwrap();
        assert_eq!(
            toks,
            vec![
                ArithToken::Name("a".into()),
                ArithToken::ShlAssign,
                ArithToken::Num(2)
            ]
        );
    }

    #[test]
    fn shifts_are_shifts_here() {
        let toks = tokenize("1<<4").unwrap();
        assert_eq!(
            toks,
            vec![ArithToken::Num(1), ArithToken::Shl, ArithToken::Num(4)]
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(tokenize("1 $ 2").is_err());
    }
}
