//! Output Builtins: `echo`, `true`, `false`

use crate::executor::context::ExecContext;
use crate::executor::engine::Executor;
use crate::executor::errors::ExecResult;
use crate::io::fd;
use crate::state::ShellState;

pub fn echo(
    _executor: &mut Executor,
    _state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    let mut newline = true;
    let mut escapes = false;
    let mut rest = args;

    // Flag words stop at the first non-flag argument
    while let Some(first) = rest.first() {
        match first.as_str() {
            "-n" => newline = false,
            "-e" => escapes = true,
            "-E" => escapes = false,
            "-ne" | "-en" => {
                newline = false;
                escapes = true;
            }
            _ => break,
        }
        rest = &rest[1..];
    }

    let mut out = rest.join(" ");
    if escapes {
        out = process_escapes(&out);
    }
    if newline {
        out.push('\n');
    }
    let _ = fd::write_all(1, out.as_bytes());
    Ok(0)
}

/// `echo -e` escape sequences. `\c` truncates the output.
fn process_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('e') => out.push('\u{1b}'),
            Some('f') => out.push('\u{0c}'),
            Some('v') => out.push('\u{0b}'),
            Some('\\') => out.push('\\'),
            Some('c') => return out,
            Some('0') => {
                let mut value = 0u32;
                for _ in 0..3 {
                    let mut peek = chars.clone();
                    match peek.next().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars = peek;
                        }
                        None => break,
                    }
                }
                if let Some(ch) = char::from_u32(value) {
                    out.push(ch);
                }
            }
            Some('x') => {
                let mut value = 0u32;
                let mut used = 0;
                for _ in 0..2 {
                    let mut peek = chars.clone();
                    match peek.next().and_then(|d| d.to_digit(16)) {
                        Some(d) => {
                            value = value * 16 + d;
                            chars = peek;
                            used += 1;
                        }
                        None => break,
                    }
                }
                if used > 0 {
                    if let Some(ch) = char::from_u32(value) {
                        out.push(ch);
                    }
                } else {
                    out.push_str("\\x");
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub fn true_(
    _executor: &mut Executor,
    _state: &mut ShellState,
    _ctx: &ExecContext,
    _args: &[String],
) -> ExecResult {
    Ok(0)
}

pub fn false_(
    _executor: &mut Executor,
    _state: &mut ShellState,
    _ctx: &ExecContext,
    _args: &[String],
) -> ExecResult {
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_processing() {
        assert_eq!(process_escapes("a\\tb"), "a\tb");
        assert_eq!(process_escapes("a\\nb"), "a\nb");
        assert_eq!(process_escapes("a\\\\b"), "a\\b");
        assert_eq!(process_escapes("a\\cb"), "a");
        assert_eq!(process_escapes("\\x41"), "A");
        assert_eq!(process_escapes("\\0101"), "A");
        assert_eq!(process_escapes("\\q"), "\\q");
    }
}
