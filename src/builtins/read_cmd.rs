//! The `read` Builtin
//!
//! Reads one line from fd 0 and splits it into variables by IFS; the last
//! variable receives the remainder. `-r` disables backslash processing;
//! `-t seconds` bounds the wait with poll(2); `-p prompt` writes a prompt
//! to stderr first.

use crate::executor::context::ExecContext;
use crate::executor::engine::Executor;
use crate::executor::errors::ExecResult;
use crate::io::fd;
use crate::state::ShellState;

pub fn read(
    _executor: &mut Executor,
    state: &mut ShellState,
    _ctx: &ExecContext,
    args: &[String],
) -> ExecResult {
    let mut raw = false;
    let mut timeout: Option<f64> = None;
    let mut prompt: Option<String> = None;
    let mut names: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-r" => raw = true,
            "-t" => {
                i += 1;
                let Some(value) = args.get(i).and_then(|v| v.parse::<f64>().ok()) else {
                    let _ = fd::write_all(2, b"psh: read: -t: invalid timeout\n");
                    return Ok(2);
                };
                timeout = Some(value);
            }
            "-p" => {
                i += 1;
                prompt = args.get(i).cloned();
            }
            name => names.push(name),
        }
        i += 1;
    }
    if names.is_empty() {
        names.push("REPLY");
    }

    if let Some(p) = &prompt {
        let _ = fd::write_all(2, p.as_bytes());
    }

    if let Some(seconds) = timeout {
        if !wait_readable(0, seconds) {
            // timed out: distinguishable from EOF
            return Ok(142);
        }
    }

    let Some(line) = read_line(raw) else {
        return Ok(1);
    };

    let ifs = state.ifs();
    assign_fields(state, &names, &line, &ifs)?;
    Ok(0)
}

/// Wait for fd to become readable, or time out.
fn wait_readable(fd_num: i32, seconds: f64) -> bool {
    let mut fds = libc::pollfd {
        fd: fd_num,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = (seconds * 1000.0) as i32;
    let ready = unsafe { libc::poll(&mut fds as *mut libc::pollfd, 1, millis) };
    ready > 0
}

/// Read until newline. Without `-r`, `\<newline>` continues the line and
/// other backslashes escape the next character.
fn read_line(raw: bool) -> Option<String> {
    let mut line = String::new();
    let mut saw_any = false;
    loop {
        match fd::read_byte(0) {
            None => {
                if saw_any {
                    return Some(line);
                }
                return None;
            }
            Some(b'\n') => return Some(line),
            Some(b'\\') if !raw => {
                saw_any = true;
                match fd::read_byte(0) {
                    Some(b'\n') => continue, // line continuation
                    Some(b) => line.push(b as char),
                    None => return Some(line),
                }
            }
            Some(b) => {
                saw_any = true;
                line.push(b as char);
            }
        }
    }
}

/// Distribute IFS fields over the names. The last name takes the rest of
/// the line verbatim — leftover fields keep their original separators, not
/// a re-join — trimmed of IFS whitespace at either end.
fn assign_fields(
    state: &mut ShellState,
    names: &[&str],
    line: &str,
    ifs: &str,
) -> ExecResult {
    if names.len() == 1 {
        let trimmed = trim_ifs_whitespace(line, ifs);
        state.assign(names[0], trimmed)?;
        return Ok(0);
    }

    let mut rest = line;
    for name in &names[..names.len() - 1] {
        let (field, remainder) = take_field(rest, ifs);
        state.assign(name, field)?;
        rest = remainder;
    }
    let ws: Vec<char> = ifs.chars().filter(|c| c.is_whitespace()).collect();
    let last = rest.trim_end_matches(|c: char| ws.contains(&c));
    state.assign(names[names.len() - 1], last)?;
    Ok(0)
}

/// Split one field off the front of `line`: skip leading IFS whitespace,
/// take the field, then consume its terminating separator (a whitespace
/// run, at most one non-whitespace IFS character, and the whitespace
/// around it). Returns the field and the untouched remainder, so the last
/// variable can receive leftover text with its separators intact.
fn take_field<'a>(line: &'a str, ifs: &str) -> (&'a str, &'a str) {
    let is_ws = |c: char| ifs.contains(c) && c.is_whitespace();
    let is_hard = |c: char| ifs.contains(c) && !c.is_whitespace();

    let mut iter = line.char_indices().peekable();
    while let Some(&(_, c)) = iter.peek() {
        if is_ws(c) {
            iter.next();
        } else {
            break;
        }
    }
    let field_start = iter.peek().map(|&(i, _)| i).unwrap_or(line.len());
    while let Some(&(_, c)) = iter.peek() {
        if ifs.contains(c) {
            break;
        }
        iter.next();
    }
    let field_end = iter.peek().map(|&(i, _)| i).unwrap_or(line.len());

    // the separator this field ends on
    while let Some(&(_, c)) = iter.peek() {
        if is_ws(c) {
            iter.next();
        } else {
            break;
        }
    }
    if let Some(&(_, c)) = iter.peek() {
        if is_hard(c) {
            iter.next();
        }
    }
    while let Some(&(_, c)) = iter.peek() {
        if is_ws(c) {
            iter.next();
        } else {
            break;
        }
    }
    let rest_start = iter.peek().map(|&(i, _)| i).unwrap_or(line.len());
    (&line[field_start..field_end], &line[rest_start..])
}

fn trim_ifs_whitespace<'a>(line: &'a str, ifs: &str) -> &'a str {
    let ws: Vec<char> = ifs.chars().filter(|c| c.is_whitespace()).collect();
    line.trim_matches(|c| ws.contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_distribute_with_remainder() {
        let mut s = ShellState::new();
        assign_fields(&mut s, &["a", "b"], "one two three", " \t\n").unwrap();
        assert_eq!(s.lookup("a").as_deref(), Some("one"));
        assert_eq!(s.lookup("b").as_deref(), Some("two three"));
    }

    #[test]
    fn single_name_takes_whole_line() {
        let mut s = ShellState::new();
        assign_fields(&mut s, &["REPLY"], "  padded value  ", " \t\n").unwrap();
        assert_eq!(s.lookup("REPLY").as_deref(), Some("padded value"));
    }

    #[test]
    fn missing_fields_are_empty() {
        let mut s = ShellState::new();
        assign_fields(&mut s, &["a", "b", "c"], "only", " \t\n").unwrap();
        assert_eq!(s.lookup("a").as_deref(), Some("only"));
        assert_eq!(s.lookup("b").as_deref(), Some(""));
        assert_eq!(s.lookup("c").as_deref(), Some(""));
    }

    #[test]
    fn remainder_keeps_hard_separators() {
        // IFS=:; read a b <<< "1:2:3" leaves b=2:3, not "2 3"
        let mut s = ShellState::new();
        assign_fields(&mut s, &["a", "b"], "1:2:3", ":").unwrap();
        assert_eq!(s.lookup("a").as_deref(), Some("1"));
        assert_eq!(s.lookup("b").as_deref(), Some("2:3"));
    }

    #[test]
    fn remainder_trims_trailing_whitespace_only() {
        let mut s = ShellState::new();
        assign_fields(&mut s, &["a", "b"], "one  two three  ", " \t\n").unwrap();
        assert_eq!(s.lookup("a").as_deref(), Some("one"));
        assert_eq!(s.lookup("b").as_deref(), Some("two three"));
    }

    #[test]
    fn take_field_consumes_one_separator() {
        assert_eq!(take_field("1:2:3", ":"), ("1", "2:3"));
        assert_eq!(take_field("  a   b c", " \t\n"), ("a", "b c"));
        assert_eq!(take_field("a : b : c", ": "), ("a", "b : c"));
        assert_eq!(take_field("", ":"), ("", ""));
        // an empty field before a hard separator
        assert_eq!(take_field(":x", ":"), ("", "x"));
    }
}
