//! Tilde Expansion
//!
//! `~` becomes `$HOME`, `~user` becomes that user's home directory, and the
//! expansion only applies to an unquoted leading tilde up to the first `/`.
//! Assignment values additionally expand tildes after `=` and `:`.

use crate::state::ShellState;
use nix::unistd::User;

/// Expand a leading tilde in `text`. Returns the text unchanged when there
/// is nothing to expand (no tilde, or an unknown user).
pub fn expand_tilde(state: &ShellState, text: &str) -> String {
    match tilde_prefix(state, text) {
        Some((expansion, rest)) => format!("{expansion}{rest}"),
        None => text.to_string(),
    }
}

/// Split `~...` into the replacement and the remainder after the prefix.
fn tilde_prefix<'a>(state: &ShellState, text: &'a str) -> Option<(String, &'a str)> {
    let rest = text.strip_prefix('~')?;
    let (name, remainder) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    if name.is_empty() {
        let home = state
            .lookup("HOME")
            .unwrap_or_else(|| "/".to_string());
        return Some((home, remainder));
    }
    let user = User::from_name(name).ok().flatten()?;
    Some((user.dir.to_string_lossy().into_owned(), remainder))
}

/// Tilde expansion inside an assignment-like value: the start of the value
/// and each position after a `:` expand (PATH-style lists).
pub fn expand_tilde_in_assignment(state: &ShellState, value: &str) -> String {
    value
        .split(':')
        .map(|piece| expand_tilde(state, piece))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_home(home: &str) -> ShellState {
        let mut state = ShellState::new();
        state.assign("HOME", home).unwrap();
        state
    }

    #[test]
    fn bare_tilde() {
        let state = state_with_home("/home/tester");
        assert_eq!(expand_tilde(&state, "~"), "/home/tester");
    }

    #[test]
    fn tilde_with_path() {
        let state = state_with_home("/home/tester");
        assert_eq!(expand_tilde(&state, "~/docs"), "/home/tester/docs");
    }

    #[test]
    fn unknown_user_is_untouched() {
        let state = state_with_home("/home/tester");
        assert_eq!(
            expand_tilde(&state, "~no-such-user-zzz/x"),
            "~no-such-user-zzz/x"
        );
    }

    #[test]
    fn non_leading_tilde_is_untouched() {
        let state = state_with_home("/home/tester");
        assert_eq!(expand_tilde(&state, "a~b"), "a~b");
    }

    #[test]
    fn assignment_colon_positions() {
        let state = state_with_home("/h");
        assert_eq!(
            expand_tilde_in_assignment(&state, "~/bin:/usr/bin:~/sbin"),
            "/h/bin:/usr/bin:/h/sbin"
        );
    }
}
