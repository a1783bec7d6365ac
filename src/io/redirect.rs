//! Redirection Application
//!
//! One function per redirect operator, shared by all four dispatch paths.
//! Targets are pre-processed with tilde and variable expansion (no word
//! splitting, no globbing); heredoc bodies expand unless the delimiter was
//! quoted.

use crate::ast::types::{QuoteType, Redirect, RedirectKind, RedirectTarget, Word};
use crate::expansion::expander::{expand_word_to_string, pre_expand_text};
use crate::expansion::ExpansionHost;
use crate::io::fd;
use crate::io::saved_fds::RedirectScope;
use crate::io::RedirError;
use crate::state::ShellState;
use std::os::unix::io::RawFd;

/// Which dispatch path is applying the redirections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Compound command or subshell prelude: save and restore
    Temporary,
    /// `exec` with no command: modifies the shell permanently
    Permanent,
    /// Wrapping a builtin invocation: save and restore
    Builtin,
    /// Inside a forked child before exec: no restore, errors exit(1)
    Child,
}

impl ApplyMode {
    fn saves(self) -> bool {
        matches!(self, ApplyMode::Temporary | ApplyMode::Builtin)
    }
}

/// Apply a redirect list. On success the returned scope owns the saved
/// descriptors; dropping it (or calling `restore`) puts them back. On error
/// any descriptors already redirected are restored before returning.
pub fn apply_redirects(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    redirects: &[Redirect],
    mode: ApplyMode,
) -> Result<RedirectScope, RedirError> {
    let mut scope = RedirectScope::new();
    for redirect in redirects {
        if let Err(err) = apply_one(state, host, redirect, mode, &mut scope) {
            if mode.saves() {
                let _ = scope.restore();
            }
            return Err(err);
        }
    }
    if !mode.saves() {
        scope.forget();
    }
    Ok(scope)
}

fn apply_one(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    redirect: &Redirect,
    mode: ApplyMode,
    scope: &mut RedirectScope,
) -> Result<(), RedirError> {
    let source = redirect.source_fd.unwrap_or_else(|| redirect.kind.default_fd());

    match redirect.kind {
        RedirectKind::Input => {
            let path = target_path(state, host, redirect)?;
            save(scope, mode, source)?;
            redirect_input(&path, source)
        }
        RedirectKind::Output => {
            let path = target_path(state, host, redirect)?;
            save(scope, mode, source)?;
            redirect_output(&path, source, state.options.noclobber)
        }
        RedirectKind::OutputClobber => {
            let path = target_path(state, host, redirect)?;
            save(scope, mode, source)?;
            redirect_output(&path, source, false)
        }
        RedirectKind::Append => {
            let path = target_path(state, host, redirect)?;
            save(scope, mode, source)?;
            redirect_append(&path, source)
        }
        RedirectKind::ReadWrite => {
            let path = target_path(state, host, redirect)?;
            save(scope, mode, source)?;
            redirect_read_write(&path, source)
        }
        RedirectKind::HereDoc { .. } => {
            let body = redirect
                .heredoc_content
                .as_deref()
                .ok_or(RedirError::HeredocMissing)?;
            let content = if redirect.heredoc_quoted {
                body.to_string()
            } else {
                pre_expand_text(state, host, body)
                    .map_err(|e| RedirError::Expansion(e.to_string()))?
            };
            save(scope, mode, source)?;
            redirect_string(&content, source)
        }
        RedirectKind::HereString => {
            let word = target_word(redirect)?;
            let mut content = if redirect.quote_type == QuoteType::Single {
                word.as_literal().unwrap_or_default()
            } else {
                expand_word_to_string(state, host, word)
                    .map_err(|e| RedirError::Expansion(e.to_string()))?
            };
            content.push('\n');
            save(scope, mode, source)?;
            redirect_string(&content, source)
        }
        RedirectKind::DupInput | RedirectKind::DupOutput => {
            match &redirect.target {
                RedirectTarget::Fd(n) => {
                    save(scope, mode, source)?;
                    redirect_dup(*n, source)
                }
                RedirectTarget::Close => {
                    save(scope, mode, source)?;
                    fd::close_quietly(source);
                    Ok(())
                }
                RedirectTarget::Word(word) => {
                    // The target may expand to a descriptor number or `-`
                    let text = expand_word_to_string(state, host, word)
                        .map_err(|e| RedirError::Expansion(e.to_string()))?;
                    save(scope, mode, source)?;
                    if text == "-" {
                        fd::close_quietly(source);
                        Ok(())
                    } else if let Ok(n) = text.parse::<i32>() {
                        redirect_dup(n, source)
                    } else {
                        Err(RedirError::BadFdTarget(text))
                    }
                }
            }
        }
    }
}

fn save(scope: &mut RedirectScope, mode: ApplyMode, source: RawFd) -> Result<(), RedirError> {
    if mode.saves() {
        scope.save(source)?;
    }
    Ok(())
}

fn target_word(redirect: &Redirect) -> Result<&Word, RedirError> {
    match &redirect.target {
        RedirectTarget::Word(word) => Ok(word),
        RedirectTarget::Fd(n) => Err(RedirError::BadFdTarget(n.to_string())),
        RedirectTarget::Close => Err(RedirError::BadFdTarget("-".to_string())),
    }
}

/// Tilde + variable expansion on the target; no splitting, no globbing.
fn target_path(
    state: &mut ShellState,
    host: &mut dyn ExpansionHost,
    redirect: &Redirect,
) -> Result<String, RedirError> {
    let word = target_word(redirect)?;
    if redirect.quote_type == QuoteType::Single {
        return Ok(word.as_literal().unwrap_or_default());
    }
    expand_word_to_string(state, host, word).map_err(|e| RedirError::Expansion(e.to_string()))
}

// --- one helper per operator ---

/// `< path`
fn redirect_input(path: &str, source: RawFd) -> Result<(), RedirError> {
    let new = fd::open_path(path, libc::O_RDONLY, 0)?;
    finish(new, source)
}

/// `> path`, honouring `noclobber`
fn redirect_output(path: &str, source: RawFd, noclobber: bool) -> Result<(), RedirError> {
    if noclobber && std::path::Path::new(path).exists() {
        return Err(RedirError::NoClobber {
            path: path.to_string(),
        });
    }
    let new = fd::open_path(path, libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC, 0o666)?;
    finish(new, source)
}

/// `>> path`
fn redirect_append(path: &str, source: RawFd) -> Result<(), RedirError> {
    let new = fd::open_path(path, libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND, 0o666)?;
    finish(new, source)
}

/// `<> path`
fn redirect_read_write(path: &str, source: RawFd) -> Result<(), RedirError> {
    let new = fd::open_path(path, libc::O_RDWR | libc::O_CREAT, 0o666)?;
    finish(new, source)
}

/// Heredoc and herestring bodies go through a real pipe.
fn redirect_string(content: &str, source: RawFd) -> Result<(), RedirError> {
    let (read_end, write_end) = fd::make_pipe()?;
    let result = fd::write_all(write_end, content.as_bytes());
    fd::close_quietly(write_end);
    result?;
    finish(read_end, source)
}

/// `>&n` / `<&n`: the target descriptor must already be open.
fn redirect_dup(target: RawFd, source: RawFd) -> Result<(), RedirError> {
    if !fd::is_open(target) {
        return Err(RedirError::BadFd(target));
    }
    fd::dup2(target, source)?;
    Ok(())
}

fn finish(new_fd: RawFd, source: RawFd) -> Result<(), RedirError> {
    if new_fd != source {
        let result = fd::dup2(new_fd, source);
        fd::close_quietly(new_fd);
        result?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expansion::NoSubstitution;
    use std::os::unix::io::RawFd;

    fn redirect_to(path: &str, kind: RedirectKind, source_fd: RawFd) -> Redirect {
        let mut r = Redirect::new(kind, RedirectTarget::Word(Word::literal(path)));
        r.source_fd = Some(source_fd);
        r
    }

    /// Reserve a scratch descriptor this test owns: a /dev/null dup parked
    /// high enough that nothing else dup2s over it.
    fn scratch_fd() -> RawFd {
        let devnull = fd::open_path("/dev/null", libc::O_RDONLY, 0).unwrap();
        let scratch = fd::dup_above(devnull, 20).unwrap();
        fd::close_quietly(devnull);
        scratch
    }

    #[test]
    fn output_then_input_round_trip() {
        let scratch = scratch_fd();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let path_str = path.to_str().unwrap();
        let mut state = ShellState::new();

        let r = redirect_to(path_str, RedirectKind::Output, scratch);
        let mut scope =
            apply_redirects(&mut state, &mut NoSubstitution, &[r], ApplyMode::Temporary)
                .unwrap();
        fd::write_all(scratch, b"payload").unwrap();
        scope.restore().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "payload");

        let r = redirect_to(path_str, RedirectKind::Input, scratch);
        let mut scope =
            apply_redirects(&mut state, &mut NoSubstitution, &[r], ApplyMode::Temporary)
                .unwrap();
        assert_eq!(fd::read_to_end(scratch), b"payload");
        scope.restore().unwrap();
        fd::close_quietly(scratch);
    }

    #[test]
    fn append_accumulates() {
        let scratch = scratch_fd();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let path_str = path.to_str().unwrap();
        let mut state = ShellState::new();

        for chunk in ["a", "b"] {
            let r = redirect_to(path_str, RedirectKind::Append, scratch);
            let mut scope =
                apply_redirects(&mut state, &mut NoSubstitution, &[r], ApplyMode::Temporary)
                    .unwrap();
            fd::write_all(scratch, chunk.as_bytes()).unwrap();
            scope.restore().unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ab");
        fd::close_quietly(scratch);
    }

    #[test]
    fn noclobber_blocks_overwrite_but_clobber_forces() {
        let scratch = scratch_fd();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x");
        std::fs::write(&path, "old").unwrap();
        let path_str = path.to_str().unwrap();
        let mut state = ShellState::new();
        state.options.noclobber = true;

        let r = redirect_to(path_str, RedirectKind::Output, scratch);
        let err = apply_redirects(&mut state, &mut NoSubstitution, &[r], ApplyMode::Temporary);
        assert!(matches!(err, Err(RedirError::NoClobber { .. })));

        let r = redirect_to(path_str, RedirectKind::OutputClobber, scratch);
        let mut scope =
            apply_redirects(&mut state, &mut NoSubstitution, &[r], ApplyMode::Temporary)
                .unwrap();
        fd::write_all(scratch, b"new").unwrap();
        scope.restore().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        fd::close_quietly(scratch);
    }

    #[test]
    fn heredoc_body_reaches_fd() {
        let scratch = scratch_fd();
        let mut state = ShellState::new();
        let mut r = redirect_to("EOF", RedirectKind::HereDoc { strip_tabs: false }, scratch);
        r.heredoc_content = Some("line one\nline two\n".to_string());
        r.heredoc_quoted = true;
        let mut scope =
            apply_redirects(&mut state, &mut NoSubstitution, &[r], ApplyMode::Temporary)
                .unwrap();
        assert_eq!(fd::read_to_end(scratch), b"line one\nline two\n");
        scope.restore().unwrap();
        fd::close_quietly(scratch);
    }

    #[test]
    fn unquoted_heredoc_expands_variables() {
        let scratch = scratch_fd();
        let mut state = ShellState::new();
        state.assign("USER", "alice").unwrap();
        let mut r = redirect_to("EOF", RedirectKind::HereDoc { strip_tabs: false }, scratch);
        r.heredoc_content = Some("hello $USER\n".to_string());
        let mut scope =
            apply_redirects(&mut state, &mut NoSubstitution, &[r], ApplyMode::Temporary)
                .unwrap();
        assert_eq!(fd::read_to_end(scratch), b"hello alice\n");
        scope.restore().unwrap();
        fd::close_quietly(scratch);
    }

    #[test]
    fn herestring_appends_newline() {
        let scratch = scratch_fd();
        let mut state = ShellState::new();
        let r = redirect_to("hi there", RedirectKind::HereString, scratch);
        let mut scope =
            apply_redirects(&mut state, &mut NoSubstitution, &[r], ApplyMode::Temporary)
                .unwrap();
        assert_eq!(fd::read_to_end(scratch), b"hi there\n");
        scope.restore().unwrap();
        fd::close_quietly(scratch);
    }

    #[test]
    fn dup_requires_open_target() {
        let scratch = scratch_fd();
        let mut state = ShellState::new();
        let mut r = Redirect::new(RedirectKind::DupOutput, RedirectTarget::Fd(123));
        r.source_fd = Some(scratch);
        let err = apply_redirects(&mut state, &mut NoSubstitution, &[r], ApplyMode::Temporary);
        assert!(matches!(err, Err(RedirError::BadFd(123))));
        fd::close_quietly(scratch);
    }

    #[test]
    fn failed_redirect_restores_earlier_ones() {
        let scratch = scratch_fd();
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good");
        let mut state = ShellState::new();

        let r1 = redirect_to(good.to_str().unwrap(), RedirectKind::Output, scratch);
        let mut r2 = Redirect::new(RedirectKind::DupOutput, RedirectTarget::Fd(123));
        r2.source_fd = Some(scratch);

        let err =
            apply_redirects(&mut state, &mut NoSubstitution, &[r1, r2], ApplyMode::Temporary);
        assert!(err.is_err());
        // the scratch descriptor is back on /dev/null: readable, at EOF
        assert!(fd::is_open(scratch));
        assert_eq!(fd::read_to_end(scratch), b"");
        fd::close_quietly(scratch);
    }
}
