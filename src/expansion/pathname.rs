//! Pathname Expansion
//!
//! Globbing over the filesystem. Plain patterns go through the `glob`
//! crate; extglob patterns fall back to regex-matching directory entries.
//! `noglob` skips this stage entirely (handled by the caller); `nullglob`
//! turns a no-match into zero words, `failglob` into an error, and the
//! default keeps the literal text.

use crate::expansion::pattern::{compile_pattern, has_glob_chars, PatternOptions};
use crate::expansion::ExpansionError;
use crate::state::ShellState;
use std::path::Path;

/// Expand one field. `text` is the literal form (quote removal applied),
/// `pattern` the globbing form (quoted characters escaped).
pub fn expand_pathnames(
    state: &ShellState,
    text: &str,
    pattern: &str,
) -> Result<Vec<String>, ExpansionError> {
    let opts = &state.options;
    if opts.noglob || !has_glob_chars(pattern, opts.extglob) {
        return Ok(vec![text.to_string()]);
    }

    let matches = if opts.extglob && has_extglob_construct(pattern) {
        extglob_matches(state, pattern)
    } else {
        glob_matches(state, pattern)
    };

    let mut matches = matches;
    matches.sort();

    if matches.is_empty() {
        if opts.failglob {
            return Err(ExpansionError::NoMatch(text.to_string()));
        }
        if opts.nullglob {
            return Ok(Vec::new());
        }
        return Ok(vec![text.to_string()]);
    }
    Ok(matches)
}

fn has_extglob_construct(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    (0..bytes.len().saturating_sub(1)).any(|i| {
        matches!(bytes[i], b'?' | b'*' | b'+' | b'@' | b'!') && bytes[i + 1] == b'('
    })
}

fn glob_matches(state: &ShellState, pattern: &str) -> Vec<String> {
    let options = glob::MatchOptions {
        case_sensitive: !state.options.nocaseglob,
        require_literal_separator: true,
        require_literal_leading_dot: !state.options.dotglob,
    };
    match glob::glob_with(pattern, options) {
        Ok(paths) => paths
            .filter_map(|entry| entry.ok())
            .map(|path| path.to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Extglob fallback: regex-match entries of the containing directory.
/// Patterns with extended constructs across `/` boundaries are not
/// supported and match nothing.
fn extglob_matches(state: &ShellState, pattern: &str) -> Vec<String> {
    let (dir, leaf) = match pattern.rfind('/') {
        Some(idx) => (&pattern[..idx + 1], &pattern[idx + 1..]),
        None => ("", pattern),
    };
    if has_extglob_construct(dir) || has_glob_chars(dir, false) {
        return Vec::new();
    }

    let opts = PatternOptions {
        extglob: true,
        case_insensitive: state.options.nocaseglob,
    };
    let Some(re) = compile_pattern(leaf, opts) else {
        return Vec::new();
    };

    let read_dir = if dir.is_empty() { Path::new(".") } else { Path::new(dir) };
    let Ok(entries) = std::fs::read_dir(read_dir) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') && !state.options.dotglob && !leaf.starts_with('.') {
            continue;
        }
        if re.is_match(&name) {
            out.push(format!("{dir}{name}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn setup() -> (tempfile::TempDir, ShellState) {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.rs", ".hidden"] {
            File::create(dir.path().join(name)).unwrap();
        }
        (dir, ShellState::new())
    }

    fn names(results: Vec<String>) -> Vec<String> {
        results
            .into_iter()
            .map(|p| {
                Path::new(&p)
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn star_matches_visible_files() {
        let (dir, state) = setup();
        let pat = format!("{}/*.txt", dir.path().display());
        let got = names(expand_pathnames(&state, &pat, &pat).unwrap());
        assert_eq!(got, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn hidden_files_need_dotglob() {
        let (dir, mut state) = setup();
        let pat = format!("{}/*", dir.path().display());
        let without = names(expand_pathnames(&state, &pat, &pat).unwrap());
        assert!(!without.contains(&".hidden".to_string()));

        state.options.dotglob = true;
        let with = names(expand_pathnames(&state, &pat, &pat).unwrap());
        assert!(with.contains(&".hidden".to_string()));
    }

    #[test]
    fn no_match_keeps_literal_by_default() {
        let (dir, state) = setup();
        let pat = format!("{}/*.zip", dir.path().display());
        assert_eq!(expand_pathnames(&state, &pat, &pat).unwrap(), vec![pat]);
    }

    #[test]
    fn nullglob_drops_no_match() {
        let (dir, mut state) = setup();
        state.options.nullglob = true;
        let pat = format!("{}/*.zip", dir.path().display());
        assert!(expand_pathnames(&state, &pat, &pat).unwrap().is_empty());
    }

    #[test]
    fn failglob_errors_on_no_match() {
        let (dir, mut state) = setup();
        state.options.failglob = true;
        let pat = format!("{}/*.zip", dir.path().display());
        assert!(expand_pathnames(&state, &pat, &pat).is_err());
    }

    #[test]
    fn noglob_returns_text() {
        let (dir, mut state) = setup();
        state.options.noglob = true;
        let pat = format!("{}/*.txt", dir.path().display());
        assert_eq!(expand_pathnames(&state, &pat, &pat).unwrap(), vec![pat]);
    }

    #[test]
    fn non_glob_text_passes_through() {
        let state = ShellState::new();
        assert_eq!(
            expand_pathnames(&state, "plain.txt", "plain.txt").unwrap(),
            vec!["plain.txt"]
        );
    }

    #[test]
    fn extglob_directory_fallback() {
        let (dir, mut state) = setup();
        state.options.extglob = true;
        let pat = format!("{}/@(a|b).txt", dir.path().display());
        let got = names(expand_pathnames(&state, &pat, &pat).unwrap());
        assert_eq!(got, vec!["a.txt", "b.txt"]);
    }
}
