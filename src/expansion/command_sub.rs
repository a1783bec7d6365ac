//! Command Substitution Output Handling
//!
//! The executor captures a child's stdout through a real pipe; this module
//! owns the POSIX post-processing: strip trailing newlines, and remove
//! embedded NUL bytes (POSIX leaves them unspecified; removal matches
//! common shells).

/// Post-process captured output into the substitution value.
pub fn substitute_output(raw: &[u8]) -> String {
    let text: String = String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| *c != '\0')
        .collect();
    text.trim_end_matches('\n').to_string()
}
