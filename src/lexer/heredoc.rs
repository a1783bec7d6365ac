//! Heredoc Collection
//!
//! Heredocs are collected in two passes: when `<<` or `<<-` is scanned the
//! following word registers a pending delimiter; when the line's newline is
//! reached the lexer consumes subsequent lines as heredoc content until the
//! delimiter stands alone on a line. The parser later attaches the collected
//! body to the matching `Redirect` node in source order.

use crate::lexer::LexerError;

/// A heredoc whose delimiter has been seen but whose body has not yet been
/// collected.
#[derive(Debug, Clone)]
pub struct PendingHeredoc {
    pub delimiter: String,
    pub strip_tabs: bool,
    /// Quoted delimiter suppresses expansion of the body
    pub quoted: bool,
}

/// A fully collected heredoc body.
#[derive(Debug, Clone, PartialEq)]
pub struct HeredocDoc {
    pub delimiter: String,
    pub content: String,
    pub strip_tabs: bool,
    pub quoted: bool,
}

/// Collect the body for `pending` from `input` starting at `pos` (the first
/// byte after the newline that ended the command line). Returns the document
/// and the position just past the delimiter line.
pub fn collect_body(
    input: &str,
    pos: usize,
    pending: &PendingHeredoc,
    line: usize,
) -> Result<(HeredocDoc, usize), LexerError> {
    let mut content = String::new();
    let mut cursor = pos;

    loop {
        if cursor >= input.len() {
            return Err(LexerError::unclosed(
                &format!("heredoc `{}`", pending.delimiter),
                line,
            ));
        }
        let line_end = input[cursor..]
            .find('\n')
            .map(|rel| cursor + rel)
            .unwrap_or(input.len());
        let raw_line = &input[cursor..line_end];
        let candidate = if pending.strip_tabs {
            raw_line.trim_start_matches('\t')
        } else {
            raw_line
        };

        if candidate == pending.delimiter {
            let after = if line_end < input.len() { line_end + 1 } else { line_end };
            return Ok((
                HeredocDoc {
                    delimiter: pending.delimiter.clone(),
                    content,
                    strip_tabs: pending.strip_tabs,
                    quoted: pending.quoted,
                },
                after,
            ));
        }

        content.push_str(candidate);
        content.push('\n');

        if line_end >= input.len() {
            return Err(LexerError::unclosed(
                &format!("heredoc `{}`", pending.delimiter),
                line,
            ));
        }
        cursor = line_end + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(delim: &str, strip: bool) -> PendingHeredoc {
        PendingHeredoc {
            delimiter: delim.to_string(),
            strip_tabs: strip,
            quoted: false,
        }
    }

    #[test]
    fn collects_until_delimiter() {
        let input = "hello\nworld\nEOF\nrest";
        let (doc, next) = collect_body(input, 0, &pending("EOF", false), 1).unwrap();
        assert_eq!(doc.content, "hello\nworld\n");
        assert_eq!(&input[next..], "rest");
    }

    #[test]
    fn empty_body() {
        let (doc, next) = collect_body("EOF\n", 0, &pending("EOF", false), 1).unwrap();
        assert_eq!(doc.content, "");
        assert_eq!(next, 4);
    }

    #[test]
    fn strip_tabs_applies_to_content_and_delimiter() {
        let input = "\thello\n\t\tworld\n\tEOF\n";
        let (doc, _) = collect_body(input, 0, &pending("EOF", true), 1).unwrap();
        assert_eq!(doc.content, "hello\nworld\n");
    }

    #[test]
    fn missing_delimiter_errors() {
        assert!(collect_body("hello\n", 0, &pending("EOF", false), 1).is_err());
    }

    #[test]
    fn delimiter_must_stand_alone() {
        let input = "EOF more\nEOF\n";
        let (doc, _) = collect_body(input, 0, &pending("EOF", false), 1).unwrap();
        assert_eq!(doc.content, "EOF more\n");
    }
}
