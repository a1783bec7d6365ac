//! Word Splitting
//!
//! IFS-driven field splitting over expanded segments. Whitespace IFS
//! characters trim and collapse; non-whitespace IFS characters make one
//! field boundary per occurrence (preserving empty fields). Quoted segments
//! never split and glue onto adjacent fields; a quoted empty string still
//! anchors an empty field.

/// One expanded piece of a word, before field splitting.
#[derive(Debug, Clone)]
pub struct Segment {
    pub text: String,
    /// Unquoted expansion results split; literals and quoted text do not
    pub splittable: bool,
    pub quoted: bool,
    /// A hard boundary from `"$@"`: always starts a new field
    pub field_break: bool,
}

impl Segment {
    pub fn literal(text: impl Into<String>, quoted: bool) -> Self {
        Segment {
            text: text.into(),
            splittable: false,
            quoted,
            field_break: false,
        }
    }

    pub fn expansion(text: impl Into<String>, splittable: bool, quoted: bool) -> Self {
        Segment {
            text: text.into(),
            splittable,
            quoted,
            field_break: false,
        }
    }

    pub fn field_break() -> Self {
        Segment {
            text: String::new(),
            splittable: false,
            quoted: true,
            field_break: true,
        }
    }
}

/// Split one string by IFS rules, reporting whether the value started or
/// ended on a delimiter (the callers use this to glue adjacent segments).
#[derive(Debug, Clone, PartialEq)]
pub struct SplitResult {
    pub fields: Vec<String>,
    pub leading_delim: bool,
    pub trailing_delim: bool,
}

pub fn split_by_ifs(value: &str, ifs: &str) -> SplitResult {
    if ifs.is_empty() || value.is_empty() {
        return SplitResult {
            fields: if value.is_empty() {
                Vec::new()
            } else {
                vec![value.to_string()]
            },
            leading_delim: false,
            trailing_delim: false,
        };
    }

    let ws: Vec<char> = ifs.chars().filter(|c| c.is_whitespace()).collect();
    let hard: Vec<char> = ifs.chars().filter(|c| !c.is_whitespace()).collect();

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut seen_field = false;
    let chars: Vec<char> = value.chars().collect();
    let leading_delim = chars.first().is_some_and(|c| ifs.contains(*c));
    let trailing_delim = chars.last().is_some_and(|c| ifs.contains(*c));

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if ws.contains(&c) {
            // Whitespace run: one boundary, however long
            if seen_field || !current.is_empty() {
                fields.push(std::mem::take(&mut current));
                seen_field = false;
            }
            while i < chars.len() && ws.contains(&chars[i]) {
                i += 1;
            }
            // Whitespace around a hard separator folds into it
            if i < chars.len() && hard.contains(&chars[i]) {
                continue;
            }
        } else if hard.contains(&c) {
            // Hard separator: always terminates a field (possibly empty)
            fields.push(std::mem::take(&mut current));
            seen_field = false;
            i += 1;
            while i < chars.len() && ws.contains(&chars[i]) {
                i += 1;
            }
        } else {
            current.push(c);
            seen_field = true;
            i += 1;
        }
    }
    if seen_field || !current.is_empty() {
        fields.push(current);
    }

    SplitResult {
        fields,
        leading_delim,
        trailing_delim,
    }
}

/// Join expanded segments into fields, splitting only where allowed.
pub fn split_segments(segments: &[Segment], ifs: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut have_current = false;

    for segment in segments {
        if segment.field_break {
            if have_current {
                fields.push(std::mem::take(&mut current));
            }
            current = String::new();
            have_current = true;
            continue;
        }
        if !segment.splittable {
            if !segment.text.is_empty() || segment.quoted {
                have_current = true;
            }
            current.push_str(&segment.text);
            continue;
        }

        let result = split_by_ifs(&segment.text, ifs);
        if result.fields.is_empty() {
            // Expansion was pure delimiters: break the field but emit none
            if (result.leading_delim || result.trailing_delim) && have_current {
                fields.push(std::mem::take(&mut current));
                have_current = false;
            }
            continue;
        }
        for (idx, piece) in result.fields.iter().enumerate() {
            let first = idx == 0;
            if first && !result.leading_delim {
                current.push_str(piece);
                have_current = true;
            } else {
                if have_current {
                    fields.push(std::mem::take(&mut current));
                }
                current = piece.clone();
                have_current = true;
            }
        }
        if result.trailing_delim {
            fields.push(std::mem::take(&mut current));
            have_current = false;
        }
    }

    if have_current {
        fields.push(current);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    const IFS: &str = " \t\n";

    #[test]
    fn whitespace_collapses() {
        let r = split_by_ifs("  a   b  ", IFS);
        assert_eq!(r.fields, vec!["a", "b"]);
        assert!(r.leading_delim);
        assert!(r.trailing_delim);
    }

    #[test]
    fn hard_separator_preserves_empty_fields() {
        let r = split_by_ifs("a::b", ":");
        assert_eq!(r.fields, vec!["a", "", "b"]);
        let r = split_by_ifs(":a", ":");
        assert_eq!(r.fields, vec!["", "a"]);
    }

    #[test]
    fn mixed_ifs() {
        // whitespace folds into an adjacent hard separator
        let r = split_by_ifs("a : b", ": ");
        assert_eq!(r.fields, vec!["a", "b"]);
    }

    #[test]
    fn empty_ifs_disables_splitting() {
        let r = split_by_ifs("a b c", "");
        assert_eq!(r.fields, vec!["a b c"]);
    }

    #[test]
    fn literal_only_segments_do_not_split() {
        let segs = vec![Segment::literal("a b", false)];
        assert_eq!(split_segments(&segs, IFS), vec!["a b"]);
    }

    #[test]
    fn splittable_segment_splits() {
        let segs = vec![Segment::expansion("1 2 3", true, false)];
        assert_eq!(split_segments(&segs, IFS), vec!["1", "2", "3"]);
    }

    #[test]
    fn quoted_glues_to_last_field() {
        // $a"$b" with a="1 2", b="3 4"
        let segs = vec![
            Segment::expansion("1 2", true, false),
            Segment::expansion("3 4", false, true),
        ];
        assert_eq!(split_segments(&segs, IFS), vec!["1", "23 4"]);
    }

    #[test]
    fn empty_expansion_produces_nothing() {
        let segs = vec![Segment::expansion("", true, false)];
        assert!(split_segments(&segs, IFS).is_empty());
    }

    #[test]
    fn quoted_empty_keeps_a_field() {
        let segs = vec![Segment::literal("", true)];
        assert_eq!(split_segments(&segs, IFS), vec![""]);
    }

    #[test]
    fn field_breaks_from_at_expansion() {
        // "x$@y" with params [a, b]: prefix glues to first, suffix to last
        let segs = vec![
            Segment::literal("x", true),
            Segment::literal("a", true),
            Segment::field_break(),
            Segment::literal("b", true),
            Segment::literal("y", true),
        ];
        assert_eq!(split_segments(&segs, IFS), vec!["xa", "by"]);
    }

    #[test]
    fn trailing_delimiter_breaks_field() {
        // $a"q" with a="1 " splits after 1
        let segs = vec![
            Segment::expansion("1 ", true, false),
            Segment::expansion("q", false, true),
        ];
        assert_eq!(split_segments(&segs, IFS), vec!["1", "q"]);
    }
}
