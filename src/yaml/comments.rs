//! Comment recovery for the document tree
//!
//! The event parser drops comments, so they are recovered from the source
//! text line by line. Lines that belong to multi-line scalar bodies are
//! skipped; everything else is checked for a `#` that starts a comment.

use std::collections::{BTreeMap, BTreeSet};

/// Comments found in a source text, keyed by 1-based line number
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CommentMap {
    /// Lines holding nothing but a comment
    pub full_line: BTreeMap<usize, String>,
    /// Comments trailing some content on their line
    pub trailing: BTreeMap<usize, String>,
}

/// Scan `source` for comments, ignoring the lines in `skip`
pub(crate) fn scan(source: &str, skip: &BTreeSet<usize>) -> CommentMap {
    let mut map = CommentMap::default();

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        if skip.contains(&line_no) {
            continue;
        }

        let Some(pos) = find_comment_start(line) else {
            continue;
        };
        let text = line[pos + 1..].trim_end().to_string();
        if line[..pos].trim().is_empty() {
            map.full_line.insert(line_no, text);
        } else {
            map.trailing.insert(line_no, text);
        }
    }

    map
}

/// Lines belonging to the body of a block scalar whose header sits on `header_line`
///
/// The body is every following line that is blank or indented deeper than
/// the node owning the scalar.
pub(crate) fn block_scalar_body(source: &str, header_line: usize) -> Vec<usize> {
    let lines: Vec<&str> = source.lines().collect();
    let Some(header) = lines.get(header_line.wrapping_sub(1)) else {
        return Vec::new();
    };
    let header_indent = owner_indentation(header);

    let mut body = Vec::new();
    let mut trailing_blank = Vec::new();
    for (idx, line) in lines.iter().enumerate().skip(header_line) {
        if line.trim().is_empty() {
            trailing_blank.push(idx + 1);
            continue;
        }
        if indentation(line) <= header_indent {
            break;
        }
        body.append(&mut trailing_blank);
        body.push(idx + 1);
    }
    body
}

fn indentation(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

/// Column of the node a block scalar header belongs to
///
/// In `- key: |` that is the key, one level right of the dash; in `- |` it
/// is the dash itself.
fn owner_indentation(line: &str) -> usize {
    let mut col = indentation(line);
    let mut rest = &line[col..];
    while let Some(after) = rest.strip_prefix('-') {
        let item = after.trim_start_matches(' ');
        if item.len() == after.len() || item.starts_with(['|', '>']) {
            break;
        }
        col += rest.len() - item.len();
        rest = item;
    }
    col
}

/// Byte offset of the `#` starting a comment on `line`, if any
fn find_comment_start(line: &str) -> Option<usize> {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut prev: Option<char> = None;
    let mut last_significant: Option<char> = None;
    let mut chars = line.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if in_double {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_double = false;
            }
        } else if in_single {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                } else {
                    in_single = false;
                }
            }
        } else {
            match c {
                '#' if prev.map_or(true, char::is_whitespace) => return Some(pos),
                '"' | '\'' if quote_may_open(prev, last_significant) => {
                    if c == '"' {
                        in_double = true;
                    } else {
                        in_single = true;
                    }
                }
                _ => {}
            }
        }

        prev = Some(c);
        if !c.is_whitespace() {
            last_significant = Some(c);
        }
    }

    None
}

/// A quote only starts a quoted scalar where a new token may begin
fn quote_may_open(prev: Option<char>, last_significant: Option<char>) -> bool {
    match prev {
        None => true,
        Some('[' | '{' | ',') => true,
        Some(c) if c.is_whitespace() => {
            matches!(last_significant, None | Some('-' | ':' | '[' | '{' | ',' | '?'))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_line_and_trailing_comments() {
        let source = "# header\napprovers:\n  - alice # lead\n  # - bob\n";
        let map = scan(source, &BTreeSet::new());

        assert_eq!(map.full_line.get(&1).map(String::as_str), Some(" header"));
        assert_eq!(map.full_line.get(&4).map(String::as_str), Some(" - bob"));
        assert_eq!(map.trailing.get(&3).map(String::as_str), Some(" lead"));
        assert!(map.trailing.get(&2).is_none());
    }

    #[test]
    fn test_hash_inside_quotes_or_words_is_not_a_comment() {
        assert_eq!(find_comment_start(r#"title: "issue #42""#), None);
        assert_eq!(find_comment_start("title: 'it''s #1'"), None);
        assert_eq!(find_comment_start("channel: sig#apps"), None);
        assert_eq!(find_comment_start("note: don't # really"), Some(12));
    }

    #[test]
    fn test_skipped_lines_are_ignored() {
        let source = "script: |\n  # not a comment\n  echo\n";
        let skip: BTreeSet<usize> = block_scalar_body(source, 1).into_iter().collect();
        assert_eq!(skip, BTreeSet::from([2, 3]));

        let map = scan(source, &skip);
        assert!(map.full_line.is_empty());
    }

    #[test]
    fn test_block_scalar_body_stops_at_dedent() {
        let source = "a: |\n  one\n\n  two\n# after\nb: c\n";
        assert_eq!(block_scalar_body(source, 1), vec![2, 3, 4]);
    }

    #[test]
    fn test_block_scalar_body_in_sequence_items() {
        let source = "- name: |\n    text\n  other: x # note\n- |\n  # kept\n";
        assert_eq!(block_scalar_body(source, 1), vec![2]);
        assert_eq!(block_scalar_body(source, 4), vec![5]);
        assert_eq!(owner_indentation("  - - key: >"), 6);
        assert_eq!(owner_indentation("-value: |"), 0);
    }
}
