//! Serialize a document tree back to YAML text

use super::node::{Comments, Document, Mapping, Node, Scalar, ScalarStyle, Sequence, Tag};
use crate::error::{MaintainersError, Result};

/// Smallest and largest indentation accepted by [`serialize`]
pub const MIN_INDENT: usize = 2;
pub const MAX_INDENT: usize = 9;

/// Serialize `node` with block collections indented by `indent` spaces
pub fn serialize(node: &Node, indent: usize) -> Result<String> {
    if !(MIN_INDENT..=MAX_INDENT).contains(&indent) {
        return Err(MaintainersError::config(format!(
            "indent must be between {} and {}, got {}",
            MIN_INDENT, MAX_INDENT, indent
        )));
    }

    let mut emitter = Emitter::new(indent);
    match node {
        Node::Document(document) => emitter.document(document)?,
        other => emitter.root(other)?,
    }
    Ok(emitter.out)
}

struct Emitter {
    out: String,
    indent: usize,
    /// Line comments waiting for the end of the current line
    pending: Vec<String>,
}

impl Emitter {
    fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
            pending: Vec::new(),
        }
    }

    fn document(&mut self, document: &Document) -> Result<()> {
        if document.explicit_start {
            self.out.push_str("---");
            self.newline();
        }
        if !document.head_comments.is_empty() {
            self.head_comments(&document.head_comments, 0);
            self.newline();
        }
        for node in &document.content {
            self.root(node)?;
        }
        self.head_comments(&document.foot_comments, 0);
        Ok(())
    }

    fn root(&mut self, node: &Node) -> Result<()> {
        match node {
            Node::Document(_) => Err(MaintainersError::YamlEmit(
                "document nested inside a document".to_string(),
            )),
            Node::Mapping(mapping) if is_block_mapping(mapping) => {
                self.head_comments(&mapping.comments.head, 0);
                self.write_collection_tag(mapping.tag.as_deref(), 0)?;
                self.mapping_block(mapping, 0, false)
            }
            Node::Sequence(sequence) if is_block_sequence(sequence) => {
                self.head_comments(&sequence.comments.head, 0);
                self.write_collection_tag(sequence.tag.as_deref(), 0)?;
                self.sequence_block(sequence, 0, false)
            }
            Node::Scalar(scalar) => {
                self.head_comments(&scalar.comments.head, 0);
                self.inline_or_block_scalar(scalar, 0, false)
            }
            other => {
                if let Some(comments) = other.comments() {
                    self.head_comments(&comments.head, 0);
                }
                let text = flow_text(other);
                self.out.push_str(&text);
                self.queue_line_comment(other.comments());
                self.newline();
                Ok(())
            }
        }
    }

    /// Write a block mapping whose entries start at column `col`
    ///
    /// With `first_inline` the first key continues the current line (after `- `).
    fn mapping_block(&mut self, mapping: &Mapping, col: usize, first_inline: bool) -> Result<()> {
        for (idx, entry) in mapping.entries.iter().enumerate() {
            if !(idx == 0 && first_inline) {
                self.head_comments(&entry.key.comments.head, col);
                self.spaces(col);
            }
            self.out.push_str(&key_text(&entry.key));
            self.out.push(':');
            self.queue(entry.key.comments.line.as_deref());
            self.value(&entry.value, col)?;
        }
        Ok(())
    }

    /// Write the value of a mapping entry whose key sits at column `col`
    fn value(&mut self, value: &Node, col: usize) -> Result<()> {
        let child = col + self.indent;
        match value {
            Node::Document(_) => Err(MaintainersError::YamlEmit(
                "document used as a mapping value".to_string(),
            )),
            Node::Scalar(scalar) => {
                if !is_empty_null(scalar) {
                    self.out.push(' ');
                }
                self.inline_or_block_scalar(scalar, child, false)
            }
            Node::Mapping(mapping) if is_block_mapping(mapping) => {
                self.write_tag_suffix(mapping.tag.as_deref());
                self.queue(mapping.comments.line.as_deref());
                self.newline();
                self.head_comments(&mapping.comments.head, child);
                self.mapping_block(mapping, child, false)
            }
            Node::Sequence(sequence) if is_block_sequence(sequence) => {
                self.write_tag_suffix(sequence.tag.as_deref());
                self.queue(sequence.comments.line.as_deref());
                self.newline();
                self.head_comments(&sequence.comments.head, child);
                self.sequence_block(sequence, child, false)
            }
            other => {
                self.out.push(' ');
                self.out.push_str(&flow_text(other));
                self.queue_line_comment(other.comments());
                self.newline();
                Ok(())
            }
        }
    }

    /// Write a block sequence whose dashes sit at column `col`
    fn sequence_block(&mut self, sequence: &Sequence, col: usize, first_inline: bool) -> Result<()> {
        let child = col + 2;
        for (idx, item) in sequence.items.iter().enumerate() {
            if !(idx == 0 && first_inline) {
                self.item_head_comments(item, col);
                self.spaces(col);
            }
            self.out.push('-');

            match item {
                Node::Document(_) => {
                    return Err(MaintainersError::YamlEmit(
                        "document used as a sequence item".to_string(),
                    ))
                }
                Node::Scalar(scalar) => {
                    if !is_empty_null(scalar) {
                        self.out.push(' ');
                    }
                    self.inline_or_block_scalar(scalar, col + self.indent, false)?;
                }
                Node::Mapping(mapping) if is_block_mapping(mapping) => {
                    if let Some(tag) = mapping.tag.as_deref() {
                        self.write_tag_suffix(Some(tag));
                        self.newline();
                        self.mapping_block(mapping, child, false)?;
                    } else {
                        self.out.push(' ');
                        self.queue(mapping.comments.line.as_deref());
                        self.mapping_block(mapping, child, true)?;
                    }
                }
                Node::Sequence(nested) if is_block_sequence(nested) => {
                    if let Some(tag) = nested.tag.as_deref() {
                        self.write_tag_suffix(Some(tag));
                        self.newline();
                        self.sequence_block(nested, child, false)?;
                    } else {
                        self.out.push(' ');
                        self.queue(nested.comments.line.as_deref());
                        self.sequence_block(nested, child, true)?;
                    }
                }
                other => {
                    self.out.push(' ');
                    self.out.push_str(&flow_text(other));
                    self.queue_line_comment(other.comments());
                    self.newline();
                }
            }
        }
        Ok(())
    }

    /// Head comments of a sequence item, including those of a collection's
    /// first child when that child shares the `- ` line
    fn item_head_comments(&mut self, item: &Node, col: usize) {
        let Some(comments) = item.comments() else {
            return;
        };
        self.head_comments(&comments.head, col);
        match item {
            Node::Mapping(mapping) if is_block_mapping(mapping) && mapping.tag.is_none() => {
                if let Some(first) = mapping.entries.first() {
                    self.head_comments(&first.key.comments.head, col);
                }
            }
            Node::Sequence(nested) if is_block_sequence(nested) && nested.tag.is_none() => {
                if let Some(first) = nested.items.first() {
                    self.item_head_comments(first, col);
                }
            }
            _ => {}
        }
    }

    /// Write a scalar on the current line; block scalars continue with a body
    /// indented to `body_col`
    fn inline_or_block_scalar(&mut self, scalar: &Scalar, body_col: usize, is_key: bool) -> Result<()> {
        let style = choose_style(scalar, false, is_key);
        if let Some(tag) = explicit_tag(scalar, style) {
            self.out.push_str(&tag);
            self.out.push(' ');
        }

        match style {
            ScalarStyle::Literal | ScalarStyle::Folded => {
                self.block_scalar(scalar, style, body_col);
            }
            _ => {
                self.out.push_str(&render(&scalar.value, style));
                self.queue(scalar.comments.line.as_deref());
                self.newline();
            }
        }
        Ok(())
    }

    fn block_scalar(&mut self, scalar: &Scalar, style: ScalarStyle, body_col: usize) {
        let value = scalar.value.as_str();
        let content = value.trim_end_matches('\n');
        let trailing = value.len() - content.len();

        self.out.push(if style == ScalarStyle::Literal { '|' } else { '>' });
        if content.starts_with(' ') || content.starts_with('\n') {
            self.out.push_str(&self.indent.to_string());
        }
        match trailing {
            0 => self.out.push('-'),
            1 => {}
            _ => self.out.push('+'),
        }
        self.queue(scalar.comments.line.as_deref());
        self.newline();

        let segments: Vec<&str> = content.split('\n').collect();
        for (idx, segment) in segments.iter().enumerate() {
            if !segment.is_empty() {
                self.spaces(body_col);
                self.out.push_str(segment);
            }
            self.newline();
            // a single line break between two folded lines needs an empty line
            if style == ScalarStyle::Folded && !segment.is_empty() && idx + 1 < segments.len() {
                self.newline();
            }
        }
        for _ in 1..trailing {
            self.newline();
        }
    }

    fn head_comments(&mut self, head: &[String], col: usize) {
        for comment in head {
            self.spaces(col);
            self.out.push('#');
            self.out.push_str(comment);
            self.newline();
        }
    }

    fn write_collection_tag(&mut self, tag: Option<&str>, col: usize) -> Result<()> {
        if let Some(tag) = tag {
            self.spaces(col);
            self.out.push_str(tag);
            self.newline();
        }
        Ok(())
    }

    fn write_tag_suffix(&mut self, tag: Option<&str>) {
        if let Some(tag) = tag {
            self.out.push(' ');
            self.out.push_str(tag);
        }
    }

    fn queue(&mut self, comment: Option<&str>) {
        if let Some(comment) = comment {
            self.pending.push(comment.to_string());
        }
    }

    fn queue_line_comment(&mut self, comments: Option<&Comments>) {
        if let Some(comments) = comments {
            self.queue(comments.line.as_deref());
        }
    }

    fn spaces(&mut self, count: usize) {
        self.out.extend(std::iter::repeat(' ').take(count));
    }

    /// End the current line, flushing queued line comments first
    fn newline(&mut self) {
        for comment in self.pending.drain(..) {
            self.out.push_str(" #");
            self.out.push_str(&comment);
        }
        self.out.push('\n');
    }
}

fn is_block_mapping(mapping: &Mapping) -> bool {
    !mapping.flow && !mapping.entries.is_empty()
}

fn is_block_sequence(sequence: &Sequence) -> bool {
    !sequence.flow && !sequence.items.is_empty()
}

fn is_empty_null(scalar: &Scalar) -> bool {
    scalar.tag == Tag::Null && scalar.value.is_empty()
}

/// Single-line rendering of a collection or scalar
fn flow_text(node: &Node) -> String {
    match node {
        Node::Document(document) => document
            .content
            .first()
            .map(flow_text)
            .unwrap_or_default(),
        Node::Mapping(mapping) => {
            let entries: Vec<String> = mapping
                .entries
                .iter()
                .map(|entry| format!("{}: {}", flow_scalar(&entry.key), flow_text(&entry.value)))
                .collect();
            with_tag(mapping.tag.as_deref(), format!("{{{}}}", entries.join(", ")))
        }
        Node::Sequence(sequence) => {
            let items: Vec<String> = sequence.items.iter().map(flow_text).collect();
            with_tag(sequence.tag.as_deref(), format!("[{}]", items.join(", ")))
        }
        Node::Scalar(scalar) => flow_scalar(scalar),
    }
}

fn with_tag(tag: Option<&str>, text: String) -> String {
    match tag {
        Some(tag) => format!("{} {}", tag, text),
        None => text,
    }
}

fn flow_scalar(scalar: &Scalar) -> String {
    if is_empty_null(scalar) {
        return "null".to_string();
    }
    let style = choose_style(scalar, true, false);
    let text = render(&scalar.value, style);
    match explicit_tag(scalar, style) {
        Some(tag) => format!("{} {}", tag, text),
        None => text,
    }
}

fn key_text(key: &Scalar) -> String {
    if is_empty_null(key) {
        return "\"\"".to_string();
    }
    let style = choose_style(key, false, true);
    let text = render(&key.value, style);
    match explicit_tag(key, style) {
        Some(tag) => format!("{} {}", tag, text),
        None => text,
    }
}

/// Pick the closest style to the original that still represents the value
fn choose_style(scalar: &Scalar, flow: bool, is_key: bool) -> ScalarStyle {
    let value = scalar.value.as_str();
    let block_allowed = !flow && !is_key;

    match scalar.style {
        ScalarStyle::Literal if block_allowed && literal_ok(value) => return ScalarStyle::Literal,
        ScalarStyle::Folded if block_allowed && folded_ok(value) => return ScalarStyle::Folded,
        ScalarStyle::Folded if block_allowed && literal_ok(value) => return ScalarStyle::Literal,
        ScalarStyle::Plain if plain_ok(scalar, flow) => return ScalarStyle::Plain,
        ScalarStyle::SingleQuoted if single_quoted_ok(value) => return ScalarStyle::SingleQuoted,
        ScalarStyle::DoubleQuoted => return ScalarStyle::DoubleQuoted,
        _ => {}
    }

    if value.contains('\n') && block_allowed && literal_ok(value) {
        ScalarStyle::Literal
    } else if plain_ok(scalar, flow) {
        ScalarStyle::Plain
    } else {
        ScalarStyle::DoubleQuoted
    }
}

/// Tag text to print in front of a scalar, when the style alone would not
/// resolve back to the same tag
fn explicit_tag(scalar: &Scalar, style: ScalarStyle) -> Option<String> {
    match &scalar.tag {
        Tag::Custom(tag) => Some(tag.clone()),
        Tag::Str => None,
        core => {
            if style == ScalarStyle::Plain && Tag::resolve_plain(&scalar.value) == *core {
                None
            } else {
                Some(core.to_string())
            }
        }
    }
}

fn plain_ok(scalar: &Scalar, flow: bool) -> bool {
    let value = scalar.value.as_str();
    if value.is_empty() {
        return scalar.tag == Tag::Null && !flow;
    }
    if let Tag::Custom(_) = scalar.tag {
        // the explicit tag decides the type, only the syntax matters
    } else if Tag::resolve_plain(value) != scalar.tag {
        return false;
    }

    if value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace) {
        return false;
    }
    if value.chars().any(|c| c.is_control()) {
        return false;
    }
    if value.starts_with("---") || value.starts_with("...") {
        return false;
    }

    let mut chars = value.chars();
    let first = chars.next().unwrap_or(' ');
    let second = chars.next();
    match first {
        '-' | '?' | ':' => {
            if second.map_or(true, |c| c.is_whitespace() || (flow && is_flow_indicator(c))) {
                return false;
            }
        }
        ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"' | '%'
        | '@' | '`' => return false,
        _ => {}
    }

    if value.contains(": ") || value.contains(" #") || value.ends_with(':') {
        return false;
    }
    if flow && (value.chars().any(is_flow_indicator) || value.contains(":")) {
        return false;
    }
    true
}

fn is_flow_indicator(c: char) -> bool {
    matches!(c, ',' | '[' | ']' | '{' | '}')
}

fn single_quoted_ok(value: &str) -> bool {
    !value.chars().any(|c| c.is_control())
}

fn literal_ok(value: &str) -> bool {
    !value.trim().is_empty()
        && !value.contains('\r')
        && !value.chars().any(|c| c.is_control() && c != '\n' && c != '\t')
}

fn folded_ok(value: &str) -> bool {
    literal_ok(value)
        && !value
            .split('\n')
            .any(|line| line.starts_with(' ') || line.starts_with('\t'))
}

/// Render a non-block scalar in the given style
fn render(value: &str, style: ScalarStyle) -> String {
    match style {
        ScalarStyle::Plain => value.to_string(),
        ScalarStyle::SingleQuoted => format!("'{}'", value.replace('\'', "''")),
        _ => double_quote(value),
    }
}

fn double_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() && (c as u32) <= 0xFF => out.push_str(&format!("\\x{:02X}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
