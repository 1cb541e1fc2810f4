//! Build a document tree from the YAML event stream

use std::collections::{BTreeMap, BTreeSet};

use saphyr_parser::{Event, Parser, ScalarStyle as EventStyle};
use tracing::debug;

use super::comments::{self, CommentMap};
use super::node::{Comments, Document, Entry, Mapping, Mark, Node, Scalar, ScalarStyle, Sequence, Tag};
use crate::error::{MaintainersError, Result};

const CORE_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// Source position of an event
#[derive(Debug, Clone, Copy)]
struct Pos {
    line: usize,
    column: usize,
    index: usize,
}

/// Owned copy of the parser events the tree builder needs
#[derive(Debug)]
enum RawEvent {
    DocumentStart { explicit: bool },
    MappingStart { tag: Option<RawTag>, start: Pos },
    MappingEnd,
    SequenceStart { tag: Option<RawTag>, start: Pos },
    SequenceEnd,
    Scalar {
        value: String,
        style: ScalarStyle,
        tag: Option<RawTag>,
        start: Pos,
        end: Pos,
    },
    Alias { start: Pos },
}

#[derive(Debug, Clone)]
struct RawTag {
    handle: String,
    suffix: String,
}

impl RawEvent {
    /// Start position of events that open a node
    fn node_start(&self) -> Option<Pos> {
        match self {
            Self::MappingStart { start, .. }
            | Self::SequenceStart { start, .. }
            | Self::Scalar { start, .. }
            | Self::Alias { start } => Some(*start),
            _ => None,
        }
    }
}

/// Parse a YAML source into a [`Node::Document`]
///
/// Only single-document sources are accepted; anchors are dropped and
/// aliases are rejected.
pub fn parse(source: &str) -> Result<Node> {
    let chars: Vec<char> = source.chars().collect();
    let events = collect_events(source, &chars)?;
    let comments = scan_comments(source, &chars, &events);
    let attached = attach_comments(source, &events, comments);

    let mut builder = TreeBuilder::new(&chars);
    for (idx, event) in events.into_iter().enumerate() {
        let node_comments = attached.per_event.get(&idx).cloned().unwrap_or_default();
        builder.handle(event, node_comments)?;
    }

    let mut document = builder.finish()?;
    document.head_comments = attached.head;
    document.foot_comments = attached.foot;
    Ok(Node::Document(document))
}

fn collect_events(source: &str, chars: &[char]) -> Result<Vec<RawEvent>> {
    let mut events = Vec::new();

    for item in Parser::new_from_str(source) {
        let (event, span) = item.map_err(|e| MaintainersError::YamlParse {
            message: e.info().to_string(),
            line: e.marker().line(),
            column: e.marker().col() + 1,
        })?;
        let start = Pos {
            line: span.start.line(),
            column: span.start.col() + 1,
            index: span.start.index(),
        };
        let end = Pos {
            line: span.end.line(),
            column: span.end.col() + 1,
            index: span.end.index(),
        };

        let raw = match event {
            Event::DocumentStart(explicit) => RawEvent::DocumentStart { explicit },
            Event::MappingStart(_, tag) => RawEvent::MappingStart {
                tag: tag.as_ref().map(|t| raw_tag(&t.handle, &t.suffix)),
                start,
            },
            Event::MappingEnd => RawEvent::MappingEnd,
            Event::SequenceStart(_, tag) => RawEvent::SequenceStart {
                tag: tag.as_ref().map(|t| raw_tag(&t.handle, &t.suffix)),
                start,
            },
            Event::SequenceEnd => RawEvent::SequenceEnd,
            Event::Scalar(value, style, _, tag) => RawEvent::Scalar {
                value: if is_empty_plain(&value, matches!(style, EventStyle::Plain) && tag.is_none(), chars, start, end) {
                    String::new()
                } else {
                    value.to_string()
                },
                style: convert_style(style),
                tag: tag.as_ref().map(|t| raw_tag(&t.handle, &t.suffix)),
                start,
                end,
            },
            Event::Alias(_) => RawEvent::Alias { start },
            _ => continue,
        };
        events.push(raw);
    }

    Ok(events)
}

/// The parser reports a missing value (`key:`) as a plain `~`; only a `~`
/// that is actually in the source is one
fn is_empty_plain(value: &str, untagged_plain: bool, chars: &[char], start: Pos, end: Pos) -> bool {
    value == "~" && untagged_plain && (start.index == end.index || chars.get(start.index) != Some(&'~'))
}

fn raw_tag(handle: &str, suffix: &str) -> RawTag {
    RawTag {
        handle: handle.to_string(),
        suffix: suffix.to_string(),
    }
}

#[allow(unreachable_patterns)]
fn convert_style(style: EventStyle) -> ScalarStyle {
    match style {
        EventStyle::SingleQuoted => ScalarStyle::SingleQuoted,
        EventStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
        EventStyle::Literal => ScalarStyle::Literal,
        EventStyle::Folded => ScalarStyle::Folded,
        _ => ScalarStyle::Plain,
    }
}

/// Find the comments of the source, skipping lines inside multi-line scalars
fn scan_comments(source: &str, chars: &[char], events: &[RawEvent]) -> CommentMap {
    let lines: Vec<&str> = source.lines().collect();
    let mut skip = BTreeSet::new();

    for event in events {
        if let RawEvent::Scalar { style, start, end, .. } = event {
            match style {
                ScalarStyle::Literal | ScalarStyle::Folded => {
                    let header = block_header_line(&lines, chars, *start);
                    skip.extend(comments::block_scalar_body(source, header));
                }
                _ if end.line > start.line => {
                    skip.extend(start.line + 1..=end.line);
                }
                _ => {}
            }
        }
    }

    comments::scan(source, &skip)
}

/// Line of the `|`/`>` indicator of a block scalar
///
/// The parser marks a block scalar at its first body line, so the header is
/// the closest non-blank line above it.
fn block_header_line(lines: &[&str], chars: &[char], start: Pos) -> usize {
    if matches!(chars.get(start.index), Some('|' | '>')) {
        return start.line;
    }
    (1..start.line)
        .rev()
        .find(|line| lines.get(line - 1).map_or(false, |text| !text.trim().is_empty()))
        .unwrap_or(start.line)
}

#[derive(Debug, Default)]
struct AttachedComments {
    per_event: BTreeMap<usize, Comments>,
    head: Vec<String>,
    foot: Vec<String>,
}

/// Decide which event each comment belongs to
///
/// A full-line comment becomes a head comment of the first node starting
/// below it. A trailing comment becomes the line comment of the last scalar
/// ending on its line, or a head comment of the next node if no scalar ends
/// there. Comments above the first node that a blank line separates from it
/// belong to the document head; whatever is left after the last node is a
/// document foot comment.
fn attach_comments(source: &str, events: &[RawEvent], comments: CommentMap) -> AttachedComments {
    let mut attached = AttachedComments::default();
    let mut full_line = comments.full_line;

    for (line, text) in comments.trailing {
        let owner = events
            .iter()
            .enumerate()
            .filter(|(_, event)| matches!(event, RawEvent::Scalar { end, .. } if end.line == line))
            .map(|(idx, _)| idx)
            .last();
        match owner {
            Some(idx) => {
                attached.per_event.entry(idx).or_default().line = Some(text);
            }
            None => {
                full_line.insert(line, text);
            }
        }
    }

    let starts: Vec<(usize, usize)> = events
        .iter()
        .enumerate()
        .filter_map(|(idx, event)| event.node_start().map(|pos| (idx, pos.line)))
        .collect();

    if let Some(&(_, first_line)) = starts.first() {
        let head_end = source
            .lines()
            .take(first_line.saturating_sub(1))
            .enumerate()
            .filter(|(_, text)| text.trim().is_empty())
            .map(|(idx, _)| idx + 1)
            .last();
        if let Some(blank) = head_end {
            let rest = full_line.split_off(&blank);
            attached.head = std::mem::replace(&mut full_line, rest).into_values().collect();
        }
    }

    for (line, text) in full_line {
        match starts.iter().find(|(_, start_line)| *start_line > line) {
            Some((idx, _)) => attached.per_event.entry(*idx).or_default().head.push(text),
            None => attached.foot.push(text),
        }
    }

    attached
}

fn resolve_scalar_tag(tag: Option<&RawTag>, style: ScalarStyle, value: &str) -> Tag {
    match tag {
        Some(tag) => {
            if tag.handle == "!!" || tag.handle == CORE_TAG_PREFIX {
                Tag::from_core_suffix(&tag.suffix)
                    .unwrap_or_else(|| Tag::Custom(format!("!!{}", tag.suffix)))
            } else if tag.handle == "!" && tag.suffix.is_empty() {
                Tag::Str
            } else {
                Tag::Custom(format!("{}{}", tag.handle, tag.suffix))
            }
        }
        None if style == ScalarStyle::Plain => Tag::resolve_plain(value),
        None => Tag::Str,
    }
}

/// Collection tags are kept only when they are not the core `!!map`/`!!seq`
fn collection_tag(tag: Option<&RawTag>) -> Option<String> {
    let tag = tag?;
    if (tag.handle == "!!" || tag.handle == CORE_TAG_PREFIX)
        && matches!(tag.suffix.as_str(), "map" | "seq")
    {
        return None;
    }
    Some(format!("{}{}", tag.handle, tag.suffix))
}

enum Frame {
    Document(Document),
    Mapping {
        mapping: Mapping,
        pending_key: Option<Scalar>,
    },
    Sequence(Sequence),
}

struct TreeBuilder<'a> {
    chars: &'a [char],
    stack: Vec<Frame>,
    documents: usize,
    /// Stack index of the outermost open flow collection
    flow_root: Option<usize>,
}

impl<'a> TreeBuilder<'a> {
    fn new(chars: &'a [char]) -> Self {
        Self {
            chars,
            stack: Vec::new(),
            documents: 0,
            flow_root: None,
        }
    }

    fn handle(&mut self, event: RawEvent, comments: Comments) -> Result<()> {
        match event {
            RawEvent::DocumentStart { explicit } => {
                self.documents += 1;
                if self.documents > 1 {
                    return Err(MaintainersError::unsupported(
                        "multiple documents in one stream",
                    ));
                }
                self.stack.push(Frame::Document(Document {
                    explicit_start: explicit,
                    ..Document::default()
                }));
            }
            RawEvent::MappingStart { tag, start } => {
                let flow = self.is_flow_start(start);
                let comments = self.redirect_comments(comments);
                if flow && self.flow_root.is_none() {
                    self.flow_root = Some(self.stack.len());
                }
                self.stack.push(Frame::Mapping {
                    mapping: Mapping {
                        tag: collection_tag(tag.as_ref()),
                        flow,
                        entries: Vec::new(),
                        comments,
                    },
                    pending_key: None,
                });
            }
            RawEvent::SequenceStart { tag, start } => {
                let flow = self.is_flow_start(start);
                let comments = self.redirect_comments(comments);
                if flow && self.flow_root.is_none() {
                    self.flow_root = Some(self.stack.len());
                }
                self.stack.push(Frame::Sequence(Sequence {
                    tag: collection_tag(tag.as_ref()),
                    flow,
                    items: Vec::new(),
                    comments,
                }));
            }
            RawEvent::MappingEnd => match self.stack.pop() {
                Some(Frame::Mapping { mapping, pending_key }) => {
                    if let Some(key) = pending_key {
                        return Err(MaintainersError::unsupported(format!(
                            "mapping key '{}' has no value",
                            key.value
                        )));
                    }
                    self.close_collection();
                    self.push_node(Node::Mapping(mapping))?;
                }
                _ => return Err(unbalanced("mapping end")),
            },
            RawEvent::SequenceEnd => match self.stack.pop() {
                Some(Frame::Sequence(sequence)) => {
                    self.close_collection();
                    self.push_node(Node::Sequence(sequence))?;
                }
                _ => return Err(unbalanced("sequence end")),
            },
            RawEvent::Scalar {
                value,
                style,
                tag,
                start,
                ..
            } => {
                let comments = self.redirect_comments(comments);
                let scalar = Scalar {
                    tag: resolve_scalar_tag(tag.as_ref(), style, &value),
                    style,
                    value,
                    mark: Some(Mark {
                        line: start.line,
                        column: start.column,
                    }),
                    comments,
                };
                self.push_node(Node::Scalar(scalar))?;
            }
            RawEvent::Alias { start } => {
                return Err(MaintainersError::unsupported(format!(
                    "alias at line {}, column {}",
                    start.line, start.column
                )));
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Document> {
        match self.stack.pop() {
            None => Ok(Document::default()),
            Some(Frame::Document(document)) if self.stack.is_empty() => Ok(document),
            _ => Err(unbalanced("end of stream")),
        }
    }

    fn is_flow_start(&self, start: Pos) -> bool {
        matches!(self.chars.get(start.index), Some('[' | '{'))
    }

    /// Comments inside a flow collection move to the outermost flow collection,
    /// since flow collections are written back on a single line
    fn redirect_comments(&mut self, comments: Comments) -> Comments {
        let Some(root) = self.flow_root else {
            return comments;
        };
        if comments.is_empty() {
            return comments;
        }

        let target = match self.stack.get_mut(root) {
            Some(Frame::Mapping { mapping, .. }) => &mut mapping.comments,
            Some(Frame::Sequence(sequence)) => &mut sequence.comments,
            _ => return comments,
        };
        target.head.extend(comments.head);
        if let Some(line) = comments.line {
            target.line = Some(match target.line.take() {
                Some(existing) => format!("{} #{}", existing, line),
                None => line,
            });
        }
        Comments::default()
    }

    fn close_collection(&mut self) {
        if self.flow_root == Some(self.stack.len()) {
            self.flow_root = None;
        }
    }

    fn push_node(&mut self, node: Node) -> Result<()> {
        match self.stack.last_mut() {
            Some(Frame::Document(document)) => {
                document.content.push(node);
                Ok(())
            }
            Some(Frame::Sequence(sequence)) => {
                sequence.items.push(node);
                Ok(())
            }
            Some(Frame::Mapping { mapping, pending_key }) => {
                match pending_key.take() {
                    Some(key) => mapping.entries.push(Entry { key, value: node }),
                    None => match node {
                        Node::Scalar(key) => *pending_key = Some(key),
                        other => {
                            return Err(MaintainersError::unsupported(format!(
                                "{} used as a mapping key",
                                other.kind()
                            )))
                        }
                    },
                }
                Ok(())
            }
            None => {
                debug!("Node outside of any document");
                Err(unbalanced("node outside of a document"))
            }
        }
    }
}

fn unbalanced(what: &str) -> MaintainersError {
    MaintainersError::YamlParse {
        message: format!("unbalanced event stream at {}", what),
        line: 0,
        column: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_mapping(node: &Node) -> &Mapping {
        match node {
            Node::Document(doc) => doc.content[0].as_mapping().expect("mapping root"),
            _ => panic!("expected document"),
        }
    }

    #[test]
    fn test_parse_owners_file() {
        let node = parse("approvers:\n  - alice\n  - bob\nreviewers:\n  - carol\n").unwrap();
        let mapping = root_mapping(&node);

        assert_eq!(mapping.len(), 2);
        let approvers = mapping.get("approvers").and_then(Node::as_sequence).unwrap();
        assert_eq!(approvers.scalar_values().collect::<Vec<_>>(), vec!["alice", "bob"]);
        assert!(!approvers.flow);
    }

    #[test]
    fn test_parse_resolves_tags_and_styles() {
        let node = parse("a: 1\nb: '1'\nc:\nd: !!str true\ne: >\n  folded\nf: [x, y]\n").unwrap();
        let mapping = root_mapping(&node);

        let scalar = |key: &str| mapping.get(key).and_then(Node::as_scalar).unwrap().clone();
        assert_eq!(scalar("a").tag, Tag::Int);
        assert_eq!(scalar("b").tag, Tag::Str);
        assert_eq!(scalar("b").style, ScalarStyle::SingleQuoted);
        assert_eq!(scalar("c").tag, Tag::Null);
        assert_eq!(scalar("c").value, "");
        assert_eq!(scalar("d").tag, Tag::Str);
        assert_eq!(scalar("e").style, ScalarStyle::Folded);
        assert_eq!(scalar("e").value, "folded\n");
        assert!(mapping.get("f").and_then(Node::as_sequence).unwrap().flow);
    }

    #[test]
    fn test_parse_attaches_comments() {
        let source = "# owners of pkg\napprovers:\n  - alice # lead\n  # - bob\n  - carol\n# trailer\n";
        let node = parse(source).unwrap();

        let Node::Document(doc) = &node else { panic!("expected document") };
        let mapping = doc.content[0].as_mapping().unwrap();
        assert_eq!(mapping.comments.head, vec![" owners of pkg".to_string()]);

        let approvers = mapping.get("approvers").and_then(Node::as_sequence).unwrap();
        let alice = approvers.items[0].as_scalar().unwrap();
        let carol = approvers.items[1].as_scalar().unwrap();
        assert_eq!(alice.comments.line.as_deref(), Some(" lead"));
        assert_eq!(carol.comments.head, vec![" - bob".to_string()]);
        assert_eq!(doc.foot_comments, vec![" trailer".to_string()]);
    }

    #[test]
    fn test_parse_keeps_missing_and_explicit_nulls_apart() {
        let node = parse("labels:\nnone: ~\nitems:\n  -\n  - ~\n").unwrap();
        let mapping = root_mapping(&node);

        let labels = mapping.get("labels").and_then(Node::as_scalar).unwrap();
        assert_eq!((labels.tag.clone(), labels.value.as_str()), (Tag::Null, ""));
        let none = mapping.get("none").and_then(Node::as_scalar).unwrap();
        assert_eq!((none.tag.clone(), none.value.as_str()), (Tag::Null, "~"));

        let items = mapping.get("items").and_then(Node::as_sequence).unwrap();
        assert_eq!(items.scalar_values().collect::<Vec<_>>(), vec!["", "~"]);
    }

    #[test]
    fn test_parse_block_scalar_lines_are_not_comments() {
        let node = parse("top: |\n  # inside\n  body # too\nafter: 1\n").unwrap();
        let mapping = root_mapping(&node);

        let top = mapping.get("top").and_then(Node::as_scalar).unwrap();
        assert_eq!(top.value, "# inside\nbody # too\n");
        assert!(top.comments.is_empty());
        assert!(mapping.entries[1].key.comments.is_empty());
        let Node::Document(doc) = &node else { panic!("expected document") };
        assert!(doc.foot_comments.is_empty());
    }

    #[test]
    fn test_parse_block_scalar_in_sequence_item() {
        let source = "subprojects:\n  - name: kubelet\n    description: >\n      # not a comment\n    # owners below\n    owners: []\n";
        let node = parse(source).unwrap();
        let mapping = root_mapping(&node);

        let subprojects = mapping.get("subprojects").and_then(Node::as_sequence).unwrap();
        let item = subprojects.items[0].as_mapping().unwrap();
        let description = item.get("description").and_then(Node::as_scalar).unwrap();
        assert_eq!(description.value, "# not a comment\n");
        assert_eq!(item.entries[2].key.comments.head, vec![" owners below".to_string()]);
    }

    #[test]
    fn test_parse_document_head_comments() {
        let source = "# See the OWNERS docs at https://go.k8s.io/owners\n\n# leads\napprovers:\n  - alice\n";
        let node = parse(source).unwrap();
        let Node::Document(doc) = &node else { panic!("expected document") };

        assert_eq!(
            doc.head_comments,
            vec![" See the OWNERS docs at https://go.k8s.io/owners".to_string()]
        );
        let mapping = doc.content[0].as_mapping().unwrap();
        assert_eq!(mapping.comments.head, vec![" leads".to_string()]);
    }

    #[test]
    fn test_parse_empty_source() {
        let node = parse("").unwrap();
        let Node::Document(doc) = node else { panic!("expected document") };
        assert!(doc.content.is_empty());
    }

    #[test]
    fn test_parse_rejects_aliases_and_multiple_documents() {
        assert!(matches!(
            parse("a: &x 1\nb: *x\n"),
            Err(MaintainersError::UnsupportedYaml(_))
        ));
        assert!(matches!(
            parse("a: 1\n---\nb: 2\n"),
            Err(MaintainersError::UnsupportedYaml(_))
        ));
    }

    #[test]
    fn test_parse_reports_syntax_errors() {
        let err = parse("approvers: [alice\n").unwrap_err();
        assert!(matches!(err, MaintainersError::YamlParse { .. }));
    }

    #[test]
    fn test_parse_records_marks() {
        let node = parse("url: https://example.com\n").unwrap();
        let mapping = root_mapping(&node);
        let value = mapping.get("url").and_then(Node::as_scalar).unwrap();
        assert_eq!(value.mark, Some(Mark { line: 1, column: 6 }));
    }
}
