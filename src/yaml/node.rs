//! Generic YAML document tree
//!
//! Nodes keep their kind, tag, style, order and attached comments so a
//! document can be edited and written back without going through a typed
//! schema. Mapping keys are scalars at the type level, which means a mapping
//! is always a list of complete key/value pairs.

use std::fmt;

/// Any node of a parsed YAML document
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Document(Document),
    Mapping(Mapping),
    Sequence(Sequence),
    Scalar(Scalar),
}

/// Root of one YAML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Whether the source started the document with an explicit `---`
    pub explicit_start: bool,
    /// Comments above the first node, set apart from it by a blank line
    pub head_comments: Vec<String>,
    /// Top-level nodes (a well-formed document holds at most one)
    pub content: Vec<Node>,
    /// Comments after the last node of the document
    pub foot_comments: Vec<String>,
}

/// Ordered key/value collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    pub tag: Option<String>,
    pub flow: bool,
    pub entries: Vec<Entry>,
    pub comments: Comments,
}

/// One key/value pair of a mapping
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Scalar,
    pub value: Node,
}

/// Ordered list of nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    pub tag: Option<String>,
    pub flow: bool,
    pub items: Vec<Node>,
    pub comments: Comments,
}

/// Leaf value
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub tag: Tag,
    pub style: ScalarStyle,
    pub value: String,
    /// Source position, absent for nodes created in memory
    pub mark: Option<Mark>,
    pub comments: Comments,
}

/// Comments attached to a node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
    /// Full-line comments directly above the node, without the leading `#`
    pub head: Vec<String>,
    /// Comment trailing the node on the same line
    pub line: Option<String>,
}

/// 1-based source position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub line: usize,
    pub column: usize,
}

/// Resolved scalar type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    Null,
    Bool,
    Int,
    Float,
    Str,
    /// Any tag outside the core schema, stored verbatim (e.g. `!secret`)
    Custom(String),
}

/// Presentation style of a scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

/// Node kind, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Document,
    Mapping,
    Sequence,
    Scalar,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Mapping => write!(f, "mapping"),
            Self::Sequence => write!(f, "sequence"),
            Self::Scalar => write!(f, "scalar"),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "!!null"),
            Self::Bool => write!(f, "!!bool"),
            Self::Int => write!(f, "!!int"),
            Self::Float => write!(f, "!!float"),
            Self::Str => write!(f, "!!str"),
            Self::Custom(tag) => write!(f, "{}", tag),
        }
    }
}

impl Tag {
    /// Map a core-schema suffix (`str`, `null`, ...) to a tag
    pub fn from_core_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "null" => Some(Self::Null),
            "bool" => Some(Self::Bool),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "str" => Some(Self::Str),
            _ => None,
        }
    }

    /// Resolve the tag of an untagged plain scalar with the YAML 1.2 core schema
    pub fn resolve_plain(value: &str) -> Self {
        match value {
            "" | "~" | "null" | "Null" | "NULL" => return Self::Null,
            "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => return Self::Bool,
            ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" | "-.inf" | "-.Inf"
            | "-.INF" | ".nan" | ".NaN" | ".NAN" => return Self::Float,
            _ => {}
        }

        if is_core_int(value) {
            Self::Int
        } else if is_core_float(value) {
            Self::Float
        } else {
            Self::Str
        }
    }
}

fn is_core_int(value: &str) -> bool {
    if let Some(hex) = value.strip_prefix("0x") {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    if let Some(oct) = value.strip_prefix("0o") {
        return !oct.is_empty() && oct.chars().all(|c| ('0'..='7').contains(&c));
    }
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_core_float(value: &str) -> bool {
    let body = value.strip_prefix(['-', '+']).unwrap_or(value);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    };

    let mut parts = mantissa.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    if !int_part.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match frac_part {
        Some(frac) => {
            if !frac.chars().all(|c| c.is_ascii_digit()) || (int_part.is_empty() && frac.is_empty()) {
                return false;
            }
        }
        None => {
            // a bare integer only counts as a float with an exponent
            if int_part.is_empty() || exponent.is_none() {
                return false;
            }
        }
    }

    match exponent {
        Some(exp) => {
            let exp = exp.strip_prefix(['-', '+']).unwrap_or(exp);
            !exp.is_empty() && exp.chars().all(|c| c.is_ascii_digit())
        }
        None => true,
    }
}

impl Node {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Document(_) => Kind::Document,
            Self::Mapping(_) => Kind::Mapping,
            Self::Sequence(_) => Kind::Sequence,
            Self::Scalar(_) => Kind::Scalar,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Self::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Sequence> {
        match self {
            Self::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Comments attached to this node (documents carry none of their own)
    pub fn comments(&self) -> Option<&Comments> {
        match self {
            Self::Document(_) => None,
            Self::Mapping(mapping) => Some(&mapping.comments),
            Self::Sequence(sequence) => Some(&sequence.comments),
            Self::Scalar(scalar) => Some(&scalar.comments),
        }
    }

    pub fn comments_mut(&mut self) -> Option<&mut Comments> {
        match self {
            Self::Document(_) => None,
            Self::Mapping(mapping) => Some(&mut mapping.comments),
            Self::Sequence(sequence) => Some(&mut sequence.comments),
            Self::Scalar(scalar) => Some(&mut scalar.comments),
        }
    }

    /// Visit every scalar of the tree, keys included, in document order
    pub fn walk_scalars<'a>(&'a self, visit: &mut impl FnMut(&'a Scalar)) {
        match self {
            Self::Document(document) => {
                for node in &document.content {
                    node.walk_scalars(visit);
                }
            }
            Self::Mapping(mapping) => {
                for entry in &mapping.entries {
                    visit(&entry.key);
                    entry.value.walk_scalars(visit);
                }
            }
            Self::Sequence(sequence) => {
                for item in &sequence.items {
                    item.walk_scalars(visit);
                }
            }
            Self::Scalar(scalar) => visit(scalar),
        }
    }
}

impl Mapping {
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|entry| entry.key.value == key)
            .map(|entry| &entry.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|entry| entry.key.value == key)
            .map(|entry| &mut entry.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry.key.value == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a pair with a plain string key
    pub fn push(&mut self, key: &str, value: Node) {
        self.entries.push(Entry {
            key: Scalar::string(key),
            value,
        });
    }
}

impl Sequence {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate the values of the scalar items, skipping nested collections
    pub fn scalar_values(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter_map(Node::as_scalar)
            .map(|scalar| scalar.value.as_str())
    }
}

impl Scalar {
    /// Plain `!!str` scalar created in memory
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            tag: Tag::Str,
            style: ScalarStyle::Plain,
            value: value.into(),
            mark: None,
            comments: Comments::default(),
        }
    }

    /// Empty `!!null` placeholder
    pub fn null() -> Self {
        Self {
            tag: Tag::Null,
            style: ScalarStyle::Plain,
            value: String::new(),
            mark: None,
            comments: Comments::default(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.tag == Tag::Null
    }

    /// Case-insensitive comparison used for user identifiers
    pub fn matches_ignore_case(&self, other: &str) -> bool {
        self.value.to_lowercase() == other.to_lowercase()
    }
}

impl Comments {
    pub fn is_empty(&self) -> bool {
        self.head.is_empty() && self.line.is_none()
    }
}
