//! Node family: concept, literal and primitive variants
//!
//! Concept nodes are canonical, id-bearing and deduplicated by name.
//! Literal and primitive nodes are plain values: created fresh on every
//! parse, compared by content, never indexed by identity.

use super::edge::Edge;
use super::property::{Properties, PropertyResult};
use super::types::NodeId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::warn;

/// Rendering marker for anonymous concept nodes
pub const ANON_MARKER: &str = "__ANON__";

/// Prefix applied to tolerated invalid concept names
pub const INVALID_NAME_PREFIX: &str = "INVALID_NAME";

static QUOTED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"[^"\\]*(?:\\.[^"\\]*)*"$"#).expect("quoted name pattern")
});

static UNSPACED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][^\s?()']+$").expect("unspaced name pattern"));

static NAME_OR_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:'?\d+|"[^"\\]*(?:\\.[^"\\]*)*"|[a-zA-Z0-9][^\s?()']+)$"#)
        .expect("name-or-id pattern")
});

/// Whether `text` matches the raw name grammar (quoted string, or an
/// unspaced token starting alphanumeric and excluding `? ( ) '`).
pub fn matches_name_grammar(text: &str) -> bool {
    QUOTED_NAME.is_match(text) || UNSPACED_NAME.is_match(text)
}

/// Whether `text` can be registered as a concept-node name. Tokens that
/// parse as primitives are reserved and never valid names.
pub fn is_valid_name(text: &str) -> bool {
    matches_name_grammar(text) && Primitive::parse(text).is_none()
}

/// Whether `text` is a name, a quoted name, or a bare/tick integer id.
pub fn is_name_or_id(text: &str) -> bool {
    NAME_OR_ID.is_match(text)
}

/// Canonical, deduplicated, named graph vertex.
///
/// Anonymous concept nodes carry no name and render as the fixed marker
/// followed by their id.
#[derive(Debug)]
pub struct ConceptNode {
    id: NodeId,
    name: Option<String>,
    properties: Properties,
}

impl ConceptNode {
    pub(crate) fn named(id: NodeId, name: String, creator: Option<String>) -> Self {
        Self {
            id,
            name: Some(name),
            properties: Properties::with_creation(creator),
        }
    }

    pub(crate) fn anonymous(id: NodeId, creator: Option<String>) -> Self {
        Self {
            id,
            name: None,
            properties: Properties::with_creation(creator),
        }
    }

    /// Normalize raw name text to its stored form. Invalid names are
    /// tolerated, tagged with a marker prefix and logged rather than
    /// rejected. Quoted text never reaches this path: node resolution
    /// claims a leading quote for string literals first.
    pub(crate) fn normalize_name(text: &str) -> String {
        if !is_valid_name(text) {
            warn!(name = text, "invalid concept-node name, storing with marker prefix");
            return format!("{}{}", INVALID_NAME_PREFIX, text);
        }
        text.to_string()
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    /// The unique name, or the synthetic anonymous identifier.
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}{}", ANON_MARKER, self.id),
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Compact on-disk record of this node: id, optional name, and the
    /// tag-mapped property list.
    pub fn encode(&self) -> PropertyResult<Vec<u8>> {
        Ok(bincode::serialize(&ConceptRecord {
            id: self.id.as_u64(),
            name: self.name.clone(),
            properties: self.properties.to_tagged(),
        })?)
    }

    /// Rebuild a node from its compact record. A property tag outside
    /// the closed namespace fails the whole record.
    pub fn decode(bytes: &[u8]) -> PropertyResult<Self> {
        let record: ConceptRecord = bincode::deserialize(bytes)?;
        Ok(Self {
            id: NodeId::new(record.id),
            name: record.name,
            properties: Properties::from_tagged(record.properties)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ConceptRecord {
    id: u64,
    name: Option<String>,
    properties: Vec<(u8, String)>,
}

impl PartialEq for ConceptNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConceptNode {}

impl PartialOrd for ConceptNode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConceptNode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for ConceptNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ConceptNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Non-deduplicated node wrapping a normalized quoted-string value.
///
/// Normalization strips the surrounding quotes (escape-aware on the
/// trailing side) and collapses embedded tabs to single spaces. Escaped
/// quotes inside the content are kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringLiteral {
    content: String,
}

impl StringLiteral {
    pub fn new(raw: &str) -> Self {
        let mut body = raw;
        while let Some(rest) = body.strip_prefix('"') {
            body = rest;
        }
        let mut content = body.to_string();
        if content.ends_with('"') {
            let backslashes = content[..content.len() - 1]
                .chars()
                .rev()
                .take_while(|c| *c == '\\')
                .count();
            if backslashes % 2 == 0 {
                content.pop();
            }
        }
        Self {
            content: content.replace('\t', " "),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl fmt::Display for StringLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.content)
    }
}

/// Non-deduplicated node wrapping a parsed scalar.
#[derive(Debug, Clone)]
pub enum Primitive {
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
}

impl Primitive {
    /// Recognize a bare or tick-prefixed scalar token. A leading `'`
    /// forces primitive interpretation but carries no other meaning.
    /// Returns `None` for anything that is not a scalar.
    pub fn parse(token: &str) -> Option<Self> {
        let body = token.strip_prefix('\'').unwrap_or(token);
        if body.is_empty() {
            return None;
        }
        match body {
            "true" => return Some(Primitive::Bool(true)),
            "false" => return Some(Primitive::Bool(false)),
            _ => {}
        }
        if let Ok(value) = body.parse::<i64>() {
            return Some(Primitive::Int(value));
        }
        if body.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(value) = body.parse::<f64>() {
                return Some(Primitive::Float(value));
            }
        }
        let mut chars = body.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Some(Primitive::Char(c));
        }
        None
    }
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Primitive::Bool(a), Primitive::Bool(b)) => a == b,
            (Primitive::Int(a), Primitive::Int(b)) => a == b,
            (Primitive::Float(a), Primitive::Float(b)) => a.to_bits() == b.to_bits(),
            (Primitive::Char(a), Primitive::Char(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Primitive {}

impl std::hash::Hash for Primitive {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Primitive::Bool(b) => (0u8, *b as u8).hash(state),
            Primitive::Int(i) => (1u8, *i).hash(state),
            Primitive::Float(f) => (2u8, f.to_bits()).hash(state),
            Primitive::Char(c) => (3u8, *c).hash(state),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Bool(b) => write!(f, "{}", b),
            Primitive::Int(i) => write!(f, "{}", i),
            Primitive::Float(fl) => write!(f, "{}", fl),
            Primitive::Char(c) => write!(f, "{}", c),
        }
    }
}

/// A tuple element: canonical concept, literal string, primitive, or a
/// nested assertion standing as an argument of an outer assertion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Concept(Arc<ConceptNode>),
    Literal(StringLiteral),
    Primitive(Primitive),
    Assertion(Arc<Edge>),
}

impl Node {
    pub fn is_concept(&self) -> bool {
        matches!(self, Node::Concept(_))
    }

    pub fn as_concept(&self) -> Option<&Arc<ConceptNode>> {
        match self {
            Node::Concept(concept) => Some(concept),
            _ => None,
        }
    }

    /// Textual identifier. `use_name` selects the name form for concept
    /// nodes; value-bearing variants have a single form either way.
    pub fn identifier(&self, use_name: bool) -> String {
        match self {
            Node::Concept(concept) => {
                if use_name {
                    concept.name()
                } else {
                    concept.id().to_string()
                }
            }
            Node::Literal(literal) => literal.to_string(),
            Node::Primitive(primitive) => primitive.to_string(),
            Node::Assertion(edge) => {
                if use_name {
                    edge.to_string()
                } else {
                    edge.id().to_string()
                }
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Concept(concept) => write!(f, "{}", concept),
            Node::Literal(literal) => write!(f, "{}", literal),
            Node::Primitive(primitive) => write!(f, "{}", primitive),
            Node::Assertion(edge) => write!(f, "{}", edge),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_grammar() {
        assert!(is_valid_name("Dog"));
        assert!(is_valid_name("isa"));
        assert!(is_valid_name("CanisGenus"));
        assert!(is_valid_name("\"Quoted Name\""));

        // Excluded characters and bad leading characters
        assert!(!is_valid_name("?var"));
        assert!(!is_valid_name("(paren"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("'ticked"));
        assert!(!is_valid_name("ab'c"));

        // Primitive tokens are reserved
        assert!(!is_valid_name("true"));
        assert!(!is_valid_name("42"));
        assert!(!is_valid_name("3.14"));
    }

    #[test]
    fn test_name_or_id_admits_integers() {
        assert!(is_name_or_id("42"));
        assert!(is_name_or_id("'42"));
        assert!(is_name_or_id("Dog"));
        assert!(is_name_or_id("\"Dog\""));
        assert!(!is_name_or_id("'Dog"));
    }

    #[test]
    fn test_normalize_name_tags_invalid() {
        let stored = ConceptNode::normalize_name("?bad name");
        assert_eq!(stored, format!("{}?bad name", INVALID_NAME_PREFIX));

        // Valid names are stored verbatim.
        assert_eq!(ConceptNode::normalize_name("Dog"), "Dog");
    }

    #[test]
    fn test_anonymous_rendering() {
        let node = ConceptNode::anonymous(NodeId::new(17), None);
        assert!(node.is_anonymous());
        assert_eq!(node.name(), format!("{}17", ANON_MARKER));
    }

    #[test]
    fn test_concept_encode_decode_roundtrip() {
        use crate::graph::property::PropertyKey;

        let node = ConceptNode::named(NodeId::new(7), "Dog".to_string(), Some("creator".to_string()));
        node.properties().put(PropertyKey::Context, "BiologyNs");

        let bytes = node.encode().expect("encode");
        let restored = ConceptNode::decode(&bytes).expect("decode");
        assert_eq!(restored.id(), NodeId::new(7));
        assert_eq!(restored.name(), "Dog");
        assert_eq!(restored.properties().snapshot(), node.properties().snapshot());

        let anon = ConceptNode::anonymous(NodeId::new(8), None);
        let restored = ConceptNode::decode(&anon.encode().expect("encode")).expect("decode");
        assert!(restored.is_anonymous());
        assert_eq!(restored.name(), anon.name());
    }

    #[test]
    fn test_concept_decode_rejects_unknown_tag() {
        use crate::graph::property::PropertyError;

        let record = ConceptRecord {
            id: 7,
            name: Some("Dog".to_string()),
            properties: vec![(99u8, "bad".to_string())],
        };
        let bytes = bincode::serialize(&record).expect("serialize");
        assert!(matches!(
            ConceptNode::decode(&bytes),
            Err(PropertyError::UnknownTag(99))
        ));
    }

    #[test]
    fn test_concept_equality_by_id() {
        let a = ConceptNode::named(NodeId::new(1), "Dog".to_string(), None);
        let b = ConceptNode::named(NodeId::new(1), "Cat".to_string(), None);
        let c = ConceptNode::named(NodeId::new(2), "Dog".to_string(), None);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_literal_normalization() {
        let simple = StringLiteral::new("\"hello\"");
        assert_eq!(simple.content(), "hello");
        assert_eq!(simple.to_string(), "\"hello\"");

        // Tabs collapse to single spaces
        let tabbed = StringLiteral::new("\"A\tB\"");
        assert_eq!(tabbed.content(), "A B");

        // Escaped trailing quote is content, not a terminator
        let escaped = StringLiteral::new("\"ends with \\\"");
        assert_eq!(escaped.content(), "ends with \\\"");

        // Escaped quotes inside content are preserved as written
        let inner = StringLiteral::new("\"say \\\"hi\\\"\"");
        assert_eq!(inner.content(), "say \\\"hi\\\"");
    }

    #[test]
    fn test_literal_equality_by_content() {
        let a = StringLiteral::new("\"same\"");
        let b = StringLiteral::new("\"same\"");
        let c = StringLiteral::new("\"other\"");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_primitive_parse() {
        assert_eq!(Primitive::parse("true"), Some(Primitive::Bool(true)));
        assert_eq!(Primitive::parse("'true"), Some(Primitive::Bool(true)));
        assert_eq!(Primitive::parse("'42"), Some(Primitive::Int(42)));
        assert_eq!(Primitive::parse("-7"), Some(Primitive::Int(-7)));
        assert_eq!(Primitive::parse("3.5"), Some(Primitive::Float(3.5)));
        assert_eq!(Primitive::parse("?"), Some(Primitive::Char('?')));
        assert_eq!(Primitive::parse("Dog"), None);
        assert_eq!(Primitive::parse(""), None);
        assert_eq!(Primitive::parse("'"), None);
    }

    #[test]
    fn test_primitive_rendering_is_bare() {
        assert_eq!(Primitive::Int(42).to_string(), "42");
        assert_eq!(Primitive::Bool(true).to_string(), "true");
        assert_eq!(Primitive::Char('?').to_string(), "?");
    }

    #[test]
    fn test_node_cross_variant_inequality() {
        let concept = Node::Concept(Arc::new(ConceptNode::named(
            NodeId::new(1),
            "same".to_string(),
            None,
        )));
        let literal = Node::Literal(StringLiteral::new("\"same\""));
        assert_ne!(concept, literal);
    }
}
