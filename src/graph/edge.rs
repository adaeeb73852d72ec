//! Edges: stored assertions over node tuples, plus error edges for
//! assertions that failed to parse.

use super::node::{ConceptNode, Node, Primitive, StringLiteral};
use super::property::{Properties, PropertyError, PropertyResult};
use super::types::EdgeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A stored assertion: an ordered tuple of at least two nodes, where
/// the first position is the predicate.
///
/// Identity is the edge id. Content-level deduplication goes through
/// [`Edge::tuple_key`], which two edges share exactly when their tuples
/// are element-wise equal.
#[derive(Debug)]
pub struct Edge {
    id: EdgeId,
    nodes: Vec<Node>,
    properties: Properties,
}

impl Edge {
    pub(crate) fn new(id: EdgeId, nodes: Vec<Node>, creator: Option<String>) -> Self {
        debug_assert!(nodes.len() >= 2, "edge tuple needs a predicate and an argument");
        Self {
            id,
            nodes,
            properties: Properties::with_creation(creator),
        }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Tuple length, predicate included.
    pub fn arity(&self) -> usize {
        self.nodes.len()
    }

    /// First tuple position.
    pub fn predicate(&self) -> &Node {
        &self.nodes[0]
    }

    /// 1-based tuple access: position 1 is the predicate.
    pub fn node_at(&self, position: usize) -> Option<&Node> {
        position.checked_sub(1).and_then(|i| self.nodes.get(i))
    }

    pub fn contains_node(&self, node: &Node) -> bool {
        self.nodes.contains(node)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Dedup key for a candidate tuple. Each element is rendered with a
    /// variant sigil so a concept id can never collide with an integer
    /// primitive or a literal of the same text.
    pub fn tuple_key_of(nodes: &[Node]) -> String {
        let mut key = String::new();
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                key.push(' ');
            }
            match node {
                Node::Concept(concept) => {
                    key.push('#');
                    key.push_str(&concept.id().to_string());
                }
                Node::Literal(literal) => {
                    key.push('"');
                    key.push_str(literal.content());
                    key.push('"');
                }
                Node::Primitive(primitive) => {
                    key.push('\'');
                    key.push_str(&primitive.to_string());
                }
                Node::Assertion(edge) => {
                    key.push('@');
                    key.push_str(&edge.id().to_string());
                }
            }
        }
        key
    }

    pub fn tuple_key(&self) -> String {
        Self::tuple_key_of(&self.nodes)
    }

    fn to_record(&self) -> EdgeRecord {
        EdgeRecord {
            id: self.id.as_u64(),
            nodes: self.nodes.iter().map(NodeRecord::from).collect(),
            properties: self.properties.to_tagged(),
        }
    }

    fn from_record<F>(record: EdgeRecord, resolve: &F) -> PropertyResult<Self>
    where
        F: Fn(u64) -> Option<Arc<ConceptNode>>,
    {
        let mut nodes = Vec::with_capacity(record.nodes.len());
        for node in record.nodes {
            nodes.push(node.resolve(resolve)?);
        }
        Ok(Self {
            id: EdgeId::new(record.id),
            nodes,
            properties: Properties::from_tagged(record.properties)?,
        })
    }

    /// Compact on-disk record of this edge. Nested assertions are
    /// inlined into the record.
    pub fn encode(&self) -> PropertyResult<Vec<u8>> {
        Ok(bincode::serialize(&self.to_record())?)
    }

    /// Rebuild an edge from its compact record. Concept references are
    /// resolved through `resolve`; a reference to a concept that no
    /// longer exists fails the whole record.
    pub fn decode<F>(bytes: &[u8], resolve: F) -> PropertyResult<Self>
    where
        F: Fn(u64) -> Option<Arc<ConceptNode>>,
    {
        let record: EdgeRecord = bincode::deserialize(bytes)?;
        Self::from_record(record, &resolve)
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Edge {}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for Edge {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", node)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeRecord {
    id: u64,
    nodes: Vec<NodeRecord>,
    properties: Vec<(u8, String)>,
}

#[derive(Debug, Serialize, Deserialize)]
enum NodeRecord {
    Concept(u64),
    Literal(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Assertion(Box<EdgeRecord>),
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        match node {
            Node::Concept(concept) => NodeRecord::Concept(concept.id().as_u64()),
            Node::Literal(literal) => NodeRecord::Literal(literal.content().to_string()),
            Node::Primitive(Primitive::Bool(b)) => NodeRecord::Bool(*b),
            Node::Primitive(Primitive::Int(i)) => NodeRecord::Int(*i),
            Node::Primitive(Primitive::Float(f)) => NodeRecord::Float(*f),
            Node::Primitive(Primitive::Char(c)) => NodeRecord::Char(*c),
            Node::Assertion(edge) => NodeRecord::Assertion(Box::new(edge.to_record())),
        }
    }
}

impl NodeRecord {
    fn resolve<F>(self, resolve: &F) -> PropertyResult<Node>
    where
        F: Fn(u64) -> Option<Arc<ConceptNode>>,
    {
        Ok(match self {
            NodeRecord::Concept(id) => Node::Concept(resolve(id).ok_or_else(|| {
                PropertyError::Codec(bincode::Error::new(bincode::ErrorKind::Custom(format!(
                    "dangling concept reference: {}",
                    id
                ))))
            })?),
            NodeRecord::Literal(content) => {
                Node::Literal(StringLiteral::new(&format!("\"{}\"", content)))
            }
            NodeRecord::Bool(b) => Node::Primitive(Primitive::Bool(b)),
            NodeRecord::Int(i) => Node::Primitive(Primitive::Int(i)),
            NodeRecord::Float(f) => Node::Primitive(Primitive::Float(f)),
            NodeRecord::Char(c) => Node::Primitive(Primitive::Char(c)),
            NodeRecord::Assertion(record) => {
                Node::Assertion(Arc::new(Edge::from_record(*record, resolve)?))
            }
        })
    }
}

/// Record of an assertion that failed to parse. Error edges are stored
/// alongside ordinary edges so malformed input is queryable instead of
/// silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEdge {
    source: String,
    human: String,
    syntactic: String,
}

impl ErrorEdge {
    pub fn new(
        source: impl Into<String>,
        human: impl Into<String>,
        syntactic: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            human: human.into(),
            syntactic: syntactic.into(),
        }
    }

    /// The raw assertion text that failed.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The failure, either as a human-readable sentence or as the
    /// stable machine form.
    pub fn message(&self, pretty: bool) -> String {
        if pretty {
            format!("Could not parse assertion {:?}: {}", self.source, self.human)
        } else {
            format!("{}|{}", self.syntactic, self.source)
        }
    }
}

impl fmt::Display for ErrorEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message(true))
    }
}

/// Any value an assertion string can resolve to.
#[derive(Debug, Clone)]
pub enum GraphObject {
    Node(Node),
    Edge(Arc<Edge>),
    Error(ErrorEdge),
}

impl GraphObject {
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            GraphObject::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Arc<Edge>> {
        match self {
            GraphObject::Edge(edge) => Some(edge),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, GraphObject::Error(_))
    }
}

impl fmt::Display for GraphObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphObject::Node(node) => write!(f, "{}", node),
            GraphObject::Edge(edge) => write!(f, "{}", edge),
            GraphObject::Error(error) => write!(f, "{}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::NodeId;

    fn concept(id: u64, name: &str) -> Node {
        Node::Concept(Arc::new(ConceptNode::named(
            NodeId::new(id),
            name.to_string(),
            None,
        )))
    }

    #[test]
    fn test_edge_identity_and_access() {
        let edge = Edge::new(
            EdgeId::new(1),
            vec![concept(1, "isa"), concept(2, "Dog"), concept(3, "Mammal")],
            None,
        );

        assert_eq!(edge.arity(), 3);
        assert_eq!(edge.predicate(), &concept(1, "isa"));
        assert_eq!(edge.node_at(1), Some(&concept(1, "isa")));
        assert_eq!(edge.node_at(3), Some(&concept(3, "Mammal")));
        assert_eq!(edge.node_at(0), None);
        assert_eq!(edge.node_at(4), None);
        assert!(edge.contains_node(&concept(2, "Dog")));
        assert!(!edge.contains_node(&concept(9, "Cat")));
    }

    #[test]
    fn test_edge_rendering() {
        let edge = Edge::new(
            EdgeId::new(1),
            vec![
                concept(1, "comment"),
                concept(2, "Dog"),
                Node::Literal(StringLiteral::new("\"A dog\"")),
            ],
            None,
        );
        assert_eq!(edge.to_string(), "(comment Dog \"A dog\")");
    }

    #[test]
    fn test_tuple_key_separates_variants() {
        let by_concept = Edge::tuple_key_of(&[concept(1, "isa"), concept(42, "Dog")]);
        let by_primitive =
            Edge::tuple_key_of(&[concept(1, "isa"), Node::Primitive(Primitive::Int(42))]);
        let by_literal =
            Edge::tuple_key_of(&[concept(1, "isa"), Node::Literal(StringLiteral::new("\"42\""))]);

        assert_ne!(by_concept, by_primitive);
        assert_ne!(by_concept, by_literal);
        assert_ne!(by_primitive, by_literal);
    }

    #[test]
    fn test_tuple_key_matches_on_equal_tuples() {
        let nodes = vec![concept(1, "isa"), concept(2, "Dog"), concept(3, "Mammal")];
        let a = Edge::new(EdgeId::new(1), nodes.clone(), None);
        let b = Edge::new(EdgeId::new(2), nodes, None);
        assert_eq!(a.tuple_key(), b.tuple_key());
        assert_ne!(a, b);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let dog = Arc::new(ConceptNode::named(NodeId::new(2), "Dog".to_string(), None));
        let edge = Edge::new(
            EdgeId::new(7),
            vec![
                concept(1, "comment"),
                Node::Concept(Arc::clone(&dog)),
                Node::Literal(StringLiteral::new("\"A dog\"")),
                Node::Primitive(Primitive::Int(4)),
            ],
            Some("TestCreator".to_string()),
        );

        let bytes = edge.encode().expect("encode");
        let isa = Arc::new(ConceptNode::named(NodeId::new(1), "comment".to_string(), None));
        let restored = Edge::decode(&bytes, |id| match id {
            1 => Some(Arc::clone(&isa)),
            2 => Some(Arc::clone(&dog)),
            _ => None,
        })
        .expect("decode");

        assert_eq!(restored.id(), EdgeId::new(7));
        assert_eq!(restored.tuple_key(), edge.tuple_key());
        assert_eq!(restored.properties().creator().as_deref(), Some("TestCreator"));
    }

    #[test]
    fn test_decode_rejects_dangling_concept() {
        let edge = Edge::new(EdgeId::new(7), vec![concept(1, "isa"), concept(2, "Dog")], None);
        let bytes = edge.encode().expect("encode");
        assert!(Edge::decode(&bytes, |_| None).is_err());
    }

    #[test]
    fn test_error_edge_messages() {
        let error = ErrorEdge::new("(isa Dog", "unbalanced parentheses", "unbalanced-parens");
        assert!(error.message(true).contains("(isa Dog"));
        assert!(error.message(true).contains("unbalanced parentheses"));
        assert_eq!(error.message(false), "unbalanced-parens|(isa Dog");
    }

    #[test]
    fn test_nested_assertion_argument() {
        let inner = Arc::new(Edge::new(
            EdgeId::new(1),
            vec![concept(1, "isa"), concept(2, "Dog"), concept(3, "Mammal")],
            None,
        ));
        let outer = Edge::new(
            EdgeId::new(2),
            vec![concept(4, "believes"), concept(5, "Alice"), Node::Assertion(inner)],
            None,
        );
        assert_eq!(outer.to_string(), "(believes Alice (isa Dog Mammal))");

        let bytes = outer.encode().expect("encode");
        let resolver: Vec<Arc<ConceptNode>> = ["isa", "Dog", "Mammal", "believes", "Alice"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Arc::new(ConceptNode::named(NodeId::new(i as u64 + 1), name.to_string(), None))
            })
            .collect();
        let restored = Edge::decode(&bytes, |id| resolver.get(id as usize - 1).cloned())
            .expect("decode");
        assert_eq!(restored.to_string(), outer.to_string());
        assert_eq!(restored.tuple_key(), outer.tuple_key());
    }
}
