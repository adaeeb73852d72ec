//! factgraph: an in-process graph knowledge store
//!
//! Nodes are deduplicated concepts, literal strings, or primitive
//! values; edges are ordered node tuples representing assertions,
//! parsed from a `(predicate arg1 ...)` mini-grammar. The engine
//! deduplicates creation, cascades removal, and keeps registered index
//! modules in sync; the related-edge module answers positional
//! multi-constraint pattern queries over edges.
//!
//! ```
//! use factgraph::{EdgeConstraint, GraphStore, RelatedEdgeIndex};
//! use std::sync::Arc;
//!
//! let index = Arc::new(RelatedEdgeIndex::new());
//! let store = GraphStore::with_modules(vec![index.clone()]);
//!
//! store.parse_object("(isa Dog Mammal)", Some("setup"), true);
//! store.parse_object("(isa Cat Mammal)", Some("setup"), true);
//!
//! let isa = store.find_or_create_node("isa", None, false).unwrap();
//! let edges = index.execute(&[EdgeConstraint::at(isa, 1)]);
//! assert_eq!(edges.len(), 2);
//! ```

pub mod graph;
pub mod index;

pub use graph::{
    ConceptNode, Edge, EdgeId, ErrorEdge, GraphError, GraphObject, GraphResult, GraphStore,
    Node, NodeId, ParseError, Primitive, Properties, PropertyError, PropertyKey, StringLiteral,
};
pub use index::{
    CompressionFlags, ConstraintKey, EdgeConstraint, IndexModule, Position, RelatedEdgeIndex,
    StringHashLookup,
};

/// Library version from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
