//! Core graph model: identity, properties, the node/edge type family,
//! the assertion grammar, and the engine that owns the canonical
//! collections.

pub mod edge;
pub mod node;
pub mod parse;
pub mod property;
pub mod store;
pub mod types;

pub use edge::{Edge, ErrorEdge, GraphObject};
pub use node::{ConceptNode, Node, Primitive, StringLiteral};
pub use parse::{ParseError, ParseResult};
pub use property::{Properties, PropertyError, PropertyKey, PropertyResult};
pub use store::{GraphError, GraphResult, GraphStore};
pub use types::{EdgeId, IdCounter, NodeId};
