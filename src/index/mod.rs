//! Pluggable index modules
//!
//! Modules maintain derived structure over the canonical node/edge
//! collections. The engine owns the registry (fixed at construction)
//! and dispatches lifecycle hooks to every module whose capability
//! check matches the object.

pub mod related_edge;

pub use related_edge::{ConstraintKey, EdgeConstraint, Position, RelatedEdgeIndex};

use crate::graph::edge::Edge;
use crate::graph::node::ConceptNode;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Lifecycle interface between the graph engine and an index module.
///
/// `remove_*` hooks report whether anything was actually deindexed so
/// the engine can surface cascade anomalies. `rebuild` reports whether
/// the module rebuilt itself from the offered snapshot.
pub trait IndexModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this module wants lifecycle hooks for the given node.
    fn supports_node(&self, node: &Arc<ConceptNode>) -> bool;

    /// Whether this module wants lifecycle hooks for the given edge.
    fn supports_edge(&self, edge: &Arc<Edge>) -> bool;

    fn add_node(&self, _node: &Arc<ConceptNode>) {}

    fn remove_node(&self, _node: &Arc<ConceptNode>) -> bool {
        false
    }

    fn add_edge(&self, _edge: &Arc<Edge>) {}

    fn remove_edge(&self, _edge: &Arc<Edge>) -> bool {
        false
    }

    /// Drop all derived state.
    fn clear(&self);

    /// Offer a full snapshot of the canonical collections. A module
    /// may decline (returning `false`) when its state is already
    /// current and `force` is not set.
    fn rebuild(&self, nodes: &[Arc<ConceptNode>], edges: &[Arc<Edge>], force: bool) -> bool;
}

/// Capability: exact-content lookup of edges containing a string
/// value, answered by a string-hash index when one is installed.
/// `None` means the backing index cannot answer for this content and
/// the caller must fall back to linear filtering.
pub trait StringHashLookup: Send + Sync {
    fn edges_for_content(&self, content: &str) -> Option<BTreeSet<Arc<Edge>>>;
}

/// Capability: whether literal arguments of a predicate are stored
/// compressed, in which case exact-content hashed lookups would miss.
pub trait CompressionFlags: Send + Sync {
    fn is_compressed_predicate(&self, predicate: &ConceptNode) -> bool;
}
