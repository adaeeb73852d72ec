//! Positional inverted index over edges
//!
//! Maintains, per concept node and per tuple position, the set of
//! edges containing that node there, and answers multi-constraint
//! pattern queries by ordered intersection and difference.

use super::{CompressionFlags, IndexModule, StringHashLookup};
use crate::graph::edge::Edge;
use crate::graph::node::{ConceptNode, Node};
use crate::graph::types::NodeId;
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Index key inside a node's entry. Positions are 1-based; position 1
/// is the predicate. `Any` aggregates every position the node touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Any,
    At(usize),
}

/// How a constraint binds its node.
///
/// `At` and `Any` are additive (edges must match); `Not` is
/// subtractive (edges with the node at that position are excluded).
/// `Any` has no subtractive form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKey {
    Any,
    At(usize),
    Not(usize),
}

/// One (node, position) constraint of a pattern query.
#[derive(Debug, Clone)]
pub struct EdgeConstraint {
    pub node: Node,
    pub key: ConstraintKey,
}

impl EdgeConstraint {
    pub fn at(node: Node, position: usize) -> Self {
        Self {
            node,
            key: ConstraintKey::At(position),
        }
    }

    pub fn not_at(node: Node, position: usize) -> Self {
        Self {
            node,
            key: ConstraintKey::Not(position),
        }
    }

    pub fn anywhere(node: Node) -> Self {
        Self {
            node,
            key: ConstraintKey::Any,
        }
    }

    fn is_additive(&self) -> bool {
        !matches!(self.key, ConstraintKey::Not(_))
    }

    /// Whether an edge satisfies this constraint, by node value.
    fn matches(&self, edge: &Edge) -> bool {
        match self.key {
            ConstraintKey::Any => edge.contains_node(&self.node),
            ConstraintKey::At(position) => edge.node_at(position) == Some(&self.node),
            ConstraintKey::Not(position) => edge.node_at(position) != Some(&self.node),
        }
    }
}

type PositionSets = FxHashMap<Position, BTreeSet<Arc<Edge>>>;

/// The related-edge index module.
///
/// Concept constraints are answered from the per-node position sets.
/// Literal and primitive constraints have no identity entry; they are
/// delegated to the string-hash collaborator when one is installed and
/// the predicate is not compressed, and otherwise filtered linearly
/// over the survivors of the indexed lookups.
pub struct RelatedEdgeIndex {
    by_node: DashMap<NodeId, PositionSets>,
    hashed: Option<Arc<dyn StringHashLookup>>,
    compression: Option<Arc<dyn CompressionFlags>>,
}

impl RelatedEdgeIndex {
    pub fn new() -> Self {
        Self::with_collaborators(None, None)
    }

    /// Collaborators are resolved at construction; there is no runtime
    /// module discovery.
    pub fn with_collaborators(
        hashed: Option<Arc<dyn StringHashLookup>>,
        compression: Option<Arc<dyn CompressionFlags>>,
    ) -> Self {
        Self {
            by_node: DashMap::new(),
            hashed,
            compression,
        }
    }

    fn index_edge(&self, edge: &Arc<Edge>) {
        for (i, node) in edge.nodes().iter().enumerate() {
            if let Node::Concept(concept) = node {
                let mut sets = self.by_node.entry(concept.id()).or_default();
                sets.entry(Position::At(i + 1)).or_default().insert(edge.clone());
                sets.entry(Position::Any).or_default().insert(edge.clone());
            }
        }
    }

    fn snapshot(&self, node: NodeId, position: Position) -> BTreeSet<Arc<Edge>> {
        self.by_node
            .get(&node)
            .and_then(|sets| sets.get(&position).cloned())
            .unwrap_or_default()
    }

    /// Whether a literal lookup may be delegated to the string-hash
    /// collaborator for a query with this predicate constraint.
    fn hashed_allowed(&self, constraints: &[EdgeConstraint]) -> bool {
        if self.hashed.is_none() {
            return false;
        }
        let compressed = constraints
            .iter()
            .find(|c| c.key == ConstraintKey::At(1))
            .and_then(|c| c.node.as_concept())
            .map(|predicate| {
                self.compression
                    .as_ref()
                    .map(|flags| flags.is_compressed_predicate(predicate))
                    .unwrap_or(false)
            })
            .unwrap_or(false);
        !compressed
    }

    /// Answer a pattern query.
    ///
    /// Indexed lookups are ordered additive-before-subtractive, then
    /// smallest-first, folded by intersection (additive) or difference
    /// (subtractive), short-circuiting the moment the running set
    /// empties. A query with no additive lookup at all is empty.
    /// Constraints that could not be answered from an index filter the
    /// survivors linearly.
    pub fn execute(&self, constraints: &[EdgeConstraint]) -> BTreeSet<Arc<Edge>> {
        let hashed_allowed = self.hashed_allowed(constraints);
        let mut lookups: Vec<(BTreeSet<Arc<Edge>>, bool)> = Vec::new();
        let mut deferred: Vec<&EdgeConstraint> = Vec::new();

        for constraint in constraints {
            match &constraint.node {
                Node::Concept(concept) => {
                    let position = match constraint.key {
                        ConstraintKey::Any => Position::Any,
                        ConstraintKey::At(p) | ConstraintKey::Not(p) => Position::At(p),
                    };
                    lookups.push((
                        self.snapshot(concept.id(), position),
                        constraint.is_additive(),
                    ));
                }
                _ => {
                    // Only string literals have a hash entry, and a
                    // hashed result is positionally imprecise, so the
                    // constraint still goes through the filter. The
                    // subtractive form is filter-only.
                    if constraint.is_additive() && hashed_allowed {
                        if let Node::Literal(literal) = &constraint.node {
                            if let Some(set) = self
                                .hashed
                                .as_ref()
                                .and_then(|hashed| hashed.edges_for_content(literal.content()))
                            {
                                lookups.push((set, true));
                            }
                        }
                    }
                    deferred.push(constraint);
                }
            }
        }

        if !lookups.iter().any(|(_, additive)| *additive) {
            return BTreeSet::new();
        }
        lookups.sort_by_key(|(set, additive)| (!*additive, set.len()));

        let mut lookups = lookups.into_iter();
        let Some((mut result, _)) = lookups.next() else {
            return BTreeSet::new();
        };
        for (set, additive) in lookups {
            if result.is_empty() {
                return result;
            }
            if additive {
                result = result.intersection(&set).cloned().collect();
            } else {
                result = result.difference(&set).cloned().collect();
            }
        }

        for constraint in deferred {
            if result.is_empty() {
                break;
            }
            result.retain(|edge| constraint.matches(edge));
        }
        result
    }

    /// Edges whose tuple starts with these nodes, each bound to its
    /// 1-based position. Longer edges whose leading positions match
    /// are included.
    pub fn find_edges_by_tuple(&self, nodes: &[Node]) -> BTreeSet<Arc<Edge>> {
        let constraints: Vec<EdgeConstraint> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| EdgeConstraint::at(node.clone(), i + 1))
            .collect();
        self.execute(&constraints)
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}

impl Default for RelatedEdgeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexModule for RelatedEdgeIndex {
    fn name(&self) -> &'static str {
        "related-edge"
    }

    fn supports_node(&self, _node: &Arc<ConceptNode>) -> bool {
        false
    }

    fn supports_edge(&self, _edge: &Arc<Edge>) -> bool {
        true
    }

    fn add_edge(&self, edge: &Arc<Edge>) {
        self.index_edge(edge);
    }

    fn remove_edge(&self, edge: &Arc<Edge>) -> bool {
        let mut removed = false;
        for node in edge.nodes() {
            let Node::Concept(concept) = node else {
                continue;
            };
            if let Some(mut sets) = self.by_node.get_mut(&concept.id()) {
                for set in sets.values_mut() {
                    removed |= set.remove(edge);
                }
                sets.retain(|_, set| !set.is_empty());
            }
            self.by_node
                .remove_if(&concept.id(), |_, sets| sets.is_empty());
        }
        removed
    }

    fn clear(&self) {
        self.by_node.clear();
    }

    fn rebuild(&self, _nodes: &[Arc<ConceptNode>], edges: &[Arc<Edge>], force: bool) -> bool {
        if !force && !self.by_node.is_empty() {
            debug!(edges = edges.len(), "related-edge index current, declining rebuild");
            return false;
        }
        self.by_node.clear();
        for edge in edges {
            if self.supports_edge(edge) {
                self.index_edge(edge);
            }
        }
        info!(edges = edges.len(), "related-edge index rebuilt");
        true
    }
}
