//! The graph engine
//!
//! Owns the canonical node/edge collections, performs dedup-aware
//! creation, parses assertion text into typed objects, cascades
//! removal, and dispatches lifecycle events to the registered index
//! modules. Shared by reference across threads; the canonical indices
//! are concurrent maps, so operations touching different objects never
//! block each other.

use super::edge::{Edge, GraphObject};
use super::node::{ConceptNode, Node, Primitive, StringLiteral};
use super::parse::{looks_like_assertion, split_assertion, ParseError};
use super::types::{EdgeId, IdCounter, NodeId};
use crate::index::IndexModule;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised at the engine boundary. Absence of a node or edge is
/// an `Option`/`bool` result, never an error.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("edge tuple needs a predicate and at least one argument, got {0} element(s)")]
    TupleTooShort(usize),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// In-process graph knowledge store.
pub struct GraphStore {
    node_ids: IdCounter,
    edge_ids: IdCounter,
    nodes_by_id: DashMap<NodeId, Arc<ConceptNode>>,
    nodes_by_name: DashMap<String, Arc<ConceptNode>>,
    edges_by_id: DashMap<EdgeId, Arc<Edge>>,
    edges_by_tuple: DashMap<String, Arc<Edge>>,
    /// Non-owning back-index used for cascade removal: concept node id
    /// to the ids of every stored edge referencing it at any depth.
    edges_by_node: DashMap<NodeId, FxHashSet<EdgeId>>,
    modules: Vec<Arc<dyn IndexModule>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::with_modules(Vec::new())
    }

    /// Engine with a fixed, ordered module registry. Modules cannot be
    /// added or removed after construction.
    pub fn with_modules(modules: Vec<Arc<dyn IndexModule>>) -> Self {
        Self {
            node_ids: IdCounter::new(),
            edge_ids: IdCounter::new(),
            nodes_by_id: DashMap::new(),
            nodes_by_name: DashMap::new(),
            edges_by_id: DashMap::new(),
            edges_by_tuple: DashMap::new(),
            edges_by_node: DashMap::new(),
            modules,
        }
    }

    pub fn modules(&self) -> &[Arc<dyn IndexModule>] {
        &self.modules
    }

    /// Resolve a single node token.
    ///
    /// Quoted text yields a fresh literal and primitive-looking text a
    /// fresh primitive, in both modes. Anything else resolves against
    /// the concept name index; with `allow_create` a miss creates the
    /// concept, otherwise it is `None`. Repeated calls with the same
    /// valid name return the identical `Arc`.
    pub fn find_or_create_node(
        &self,
        text: &str,
        creator: Option<&str>,
        allow_create: bool,
    ) -> Option<Node> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('"') {
            return Some(Node::Literal(StringLiteral::new(trimmed)));
        }
        if let Some(primitive) = Primitive::parse(trimmed) {
            return Some(Node::Primitive(primitive));
        }

        let stored_name = ConceptNode::normalize_name(trimmed);
        if let Some(existing) = self.nodes_by_name.get(&stored_name) {
            return Some(Node::Concept(existing.clone()));
        }
        if !allow_create {
            return None;
        }

        // Entry API so two racing creators of the same name observe a
        // single winner.
        let (node, created) = match self.nodes_by_name.entry(stored_name.clone()) {
            Entry::Occupied(occupied) => (occupied.get().clone(), false),
            Entry::Vacant(vacant) => {
                let node = Arc::new(ConceptNode::named(
                    NodeId::new(self.node_ids.allocate()),
                    stored_name,
                    creator.map(str::to_string),
                ));
                vacant.insert(node.clone());
                (node, true)
            }
        };
        if created {
            self.nodes_by_id.insert(node.id(), node.clone());
            debug!(id = %node.id(), name = %node.name(), "created concept node");
            for module in &self.modules {
                if module.supports_node(&node) {
                    module.add_node(&node);
                }
            }
        }
        Some(Node::Concept(node))
    }

    /// Create a nameless concept node. Anonymous nodes are reachable
    /// only by id and render as a synthetic marker identifier.
    pub fn create_anonymous_node(&self, creator: Option<&str>) -> Node {
        let node = Arc::new(ConceptNode::anonymous(
            NodeId::new(self.node_ids.allocate()),
            creator.map(str::to_string),
        ));
        self.nodes_by_id.insert(node.id(), node.clone());
        for module in &self.modules {
            if module.supports_node(&node) {
                module.add_node(&node);
            }
        }
        Node::Concept(node)
    }

    /// Resolve an edge by exact tuple equality.
    ///
    /// On a miss with `allow_create` the edge is constructed, indexed,
    /// and offered to every edge-supporting module. On a miss without
    /// it a detached edge is returned: id allocated but never indexed,
    /// observable only through the returned handle.
    pub fn find_or_create_edge(
        &self,
        nodes: Vec<Node>,
        creator: Option<&str>,
        allow_create: bool,
    ) -> GraphResult<Arc<Edge>> {
        if nodes.len() < 2 {
            return Err(GraphError::TupleTooShort(nodes.len()));
        }
        let key = Edge::tuple_key_of(&nodes);
        if let Some(existing) = self.edges_by_tuple.get(&key) {
            return Ok(existing.clone());
        }
        if !allow_create {
            return Ok(Arc::new(Edge::new(
                EdgeId::new(self.edge_ids.allocate()),
                nodes,
                creator.map(str::to_string),
            )));
        }

        let (edge, created) = match self.edges_by_tuple.entry(key) {
            Entry::Occupied(occupied) => (occupied.get().clone(), false),
            Entry::Vacant(vacant) => {
                let edge = Arc::new(Edge::new(
                    EdgeId::new(self.edge_ids.allocate()),
                    nodes,
                    creator.map(str::to_string),
                ));
                vacant.insert(edge.clone());
                (edge, true)
            }
        };
        if created {
            self.edges_by_id.insert(edge.id(), edge.clone());
            for concept in collect_concepts(edge.nodes()) {
                self.edges_by_node
                    .entry(concept.id())
                    .or_default()
                    .insert(edge.id());
            }
            debug!(id = %edge.id(), edge = %edge, "created edge");
            for module in &self.modules {
                if module.supports_edge(&edge) {
                    module.add_edge(&edge);
                }
            }
        }
        Ok(edge)
    }

    /// Pure tuple lookup, never mutates.
    pub fn find_edge(&self, nodes: &[Node]) -> Option<Arc<Edge>> {
        self.edges_by_tuple
            .get(&Edge::tuple_key_of(nodes))
            .map(|edge| edge.clone())
    }

    /// Parse assertion text into a typed graph object.
    ///
    /// `(predicate arg1 ...)` yields an edge, anything else a single
    /// node. Nested parenthesized arguments are parsed recursively as
    /// edges. In strict mode (`allow_create = false`) an unresolved
    /// bare name anywhere yields `None` for the whole assertion.
    /// Malformed text yields `GraphObject::Error` instead of failing.
    pub fn parse_object(
        &self,
        text: &str,
        creator: Option<&str>,
        allow_create: bool,
    ) -> Option<GraphObject> {
        let trimmed = text.trim();
        if looks_like_assertion(trimmed) {
            match self.parse_assertion(trimmed, creator, allow_create) {
                Ok(Some(edge)) => Some(GraphObject::Edge(edge)),
                Ok(None) => None,
                Err(err) => Some(GraphObject::Error(err.into())),
            }
        } else {
            self.find_or_create_node(trimmed, creator, allow_create)
                .map(GraphObject::Node)
        }
    }

    fn parse_assertion(
        &self,
        text: &str,
        creator: Option<&str>,
        allow_create: bool,
    ) -> Result<Option<Arc<Edge>>, ParseError> {
        let tokens = split_assertion(text)?;
        let mut nodes = Vec::with_capacity(tokens.len());
        for token in &tokens {
            if looks_like_assertion(token) {
                match self.parse_assertion(token, creator, allow_create)? {
                    Some(edge) => nodes.push(Node::Assertion(edge)),
                    None => return Ok(None),
                }
            } else {
                match self.find_or_create_node(token, creator, allow_create) {
                    Some(node) => nodes.push(node),
                    None => return Ok(None),
                }
            }
        }
        // Arity was checked by the tokenizer.
        self.find_or_create_edge(nodes, creator, allow_create)
            .map(Some)
            .map_err(|_| ParseError::TooFewElements(text.to_string()))
    }

    /// Remove a concept node and cascade removal of every stored edge
    /// referencing it at any tuple position. `false` when absent.
    ///
    /// Cascades are best-effort, not transactional: an index module
    /// that reports nothing removed for a stored edge is surfaced in
    /// the log and the cascade continues.
    pub fn remove_node(&self, id: NodeId) -> bool {
        let Some((_, node)) = self.nodes_by_id.remove(&id) else {
            return false;
        };
        self.nodes_by_name
            .remove_if(&node.name(), |_, candidate| candidate.id() == id);

        let edge_ids = self
            .edges_by_node
            .remove(&id)
            .map(|(_, ids)| ids)
            .unwrap_or_default();
        let mut sorted: Vec<EdgeId> = edge_ids.into_iter().collect();
        sorted.sort_unstable();
        for edge_id in sorted {
            if !self.remove_edge(edge_id) {
                warn!(node = %id, edge = %edge_id, "cascade found back-indexed edge already gone");
            }
        }

        for module in &self.modules {
            if module.supports_node(&node) && !module.remove_node(&node) {
                warn!(node = %id, module = module.name(), "module removed nothing for stored node");
            }
        }
        true
    }

    /// Remove a stored edge; its constituent nodes are untouched.
    /// `false` when absent (detached edges are never present).
    pub fn remove_edge(&self, id: EdgeId) -> bool {
        let Some((_, edge)) = self.edges_by_id.remove(&id) else {
            return false;
        };
        self.edges_by_tuple
            .remove_if(&edge.tuple_key(), |_, candidate| candidate.id() == id);
        for concept in collect_concepts(edge.nodes()) {
            if let Some(mut ids) = self.edges_by_node.get_mut(&concept.id()) {
                ids.remove(&id);
            }
            self.edges_by_node
                .remove_if(&concept.id(), |_, ids| ids.is_empty());
        }
        for module in &self.modules {
            if module.supports_edge(&edge) && !module.remove_edge(&edge) {
                warn!(edge = %id, module = module.name(), "module removed nothing for stored edge");
            }
        }
        true
    }

    pub fn get_node_by_id(&self, id: NodeId) -> Option<Arc<ConceptNode>> {
        self.nodes_by_id.get(&id).map(|node| node.clone())
    }

    pub fn get_edge_by_id(&self, id: EdgeId) -> Option<Arc<Edge>> {
        self.edges_by_id.get(&id).map(|edge| edge.clone())
    }

    pub fn node_count(&self) -> usize {
        self.nodes_by_id.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges_by_id.len()
    }

    /// Drop every node and edge, reset both id spaces, and clear every
    /// module.
    pub fn clear(&self) {
        self.nodes_by_id.clear();
        self.nodes_by_name.clear();
        self.edges_by_id.clear();
        self.edges_by_tuple.clear();
        self.edges_by_node.clear();
        self.node_ids.reset();
        self.edge_ids.reset();
        for module in &self.modules {
            module.clear();
        }
    }

    /// Snapshot the canonical collections and offer them to every
    /// module's rebuild hook. Returns how many modules rebuilt.
    pub fn rebuild_modules(&self, force: bool) -> usize {
        let nodes: Vec<Arc<ConceptNode>> =
            self.nodes_by_id.iter().map(|entry| entry.value().clone()).collect();
        let edges: Vec<Arc<Edge>> =
            self.edges_by_id.iter().map(|entry| entry.value().clone()).collect();
        let mut rebuilt = 0;
        for module in &self.modules {
            if module.rebuild(&nodes, &edges, force) {
                info!(module = module.name(), force, "module rebuilt");
                rebuilt += 1;
            } else {
                debug!(module = module.name(), force, "module declined rebuild");
            }
        }
        rebuilt
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Concept nodes referenced by a tuple, descending into nested
/// assertions.
fn collect_concepts(nodes: &[Node]) -> Vec<Arc<ConceptNode>> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            Node::Concept(concept) => out.push(concept.clone()),
            Node::Assertion(edge) => out.extend(collect_concepts(edge.nodes())),
            _ => {}
        }
    }
    out
}
