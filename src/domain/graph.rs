//! Immutable passive skill graph.
//!
//! A graph is built once per dataset load (see [`crate::domain::builder`]) and
//! never mutated afterwards. Reloading a dataset produces a new graph which is
//! swapped in through [`SharedGraph`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::domain::entities::{NodeId, NodeSet};

/// Draw position derived from group position and orbit; rendering only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// A single passive node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Empty for nodes on the shared tree.
    pub ascendancy: String,
    pub is_notable: bool,
    pub is_keystone: bool,
    pub is_jewel_socket: bool,
    pub is_mastery: bool,
    pub is_multiple_choice: bool,
    /// Undirected neighbour ids as delivered by the dataset.
    pub linked: Vec<NodeId>,
    pub orbit: usize,
    pub orbit_index: usize,
    pub draw_position: Position,
    pub draw_size: f32,
}

impl Node {
    /// Bare node without layout, mostly for hand-built graphs.
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ascendancy: String::new(),
            is_notable: false,
            is_keystone: false,
            is_jewel_socket: false,
            is_mastery: false,
            is_multiple_choice: false,
            linked: Vec::new(),
            orbit: 0,
            orbit_index: 0,
            draw_position: Position::default(),
            draw_size: 100.0,
        }
    }

    pub fn with_ascendancy(mut self, ascendancy: impl Into<String>) -> Self {
        self.ascendancy = ascendancy.into();
        self
    }

    pub fn is_linked_to(&self, other: NodeId) -> bool {
        self.linked.contains(&other)
    }
}

/// Non-fatal problem found while building or validating a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphWarning {
    /// Dataset entry skipped because it could not be decoded.
    SkippedNode { key: String, reason: String },
    /// Group skipped because it could not be decoded.
    SkippedGroup { key: String, reason: String },
    /// Group references a node the dataset does not define.
    UnknownGroupMember { group: String, node: NodeId },
    /// Edge to a node that does not exist; the edge was dropped.
    DanglingEdge { from: NodeId, to: NodeId },
    /// `from` lists `to` but `to` does not list `from`.
    AsymmetricEdge { from: NodeId, to: NodeId },
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWarning::SkippedNode { key, reason } => {
                write!(f, "skipped node entry {key}: {reason}")
            }
            GraphWarning::SkippedGroup { key, reason } => {
                write!(f, "skipped group {key}: {reason}")
            }
            GraphWarning::UnknownGroupMember { group, node } => {
                write!(f, "group {group} references unknown node {node}")
            }
            GraphWarning::DanglingEdge { from, to } => {
                write!(f, "node {from} links to unknown node {to}; edge dropped")
            }
            GraphWarning::AsymmetricEdge { from, to } => {
                write!(f, "node {from} links to {to} but not the other way round")
            }
        }
    }
}

/// Read-only mapping from node id to node.
#[derive(Debug, Clone, Default)]
pub struct SkillGraph {
    nodes: HashMap<NodeId, Node>,
    fingerprint: String,
}

impl SkillGraph {
    /// Build a graph from already decoded nodes, dropping dangling edges.
    ///
    /// Returns the graph together with every edge problem found.
    pub fn from_nodes(
        nodes: impl IntoIterator<Item = Node>,
        fingerprint: impl Into<String>,
    ) -> (Self, Vec<GraphWarning>) {
        let mut nodes: HashMap<NodeId, Node> = nodes.into_iter().map(|n| (n.id, n)).collect();
        let mut warnings = Vec::new();

        let mut ids: Vec<NodeId> = nodes.keys().copied().collect();
        ids.sort_unstable();

        for id in &ids {
            let linked = nodes[id].linked.clone();
            let mut kept = Vec::with_capacity(linked.len());
            for to in linked {
                if to == *id || kept.contains(&to) {
                    continue;
                }
                if nodes.contains_key(&to) {
                    kept.push(to);
                } else {
                    warnings.push(GraphWarning::DanglingEdge { from: *id, to });
                }
            }
            if let Some(node) = nodes.get_mut(id) {
                node.linked = kept;
            }
        }

        let graph = Self {
            nodes,
            fingerprint: fingerprint.into(),
        };
        warnings.extend(graph.asymmetric_edges());
        (graph, warnings)
    }

    pub fn lookup(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Neighbours of `id`; empty for unknown ids.
    pub fn neighbours(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.linked.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> NodeSet {
        self.nodes.keys().copied().collect()
    }

    /// Content hash of the dataset this graph was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Edges present in one direction only.
    ///
    /// One-directional edges stay navigable from the side that lists them.
    pub fn asymmetric_edges(&self) -> Vec<GraphWarning> {
        let mut ids: Vec<&NodeId> = self.nodes.keys().collect();
        ids.sort_unstable();

        let mut warnings = Vec::new();
        for from in ids {
            for &to in &self.nodes[from].linked {
                if let Some(other) = self.nodes.get(&to) {
                    if !other.is_linked_to(*from) {
                        warnings.push(GraphWarning::AsymmetricEdge { from: *from, to });
                    }
                }
            }
        }
        warnings
    }
}

/// Atomically replaceable handle to the current graph.
///
/// Readers clone the inner `Arc` and keep working on that snapshot even if a
/// reload swaps in a new graph meanwhile.
#[derive(Debug, Default)]
pub struct SharedGraph {
    inner: RwLock<Option<Arc<SkillGraph>>>,
}

impl SharedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<SkillGraph>> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Swap in a new graph, returning the previous one.
    pub fn replace(&self, graph: SkillGraph) -> Option<Arc<SkillGraph>> {
        let next = Arc::new(graph);
        match self.inner.write() {
            Ok(mut guard) => guard.replace(next),
            Err(poisoned) => poisoned.into_inner().replace(next),
        }
    }
}
