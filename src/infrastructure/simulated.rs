//! In-memory passive panel.
//!
//! Behaves like the game's panel closely enough to drive the convergence loop
//! without a game client: nodes can be allocated next to an allocated node (or
//! on a root), and deallocated as long as the rest of the allocation stays
//! connected. Used by the `simulate` command and the tests.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::domain::{NodeId, NodeSet, SkillGraph, TreeType};
use crate::infrastructure::traits::{
    AllocationSource, NodeAffordance, PassiveSurface, RefundSurface, SurfaceError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hover {
    Node(NodeId),
    Refund,
}

#[derive(Debug, Default)]
struct State {
    allocated: NodeSet,
    pending_refunds: NodeSet,
    hovered: Option<Hover>,
    open: bool,
    confirms: usize,
}

/// Simulated passive panel for a single tree type.
pub struct SimulatedTree {
    tree: TreeType,
    graph: Arc<SkillGraph>,
    roots: NodeSet,
    hidden: NodeSet,
    refund_mode: bool,
    close_after: Option<usize>,
    state: Mutex<State>,
}

impl SimulatedTree {
    pub fn new(tree: TreeType, graph: Arc<SkillGraph>, allocated: NodeSet) -> Self {
        Self {
            tree,
            graph,
            roots: NodeSet::new(),
            hidden: NodeSet::new(),
            refund_mode: false,
            close_after: None,
            state: Mutex::new(State {
                allocated,
                open: true,
                ..State::default()
            }),
        }
    }

    /// Nodes that can always be allocated and never deallocated (class start).
    pub fn with_roots(mut self, roots: NodeSet) -> Self {
        self.roots = roots;
        self
    }

    /// Nodes present in the graph but missing from the panel.
    pub fn with_hidden(mut self, hidden: NodeSet) -> Self {
        self.hidden = hidden;
        self
    }

    /// Deallocations go through a bulk refund surface that must be confirmed.
    pub fn with_refund_mode(mut self) -> Self {
        self.refund_mode = true;
        self
    }

    /// Close the panel after this many confirms.
    pub fn close_after(mut self, confirms: usize) -> Self {
        self.close_after = Some(confirms);
        self
    }

    pub fn close(&self) {
        self.lock().open = false;
    }

    pub fn snapshot(&self) -> NodeSet {
        self.lock().allocated.clone()
    }

    pub fn confirms(&self) -> usize {
        self.lock().confirms
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn serves(&self, tree: TreeType) -> bool {
        tree == self.tree
    }

    fn is_visible(&self, id: NodeId) -> bool {
        self.graph.contains(id) && !self.hidden.contains(&id)
    }

    fn can_allocate(&self, state: &State, id: NodeId) -> bool {
        if state.allocated.contains(&id) {
            return false;
        }
        self.roots.contains(&id)
            || state.allocated.is_empty()
            || self
                .graph
                .neighbours(id)
                .iter()
                .any(|n| state.allocated.contains(n))
    }

    /// Removing `id` must leave the remaining live allocation connected.
    fn can_deallocate(&self, state: &State, id: NodeId) -> bool {
        if !state.allocated.contains(&id)
            || state.pending_refunds.contains(&id)
            || self.roots.contains(&id)
        {
            return false;
        }
        let remaining: NodeSet = state
            .allocated
            .iter()
            .copied()
            .filter(|n| *n != id && !state.pending_refunds.contains(n))
            .collect();
        self.is_connected(&remaining)
    }

    fn is_connected(&self, nodes: &NodeSet) -> bool {
        let Some(&first) = nodes.iter().next() else {
            return true;
        };
        let mut seen = HashSet::from([first]);
        let mut queue = VecDeque::from([first]);
        while let Some(current) = queue.pop_front() {
            for &next in self.graph.neighbours(current) {
                if nodes.contains(&next) && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen.len() == nodes.len()
    }
}

impl AllocationSource for SimulatedTree {
    fn allocated(&self, tree: TreeType) -> NodeSet {
        if !self.serves(tree) {
            return NodeSet::new();
        }
        self.lock().allocated.clone()
    }
}

impl PassiveSurface for SimulatedTree {
    fn is_open(&self, tree: TreeType) -> bool {
        self.serves(tree) && self.lock().open
    }

    fn node(&self, tree: TreeType, id: NodeId) -> Option<NodeAffordance> {
        if !self.serves(tree) || !self.is_visible(id) {
            return None;
        }
        let state = self.lock();
        Some(NodeAffordance {
            allocated: state.allocated.contains(&id) && !state.pending_refunds.contains(&id),
            can_allocate: self.can_allocate(&state, id),
            can_deallocate: self.can_deallocate(&state, id),
        })
    }

    fn hovered(&self, tree: TreeType) -> Option<NodeId> {
        if !self.serves(tree) {
            return None;
        }
        match self.lock().hovered {
            Some(Hover::Node(id)) => Some(id),
            _ => None,
        }
    }

    fn refund_surface(&self, tree: TreeType) -> RefundSurface {
        let state = self.lock();
        if !self.serves(tree) || state.pending_refunds.is_empty() {
            return RefundSurface::Closed;
        }
        RefundSurface::Open {
            ready: state.hovered == Some(Hover::Refund),
        }
    }

    fn hover_node(&self, tree: TreeType, id: NodeId) -> Result<(), SurfaceError> {
        if !self.is_open(tree) {
            return Err(SurfaceError::Closed);
        }
        if !self.is_visible(id) {
            return Err(SurfaceError::NodeNotFound(id));
        }
        trace!("hover node {}", id);
        self.lock().hovered = Some(Hover::Node(id));
        Ok(())
    }

    fn hover_refund(&self, tree: TreeType) -> Result<(), SurfaceError> {
        if !self.is_open(tree) {
            return Err(SurfaceError::Closed);
        }
        let mut state = self.lock();
        if state.pending_refunds.is_empty() {
            return Err(SurfaceError::RefundClosed);
        }
        state.hovered = Some(Hover::Refund);
        Ok(())
    }

    fn confirm(&self, tree: TreeType) -> Result<(), SurfaceError> {
        if !self.is_open(tree) {
            return Err(SurfaceError::Closed);
        }
        let mut state = self.lock();
        let result = match state.hovered {
            None => Err(SurfaceError::NothingHovered),
            Some(Hover::Refund) => {
                let refunded = std::mem::take(&mut state.pending_refunds);
                debug!("refund confirmed for {:?}", refunded);
                for id in &refunded {
                    state.allocated.remove(id);
                }
                state.hovered = None;
                Ok(())
            }
            Some(Hover::Node(id)) => {
                if self.can_deallocate(&state, id) {
                    if self.refund_mode {
                        state.pending_refunds.insert(id);
                    } else {
                        state.allocated.remove(&id);
                    }
                    Ok(())
                } else if self.can_allocate(&state, id) {
                    state.allocated.insert(id);
                    Ok(())
                } else {
                    Err(SurfaceError::NotActionable(format!("node {id}")))
                }
            }
        };

        if result.is_ok() {
            state.confirms += 1;
            if self.close_after.is_some_and(|limit| state.confirms >= limit) {
                debug!("panel closes after {} confirms", state.confirms);
                state.open = false;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Node;

    fn chain() -> Arc<SkillGraph> {
        let mut nodes = Vec::new();
        for id in 1..=4u16 {
            let mut node = Node::new(id, format!("n{id}"));
            if id > 1 {
                node.linked.push(id - 1);
            }
            if id < 4 {
                node.linked.push(id + 1);
            }
            nodes.push(node);
        }
        Arc::new(SkillGraph::from_nodes(nodes, "").0)
    }

    #[test]
    fn given_middle_node_when_querying_then_cannot_deallocate() {
        let sim = SimulatedTree::new(TreeType::Character, chain(), [1, 2, 3].into());

        let middle = sim.node(TreeType::Character, 2).unwrap();
        let leaf = sim.node(TreeType::Character, 3).unwrap();

        assert!(middle.allocated && !middle.can_deallocate);
        assert!(leaf.can_deallocate);
        assert!(sim.node(TreeType::Character, 4).unwrap().can_allocate);
    }

    #[test]
    fn given_hovered_neighbour_when_confirming_then_allocates() {
        let sim = SimulatedTree::new(TreeType::Character, chain(), [1].into());

        sim.hover_node(TreeType::Character, 2).unwrap();
        sim.confirm(TreeType::Character).unwrap();

        assert_eq!(sim.snapshot(), NodeSet::from([1, 2]));
        assert_eq!(sim.confirms(), 1);
    }

    #[test]
    fn given_refund_mode_when_deallocating_then_needs_refund_confirm() {
        let sim = SimulatedTree::new(TreeType::Atlas, chain(), [1, 2].into()).with_refund_mode();

        sim.hover_node(TreeType::Atlas, 2).unwrap();
        sim.confirm(TreeType::Atlas).unwrap();
        assert_eq!(
            sim.refund_surface(TreeType::Atlas),
            RefundSurface::Open { ready: false }
        );
        assert_eq!(sim.allocated(TreeType::Atlas), NodeSet::from([1, 2]));

        sim.hover_refund(TreeType::Atlas).unwrap();
        sim.confirm(TreeType::Atlas).unwrap();

        assert_eq!(sim.allocated(TreeType::Atlas), NodeSet::from([1]));
        assert_eq!(sim.refund_surface(TreeType::Atlas), RefundSurface::Closed);
    }

    #[test]
    fn given_hidden_node_when_hovering_then_not_found() {
        let sim = SimulatedTree::new(TreeType::Character, chain(), [1].into())
            .with_hidden([2].into());

        assert_eq!(
            sim.hover_node(TreeType::Character, 2),
            Err(SurfaceError::NodeNotFound(2))
        );
        assert!(sim.node(TreeType::Character, 2).is_none());
    }

    #[test]
    fn given_other_tree_type_when_querying_then_surface_is_closed() {
        let sim = SimulatedTree::new(TreeType::Character, chain(), [1].into());

        assert!(!sim.is_open(TreeType::Atlas));
        assert!(sim.allocated(TreeType::Atlas).is_empty());
    }
}
