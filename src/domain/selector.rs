//! Next-node selection.
//!
//! Picks the single best node to allocate next. Candidates touching the
//! current allocation (the frontier) always win over the starter fallback.
//! Among candidates the one heading the shallowest branch of the remaining
//! missing region is chosen, ties broken by the smaller id. The result is a
//! pure function of its inputs.

use std::collections::{HashSet, VecDeque};

use rayon::prelude::*;
use tracing::trace;

use crate::domain::diff::AscendancyExclusions;
use crate::domain::entities::{NodeId, NodeSet};
use crate::domain::graph::SkillGraph;

/// Two class start nodes per character archetype.
pub const DEFAULT_STARTER_NODES: [NodeId; 12] = [
    // duelist
    39725, 47389, //
    // warrior
    50904, 31628, //
    // templar
    20228, 63965, //
    // witch
    57264, 57226, //
    // shadow
    45272, 38129, //
    // ranger
    45035, 39821,
];

/// Maximum BFS distance reachable from `start` moving only through `missing`.
pub fn missing_depth(start: NodeId, missing: &NodeSet, graph: &SkillGraph) -> usize {
    let mut queue = VecDeque::from([(start, 0usize)]);
    let mut seen = HashSet::from([start]);
    let mut max_depth = 0;

    while let Some((current, dist)) = queue.pop_front() {
        max_depth = max_depth.max(dist);
        for &next in graph.neighbours(current) {
            if missing.contains(&next) && seen.insert(next) {
                queue.push_back((next, dist + 1));
            }
        }
    }

    max_depth
}

/// Smallest `(depth, id)` among candidates.
fn shallowest(
    candidates: &[NodeId],
    missing: &NodeSet,
    graph: &SkillGraph,
) -> Option<NodeId> {
    candidates
        .par_iter()
        .map(|&id| (missing_depth(id, missing, graph), id))
        .min()
        .map(|(depth, id)| {
            trace!("picked {} at depth {}", id, depth);
            id
        })
}

/// Next-node selector configured with exclusions and starter nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextNodeSelector {
    exclusions: AscendancyExclusions,
    starters: NodeSet,
}

impl Default for NextNodeSelector {
    fn default() -> Self {
        Self::new(
            AscendancyExclusions::default(),
            DEFAULT_STARTER_NODES.into_iter().collect(),
        )
    }
}

impl NextNodeSelector {
    pub fn new(exclusions: AscendancyExclusions, starters: NodeSet) -> Self {
        Self {
            exclusions,
            starters,
        }
    }

    pub fn exclusions(&self) -> &AscendancyExclusions {
        &self.exclusions
    }

    pub fn starters(&self) -> &NodeSet {
        &self.starters
    }

    /// Filtered view of `missing`: what is still reachable to allocate.
    pub fn filter_missing(&self, missing: &NodeSet, graph: &SkillGraph) -> NodeSet {
        self.exclusions.filter(missing, graph)
    }

    /// Frontier: filtered missing nodes with at least one allocated neighbour.
    pub fn frontier(&self, allocated: &NodeSet, filtered: &NodeSet, graph: &SkillGraph) -> Vec<NodeId> {
        filtered
            .iter()
            .copied()
            .filter(|&id| graph.neighbours(id).iter().any(|n| allocated.contains(n)))
            .collect()
    }

    /// Best node to allocate next, or `None` when nothing is reachable.
    pub fn select(
        &self,
        allocated: &NodeSet,
        missing: &NodeSet,
        graph: &SkillGraph,
    ) -> Option<NodeId> {
        let filtered = self.filter_missing(missing, graph);
        if filtered.is_empty() {
            return None;
        }

        let frontier = self.frontier(allocated, &filtered, graph);
        if !frontier.is_empty() {
            return shallowest(&frontier, missing, graph);
        }

        // Disconnected target region: enter through a class start node.
        let starters: Vec<NodeId> = missing.intersection(&self.starters).copied().collect();
        shallowest(&starters, missing, graph)
    }
}

/// [`NextNodeSelector::select`] with the default exclusions and the given starters.
pub fn select_next(
    allocated: &NodeSet,
    missing: &NodeSet,
    graph: &SkillGraph,
    starters: &NodeSet,
) -> Option<NodeId> {
    NextNodeSelector::new(AscendancyExclusions::default(), starters.clone())
        .select(allocated, missing, graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::Node;

    fn line_graph(edges: &[(NodeId, NodeId)]) -> SkillGraph {
        let mut nodes: std::collections::BTreeMap<NodeId, Node> = Default::default();
        for &(a, b) in edges {
            nodes.entry(a).or_insert_with(|| Node::new(a, "")).linked.push(b);
            nodes.entry(b).or_insert_with(|| Node::new(b, "")).linked.push(a);
        }
        SkillGraph::from_nodes(nodes.into_values(), "").0
    }

    #[test]
    fn given_chain_when_measuring_depth_then_counts_longest_missing_path() {
        let graph = line_graph(&[(1, 2), (2, 3), (3, 4)]);
        let missing: NodeSet = [2, 3, 4].into();

        assert_eq!(missing_depth(2, &missing, &graph), 2);
        assert_eq!(missing_depth(4, &missing, &graph), 2);
        assert_eq!(missing_depth(3, &missing, &graph), 1);
    }

    #[test]
    fn given_isolated_candidate_when_measuring_depth_then_zero() {
        let graph = line_graph(&[(1, 2)]);
        assert_eq!(missing_depth(1, &NodeSet::from([1]), &graph), 0);
    }

    #[test]
    fn given_two_frontier_branches_when_selecting_then_prefers_shallow_branch() {
        // 1 is allocated; branch via 10 is one node deep, via 5 three deep
        let graph = line_graph(&[(1, 5), (5, 6), (6, 7), (7, 8), (1, 10)]);
        let allocated: NodeSet = [1].into();
        let missing: NodeSet = [5, 6, 7, 8, 10].into();

        let next = NextNodeSelector::default().select(&allocated, &missing, &graph);

        assert_eq!(next, Some(10));
    }

    #[test]
    fn given_nothing_missing_when_selecting_then_none() {
        let graph = line_graph(&[(1, 2)]);
        let next = NextNodeSelector::default().select(&NodeSet::from([1]), &NodeSet::new(), &graph);
        assert_eq!(next, None);
    }
}
