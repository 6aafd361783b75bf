//! Overlay plan: what an external renderer should draw for one tree.

use std::collections::BTreeMap;

use crate::domain::diff::AllocationDiff;
use crate::domain::entities::{NodeId, NodeSet};
use crate::domain::graph::SkillGraph;

/// Per-node state shown by the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMark {
    /// Allocated and wanted.
    Picked,
    /// Allocated but not part of the target.
    Wrong,
    /// Wanted but not allocated yet.
    Unpicked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Deallocate,
    Allocate,
    Allocated,
}

/// Undirected link, stored with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
}

impl Link {
    pub fn new(x: NodeId, y: NodeId) -> Self {
        Self {
            a: x.min(y),
            b: x.max(y),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlaySummary {
    pub total: usize,
    pub picked: usize,
    pub wrong: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayPlan {
    pub marks: BTreeMap<NodeId, NodeMark>,
    pub links: BTreeMap<Link, LinkKind>,
    pub summary: OverlaySummary,
    pub highlighted: Option<NodeId>,
}

impl OverlayPlan {
    /// Nodes outside the graph get no mark and no links.
    pub fn compute(
        allocated: &NodeSet,
        target: &NodeSet,
        graph: &SkillGraph,
        highlighted: Option<NodeId>,
    ) -> Self {
        let diff = AllocationDiff::compute(allocated, target);
        let mut marks = BTreeMap::new();

        for &id in allocated.union(target) {
            if !graph.contains(id) {
                continue;
            }
            let mark = if diff.wrong.contains(&id) {
                NodeMark::Wrong
            } else if diff.missing.contains(&id) {
                NodeMark::Unpicked
            } else {
                NodeMark::Picked
            };
            marks.insert(id, mark);
        }

        let mut links = BTreeMap::new();
        for &id in marks.keys() {
            for &other in graph.neighbours(id) {
                if !marks.contains_key(&other) {
                    continue;
                }
                let kind = if diff.wrong.contains(&id) || diff.wrong.contains(&other) {
                    LinkKind::Deallocate
                } else if diff.missing.contains(&id) || diff.missing.contains(&other) {
                    LinkKind::Allocate
                } else {
                    LinkKind::Allocated
                };
                links.insert(Link::new(id, other), kind);
            }
        }

        let summary = OverlaySummary {
            total: target.len(),
            picked: target.intersection(allocated).count(),
            wrong: diff.wrong.len(),
        };

        Self {
            marks,
            links,
            summary,
            highlighted,
        }
    }

    pub fn links_of(&self, kind: LinkKind) -> impl Iterator<Item = &Link> + '_ {
        self.links
            .iter()
            .filter(move |(_, k)| **k == kind)
            .map(|(link, _)| link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::Node;

    fn chain() -> SkillGraph {
        let mut n1 = Node::new(1, "a");
        n1.linked = vec![2];
        let mut n2 = Node::new(2, "b");
        n2.linked = vec![1, 3];
        let mut n3 = Node::new(3, "c");
        n3.linked = vec![2, 4];
        let mut n4 = Node::new(4, "d");
        n4.linked = vec![3];
        SkillGraph::from_nodes(vec![n1, n2, n3, n4], "").0
    }

    #[test]
    fn given_partial_allocation_when_planning_then_marks_each_node() {
        let plan = OverlayPlan::compute(&NodeSet::from([1, 2]), &NodeSet::from([2, 3]), &chain(), Some(3));

        assert_eq!(plan.marks[&1], NodeMark::Wrong);
        assert_eq!(plan.marks[&2], NodeMark::Picked);
        assert_eq!(plan.marks[&3], NodeMark::Unpicked);
        assert!(!plan.marks.contains_key(&4));
        assert_eq!(plan.highlighted, Some(3));
    }

    #[test]
    fn given_partial_allocation_when_planning_then_classifies_links_once() {
        let plan = OverlayPlan::compute(&NodeSet::from([1, 2]), &NodeSet::from([2, 3]), &chain(), None);

        assert_eq!(plan.links.len(), 2);
        assert_eq!(plan.links[&Link::new(2, 1)], LinkKind::Deallocate);
        assert_eq!(plan.links[&Link::new(2, 3)], LinkKind::Allocate);
        assert_eq!(plan.links_of(LinkKind::Allocated).count(), 0);
    }

    #[test]
    fn given_partial_allocation_when_planning_then_summarises_progress() {
        let plan = OverlayPlan::compute(&NodeSet::from([1, 2]), &NodeSet::from([2, 3, 99]), &chain(), None);

        assert_eq!(
            plan.summary,
            OverlaySummary {
                total: 3,
                picked: 1,
                wrong: 1
            }
        );
    }
}
