//! Allocation diff and the node exclusion filter.

use std::fmt;

use crate::domain::entities::{NodeId, NodeSet};
use crate::domain::graph::{Node, SkillGraph};

/// Ascendancy classes whose nodes are never a valid automated target.
pub const IGNORED_ASCENDANCIES: [&str; 19] = [
    "Berserker",
    "Guardian",
    "Juggernaut",
    "Hierophant",
    "Chieftain",
    "Inquisitor",
    "Ascendant",
    "Gladiator",
    "Occultist",
    "Elementalist",
    "Champion",
    "Necromancer",
    "Slayer",
    "Assassin",
    "Pathfinder",
    "Trickster",
    "Saboteur",
    "Raider",
    "Deadeye",
];

/// `wrong = allocated − target`, `missing = target − allocated`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationDiff {
    pub wrong: NodeSet,
    pub missing: NodeSet,
}

impl AllocationDiff {
    pub fn compute(allocated: &NodeSet, target: &NodeSet) -> Self {
        Self {
            wrong: allocated.difference(target).copied().collect(),
            missing: target.difference(allocated).copied().collect(),
        }
    }

    pub fn is_converged(&self) -> bool {
        self.wrong.is_empty() && self.missing.is_empty()
    }
}

/// Drops nodes that must never be treated as a next or missing target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AscendancyExclusions {
    names: Vec<String>,
}

impl Default for AscendancyExclusions {
    fn default() -> Self {
        Self::new(IGNORED_ASCENDANCIES.iter().map(|s| s.to_string()))
    }
}

impl AscendancyExclusions {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names
                .into_iter()
                .map(|n| n.trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Case-insensitive substring match of the node's ascendancy tag.
    pub fn is_excluded(&self, node: &Node) -> bool {
        let tag = node.ascendancy.trim();
        if tag.is_empty() {
            return false;
        }
        let tag = tag.to_lowercase();
        self.names.iter().any(|name| tag.contains(name.as_str()))
    }

    /// Removes the `0` sentinel, ids unknown to the graph and excluded
    /// ascendancy nodes.
    pub fn filter<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a NodeId>,
        graph: &SkillGraph,
    ) -> NodeSet {
        ids.into_iter()
            .copied()
            .filter(|&id| id != 0)
            .filter(|&id| match graph.lookup(id) {
                Some(node) => !self.is_excluded(node),
                None => false,
            })
            .collect()
    }
}

/// Problem with a freshly loaded target set. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetWarning {
    UnknownNode(NodeId),
    ExcludedNode { id: NodeId, ascendancy: String },
}

impl fmt::Display for TargetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetWarning::UnknownNode(id) => write!(f, "target node {id} is not in the tree"),
            TargetWarning::ExcludedNode { id, ascendancy } => {
                write!(f, "target node {id} belongs to {ascendancy} and is skipped")
            }
        }
    }
}

/// Report target ids the planner will never act on.
pub fn validate_target(
    target: &NodeSet,
    graph: &SkillGraph,
    exclusions: &AscendancyExclusions,
) -> Vec<TargetWarning> {
    target
        .iter()
        .filter(|&&id| id != 0)
        .filter_map(|&id| match graph.lookup(id) {
            None => Some(TargetWarning::UnknownNode(id)),
            Some(node) if exclusions.is_excluded(node) => Some(TargetWarning::ExcludedNode {
                id,
                ascendancy: node.ascendancy.clone(),
            }),
            Some(_) => None,
        })
        .collect()
}
