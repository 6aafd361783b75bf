//! Domain entities: core data structures

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Passive node identifier, unique within one graph snapshot.
pub type NodeId = u16;

/// Set of node ids. Membership matters, order does not; the ordered set
/// keeps iteration deterministic.
pub type NodeSet = BTreeSet<NodeId>;

/// Which passive tree a build, graph or allocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeType {
    #[serde(alias = "Character", alias = "passive")]
    Character,
    #[serde(alias = "Atlas")]
    Atlas,
}

impl TreeType {
    pub const ALL: [TreeType; 2] = [TreeType::Character, TreeType::Atlas];

    pub fn as_str(&self) -> &'static str {
        match self {
            TreeType::Character => "character",
            TreeType::Atlas => "atlas",
        }
    }
}

impl fmt::Display for TreeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TreeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "character" | "char" | "passive" => Ok(TreeType::Character),
            "atlas" => Ok(TreeType::Atlas),
            other => Err(format!("unknown tree type: {other}")),
        }
    }
}

/// Identity of the currently loaded target: tree type plus the build string.
///
/// Compared by value, used for throttle and dedup guards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildRef {
    pub tree: TreeType,
    pub code: String,
}

impl BuildRef {
    /// Surrounding whitespace is dropped so references compare equal to
    /// the stage they were loaded from.
    pub fn new(tree: TreeType, code: impl AsRef<str>) -> Self {
        Self {
            tree,
            code: code.as_ref().trim().to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.code.trim().is_empty()
    }
}

impl fmt::Display for BuildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tree, self.code)
    }
}

/// One entry of a staged build: a labelled target build string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub tag: String,
    #[serde(rename = "url")]
    pub code: String,
    #[serde(rename = "type")]
    pub tree: TreeType,
}

impl Stage {
    pub fn build_ref(&self) -> BuildRef {
        BuildRef::new(self.tree, self.code.clone())
    }
}

/// Parse a comma or whitespace separated list of node ids.
///
/// Used for allocation snapshots given on the command line or in fixtures.
pub fn parse_node_list(input: &str) -> Result<NodeSet, String> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<NodeId>()
                .map_err(|e| format!("invalid node id '{s}': {e}"))
        })
        .collect()
}
