//! Graph builder for the game's passive tree dataset.
//!
//! Only the graph shape is extracted: node flags, adjacency (`out` ∪ `in`) and
//! the layout needed to place a node on screen. Anything else in the dataset
//! is ignored.

use std::collections::{BTreeMap, HashMap};
use std::f32::consts::PI;

use serde::de::{Deserializer, Error as _};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::entities::NodeId;
use crate::domain::error::DomainError;
use crate::domain::graph::{GraphWarning, Node, Position, SkillGraph};

/// Result type for graph building.
pub type BuildResult<T> = Result<T, DomainError>;

const ANGLES_16: [f32; 16] = [
    0.0, 30.0, 45.0, 60.0, 90.0, 120.0, 135.0, 150.0, 180.0, 210.0, 225.0, 240.0, 270.0, 300.0,
    315.0, 330.0,
];

const ANGLES_40: [f32; 40] = [
    0.0, 10.0, 20.0, 30.0, 40.0, 45.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 110.0, 120.0, 130.0,
    135.0, 140.0, 150.0, 160.0, 170.0, 180.0, 190.0, 200.0, 210.0, 220.0, 225.0, 230.0, 240.0,
    250.0, 260.0, 270.0, 280.0, 290.0, 300.0, 310.0, 315.0, 320.0, 330.0, 340.0, 350.0,
];

#[derive(Debug, Deserialize)]
struct RawTree {
    #[serde(default)]
    nodes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    groups: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    constants: RawConstants,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawConstants {
    skills_per_orbit: Vec<usize>,
    orbit_radii: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    skill: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ascendancy_name: Option<String>,
    #[serde(default)]
    is_notable: bool,
    #[serde(default)]
    is_keystone: bool,
    #[serde(default)]
    is_jewel_socket: bool,
    #[serde(default)]
    is_mastery: bool,
    #[serde(default)]
    is_multiple_choice: bool,
    #[serde(default)]
    orbit: usize,
    #[serde(default)]
    orbit_index: usize,
    #[serde(default, deserialize_with = "id_list")]
    out: Vec<NodeId>,
    #[serde(default, rename = "in", deserialize_with = "id_list")]
    inbound: Vec<NodeId>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    x: f32,
    y: f32,
    #[serde(default, deserialize_with = "id_list")]
    nodes: Vec<NodeId>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

/// Node id lists appear both as numbers and as numeric strings.
fn id_list<'de, D>(deserializer: D) -> Result<Vec<NodeId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<RawId>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|id| match id {
            RawId::Number(n) => NodeId::try_from(n).map_err(D::Error::custom),
            RawId::Text(s) => s.trim().parse::<NodeId>().map_err(D::Error::custom),
        })
        .collect()
}

/// Output of a successful dataset load.
#[derive(Debug, Clone)]
pub struct BuiltGraph {
    pub graph: SkillGraph,
    pub warnings: Vec<GraphWarning>,
}

/// Constructs a [`SkillGraph`] from the tree dataset JSON.
///
/// Loading is all-or-nothing with respect to JSON syntax: a document that does
/// not parse yields an error and no graph. Individual entries that fail to
/// decode are skipped and reported as warnings.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    fingerprint: String,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content hash recorded on the resulting graph.
    pub fn fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = fingerprint.into();
        self
    }

    pub fn build_from_json(self, json: &str) -> BuildResult<BuiltGraph> {
        let raw: RawTree =
            serde_json::from_str(json).map_err(|e| DomainError::InvalidDataset(e.to_string()))?;
        let mut warnings = Vec::new();

        let mut nodes: BTreeMap<NodeId, Node> = BTreeMap::new();
        for (key, value) in raw.nodes {
            match serde_json::from_value::<RawNode>(value) {
                Ok(raw_node) => match NodeId::try_from(raw_node.skill) {
                    Ok(id) => {
                        nodes.insert(id, decode_node(id, raw_node));
                    }
                    Err(_) => warnings.push(GraphWarning::SkippedNode {
                        key,
                        reason: format!("skill id {} out of range", raw_node.skill),
                    }),
                },
                Err(e) => warnings.push(GraphWarning::SkippedNode {
                    key,
                    reason: e.to_string(),
                }),
            }
        }

        let mut group_of: HashMap<NodeId, Position> = HashMap::new();
        for (key, value) in raw.groups {
            match serde_json::from_value::<RawGroup>(value) {
                Ok(group) => {
                    for id in group.nodes {
                        if nodes.contains_key(&id) {
                            group_of.insert(id, Position { x: group.x, y: group.y });
                        } else {
                            warnings.push(GraphWarning::UnknownGroupMember {
                                group: key.clone(),
                                node: id,
                            });
                        }
                    }
                }
                Err(e) => warnings.push(GraphWarning::SkippedGroup {
                    key,
                    reason: e.to_string(),
                }),
            }
        }

        for node in nodes.values_mut() {
            if let Some(group) = group_of.get(&node.id) {
                node.draw_position = layout_position(*group, node, &raw.constants);
            }
        }

        debug!(
            "decoded {} nodes, {} grouped",
            nodes.len(),
            group_of.len()
        );

        let (graph, edge_warnings) = SkillGraph::from_nodes(nodes.into_values(), self.fingerprint);
        warnings.extend(edge_warnings);

        for warning in &warnings {
            warn!("tree dataset: {}", warning);
        }

        Ok(BuiltGraph { graph, warnings })
    }
}

fn decode_node(id: NodeId, raw: RawNode) -> Node {
    let mut linked = raw.out;
    linked.extend(raw.inbound);

    let mut node = Node::new(id, raw.name.unwrap_or_default());
    node.ascendancy = raw.ascendancy_name.unwrap_or_default();
    node.is_notable = raw.is_notable;
    node.is_keystone = raw.is_keystone;
    node.is_jewel_socket = raw.is_jewel_socket;
    node.is_mastery = raw.is_mastery;
    node.is_multiple_choice = raw.is_multiple_choice;
    node.linked = linked;
    node.orbit = raw.orbit;
    node.orbit_index = raw.orbit_index;
    node.draw_size = draw_size(&node);
    node
}

fn draw_size(node: &Node) -> f32 {
    if node.is_keystone {
        250.0
    } else if node.is_notable {
        170.0
    } else if node.is_jewel_socket {
        160.0
    } else {
        100.0
    }
}

/// Angle in radians of slot `index` on an orbit with `slots` positions.
pub fn orbit_angle(index: usize, slots: usize) -> f32 {
    match slots {
        16 if index < ANGLES_16.len() => ANGLES_16[index] * PI / 180.0,
        40 if index < ANGLES_40.len() => ANGLES_40[index] * PI / 180.0,
        0 => 0.0,
        _ => 2.0 * PI * index as f32 / slots as f32,
    }
}

fn layout_position(group: Position, node: &Node, constants: &RawConstants) -> Position {
    let radius = constants.orbit_radii.get(node.orbit).copied().unwrap_or(0.0);
    let slots = constants.skills_per_orbit.get(node.orbit).copied().unwrap_or(0);
    let angle = orbit_angle(node.orbit_index, slots);
    Position {
        x: group.x + radius * angle.sin(),
        y: group.y - radius * angle.cos(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_TREE: &str = r#"{
        "nodes": {
            "root": { "out": ["10"] },
            "10": { "skill": 10, "name": "Start", "orbit": 0, "orbitIndex": 0, "out": ["11"], "in": [] },
            "11": { "skill": 11, "name": "Notable", "isNotable": true, "orbit": 1, "orbitIndex": 4,
                    "out": [], "in": ["10"] },
            "12": { "skill": 12, "name": "Keystone", "isKeystone": true, "out": [12345], "in": [] }
        },
        "groups": {
            "1": { "x": 100.0, "y": 50.0, "nodes": ["10", "11", "99"] }
        },
        "constants": { "skillsPerOrbit": [1, 16], "orbitRadii": [0, 82] }
    }"#;

    #[test]
    fn given_small_tree_when_building_then_decodes_nodes_and_links() {
        let built = GraphBuilder::new().build_from_json(SMALL_TREE).unwrap();
        let graph = &built.graph;

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.neighbours(10), &[11]);
        assert_eq!(graph.neighbours(11), &[10]);
        assert!(graph.lookup(11).unwrap().is_notable);
        assert_eq!(graph.lookup(12).unwrap().draw_size, 250.0);
    }

    #[test]
    fn given_small_tree_when_building_then_reports_skips_and_dangling_edges() {
        let built = GraphBuilder::new().build_from_json(SMALL_TREE).unwrap();

        assert!(built
            .warnings
            .iter()
            .any(|w| matches!(w, GraphWarning::SkippedNode { key, .. } if key == "root")));
        assert!(built
            .warnings
            .contains(&GraphWarning::UnknownGroupMember { group: "1".into(), node: 99 }));
        assert!(built
            .warnings
            .contains(&GraphWarning::DanglingEdge { from: 12, to: 12345 }));
    }

    #[test]
    fn given_orbit_layout_when_building_then_positions_relative_to_group() {
        let built = GraphBuilder::new().build_from_json(SMALL_TREE).unwrap();
        let start = built.graph.lookup(10).unwrap();
        let notable = built.graph.lookup(11).unwrap();

        assert_eq!(start.draw_position, Position { x: 100.0, y: 50.0 });
        // slot 4 of 16 is 90 degrees: straight to the right
        assert!((notable.draw_position.x - 182.0).abs() < 1e-3);
        assert!((notable.draw_position.y - 50.0).abs() < 1e-3);
    }

    #[test]
    fn given_broken_json_when_building_then_fails_without_graph() {
        let err = GraphBuilder::new().build_from_json("{ \"nodes\": ").unwrap_err();
        assert!(matches!(err, DomainError::InvalidDataset(_)));
    }

    #[test]
    fn given_uniform_orbit_when_computing_angle_then_divides_circle() {
        assert!((orbit_angle(3, 6) - PI).abs() < 1e-6);
        assert_eq!(orbit_angle(5, 0), 0.0);
    }
}
