//! Dataset loading into a skill graph.

use std::sync::Arc;

use treeplanter::domain::{GraphBuilder, GraphWarning, SharedGraph};

const DATASET: &str = r#"{
    "tree": "Default",
    "classes": [],
    "nodes": {
        "root": { "out": ["1"] },
        "1": { "skill": 1, "name": "Start", "out": ["2"], "in": [] },
        "2": { "skill": 2, "name": "Life", "out": [3], "in": ["1"] },
        "3": { "skill": 3, "name": "Big Notable", "isNotable": true, "out": ["4"], "in": ["2"] },
        "4": { "skill": 4, "name": "One Way", "out": [], "in": [] },
        "5": { "skill": 5, "name": "Ascendant Start", "ascendancyName": "Ascendant", "out": [], "in": [] },
        "70000": { "skill": 70000, "name": "Too Big" }
    },
    "groups": {
        "7": { "x": -10.5, "y": 20.0, "nodes": ["1", "2"] },
        "8": { "x": 0.0 }
    },
    "constants": { "skillsPerOrbit": [1, 6], "orbitRadii": [0, 82] }
}"#;

#[test]
fn given_dataset_when_building_then_links_are_union_of_out_and_in() {
    let built = GraphBuilder::new().build_from_json(DATASET).unwrap();
    let graph = built.graph;

    assert_eq!(graph.len(), 5);
    assert_eq!(graph.neighbours(2), &[3, 1]);
    assert_eq!(graph.neighbours(1), &[2]);
    assert_eq!(graph.lookup(5).unwrap().ascendancy, "Ascendant");
    assert!(graph.lookup(3).unwrap().is_notable);
}

#[test]
fn given_one_directional_edge_when_building_then_keeps_it_and_warns() {
    let built = GraphBuilder::new().build_from_json(DATASET).unwrap();

    assert_eq!(built.graph.neighbours(3), &[4, 2]);
    assert!(built.graph.neighbours(4).is_empty());
    assert!(built
        .warnings
        .contains(&GraphWarning::AsymmetricEdge { from: 3, to: 4 }));
}

#[test]
fn given_undecodable_entries_when_building_then_skips_them_with_warnings() {
    let built = GraphBuilder::new().build_from_json(DATASET).unwrap();

    let skipped: Vec<&str> = built
        .warnings
        .iter()
        .filter_map(|w| match w {
            GraphWarning::SkippedNode { key, .. } => Some(key.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec!["70000", "root"]);
    assert!(built
        .warnings
        .iter()
        .any(|w| matches!(w, GraphWarning::SkippedGroup { key, .. } if key == "8")));
}

#[test]
fn given_fingerprint_when_building_then_graph_carries_it() {
    let built = GraphBuilder::new()
        .fingerprint("abcd1234")
        .build_from_json(DATASET)
        .unwrap();
    assert_eq!(built.graph.fingerprint(), "abcd1234");
}

#[test]
fn given_invalid_json_when_building_then_errors() {
    assert!(GraphBuilder::new().build_from_json("[1, 2").is_err());
}

#[test]
fn given_reader_snapshot_when_graph_replaced_then_snapshot_stays_valid() {
    let shared = SharedGraph::new();
    assert!(shared.current().is_none());

    let first = GraphBuilder::new().fingerprint("a").build_from_json(DATASET).unwrap();
    shared.replace(first.graph);
    let snapshot = shared.current().unwrap();

    let second = GraphBuilder::new()
        .fingerprint("b")
        .build_from_json(r#"{ "nodes": {} }"#)
        .unwrap();
    let previous = shared.replace(second.graph).unwrap();

    assert!(Arc::ptr_eq(&snapshot, &previous));
    assert_eq!(snapshot.len(), 5);
    assert_eq!(shared.current().unwrap().fingerprint(), "b");
    assert!(shared.current().unwrap().is_empty());
}
