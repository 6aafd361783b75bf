//! Build code decoding against hand-assembled payloads.

use rstest::rstest;

use treeplanter::domain::codec::{self, ATLAS_TREE_URL, CHARACTER_TREE_URL};
use treeplanter::domain::{DomainError, NodeSet, TreeType};

#[rstest]
#[case::v4_with_padding(
    "https://www.pathofexile.com/passive-skill-tree/AAAABAEAAABkAMibLQ==",
    TreeType::Character,
    4,
    &[100, 200, 39725]
)]
#[case::v4_versioned_path(
    "https://www.pathofexile.com/passive-skill-tree/3.25.0/AAAABAEAAABkAMibLQ",
    TreeType::Character,
    4,
    &[100, 200, 39725]
)]
#[case::v6_with_clusters_and_masteries(
    "https://www.pathofexile.com/atlas-skill-tree/AAAABgMCAwABAAIAAwEACQEABQAH",
    TreeType::Atlas,
    6,
    &[1, 2, 3]
)]
#[case::fullscreen_and_account_query(
    "https://www.pathofexile.com/fullscreen-passive-skill-tree/AAAABgAAAgAKABQAAA==?accountName=x&characterName=y",
    TreeType::Character,
    6,
    &[10, 20]
)]
fn given_known_code_when_decoding_then_yields_nodes(
    #[case] code: &str,
    #[case] tree: TreeType,
    #[case] version: u32,
    #[case] nodes: &[u16],
) {
    let build = codec::decode(code).unwrap();

    assert_eq!(build.tree, tree);
    assert_eq!(build.version, version);
    assert_eq!(build.nodes, nodes.iter().copied().collect::<NodeSet>());
}

#[test]
fn given_v6_code_when_decoding_then_cluster_and_mastery_ids_are_not_nodes() {
    let build = codec::decode(
        "https://www.pathofexile.com/atlas-skill-tree/AAAABgMCAwABAAIAAwEACQEABQAH",
    )
    .unwrap();

    assert_eq!(build.class_id, 3);
    assert_eq!(build.ascendancy_id, 2);
    assert!(!build.nodes.contains(&9));
    assert!(!build.nodes.contains(&7));
}

#[rstest]
#[case::not_a_tree_url("https://example.com/build/AAAA")]
#[case::empty("")]
#[case::bad_base64("https://www.pathofexile.com/passive-skill-tree/A")]
#[case::truncated_v6("https://www.pathofexile.com/passive-skill-tree/AAAABgAAAgAK")]
#[case::unknown_version("https://www.pathofexile.com/passive-skill-tree/AAAACQAA")]
fn given_malformed_code_when_decoding_then_fails(#[case] code: &str) {
    assert!(codec::decode(code).is_err());
    assert!(!codec::is_valid(code));
}

#[test]
fn given_unknown_version_when_decoding_then_reports_version() {
    let err = codec::decode("https://www.pathofexile.com/passive-skill-tree/AAAACQAA").unwrap_err();
    assert_eq!(err, DomainError::UnsupportedVersion(9));
}

#[test]
fn given_node_set_when_encoding_then_decodes_to_same_set_and_tree() {
    let nodes: NodeSet = [5, 500, 65535].into();

    let passive = codec::encode(&nodes, TreeType::Character).unwrap();
    let atlas = codec::encode(&nodes, TreeType::Atlas).unwrap();

    assert!(passive.starts_with(CHARACTER_TREE_URL));
    assert!(atlas.starts_with(ATLAS_TREE_URL));
    assert_eq!(codec::decode(&passive).unwrap().nodes, nodes);
    assert_eq!(codec::decode(&atlas).unwrap().tree, TreeType::Atlas);
}

#[test]
fn given_more_than_255_nodes_when_encoding_then_fails() {
    let nodes: NodeSet = (1..=300).collect();
    assert_eq!(
        codec::encode(&nodes, TreeType::Character).unwrap_err(),
        DomainError::TooManyNodes(300)
    );
}
