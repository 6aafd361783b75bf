//! Stage sequencing across a staged build.

use std::time::{Duration, Instant};

use treeplanter::domain::codec::encode;
use treeplanter::domain::sequence::stages_for;
use treeplanter::domain::{BuildRef, Hold, NodeSet, SequenceAdvancer, Stage, TreeType};

fn stage(tag: &str, tree: TreeType, nodes: &[u16]) -> Stage {
    let set: NodeSet = nodes.iter().copied().collect();
    Stage {
        tag: tag.to_string(),
        code: encode(&set, tree).unwrap(),
        tree,
    }
}

/// Character stages A, B, C with an atlas stage in between.
fn build() -> Vec<Stage> {
    vec![
        stage("A", TreeType::Character, &[1]),
        stage("maps", TreeType::Atlas, &[7]),
        stage("B", TreeType::Character, &[1, 2]),
        stage("C", TreeType::Character, &[1, 2, 3]),
    ]
}

#[test]
fn given_stage_b_done_when_advancing_then_moves_to_c() {
    let stages = build();
    let mut advancer = SequenceAdvancer::new(Duration::ZERO);
    let b = stages[2].build_ref();
    advancer.select(&stages, &b);

    let advance = advancer
        .try_advance(&stages, Some(&b), true, Instant::now())
        .unwrap();

    assert_eq!(advance.from_index, 1);
    assert_eq!(advance.to_index, 2);
    assert_eq!(advance.to, stages[3].build_ref());
    assert_eq!(advancer.current_index(TreeType::Character), 2);
}

#[test]
fn given_last_stage_done_when_advancing_then_wraps_to_first() {
    let stages = build();
    let mut advancer = SequenceAdvancer::new(Duration::ZERO);
    let c = stages[3].build_ref();

    let advance = advancer
        .try_advance(&stages, Some(&c), true, Instant::now())
        .unwrap();

    assert_eq!(advance.to_index, 0);
    assert_eq!(advance.to, stages[0].build_ref());
}

#[test]
fn given_recent_advance_when_advancing_again_then_cooling_down() {
    let stages = build();
    let mut advancer = SequenceAdvancer::new(Duration::from_millis(250));
    let now = Instant::now();
    let a = stages[0].build_ref();
    let b = stages[2].build_ref();

    assert!(advancer.try_advance(&stages, Some(&a), true, now).is_ok());
    assert_eq!(
        advancer.try_advance(&stages, Some(&b), true, now + Duration::from_millis(100)),
        Err(Hold::CoolingDown)
    );
    assert!(advancer
        .try_advance(&stages, Some(&b), true, now + Duration::from_millis(300))
        .is_ok());
}

#[test]
fn given_missing_nodes_left_when_advancing_then_still_missing() {
    let stages = build();
    let mut advancer = SequenceAdvancer::default();

    assert_eq!(
        advancer.try_advance(&stages, Some(&stages[0].build_ref()), false, Instant::now()),
        Err(Hold::StillMissing)
    );
}

#[test]
fn given_blank_or_no_current_target_when_advancing_then_holds() {
    let stages = build();
    let mut advancer = SequenceAdvancer::default();
    let blank = BuildRef::new(TreeType::Character, "  ");

    assert_eq!(
        advancer.try_advance(&stages, None, true, Instant::now()),
        Err(Hold::NoCurrentTarget)
    );
    assert_eq!(
        advancer.try_advance(&stages, Some(&blank), true, Instant::now()),
        Err(Hold::NoCurrentTarget)
    );
}

#[test]
fn given_next_stage_with_broken_code_when_advancing_then_invalid_next_stage() {
    let mut stages = build();
    stages[2].code = "https://www.pathofexile.com/passive-skill-tree/AAAACQAA".to_string();
    let mut advancer = SequenceAdvancer::new(Duration::ZERO);

    assert_eq!(
        advancer.try_advance(&stages, Some(&stages[0].build_ref()), true, Instant::now()),
        Err(Hold::InvalidNextStage)
    );
    assert_eq!(advancer.current_index(TreeType::Character), 0);
}

#[test]
fn given_single_atlas_stage_when_advancing_then_wraps_onto_itself_once() {
    let stages = build();
    let mut advancer = SequenceAdvancer::new(Duration::ZERO);
    let maps = stages[1].build_ref();
    let now = Instant::now();

    let advance = advancer.try_advance(&stages, Some(&maps), true, now).unwrap();
    assert_eq!((advance.from_index, advance.to_index), (0, 0));
    assert_eq!(
        advancer.try_advance(&stages, Some(&maps), true, now + Duration::from_secs(1)),
        Err(Hold::AlreadyAdvanced)
    );
}

#[test]
fn given_mixed_build_when_filtering_then_keeps_file_order_per_tree() {
    let stages = build();

    let tags: Vec<&str> = stages_for(&stages, TreeType::Character)
        .iter()
        .map(|s| s.tag.as_str())
        .collect();

    assert_eq!(tags, vec!["A", "B", "C"]);
    assert_eq!(stages_for(&stages, TreeType::Atlas).len(), 1);
}

#[test]
fn given_next_stage_code_for_other_tree_when_advancing_then_invalid_next_stage() {
    let mut stages = build();
    stages[2].code = encode(&[1, 2].into_iter().collect(), TreeType::Atlas).unwrap();
    let mut advancer = SequenceAdvancer::new(Duration::ZERO);

    assert_eq!(
        advancer.try_advance(&stages, Some(&stages[0].build_ref()), true, Instant::now()),
        Err(Hold::InvalidNextStage)
    );
    assert_eq!(advancer.current_index(TreeType::Character), 0);
}

#[test]
fn given_atlas_advance_when_advancing_character_then_no_shared_cooldown() {
    let stages = build();
    let mut advancer = SequenceAdvancer::new(Duration::from_secs(60));
    let now = Instant::now();
    let maps = stages[1].build_ref();
    let a = stages[0].build_ref();

    assert!(advancer.try_advance(&stages, Some(&maps), true, now).is_ok());
    let advance = advancer
        .try_advance(&stages, Some(&a), true, now + Duration::from_millis(10))
        .unwrap();

    assert_eq!(advance.to, stages[2].build_ref());
    assert_eq!(
        advancer.try_advance(&stages, Some(&maps), true, now + Duration::from_millis(20)),
        Err(Hold::CoolingDown)
    );
}

#[test]
fn given_padded_stage_codes_when_advancing_then_follows_build_order() {
    let mut stages = build();
    for stage in &mut stages {
        stage.code.push_str("  \n");
    }
    let mut advancer = SequenceAdvancer::new(Duration::ZERO);
    let b = BuildRef::new(TreeType::Character, &stages[2].code);
    advancer.select(&stages, &b);
    assert_eq!(advancer.current_index(TreeType::Character), 1);

    let advance = advancer
        .try_advance(&stages, Some(&b), true, Instant::now())
        .unwrap();

    assert_eq!((advance.from_index, advance.to_index), (1, 2));
    assert_eq!(advance.to, stages[3].build_ref());
}
