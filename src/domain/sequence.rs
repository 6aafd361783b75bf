//! Stage sequencing.
//!
//! A build is an ordered list of stages per tree type. Once everything
//! reachable in the current stage is allocated, the advancer moves on to the
//! next stage, wrapping around after the last one.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::domain::codec;
use crate::domain::entities::{BuildRef, Stage, TreeType};

/// Default minimum time between two advances of the same tree type.
pub const DEFAULT_ADVANCE_COOLDOWN: Duration = Duration::from_millis(250);

/// An accepted stage switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub from_index: usize,
    pub to_index: usize,
    pub from: BuildRef,
    pub to: BuildRef,
}

/// Why an advance did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hold {
    Disabled,
    NoStages,
    NoCurrentTarget,
    StillMissing,
    CoolingDown,
    AlreadyAdvanced,
    InvalidNextStage,
}

#[derive(Debug, Clone, Default)]
struct TreeProgress {
    current_index: usize,
    last_advance_at: Option<Instant>,
    last_advanced_from: Option<BuildRef>,
}

/// Per tree type "last advanced" bookkeeping plus the current stage index.
#[derive(Debug, Clone)]
pub struct SequenceAdvancer {
    cooldown: Duration,
    progress: HashMap<TreeType, TreeProgress>,
}

impl Default for SequenceAdvancer {
    fn default() -> Self {
        Self::new(DEFAULT_ADVANCE_COOLDOWN)
    }
}

/// Stages of one tree type, in build order.
pub fn stages_for(stages: &[Stage], tree: TreeType) -> Vec<&Stage> {
    stages.iter().filter(|s| s.tree == tree).collect()
}

fn index_of(stages: &[&Stage], current: &BuildRef) -> Option<usize> {
    stages.iter().position(|s| s.code.trim() == current.code)
}

impl SequenceAdvancer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            progress: HashMap::new(),
        }
    }

    /// Current stage index for `tree` within its filtered stage list.
    pub fn current_index(&self, tree: TreeType) -> usize {
        self.progress
            .get(&tree)
            .map(|p| p.current_index)
            .unwrap_or(0)
    }

    /// Record a manual stage selection.
    pub fn select(&mut self, stages: &[Stage], current: &BuildRef) {
        let list = stages_for(stages, current.tree);
        let progress = self.progress.entry(current.tree).or_default();
        progress.current_index = index_of(&list, current).unwrap_or(0);
    }

    /// Forget all bookkeeping for `tree`, e.g. after another build was loaded.
    pub fn reset(&mut self, tree: TreeType) {
        self.progress.remove(&tree);
    }

    /// Decide whether to advance from `current` to the next stage.
    ///
    /// `reachable_done` means the filtered missing set for `current` is empty.
    pub fn try_advance(
        &mut self,
        stages: &[Stage],
        current: Option<&BuildRef>,
        reachable_done: bool,
        now: Instant,
    ) -> Result<Advance, Hold> {
        let current = match current {
            Some(c) if !c.is_blank() => c,
            _ => return Err(Hold::NoCurrentTarget),
        };
        if !reachable_done {
            return Err(Hold::StillMissing);
        }

        let list = stages_for(stages, current.tree);
        if list.is_empty() {
            return Err(Hold::NoStages);
        }

        let progress = self.progress.entry(current.tree).or_default();
        if let Some(at) = progress.last_advance_at {
            if now.saturating_duration_since(at) < self.cooldown {
                return Err(Hold::CoolingDown);
            }
        }
        if progress.last_advanced_from.as_ref() == Some(current) {
            return Err(Hold::AlreadyAdvanced);
        }

        let from_index = index_of(&list, current).unwrap_or(0);
        let to_index = (from_index + 1) % list.len();
        let next = list[to_index];
        match codec::decode(&next.code) {
            Ok(build) if build.tree == next.tree => {}
            Ok(build) => {
                debug!(
                    "stage {} of {} holds a {} build code",
                    to_index, current.tree, build.tree
                );
                return Err(Hold::InvalidNextStage);
            }
            Err(_) => {
                debug!("stage {} of {} has no valid build code", to_index, current.tree);
                return Err(Hold::InvalidNextStage);
            }
        }

        progress.last_advance_at = Some(now);
        progress.last_advanced_from = Some(current.clone());
        progress.current_index = to_index;

        info!(
            "advancing {} tree: stage {} -> {} ({})",
            current.tree, from_index, to_index, next.tag
        );
        Ok(Advance {
            from_index,
            to_index,
            from: current.clone(),
            to: next.build_ref(),
        })
    }
}
