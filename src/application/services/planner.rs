//! Planner service
//!
//! Owns the per tree type session: graph, target, stages, auto-advance and the
//! highlighted next node. One evaluation per tick; the live allocation is
//! passed in every time and never stored.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::application::hash::{content_hash, short};
use crate::application::services::convergence::ConvergenceDriver;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::codec::{self, DecodedBuild};
use crate::domain::sequence::{stages_for, Advance, Hold, SequenceAdvancer};
use crate::domain::{
    validate_target, AllocationDiff, BuildRef, GraphBuilder, GraphWarning, NextNodeSelector,
    NodeId, NodeSet, OverlayPlan, SharedGraph, SkillGraph, Stage, TargetWarning, TreeType,
};
use crate::infrastructure::traits::{AllocationSource, FileSystem, PassiveSurface, StageStore};

/// Result of a dataset load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetLoad {
    Loaded {
        fingerprint: String,
        nodes: usize,
        warnings: Vec<GraphWarning>,
    },
    /// Same content as the current graph; nothing was replaced.
    Unchanged { fingerprint: String },
}

/// Result of loading a target build code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLoad {
    pub build: DecodedBuild,
    pub warnings: Vec<TargetWarning>,
}

/// Everything one evaluation tick computed for a tree type.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub tree: TreeType,
    pub allocated: NodeSet,
    pub diff: AllocationDiff,
    /// `diff.missing` without excluded or unknown nodes.
    pub reachable_missing: NodeSet,
    pub next: Option<NodeId>,
    pub advance: Result<Advance, Hold>,
    pub overlay: OverlayPlan,
}

#[derive(Debug, Default)]
struct TreeSession {
    target: NodeSet,
    current: Option<BuildRef>,
    highlighted: Option<NodeId>,
}

/// Planner for both tree types.
pub struct PlannerService {
    settings: Arc<Settings>,
    fs: Arc<dyn FileSystem>,
    store: Arc<dyn StageStore>,
    selector: NextNodeSelector,
    graphs: HashMap<TreeType, SharedGraph>,
    sessions: HashMap<TreeType, TreeSession>,
    build: Option<String>,
    stages: Vec<Stage>,
    advancer: SequenceAdvancer,
}

impl PlannerService {
    pub fn new(
        settings: Arc<Settings>,
        fs: Arc<dyn FileSystem>,
        store: Arc<dyn StageStore>,
    ) -> Self {
        let selector = settings.selection.selector();
        let advancer = SequenceAdvancer::new(settings.advance_cooldown());
        Self {
            settings,
            fs,
            store,
            selector,
            graphs: TreeType::ALL.iter().map(|t| (*t, SharedGraph::new())).collect(),
            sessions: HashMap::new(),
            build: None,
            stages: Vec::new(),
            advancer,
        }
    }

    pub fn selector(&self) -> &NextNodeSelector {
        &self.selector
    }

    /// Current graph of `tree`.
    pub fn graph(&self, tree: TreeType) -> ApplicationResult<Arc<SkillGraph>> {
        self.graphs
            .get(&tree)
            .and_then(SharedGraph::current)
            .ok_or(ApplicationError::NoGraph(tree))
    }

    /// Load a tree dataset file. On failure the previous graph stays active.
    #[instrument(level = "debug", skip(self))]
    pub fn load_dataset(&mut self, tree: TreeType, path: &Path) -> ApplicationResult<DatasetLoad> {
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read tree dataset", path)?;
        self.load_dataset_str(tree, &content)
    }

    pub fn load_dataset_str(&mut self, tree: TreeType, json: &str) -> ApplicationResult<DatasetLoad> {
        let fingerprint = content_hash(json.as_bytes());
        if let Ok(current) = self.graph(tree) {
            if current.fingerprint() == fingerprint {
                debug!("{} dataset {} unchanged", tree, short(&fingerprint));
                return Ok(DatasetLoad::Unchanged { fingerprint });
            }
        }

        let built = GraphBuilder::new()
            .fingerprint(fingerprint.clone())
            .build_from_json(json)?;
        let nodes = built.graph.len();
        if let Some(shared) = self.graphs.get(&tree) {
            shared.replace(built.graph);
        }
        info!(
            "{} dataset {} loaded: {} nodes, {} warnings",
            tree,
            short(&fingerprint),
            nodes,
            built.warnings.len()
        );

        Ok(DatasetLoad::Loaded {
            fingerprint,
            nodes,
            warnings: built.warnings,
        })
    }

    /// Replace the target of the tree the build code belongs to.
    #[instrument(level = "debug", skip(self))]
    pub fn load_target(&mut self, code: &str) -> ApplicationResult<TargetLoad> {
        let build = codec::decode(code)?;
        let tree = build.tree;

        let warnings = match self.graph(tree) {
            Ok(graph) => validate_target(&build.nodes, &graph, self.selector.exclusions()),
            Err(_) => Vec::new(),
        };
        for warning in &warnings {
            warn!("{}", warning);
        }

        let current = BuildRef::new(tree, code);
        self.advancer.select(&self.stages, &current);
        let session = self.sessions.entry(tree).or_default();
        session.target = build.nodes.clone();
        session.current = Some(current);
        session.highlighted = None;

        debug!("{} target: {} nodes", tree, build.nodes.len());
        Ok(TargetLoad { build, warnings })
    }

    /// Load a stored build and make the first stage of every tree type current.
    #[instrument(level = "debug", skip(self))]
    pub fn load_build(&mut self, name: &str) -> ApplicationResult<Vec<Stage>> {
        let stages = self.store.load_stages(name)?;
        self.build = Some(name.to_string());
        self.stages = stages;

        for tree in TreeType::ALL {
            self.advancer.reset(tree);
            if stages_for(&self.stages, tree).is_empty() {
                continue;
            }
            if let Err(e) = self.select_stage(tree, 0) {
                warn!("build {}: first {} stage not loaded: {}", name, tree, e);
            }
        }
        Ok(self.stages.clone())
    }

    /// Make stage `index` of `tree` the current target.
    pub fn select_stage(&mut self, tree: TreeType, index: usize) -> ApplicationResult<TargetLoad> {
        let code = {
            let list = stages_for(&self.stages, tree);
            let stage = list
                .get(index)
                .or_else(|| list.first())
                .ok_or_else(|| ApplicationError::NoStages {
                    build: self.build.clone().unwrap_or_default(),
                    tree,
                })?;
            stage.code.clone()
        };
        self.load_target(&code)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn current_stage_index(&self, tree: TreeType) -> usize {
        self.advancer.current_index(tree)
    }

    pub fn target(&self, tree: TreeType) -> NodeSet {
        self.sessions
            .get(&tree)
            .map(|s| s.target.clone())
            .unwrap_or_default()
    }

    pub fn current(&self, tree: TreeType) -> Option<&BuildRef> {
        self.sessions.get(&tree).and_then(|s| s.current.as_ref())
    }

    /// Next node highlighted by the last evaluation.
    pub fn highlighted(&self, tree: TreeType) -> Option<NodeId> {
        self.sessions.get(&tree).and_then(|s| s.highlighted)
    }

    /// One evaluation tick: diff, auto-advance, next node and overlay plan.
    #[instrument(level = "trace", skip(self, source))]
    pub fn evaluate(
        &mut self,
        tree: TreeType,
        source: &dyn AllocationSource,
        now: Instant,
    ) -> ApplicationResult<Evaluation> {
        let graph = self.graph(tree)?;
        let allocated = source.allocated(tree);

        let mut diff = AllocationDiff::compute(&allocated, &self.target(tree));
        let mut reachable_missing = self.selector.filter_missing(&diff.missing, &graph);

        let advance = if self.settings.auto_advance.enabled(tree) {
            let current = self.sessions.get(&tree).and_then(|s| s.current.as_ref());
            self.advancer
                .try_advance(&self.stages, current, reachable_missing.is_empty(), now)
        } else {
            Err(Hold::Disabled)
        };

        if let Ok(advance) = &advance {
            self.load_target(&advance.to.code)?;
            diff = AllocationDiff::compute(&allocated, &self.target(tree));
            reachable_missing = self.selector.filter_missing(&diff.missing, &graph);
        }

        let next = self.selector.select(&allocated, &diff.missing, &graph);
        let target = self.target(tree);
        let session = self.sessions.entry(tree).or_default();
        session.highlighted = next;

        let overlay = OverlayPlan::compute(&allocated, &target, &graph, next);
        Ok(Evaluation {
            tree,
            allocated,
            diff,
            reachable_missing,
            next,
            advance,
            overlay,
        })
    }

    /// Convergence run for the current target of `tree`.
    pub fn driver(
        &self,
        tree: TreeType,
        source: Arc<dyn AllocationSource>,
        surface: Arc<dyn PassiveSurface>,
    ) -> ApplicationResult<ConvergenceDriver> {
        let graph = self.graph(tree)?;
        Ok(
            ConvergenceDriver::new(tree, graph, self.target(tree), source, surface)
                .with_selector(self.selector.clone())
                .with_settle_delay(self.settings.settle_delay())
                .with_max_ticks(self.settings.max_ticks),
        )
    }
}
