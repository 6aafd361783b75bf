//! Convergence driver
//!
//! Polls the live passive panel and issues one hover or confirm per tick until
//! the live allocation matches the target, nothing actionable is left, or the
//! panel disappears. Removable wrong nodes are always handled before anything
//! is allocated.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::domain::{AllocationDiff, NextNodeSelector, NodeId, NodeSet, SkillGraph, TreeType};
use crate::infrastructure::traits::{AllocationSource, PassiveSurface, RefundSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    /// Live allocation equals the target.
    Converged,
    /// Nothing removable or allocatable remains, target not fully reached.
    NothingActionable,
    SurfaceClosed,
    Cancelled,
    TickLimit,
}

impl fmt::Display for DoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DoneReason::Converged => "converged",
            DoneReason::NothingActionable => "nothing actionable",
            DoneReason::SurfaceClosed => "panel closed",
            DoneReason::Cancelled => "cancelled",
            DoneReason::TickLimit => "tick limit reached",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Refunding,
    Allocating,
    Done(DoneReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAction {
    HoverNode(NodeId),
    HoverRefund,
    Confirm,
}

/// One issued action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub tick: usize,
    pub state: DriverState,
    pub action: SurfaceAction,
    /// Node the action is about; `None` for the refund surface.
    pub node: Option<NodeId>,
    pub failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceReport {
    pub tree: TreeType,
    pub reason: DoneReason,
    pub ticks: usize,
    pub steps: Vec<Step>,
    pub final_diff: AllocationDiff,
}

impl ConvergenceReport {
    /// Nodes successfully confirmed while in `state`, in order.
    pub fn confirmed(&self, state: DriverState) -> Vec<NodeId> {
        self.steps
            .iter()
            .filter(|s| s.state == state && s.action == SurfaceAction::Confirm && !s.failed)
            .filter_map(|s| s.node)
            .collect()
    }
}

enum Tick {
    Acted(Step),
    Done(DoneReason),
}

/// A single convergence run for one tree type.
pub struct ConvergenceDriver {
    tree: TreeType,
    graph: Arc<SkillGraph>,
    target: NodeSet,
    selector: NextNodeSelector,
    source: Arc<dyn AllocationSource>,
    surface: Arc<dyn PassiveSurface>,
    settle: Duration,
    max_ticks: usize,
    state: DriverState,
}

impl ConvergenceDriver {
    pub fn new(
        tree: TreeType,
        graph: Arc<SkillGraph>,
        target: NodeSet,
        source: Arc<dyn AllocationSource>,
        surface: Arc<dyn PassiveSurface>,
    ) -> Self {
        Self {
            tree,
            graph,
            target,
            selector: NextNodeSelector::default(),
            source,
            surface,
            settle: Duration::from_millis(250),
            max_ticks: 2000,
            state: DriverState::Idle,
        }
    }

    pub fn with_selector(mut self, selector: NextNodeSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Pause after each action before observing the panel again.
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: usize) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn tree(&self) -> TreeType {
        self.tree
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Drive until done or until `cancel` turns true.
    ///
    /// Cancellation is checked before every tick and during every settle
    /// delay. A cancelled run leaves the panel in whatever partial state it
    /// reached.
    #[instrument(level = "debug", skip_all, fields(tree = %self.tree))]
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) -> ConvergenceReport {
        let mut steps = Vec::new();
        let mut ticks = 0;

        let reason = loop {
            let cancelled = *cancel.borrow();
            if cancelled {
                break DoneReason::Cancelled;
            }
            if ticks >= self.max_ticks {
                break DoneReason::TickLimit;
            }
            ticks += 1;

            match self.tick(ticks) {
                Tick::Done(reason) => break reason,
                Tick::Acted(step) => steps.push(step),
            }

            if self.settle_or_cancel(&mut cancel).await {
                break DoneReason::Cancelled;
            }
        };

        self.state = DriverState::Done(reason);
        let final_diff = AllocationDiff::compute(&self.source.allocated(self.tree), &self.target);
        info!(
            "{} tree convergence finished after {} ticks: {}",
            self.tree, ticks, reason
        );

        ConvergenceReport {
            tree: self.tree,
            reason,
            ticks,
            steps,
            final_diff,
        }
    }

    /// Returns true when cancelled during the delay.
    async fn settle_or_cancel(&self, cancel: &mut watch::Receiver<bool>) -> bool {
        let sleep = tokio::time::sleep(self.settle);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                changed = cancel.changed() => {
                    if changed.is_err() {
                        // sender gone: nobody can cancel any more
                        (&mut sleep).await;
                        return false;
                    }
                    let cancelled = *cancel.borrow();
                    if cancelled {
                        return true;
                    }
                }
            }
        }
    }

    /// Observe once, issue at most one action.
    fn tick(&mut self, tick: usize) -> Tick {
        if !self.surface.is_open(self.tree) {
            return Tick::Done(DoneReason::SurfaceClosed);
        }

        let allocated = self.source.allocated(self.tree);
        let diff = AllocationDiff::compute(&allocated, &self.target);
        let refund = self.surface.refund_surface(self.tree);

        if let Some(node) = self.removable(&diff.wrong) {
            self.state = DriverState::Refunding;
            return Tick::Acted(match refund {
                RefundSurface::Open { ready: true } => self.perform(tick, SurfaceAction::Confirm, None),
                RefundSurface::Open { ready: false } => {
                    self.perform(tick, SurfaceAction::HoverRefund, None)
                }
                RefundSurface::Closed => self.hover_or_confirm(tick, node),
            });
        }

        if let RefundSurface::Open { ready } = refund {
            self.state = DriverState::Refunding;
            let action = if ready {
                SurfaceAction::Confirm
            } else {
                SurfaceAction::HoverRefund
            };
            return Tick::Acted(self.perform(tick, action, None));
        }

        if let Some(node) = self.allocatable(&allocated, &diff.missing) {
            self.state = DriverState::Allocating;
            return Tick::Acted(self.hover_or_confirm(tick, node));
        }

        if diff.is_converged() {
            Tick::Done(DoneReason::Converged)
        } else {
            debug!(
                "{} tree: {} wrong and {} missing left, none actionable",
                self.tree,
                diff.wrong.len(),
                diff.missing.len()
            );
            Tick::Done(DoneReason::NothingActionable)
        }
    }

    /// First wrong node (by id) the panel allows removing right now.
    fn removable(&self, wrong: &NodeSet) -> Option<NodeId> {
        wrong.iter().copied().find(|&id| {
            self.surface
                .node(self.tree, id)
                .is_some_and(|a| a.allocated && a.can_deallocate)
        })
    }

    /// Prefer the selector's pick, else the smallest allocatable reachable id.
    fn allocatable(&self, allocated: &NodeSet, missing: &NodeSet) -> Option<NodeId> {
        let can_take = |id: NodeId| {
            self.surface
                .node(self.tree, id)
                .is_some_and(|a| !a.allocated && a.can_allocate)
        };

        if let Some(pick) = self.selector.select(allocated, missing, &self.graph) {
            if can_take(pick) {
                return Some(pick);
            }
        }
        self.selector
            .filter_missing(missing, &self.graph)
            .into_iter()
            .find(|&id| can_take(id))
    }

    fn hover_or_confirm(&self, tick: usize, node: NodeId) -> Step {
        if self.surface.hovered(self.tree) == Some(node) {
            self.perform(tick, SurfaceAction::Confirm, Some(node))
        } else {
            self.perform(tick, SurfaceAction::HoverNode(node), Some(node))
        }
    }

    fn perform(&self, tick: usize, action: SurfaceAction, node: Option<NodeId>) -> Step {
        let result = match action {
            SurfaceAction::HoverNode(id) => self.surface.hover_node(self.tree, id),
            SurfaceAction::HoverRefund => self.surface.hover_refund(self.tree),
            SurfaceAction::Confirm => self.surface.confirm(self.tree),
        };
        match &result {
            Ok(()) => debug!("{} tree tick {}: {:?} {:?}", self.tree, tick, self.state, action),
            Err(e) => warn!(
                "{} tree tick {}: {:?} failed, retrying next tick: {}",
                self.tree, tick, action, e
            ),
        }
        Step {
            tick,
            state: self.state,
            action,
            node,
            failed: result.is_err(),
        }
    }
}

struct RunHandle {
    cancel: watch::Sender<bool>,
    join: JoinHandle<ConvergenceReport>,
}

/// Outcome of [`ConvergenceRunner::toggle`].
#[derive(Debug)]
pub enum Toggle {
    Started,
    Stopped(Option<ConvergenceReport>),
}

/// At most one active convergence run per tree type.
#[derive(Default)]
pub struct ConvergenceRunner {
    runs: Mutex<HashMap<TreeType, RunHandle>>,
}

impl ConvergenceRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run, cancelling and awaiting any previous run for the same tree.
    ///
    /// Returns the report of the replaced run, if there was one.
    pub async fn start(&self, driver: ConvergenceDriver) -> Option<ConvergenceReport> {
        let mut runs = self.runs.lock().await;
        let previous = match runs.remove(&driver.tree()) {
            Some(handle) => Self::stop(handle).await,
            None => None,
        };
        Self::spawn(&mut runs, driver);
        previous
    }

    /// Cancel the run for `tree`. Calling this without an active run is a no-op.
    pub async fn cancel(&self, tree: TreeType) -> Option<ConvergenceReport> {
        let handle = self.runs.lock().await.remove(&tree);
        match handle {
            Some(handle) => Self::stop(handle).await,
            None => None,
        }
    }

    /// Start when idle, cancel when running.
    pub async fn toggle(&self, driver: ConvergenceDriver) -> Toggle {
        let mut runs = self.runs.lock().await;
        if let Some(handle) = runs.remove(&driver.tree()) {
            if !handle.join.is_finished() {
                return Toggle::Stopped(Self::stop(handle).await);
            }
        }
        Self::spawn(&mut runs, driver);
        Toggle::Started
    }

    pub async fn is_running(&self, tree: TreeType) -> bool {
        self.runs
            .lock()
            .await
            .get(&tree)
            .is_some_and(|h| !h.join.is_finished())
    }

    /// Wait for the run of `tree` to finish on its own.
    pub async fn wait(&self, tree: TreeType) -> Option<ConvergenceReport> {
        let handle = self.runs.lock().await.remove(&tree)?;
        Self::join(handle.join).await
    }

    fn spawn(runs: &mut HashMap<TreeType, RunHandle>, driver: ConvergenceDriver) {
        let tree = driver.tree();
        let (cancel, rx) = watch::channel(false);
        let join = tokio::spawn(driver.run(rx));
        debug!("started {} tree convergence run", tree);
        runs.insert(tree, RunHandle { cancel, join });
    }

    async fn stop(handle: RunHandle) -> Option<ConvergenceReport> {
        // receiver may already be gone when the run finished
        let _ = handle.cancel.send(true);
        Self::join(handle.join).await
    }

    async fn join(join: JoinHandle<ConvergenceReport>) -> Option<ConvergenceReport> {
        match join.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("convergence run ended abnormally: {}", e);
                None
            }
        }
    }
}
