//! Command dispatch
//!
//! Each subcommand wires the service container to one planner operation and
//! renders the result.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::CommandFactory;
use itertools::Itertools;
use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::hash::short;
use crate::application::services::{
    ConvergenceRunner, DatasetLoad, DoneReason, DriverState, PlannerService,
};
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands, PlanArgs, StagesCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::codec;
use crate::domain::sequence::stages_for;
use crate::domain::{parse_node_list, NodeId, NodeSet, SkillGraph, TreeType};
use crate::exitcode;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::{InfraError, SimulatedTree};

/// Run the parsed command, returning the process exit code.
pub fn execute_command(cli: &Cli) -> CliResult<i32> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see --help".to_string(),
        ));
    };

    let dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| InfraError::io("current directory", e))?,
    };
    let settings = Settings::load(Some(dir.as_path()))?;
    debug!("settings loaded, base_dir={}", settings.base_dir.display());
    let container = ServiceContainer::new(settings);

    match command {
        Commands::Decode { code } => decode(code),
        Commands::Encode { tree, ids } => encode(*tree, ids),
        Commands::Validate { dataset, tree } => validate(&container, *tree, dataset),
        Commands::Diff(plan) => diff(&container, plan),
        Commands::Next(plan) => next(&container, plan),
        Commands::Simulate {
            plan,
            refund_mode,
            settle_ms,
        } => simulate(&container, plan, *refund_mode, *settle_ms),
        Commands::Stages { command } => match command {
            StagesCommands::List { name } => stages_list(&container, name),
            StagesCommands::Builds => stages_builds(&container),
        },
        Commands::Config { command } => config(&container.settings, command, &dir),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(exitcode::OK)
        }
    }
}

fn node_label(graph: &SkillGraph, id: NodeId) -> String {
    match graph.lookup(id) {
        Some(node) if !node.name.is_empty() => format!("{id} ({})", node.name),
        _ => id.to_string(),
    }
}

fn id_list(ids: &NodeSet) -> String {
    ids.iter().join(", ")
}

#[instrument]
fn decode(code: &str) -> CliResult<i32> {
    let build = codec::decode(code).map_err(ApplicationError::from)?;
    output::action("tree", &build.tree);
    output::action("version", &build.version);
    output::action("class", &build.class_id);
    output::action("ascendancy", &build.ascendancy_id);
    output::action("nodes", &build.nodes.len());
    output::info(&id_list(&build.nodes));
    Ok(exitcode::OK)
}

#[instrument]
fn encode(tree: TreeType, ids: &[String]) -> CliResult<i32> {
    let nodes = parse_node_list(&ids.join(" ")).map_err(CliError::InvalidArgs)?;
    let code = codec::encode(&nodes, tree).map_err(ApplicationError::from)?;
    output::info(&code);
    Ok(exitcode::OK)
}

#[instrument(skip(container))]
fn validate(container: &ServiceContainer, tree: TreeType, dataset: &Path) -> CliResult<i32> {
    let mut planner = container.planner();
    match planner.load_dataset(tree, dataset)? {
        DatasetLoad::Loaded {
            fingerprint,
            nodes,
            warnings,
        } => {
            for warning in &warnings {
                output::warning(warning);
            }
            output::success(&format!(
                "{} tree dataset {}: {} nodes, {} warnings",
                tree,
                short(&fingerprint),
                nodes,
                warnings.len()
            ));
        }
        DatasetLoad::Unchanged { fingerprint } => {
            output::success(&format!("{} tree dataset {} unchanged", tree, short(&fingerprint)));
        }
    }
    Ok(exitcode::OK)
}

/// Planner with dataset and target loaded for the tree of `plan.build`.
fn prepare(
    container: &ServiceContainer,
    plan: &PlanArgs,
) -> CliResult<(PlannerService, TreeType, NodeSet)> {
    let tree = codec::decode(&plan.build)
        .map_err(ApplicationError::from)?
        .tree;
    let data: PathBuf = plan
        .data
        .clone()
        .unwrap_or_else(|| container.settings.dataset_path(tree));

    let mut planner = container.planner();
    if let DatasetLoad::Loaded { warnings, .. } = planner.load_dataset(tree, &data)? {
        if !warnings.is_empty() {
            output::warning(&format!(
                "{} dataset warnings, rerun with -d for details",
                warnings.len()
            ));
        }
    }

    let target = planner.load_target(&plan.build)?;
    for warning in &target.warnings {
        output::warning(warning);
    }

    let allocated = parse_node_list(&plan.allocated).map_err(CliError::InvalidArgs)?;
    Ok((planner, tree, allocated))
}

#[instrument(skip(container))]
fn diff(container: &ServiceContainer, plan: &PlanArgs) -> CliResult<i32> {
    let (mut planner, tree, allocated) = prepare(container, plan)?;
    let graph = planner.graph(tree)?;
    let snapshot = SimulatedTree::new(tree, graph.clone(), allocated);
    let eval = planner.evaluate(tree, &snapshot, Instant::now())?;

    output::header(&format!("{} tree", tree));
    for &id in &eval.diff.wrong {
        output::diff_remove(&node_label(&graph, id));
    }
    for &id in &eval.reachable_missing {
        output::diff_add(&node_label(&graph, id));
    }
    let skipped = eval.diff.missing.len() - eval.reachable_missing.len();
    if skipped > 0 {
        output::detail(&format!("{skipped} target nodes skipped (ascendancy or unknown)"));
    }

    let summary = eval.overlay.summary;
    output::action(
        "progress",
        &format!(
            "{}/{} picked, {} wrong",
            summary.picked, summary.total, summary.wrong
        ),
    );
    Ok(exitcode::OK)
}

#[instrument(skip(container))]
fn next(container: &ServiceContainer, plan: &PlanArgs) -> CliResult<i32> {
    let (mut planner, tree, allocated) = prepare(container, plan)?;
    let graph = planner.graph(tree)?;
    let snapshot = SimulatedTree::new(tree, graph.clone(), allocated);
    let eval = planner.evaluate(tree, &snapshot, Instant::now())?;

    match eval.next {
        Some(id) => output::action("next", &node_label(&graph, id)),
        None if eval.reachable_missing.is_empty() => {
            output::success("nothing left to allocate")
        }
        None => output::failure(&format!(
            "{} missing nodes, none reachable",
            eval.reachable_missing.len()
        )),
    }
    Ok(exitcode::OK)
}

#[instrument(skip(container))]
fn simulate(
    container: &ServiceContainer,
    plan: &PlanArgs,
    refund_mode: bool,
    settle_ms: Option<u64>,
) -> CliResult<i32> {
    let (planner, tree, allocated) = prepare(container, plan)?;
    let graph = planner.graph(tree)?;

    let mut sim = SimulatedTree::new(tree, graph.clone(), allocated)
        .with_roots(planner.selector().starters().clone());
    if refund_mode {
        sim = sim.with_refund_mode();
    }
    let sim = Arc::new(sim);

    let mut driver = planner.driver(tree, sim.clone(), sim.clone())?;
    if let Some(ms) = settle_ms {
        driver = driver.with_settle_delay(Duration::from_millis(ms));
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| InfraError::io("start async runtime", e))?;
    let report = runtime
        .block_on(async {
            let runner = ConvergenceRunner::new();
            runner.start(driver).await;
            runner.wait(tree).await
        })
        .ok_or_else(|| InfraError::Runtime {
            message: "convergence run aborted".to_string(),
        })?;

    output::header(&format!("{} tree: {}", tree, report.reason));
    for &id in &report.confirmed(DriverState::Refunding) {
        output::diff_remove(&node_label(&graph, id));
    }
    for &id in &report.confirmed(DriverState::Allocating) {
        output::diff_add(&node_label(&graph, id));
    }
    output::action("ticks", &report.ticks);
    output::action("allocated", &id_list(&sim.snapshot()));

    if report.reason == DoneReason::Converged {
        Ok(exitcode::OK)
    } else {
        if !report.final_diff.is_converged() {
            output::failure(&format!(
                "{} wrong, {} missing",
                report.final_diff.wrong.len(),
                report.final_diff.missing.len()
            ));
        }
        Ok(exitcode::INCOMPLETE)
    }
}

#[instrument(skip(container))]
fn stages_list(container: &ServiceContainer, name: &str) -> CliResult<i32> {
    let stages = container.stages.load_stages(name)?;

    let mut root = Tree::new(name.to_string());
    for tree in TreeType::ALL {
        let list = stages_for(&stages, tree);
        if list.is_empty() {
            continue;
        }
        let mut branch = Tree::new(tree.to_string());
        for (index, stage) in list.iter().enumerate() {
            let label = match codec::decode(&stage.code) {
                Ok(build) => format!("[{index}] {} ({} nodes)", stage.tag, build.nodes.len()),
                Err(e) => format!("[{index}] {} (invalid: {e})", stage.tag),
            };
            branch.push(Tree::new(label));
        }
        root.push(branch);
    }
    output::info(&root);
    Ok(exitcode::OK)
}

#[instrument(skip(container))]
fn stages_builds(container: &ServiceContainer) -> CliResult<i32> {
    let builds = container.stages.list_builds()?;
    if builds.is_empty() {
        output::warning(&format!(
            "no builds in {}",
            container.settings.builds_dir().display()
        ));
    }
    for build in builds {
        output::info(&build);
    }
    Ok(exitcode::OK)
}

fn config(settings: &Settings, command: &ConfigCommands, dir: &Path) -> CliResult<i32> {
    match command {
        ConfigCommands::Show => output::info(&settings.to_toml()?),
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::action("global", &path.display()),
                None => output::action("global", &"(no config dir)"),
            }
            output::action("local", &local_config_path(dir).display());
            output::action("builds", &settings.builds_dir().display());
            output::action("data", &settings.data_dir().display());
        }
        ConfigCommands::Template => output::info(&Settings::template()),
    }
    Ok(exitcode::OK)
}
