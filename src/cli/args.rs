//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::domain::TreeType;

/// Passive tree planner: next-node selection, convergence and staged builds
#[derive(Parser, Debug)]
#[command(name = "treeplanter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Turn debugging information on (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Directory holding a local .treeplanter.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a build code into its node ids
    Decode {
        /// Passive or atlas tree URL
        code: String,
    },

    /// Encode node ids as a build code
    Encode {
        /// Tree type of the resulting code
        #[arg(short, long, default_value = "character")]
        tree: TreeType,
        /// Node ids (space or comma separated)
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Load a tree dataset and report problems
    Validate {
        /// Tree dataset JSON
        #[arg(value_hint = ValueHint::FilePath)]
        dataset: PathBuf,
        /// Tree type the dataset describes
        #[arg(short, long, default_value = "character")]
        tree: TreeType,
    },

    /// Show wrong and missing nodes
    Diff(PlanArgs),

    /// Show the next node to allocate
    Next(PlanArgs),

    /// Run the convergence loop against an in-memory panel
    Simulate {
        #[command(flatten)]
        plan: PlanArgs,
        /// Deallocations go through the bulk refund surface
        #[arg(long)]
        refund_mode: bool,
        /// Settle delay after each action in milliseconds (default: from config)
        #[arg(long)]
        settle_ms: Option<u64>,
    },

    /// Inspect stored builds
    Stages {
        #[command(subcommand)]
        command: StagesCommands,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Inputs shared by the planning commands.
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Target build code; its tree type selects the dataset
    #[arg(short, long)]
    pub build: String,

    /// Tree dataset (default: <base_dir>/data/<tree>.json)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub data: Option<PathBuf>,

    /// Currently allocated node ids, comma separated
    #[arg(short, long, default_value = "")]
    pub allocated: String,
}

#[derive(Subcommand, Debug)]
pub enum StagesCommands {
    /// Show the stages of a build per tree type
    List {
        /// Build name (file stem in the builds directory)
        name: String,
    },
    /// List stored builds
    Builds,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,
    /// Show config paths
    Path,
    /// Print a config template
    Template,
}
