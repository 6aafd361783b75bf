//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/treeplanter/treeplanter.toml`
//! 3. Local config: `<dir>/.treeplanter.toml`
//! 4. Environment variables: `TREEPLANTER_*` prefix

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{
    AscendancyExclusions, NextNodeSelector, NodeId, TreeType, DEFAULT_STARTER_NODES,
    IGNORED_ASCENDANCIES,
};

/// Per tree type auto-advance switches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutoAdvanceConfig {
    pub character: bool,
    pub atlas: bool,
}

impl Default for AutoAdvanceConfig {
    fn default() -> Self {
        Self {
            character: true,
            atlas: true,
        }
    }
}

impl AutoAdvanceConfig {
    pub fn enabled(&self, tree: TreeType) -> bool {
        match tree {
            TreeType::Character => self.character,
            TreeType::Atlas => self.atlas,
        }
    }
}

/// Next-node selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SelectionConfig {
    /// Ascendancy names whose nodes are never targeted
    pub excluded_ascendancies: Vec<String>,
    /// Entry points into a target region not touching the allocation
    pub starter_nodes: Vec<NodeId>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            excluded_ascendancies: IGNORED_ASCENDANCIES.iter().map(|s| s.to_string()).collect(),
            starter_nodes: DEFAULT_STARTER_NODES.to_vec(),
        }
    }
}

/// Raw auto-advance config (fields are Option to detect "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawAutoAdvanceConfig {
    pub character: Option<bool>,
    pub atlas: Option<bool>,
}

/// Raw selection config for intermediate parsing.
///
/// Used during layered config merging to distinguish between:
/// - `None` → field not specified, inherit from base
/// - `Some([])` → explicit empty array
/// - `Some([...])` → explicit values to merge
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSelectionConfig {
    pub excluded_ascendancies: Option<Vec<String>>,
    pub starter_nodes: Option<Vec<NodeId>>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub base_dir: Option<PathBuf>,
    pub settle_delay_ms: Option<u64>,
    pub advance_cooldown_ms: Option<u64>,
    pub max_ticks: Option<usize>,
    pub auto_advance: RawAutoAdvanceConfig,
    pub selection: RawSelectionConfig,
}

impl AutoAdvanceConfig {
    fn merge(&self, overlay: &RawAutoAdvanceConfig) -> Self {
        Self {
            character: overlay.character.unwrap_or(self.character),
            atlas: overlay.atlas.unwrap_or(self.atlas),
        }
    }
}

impl SelectionConfig {
    /// Merge arrays with union semantics and negation support.
    ///
    /// - Items from overlay are added to base
    /// - Items prefixed with `!` remove the corresponding item from the result
    /// - Duplicates are de-duplicated
    ///
    /// # Examples
    /// ```ignore
    /// merge_array(&["Slayer", "Raider"], &["Warden"])   // → ["Raider", "Slayer", "Warden"]
    /// merge_array(&["Slayer", "Raider"], &["!Raider"])  // → ["Slayer"]
    /// ```
    pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
        let mut result: HashSet<String> = base.iter().cloned().collect();

        for pattern in overlay {
            if let Some(negated) = pattern.strip_prefix('!') {
                result.remove(negated);
            } else {
                result.insert(pattern.clone());
            }
        }

        // Convert to sorted Vec for deterministic output
        let mut vec: Vec<String> = result.into_iter().collect();
        vec.sort();
        vec
    }

    /// Merge overlay config onto self (base).
    ///
    /// - Ascendancy names: union merge with negation support (if overlay specified)
    /// - Starter nodes: replaced when specified
    pub fn merge(&self, overlay: &RawSelectionConfig) -> Self {
        Self {
            excluded_ascendancies: overlay
                .excluded_ascendancies
                .as_ref()
                .map(|o| Self::merge_array(&self.excluded_ascendancies, o))
                .unwrap_or_else(|| self.excluded_ascendancies.clone()),
            starter_nodes: overlay
                .starter_nodes
                .clone()
                .unwrap_or_else(|| self.starter_nodes.clone()),
        }
    }

    /// Apply global config onto defaults.
    ///
    /// Unlike `merge()` which uses union semantics for arrays, this method
    /// uses REPLACE semantics: if global config specifies an array, it completely
    /// replaces the default array.
    pub fn apply_global(&self, global: &RawSelectionConfig) -> Self {
        Self {
            excluded_ascendancies: global
                .excluded_ascendancies
                .clone()
                .unwrap_or_else(|| self.excluded_ascendancies.clone()),
            starter_nodes: global
                .starter_nodes
                .clone()
                .unwrap_or_else(|| self.starter_nodes.clone()),
        }
    }

    pub fn exclusions(&self) -> AscendancyExclusions {
        AscendancyExclusions::new(self.excluded_ascendancies.iter().cloned())
    }

    pub fn selector(&self) -> NextNodeSelector {
        NextNodeSelector::new(self.exclusions(), self.starter_nodes.iter().copied().collect())
    }
}

/// Unified configuration for treeplanter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Base directory (default: ~/.treeplanter)
    pub base_dir: PathBuf,
    /// Pause after each surface action before observing again
    pub settle_delay_ms: u64,
    /// Minimum time between two stage advances of one tree type
    pub advance_cooldown_ms: u64,
    /// Upper bound of ticks per convergence run
    pub max_ticks: usize,
    pub auto_advance: AutoAdvanceConfig,
    pub selection: SelectionConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_dir: dirs_default_base_dir(),
            settle_delay_ms: 250,
            advance_cooldown_ms: 250,
            max_ticks: 2000,
            auto_advance: AutoAdvanceConfig::default(),
            selection: SelectionConfig::default(),
        }
    }
}

/// Get the default base directory (~/.treeplanter).
fn dirs_default_base_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".treeplanter"))
        .unwrap_or_else(|| PathBuf::from("~/.treeplanter"))
}

/// Get the XDG config directory for treeplanter.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "treeplanter").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("treeplanter.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".treeplanter.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

impl Settings {
    /// Directory holding the tree datasets (base_dir/data).
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Directory holding the build files (base_dir/builds).
    pub fn builds_dir(&self) -> PathBuf {
        self.base_dir.join("builds")
    }

    /// Default dataset location for a tree type (data_dir/<tree>.json).
    pub fn dataset_path(&self, tree: TreeType) -> PathBuf {
        self.data_dir().join(format!("{tree}.json"))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn advance_cooldown(&self) -> Duration {
        Duration::from_millis(self.advance_cooldown_ms)
    }

    /// Expand shell variables and tilde in path-like fields.
    ///
    /// Handles `~`, `$VAR`, and `${VAR}` syntax.
    fn expand_paths(&mut self) {
        let expanded = expand_env_vars(self.base_dir.to_string_lossy().as_ref());
        self.base_dir = PathBuf::from(expanded);
    }

    /// Merge overlay config onto self (base) with union semantics for arrays.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            base_dir: overlay
                .base_dir
                .clone()
                .unwrap_or_else(|| self.base_dir.clone()),
            settle_delay_ms: overlay.settle_delay_ms.unwrap_or(self.settle_delay_ms),
            advance_cooldown_ms: overlay
                .advance_cooldown_ms
                .unwrap_or(self.advance_cooldown_ms),
            max_ticks: overlay.max_ticks.unwrap_or(self.max_ticks),
            auto_advance: self.auto_advance.merge(&overlay.auto_advance),
            selection: self.selection.merge(&overlay.selection),
        }
    }

    /// Apply global config onto defaults with REPLACE semantics for arrays.
    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            selection: self.selection.apply_global(&global.selection),
            ..self.merge_with(&RawSettings {
                selection: RawSelectionConfig::default(),
                ..global.clone()
            })
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory holding a `.treeplanter.toml`
    ///
    /// # Array Merge Semantics
    /// - Defaults → Global: REPLACE (global defines the real baseline)
    /// - Global → Local: UNION with negation support for ascendancy names
    /// - Any → Env vars: REPLACE (explicit user override)
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Load global config (REPLACES defaults)
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        // 3. Load and merge local config (UNION with global)
        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 4. Apply environment variables (replaces - explicit override)
        current = Self::apply_env_overrides(current)?;

        // Expand ~ and $VAR in path-like fields
        current.expand_paths();

        Ok(current)
    }

    /// Apply TREEPLANTER_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("TREEPLANTER")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("selection.excluded_ascendancies")
                .with_list_parse_key("selection.starter_nodes"),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("base_dir") {
            settings.base_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get::<u64>("settle_delay_ms") {
            settings.settle_delay_ms = val;
        }
        if let Ok(val) = config.get::<u64>("advance_cooldown_ms") {
            settings.advance_cooldown_ms = val;
        }
        if let Ok(val) = config.get::<usize>("max_ticks") {
            settings.max_ticks = val;
        }
        if let Ok(val) = config.get_bool("auto_advance.character") {
            settings.auto_advance.character = val;
        }
        if let Ok(val) = config.get_bool("auto_advance.atlas") {
            settings.auto_advance.atlas = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("selection.excluded_ascendancies") {
            settings.selection.excluded_ascendancies = val;
        }
        if let Ok(val) = config.get::<Vec<NodeId>>("selection.starter_nodes") {
            settings.selection.starter_nodes = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# treeplanter configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/treeplanter/treeplanter.toml  (defines your baseline)
#   Local:  <dir>/.treeplanter.toml                 (per-directory additions)
#   Env:    TREEPLANTER_* environment variables      (explicit overrides)
#
# Array Merge Semantics:
#   Global config REPLACES compiled defaults.
#   Local config UNIONS excluded_ascendancies with global.
#   Use "!name" in local config to REMOVE an inherited item:
#     excluded_ascendancies = ["Warden", "!Raider"]

# Base directory (datasets in base_dir/data, builds in base_dir/builds)
# base_dir = "~/.treeplanter"

# Pause after every hover/confirm before looking at the panel again
# settle_delay_ms = 250

# Minimum time between two stage advances of the same tree
# advance_cooldown_ms = 250

# Safety ceiling for one convergence run
# max_ticks = 2000

[auto_advance]
# character = true
# atlas = true

[selection]
# Ascendancy names whose nodes are never targeted (case-insensitive substring)
# excluded_ascendancies = ["Necromancer", "Deadeye"]

# Class start nodes used to enter a target region not touching the allocation
# starter_nodes = [39725, 47389, 50904, 31628, 20228, 63965, 57264, 57226, 45272, 38129, 45035, 39821]
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
