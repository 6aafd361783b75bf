//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::PlannerService;
use crate::config::Settings;
use crate::infrastructure::traits::{FileSystem, JsonStageStore, RealFileSystem, StageStore};

/// Container holding the shared dependencies of all services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Build storage
    pub stages: Arc<dyn StageStore>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let stages = Arc::new(JsonStageStore::new(fs.clone(), settings.builds_dir()));
        Self::with_deps(settings, fs, stages)
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        stages: Arc<dyn StageStore>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self {
            settings,
            fs,
            stages,
        }
    }

    /// A planner session on top of the shared dependencies.
    pub fn planner(&self) -> PlannerService {
        PlannerService::new(
            self.settings.clone(),
            self.fs.clone(),
            self.stages.clone(),
        )
    }
}
