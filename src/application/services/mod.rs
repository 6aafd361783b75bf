//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, StageStore, PassiveSurface, etc.)
//! but are themselves concrete structs, not traits.

mod convergence;
mod planner;

pub use convergence::{
    ConvergenceDriver, ConvergenceReport, ConvergenceRunner, DoneReason, DriverState, Step,
    SurfaceAction, Toggle,
};
pub use planner::{DatasetLoad, Evaluation, PlannerService, TargetLoad};
