//! Domain layer: entities and planning logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod builder;
pub mod codec;
pub mod diff;
pub mod entities;
pub mod error;
pub mod graph;
pub mod overlay;
pub mod selector;
pub mod sequence;

pub use builder::{BuiltGraph, GraphBuilder};
pub use codec::{decode, encode, DecodedBuild};
pub use diff::{validate_target, AllocationDiff, AscendancyExclusions, TargetWarning, IGNORED_ASCENDANCIES};
pub use entities::*;
pub use error::DomainError;
pub use graph::{GraphWarning, Node, Position, SharedGraph, SkillGraph};
pub use overlay::{LinkKind, NodeMark, OverlayPlan, OverlaySummary};
pub use selector::{select_next, NextNodeSelector, DEFAULT_STARTER_NODES};
pub use sequence::{Advance, Hold, SequenceAdvancer};
