//! Passive tree planner
//!
//! Decodes build codes, diffs them against the live allocation, picks the
//! next node to take and drives a passive tree panel toward the target.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
