//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::{DomainError, TreeType};

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("no tree dataset loaded for the {0} tree")]
    NoGraph(TreeType),

    #[error("build not found: {0}")]
    BuildNotFound(String),

    #[error("build {build} has no {tree} stages")]
    NoStages { build: String, tree: TreeType },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
