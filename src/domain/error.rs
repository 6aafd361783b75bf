//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent invalid input to the pure planning layer.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("tree dataset could not be parsed: {0}")]
    InvalidDataset(String),

    #[error("not a passive tree build code: {0}")]
    UnrecognizedBuildCode(String),

    #[error("build code payload is not valid base64: {0}")]
    InvalidEncoding(String),

    #[error("build code payload is truncated: expected {expected} bytes, got {actual}")]
    TruncatedPayload { expected: usize, actual: usize },

    #[error("unsupported build code version: {0}")]
    UnsupportedVersion(u32),

    #[error("build code has {0} trailing bytes")]
    TrailingBytes(usize),

    #[error("too many nodes for one build code: {0} (max 255)")]
    TooManyNodes(usize),
}
