//! Error types for switchsim-core.

use thiserror::Error;

/// Errors produced by the linear-algebra kernel and the assembler.
#[derive(Debug, Error)]
pub enum Error {
    /// Matrix/vector dimensions do not agree.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// LU elimination found no pivot above the configured tolerance.
    #[error("singular matrix: pivot below tolerance in column {column}")]
    Singular { column: usize },

    /// Inconsistent nodes, duplicate component names, non-finite parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for switchsim-core operations.
pub type Result<T> = std::result::Result<T, Error>;
