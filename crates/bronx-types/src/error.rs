// ─────────────────────────────────────────────────────────────────────
// Bronx — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all Bronx failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BronxError {
    /// Shape or contract violation (mismatched dimensions, wrong node count).
    #[error("shape error: {0}")]
    Shape(String),

    /// A node or row index outside the valid range.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A required argument was not supplied (e.g. no graph for a diffusion kernel).
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    /// Cholesky factorisation hit a non-positive pivot.
    #[error("matrix is not positive definite: pivot {pivot:e} at row {row}")]
    NotPositiveDefinite { row: usize, pivot: f64 },

    /// LU factorisation broke down on a zero pivot.
    #[error("singular matrix: {0}")]
    Singular(String),

    /// NaN/Inf produced by a computation.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Malformed graph (bad edge list, empty node set).
    #[error("graph error: {0}")]
    Graph(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}

pub type BronxResult<T> = Result<T, BronxError>;
