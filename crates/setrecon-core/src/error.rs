//! Error types for the core values.

use thiserror::Error;

/// Errors from element encoding and field arithmetic.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("element encoding too wide: at most {max} bytes, got {got}")]
    ElementWidth { max: usize, got: usize },

    #[error("element out of field range: {0}")]
    OutOfRange(String),

    #[error("division by zero in field arithmetic")]
    DivisionByZero,

    #[error("malformed prefix: {0}")]
    MalformedPrefix(String),
}

/// Errors reported by an algebraic solver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolveError {
    /// The difference is larger than the interpolation degree bound can
    /// resolve ("low MBar"). Callers fall back to other strategies.
    #[error("insufficient interpolation degree to resolve difference")]
    InsufficientDegree,

    /// Any other solver failure.
    #[error("solver failed: {0}")]
    Failed(String),
}
