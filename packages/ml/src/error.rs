//! Error types for the learning algorithms.

use thiserror::Error;

/// Result type alias for learning routines.
pub type Result<T> = std::result::Result<T, MlError>;

/// Errors raised by fitting or applying a model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MlError {
    /// Too few samples for the requested operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// The input carries no usable variation.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// Rows or targets do not line up.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A configuration value is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
