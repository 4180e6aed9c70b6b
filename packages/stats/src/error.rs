//! Error types for the statistics crate.

use thiserror::Error;

/// Result type alias for statistical routines.
pub type Result<T> = std::result::Result<T, StatsError>;

/// Errors raised when a routine cannot produce a stable estimate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    /// The input is shorter than the routine requires.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// The input has no variation (or no finite values) to work with.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// Two inputs that must line up have different lengths.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = StatsError::InsufficientData { needed: 24, got: 18 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 24, got 18"
        );

        let err = StatsError::DegenerateInput("constant series".to_string());
        assert_eq!(err.to_string(), "degenerate input: constant series");

        let err = StatsError::DimensionMismatch {
            expected: 3,
            got: 2,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 3, got 2");
    }
}
