//! Error taxonomy shared by the analysis stages.

use crime_stats_artifact::ArtifactError;
use crime_stats_crime_models::State;
use crime_stats_ml::MlError;
use crime_stats_stats::StatsError;
use strum_macros::{AsRefStr, Display};

/// Result type alias for the analysis stages.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Failure categories reported for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum ErrorKind {
    MalformedInput,
    InsufficientData,
    InsufficientHistory,
    DegenerateInput,
    StaleArtifact,
    /// Filesystem, encoding or configuration problems.
    Infrastructure,
}

/// Errors that abort an analysis stage.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Input rows violate the canonical schema.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A series or sample is too short for the requested statistic.
    #[error("insufficient data for {context}: need at least {needed}, got {got}")]
    InsufficientData {
        context: String,
        needed: usize,
        got: usize,
    },

    /// A state has too few months to train the forecaster.
    #[error("insufficient history for {state}: need at least {needed} months, got {got}")]
    InsufficientHistory {
        state: State,
        needed: usize,
        got: usize,
    },

    /// The input carries no usable variation.
    #[error("degenerate input for {context}: {message}")]
    DegenerateInput { context: String, message: String },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("invalid analysis config: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// Wraps a statistics failure with the series it happened on.
    pub fn stats(context: impl Into<String>, err: StatsError) -> Self {
        let context = context.into();
        match err {
            StatsError::InsufficientData { needed, got } => Self::InsufficientData {
                context,
                needed,
                got,
            },
            StatsError::DegenerateInput(message) => Self::DegenerateInput { context, message },
            StatsError::DimensionMismatch { .. } => Self::MalformedInput(format!("{context}: {err}")),
        }
    }

    /// Wraps a learning failure with the data set it happened on.
    pub fn ml(context: impl Into<String>, err: MlError) -> Self {
        let context = context.into();
        match err {
            MlError::InsufficientData { needed, got } => Self::InsufficientData {
                context,
                needed,
                got,
            },
            MlError::DegenerateInput(message) => Self::DegenerateInput { context, message },
            MlError::DimensionMismatch { .. } | MlError::InvalidParameter(_) => {
                Self::MalformedInput(format!("{context}: {err}"))
            }
        }
    }

    /// Taxonomy kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedInput(_) => ErrorKind::MalformedInput,
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::InsufficientHistory { .. } => ErrorKind::InsufficientHistory,
            Self::DegenerateInput { .. } => ErrorKind::DegenerateInput,
            Self::Artifact(
                ArtifactError::Missing { .. }
                | ArtifactError::Stale { .. }
                | ArtifactError::Incomplete { .. },
            ) => ErrorKind::StaleArtifact,
            Self::Artifact(ArtifactError::SchemaMismatch { .. }) => ErrorKind::MalformedInput,
            Self::Artifact(_) | Self::Config(_) | Self::Io(_) => ErrorKind::Infrastructure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_errors_keep_their_kind() {
        let err = AnalysisError::stats(
            "SP homicide",
            StatsError::InsufficientData { needed: 24, got: 18 },
        );
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert_eq!(
            err.to_string(),
            "insufficient data for SP homicide: need at least 24, got 18"
        );

        let err = AnalysisError::ml("spatial", MlError::DegenerateInput("no variance".to_string()));
        assert_eq!(err.kind(), ErrorKind::DegenerateInput);
    }

    #[test]
    fn artifact_errors_map_to_stale() {
        let err = AnalysisError::from(ArtifactError::Stale {
            kind: crime_stats_artifact::ArtifactKind::Canonical,
            reason: "hash changed".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::StaleArtifact);
        assert_eq!(err.kind().to_string(), "StaleArtifact");
    }
}
