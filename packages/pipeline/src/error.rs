use crime_stats_analytics::{AnalysisError, ErrorKind};
use crime_stats_artifact::{ArtifactError, Stage};
use crime_stats_source::SourceError;

/// Why a single stage failed.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl From<ArtifactError> for StageError {
    fn from(err: ArtifactError) -> Self {
        Self::Analysis(err.into())
    }
}

impl From<std::io::Error> for StageError {
    fn from(err: std::io::Error) -> Self {
        Self::Analysis(err.into())
    }
}

impl StageError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Source(
                SourceError::MalformedInput { .. }
                | SourceError::InvalidDefinition { .. }
                | SourceError::Csv(_)
                | SourceError::Toml(_),
            ) => ErrorKind::MalformedInput,
            Self::Source(SourceError::MissingFile { .. } | SourceError::Io(_)) => {
                ErrorKind::Infrastructure
            }
            Self::Analysis(e) => e.kind(),
        }
    }
}

/// Errors surfaced by the pipeline runner.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A stage aborted; its outputs were not published.
    #[error("stage {} ({}) failed [{}]: {source}", .stage.number(), .stage.label(), .source.kind())]
    Stage { stage: Stage, source: StageError },

    /// The artifact directory could not be opened.
    #[error("cannot open artifact directory: {0}")]
    Store(#[from] ArtifactError),
}

impl PipelineError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Stage { source, .. } => source.kind(),
            Self::Store(_) => ErrorKind::Infrastructure,
        }
    }

    /// The failed stage, if the error came from one.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            Self::Store(_) => None,
        }
    }
}
