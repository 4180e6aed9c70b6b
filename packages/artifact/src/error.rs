use crate::{ArtifactKind, Stage};

/// Errors raised while reading, verifying or publishing artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// An upstream artifact does not exist on disk.
    #[error("artifact {kind} is missing ({path}); run the {producer} stage first")]
    Missing {
        kind: ArtifactKind,
        producer: Stage,
        path: String,
    },

    /// An upstream artifact exists but no longer matches the manifest.
    #[error("artifact {kind} is stale: {reason}")]
    Stale { kind: ArtifactKind, reason: String },

    /// A table could not be decoded into the expected row type.
    #[error("artifact {kind} does not match its schema: {message}")]
    SchemaMismatch { kind: ArtifactKind, message: String },

    /// A stage tried to publish without writing all of its outputs.
    #[error("stage {stage} did not write its {kind} artifact")]
    Incomplete { stage: Stage, kind: ArtifactKind },

    /// A stage tried to write an artifact it does not declare.
    #[error("stage {stage} does not publish the {kind} artifact")]
    Undeclared { stage: Stage, kind: ArtifactKind },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_names_the_producer() {
        let err = ArtifactError::Missing {
            kind: ArtifactKind::QualityFlags,
            producer: Stage::Quality,
            path: "out/quality_flags.csv".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "artifact quality_flags is missing (out/quality_flags.csv); run the quality stage first"
        );
    }
}
