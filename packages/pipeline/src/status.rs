//! Per-stage lifecycle.

use crime_stats_analytics::ErrorKind;
use crime_stats_artifact::{ArtifactKind, Stage};

use crate::PipelineError;

/// Lifecycle of one stage within a run.
///
/// `Idle -> Running -> Succeeded | Failed`. A stage whose upstream failed
/// in the same run is never started and stays `Idle`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StageStatus {
    #[default]
    Idle,
    Running,
    Succeeded {
        artifacts: Vec<ArtifactKind>,
    },
    Failed {
        kind: ErrorKind,
        reason: String,
    },
}

impl StageStatus {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub const fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Outcome of [`crate::Pipeline::run_all`].
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Final status of every stage, in pipeline order.
    pub statuses: Vec<(Stage, StageStatus)>,
    pub errors: Vec<PipelineError>,
}

impl RunSummary {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
            && self
                .statuses
                .iter()
                .all(|(_, status)| status.is_succeeded())
    }

    #[must_use]
    pub fn status(&self, stage: Stage) -> Option<&StageStatus> {
        self.statuses
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, status)| status)
    }

    /// Stages left idle because an upstream stage failed.
    #[must_use]
    pub fn skipped(&self) -> Vec<Stage> {
        self.statuses
            .iter()
            .filter(|(_, status)| *status == StageStatus::Idle)
            .map(|(stage, _)| *stage)
            .collect()
    }
}
