//! The stage graph: which artifacts each stage reads and publishes.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::ArtifactKind;

/// A pipeline stage, numbered 1 through 8 in dependency order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Stage {
    Load,
    Explore,
    Quality,
    Compare,
    Spatial,
    Seasonality,
    Forecast,
    Report,
}

impl Stage {
    /// All stages in execution order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Load,
            Self::Explore,
            Self::Quality,
            Self::Compare,
            Self::Spatial,
            Self::Seasonality,
            Self::Forecast,
            Self::Report,
        ]
    }

    /// 1-based position in the pipeline.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Load => 1,
            Self::Explore => 2,
            Self::Quality => 3,
            Self::Compare => 4,
            Self::Spatial => 5,
            Self::Seasonality => 6,
            Self::Forecast => 7,
            Self::Report => 8,
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Load => "Loader/Unifier",
            Self::Explore => "Descriptive Explorer",
            Self::Quality => "Data-Quality Diagnostic",
            Self::Compare => "Statistical Comparator",
            Self::Spatial => "Spatial Analyzer",
            Self::Seasonality => "Seasonality Modeler",
            Self::Forecast => "Forecast Ensemble",
            Self::Report => "Report Composer",
        }
    }

    /// Upstream artifacts that must be present and fresh before the stage
    /// may run. The loader reads raw files only.
    #[must_use]
    pub const fn inputs(self) -> &'static [ArtifactKind] {
        use ArtifactKind as A;
        match self {
            Self::Load => &[],
            Self::Explore | Self::Quality => &[A::Canonical],
            Self::Compare | Self::Spatial | Self::Seasonality | Self::Forecast => {
                &[A::Canonical, A::QualityFlags]
            }
            Self::Report => &[
                A::Canonical,
                A::RejectedRows,
                A::MonthlyTotals,
                A::AnnualTotals,
                A::DistributionSummary,
                A::QualityFlags,
                A::QualityCoverage,
                A::ComparisonByState,
                A::ComparisonPairwise,
                A::SpatialMunicipalities,
                A::SpatialExcluded,
                A::SpatialHotspots,
                A::SpatialClusters,
                A::SpatialPca,
                A::SeasonalStrength,
                A::MonthlyPatterns,
                A::SeasonalForecastMetrics,
                A::CrossCorrelation,
                A::ForecastPredictions,
                A::ForecastMetrics,
                A::ForecastImportance,
                A::ForecastRecords,
            ],
        }
    }

    /// Artifacts the stage publishes, all or nothing.
    #[must_use]
    pub const fn outputs(self) -> &'static [ArtifactKind] {
        use ArtifactKind as A;
        match self {
            Self::Load => &[A::Canonical, A::RejectedRows],
            Self::Explore => &[A::MonthlyTotals, A::AnnualTotals, A::DistributionSummary],
            Self::Quality => &[A::QualityFlags, A::QualityCoverage],
            Self::Compare => &[A::ComparisonByState, A::ComparisonPairwise],
            Self::Spatial => &[
                A::SpatialMunicipalities,
                A::SpatialExcluded,
                A::SpatialHotspots,
                A::SpatialClusters,
                A::SpatialPca,
            ],
            Self::Seasonality => &[
                A::SeasonalStrength,
                A::MonthlyPatterns,
                A::SeasonalForecastMetrics,
                A::CrossCorrelation,
            ],
            Self::Forecast => &[
                A::ForecastPredictions,
                A::ForecastMetrics,
                A::ForecastImportance,
                A::ForecastRecords,
            ],
            Self::Report => &[A::ReportMarkdown, A::ReportHtml],
        }
    }

    /// The stage that publishes `kind`.
    #[must_use]
    pub fn producer_of(kind: ArtifactKind) -> Self {
        Self::all()
            .iter()
            .copied()
            .find(|s| s.outputs().contains(&kind))
            .unwrap_or(Self::Load)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn every_artifact_has_exactly_one_producer() {
        for kind in ArtifactKind::all() {
            let producers = Stage::all()
                .iter()
                .filter(|s| s.outputs().contains(kind))
                .count();
            assert_eq!(producers, 1, "{kind}");
        }
    }

    #[test]
    fn inputs_come_from_earlier_stages() {
        for stage in Stage::all() {
            for input in stage.inputs() {
                assert!(Stage::producer_of(*input).number() < stage.number());
            }
        }
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(Stage::from_str("Seasonality").unwrap(), Stage::Seasonality);
        assert_eq!(Stage::Forecast.to_string(), "forecast");
    }
}
