//! Catalogue of every artifact the pipeline publishes.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A persisted artifact. Each maps to one file in the artifact directory.
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
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
    Canonical,
    RejectedRows,
    MonthlyTotals,
    AnnualTotals,
    DistributionSummary,
    QualityFlags,
    QualityCoverage,
    ComparisonByState,
    ComparisonPairwise,
    SpatialMunicipalities,
    SpatialExcluded,
    SpatialHotspots,
    SpatialClusters,
    SpatialPca,
    SeasonalStrength,
    MonthlyPatterns,
    SeasonalForecastMetrics,
    CrossCorrelation,
    ForecastPredictions,
    ForecastMetrics,
    ForecastImportance,
    ForecastRecords,
    ReportMarkdown,
    ReportHtml,
}

impl ArtifactKind {
    /// Every artifact, in pipeline order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Canonical,
            Self::RejectedRows,
            Self::MonthlyTotals,
            Self::AnnualTotals,
            Self::DistributionSummary,
            Self::QualityFlags,
            Self::QualityCoverage,
            Self::ComparisonByState,
            Self::ComparisonPairwise,
            Self::SpatialMunicipalities,
            Self::SpatialExcluded,
            Self::SpatialHotspots,
            Self::SpatialClusters,
            Self::SpatialPca,
            Self::SeasonalStrength,
            Self::MonthlyPatterns,
            Self::SeasonalForecastMetrics,
            Self::CrossCorrelation,
            Self::ForecastPredictions,
            Self::ForecastMetrics,
            Self::ForecastImportance,
            Self::ForecastRecords,
            Self::ReportMarkdown,
            Self::ReportHtml,
        ]
    }

    /// File name inside the artifact directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Canonical => "canonical.csv",
            Self::RejectedRows => "rejected_rows.csv",
            Self::MonthlyTotals => "monthly_totals.csv",
            Self::AnnualTotals => "annual_totals.csv",
            Self::DistributionSummary => "distribution_summary.csv",
            Self::QualityFlags => "quality_flags.csv",
            Self::QualityCoverage => "quality_coverage.csv",
            Self::ComparisonByState => "comparison_by_state.csv",
            Self::ComparisonPairwise => "comparison_pairwise.csv",
            Self::SpatialMunicipalities => "spatial_municipalities.csv",
            Self::SpatialExcluded => "spatial_excluded.csv",
            Self::SpatialHotspots => "spatial_hotspots.csv",
            Self::SpatialClusters => "spatial_clusters.csv",
            Self::SpatialPca => "spatial_pca.csv",
            Self::SeasonalStrength => "seasonal_strength.csv",
            Self::MonthlyPatterns => "monthly_patterns.csv",
            Self::SeasonalForecastMetrics => "seasonal_forecast_metrics.csv",
            Self::CrossCorrelation => "cross_correlation.csv",
            Self::ForecastPredictions => "forecast_predictions.csv",
            Self::ForecastMetrics => "forecast_metrics.csv",
            Self::ForecastImportance => "forecast_importance.csv",
            Self::ForecastRecords => "forecast_records.csv",
            Self::ReportMarkdown => "report.md",
            Self::ReportHtml => "report.html",
        }
    }

    /// Whether the artifact is a CSV table (as opposed to a text document).
    #[must_use]
    pub const fn is_table(self) -> bool {
        !matches!(self, Self::ReportMarkdown | Self::ReportHtml)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn file_names_are_unique() {
        let names: BTreeSet<_> = ArtifactKind::all().iter().map(|k| k.file_name()).collect();
        assert_eq!(names.len(), ArtifactKind::all().len());
    }

    #[test]
    fn string_form_round_trips() {
        assert_eq!(ArtifactKind::QualityFlags.to_string(), "quality_flags");
        assert_eq!(
            ArtifactKind::from_str("forecast_records").unwrap(),
            ArtifactKind::ForecastRecords
        );
    }
}
