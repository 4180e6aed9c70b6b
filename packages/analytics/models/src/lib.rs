#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Row types of the tables written by the analysis stages.
//!
//! Each struct maps 1:1 to the columns of one CSV artifact, so fields are
//! flat: lists are joined into a single `;`-separated cell and values that
//! cannot be computed are `None` (an empty cell).

use crime_stats_crime_models::{CrimeType, MunicipalityId, State};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Separator used for list-valued cells.
pub const LIST_SEPARATOR: &str = ";";

/// Joins list items into one cell.
#[must_use]
pub fn join_list<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Splits a list cell back into its items.
#[must_use]
pub fn split_list(cell: &str) -> Vec<&str> {
    cell.split(LIST_SEPARATOR).filter(|s| !s.is_empty()).collect()
}

// ---------------------------------------------------------------------------
// Descriptive explorer
// ---------------------------------------------------------------------------

/// State-level total for one crime type and month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub state: State,
    pub crime_type: CrimeType,
    pub year: i32,
    pub month: u8,
    pub total: u64,
}

/// State-level total for one crime type and calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualTotal {
    pub state: State,
    pub crime_type: CrimeType,
    pub year: i32,
    pub total: u64,
    /// Months of the year present in the canonical table.
    pub months_with_data: u32,
}

/// Distribution of the monthly state totals of one crime type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub state: State,
    pub crime_type: CrimeType,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

// ---------------------------------------------------------------------------
// Data quality
// ---------------------------------------------------------------------------

/// Why a state-month was flagged.
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
pub enum FlagReason {
    /// Zero homicides in a state that normally reports them.
    ZeroTotal,
    /// Part of a run of months with no records at all.
    ZeroRun,
    /// Too few municipalities reported anything.
    LowCoverage,
}

/// A flagged (state, month) with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityFlag {
    pub state: State,
    pub year: i32,
    pub month: u8,
    pub reason: FlagReason,
    pub detail: String,
}

/// Reporting coverage of one state-year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCoverage {
    pub state: State,
    pub year: i32,
    /// Months with a non-zero state total.
    pub months_with_data: u32,
    /// Municipalities with a non-zero count in at least one month.
    pub reporting_municipalities: u32,
    pub total_municipalities: u32,
    pub flagged_months: u32,
}

// ---------------------------------------------------------------------------
// Statistical comparator
// ---------------------------------------------------------------------------

/// Single-state statistics for one crime type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonByState {
    pub state: State,
    pub crime_type: CrimeType,
    /// First and last month of the analysed run, `YYYY-MM`.
    pub window_start: String,
    pub window_end: String,
    pub months: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub trend_slope: f64,
    pub trend_r_squared: f64,
    pub trend_p_value: f64,
    pub annual_change_pct: Option<f64>,
    pub changepoint_count: usize,
    /// Months where a new segment starts, `YYYY-MM` joined by `;`.
    pub changepoints: String,
    pub seasonal_strength: f64,
    pub trend_strength: f64,
}

/// Cross-state comparison for one crime type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPairwise {
    pub crime_type: CrimeType,
    pub state_a: State,
    pub state_b: State,
    pub mean_a: f64,
    pub mean_b: f64,
    pub mean_b_above_a: bool,
    pub u_statistic: f64,
    pub z: f64,
    pub p_value: f64,
    pub effect_size_r: f64,
    pub welch_t: f64,
    pub welch_df: f64,
    pub welch_p_value: f64,
    pub cohens_d: f64,
    pub annual_change_a: Option<f64>,
    pub annual_change_b: Option<f64>,
    /// `annual_change_b - annual_change_a`, in percentage points.
    pub trend_gap_pct: Option<f64>,
    pub significant: bool,
}

// ---------------------------------------------------------------------------
// Spatial analyzer
// ---------------------------------------------------------------------------

/// Indicators and labels of one clustered municipality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialMunicipality {
    pub state: State,
    pub municipality_id: MunicipalityId,
    pub name: String,
    pub region: String,
    pub capital: bool,
    pub homicide_mean: f64,
    pub homicide_cv: f64,
    pub vehicle_robbery_mean: f64,
    pub vehicle_theft_mean: f64,
    pub violent_mean: f64,
    pub robbery_theft_ratio: f64,
    pub homicide_trend: f64,
    pub volatility: f64,
    pub pc1: f64,
    pub pc2: f64,
    /// Cluster label, 1-based.
    pub cluster: usize,
    pub criminality_index: f64,
    pub hotspot: bool,
}

/// A municipality left out of clustering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialExcluded {
    pub state: State,
    pub municipality_id: MunicipalityId,
    pub name: String,
    pub reason: String,
}

/// A hotspot, ranked by criminality index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialHotspot {
    pub rank: usize,
    pub state: State,
    pub municipality_id: MunicipalityId,
    pub name: String,
    pub region: String,
    pub capital: bool,
    pub criminality_index: f64,
    pub cluster: usize,
}

/// Mean indicators of the members of one cluster within one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialCluster {
    pub cluster: usize,
    pub state: State,
    pub municipalities: usize,
    pub hotspots: usize,
    pub homicide_mean: f64,
    pub vehicle_robbery_mean: f64,
    pub vehicle_theft_mean: f64,
    pub violent_mean: f64,
    pub volatility: f64,
    pub criminality_index: f64,
}

/// One principal component with its loading on every indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialPca {
    /// 1-based component number.
    pub component: usize,
    pub explained_variance_ratio: f64,
    pub cumulative_ratio: f64,
    pub retained: bool,
    pub homicide_mean: f64,
    pub homicide_cv: f64,
    pub vehicle_robbery_mean: f64,
    pub vehicle_theft_mean: f64,
    pub violent_mean: f64,
    pub robbery_theft_ratio: f64,
    pub homicide_trend: f64,
    pub volatility: f64,
}

// ---------------------------------------------------------------------------
// Seasonality modeler
// ---------------------------------------------------------------------------

/// Decomposition summary and peak/trough months of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalStrength {
    pub state: State,
    pub crime_type: CrimeType,
    pub months: usize,
    pub seasonal_strength: f64,
    pub trend_strength: f64,
    pub amplitude_pct: Option<f64>,
    /// Month numbers joined by `;`, highest mean first.
    pub peak_months: String,
    /// Month numbers joined by `;`, lowest mean first.
    pub trough_months: String,
    /// `(max / min - 1) * 100` of the monthly means; empty when min is 0.
    pub swing_pct: Option<f64>,
}

/// Month-of-year effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPattern {
    pub state: State,
    pub crime_type: CrimeType,
    pub month: u8,
    pub n: usize,
    pub mean: f64,
    pub std: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// Held-out accuracy of a Holt-Winters fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalForecastMetric {
    pub state: State,
    pub crime_type: CrimeType,
    pub train_months: usize,
    pub test_months: usize,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub mae: f64,
    pub rmse: f64,
    /// Empty when any held-out actual is zero.
    pub mape: Option<f64>,
    /// Next three months after the full series, `;`-joined.
    pub next_forecast: String,
}

/// Robbery/theft correlation at one lag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossCorrelation {
    pub state: State,
    /// Positive lags compare robbery with earlier theft.
    pub lag: i32,
    pub correlation: f64,
    /// Set on the lag with the largest absolute correlation.
    pub best: bool,
}

// ---------------------------------------------------------------------------
// Forecast ensemble
// ---------------------------------------------------------------------------

/// Regressor whose results a metrics row describes.
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
pub enum ModelKind {
    RandomForest,
    GradientBoosting,
    Ensemble,
}

impl ModelKind {
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::RandomForest, Self::GradientBoosting, Self::Ensemble]
    }
}

/// Out-of-fold prediction for one test month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPrediction {
    pub state: State,
    /// 1-based fold number.
    pub fold: usize,
    pub year: i32,
    pub month: u8,
    pub actual: f64,
    pub random_forest: f64,
    pub gradient_boosting: f64,
    pub ensemble: f64,
}

/// Cross-validated accuracy of one model for one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetric {
    pub state: State,
    pub model: ModelKind,
    pub mean_r_squared: f64,
    pub mean_mae: f64,
    pub folds: usize,
}

/// One entry of the ranked feature importance list of a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub state: State,
    /// 1-based rank.
    pub rank: usize,
    pub feature: String,
    pub weight: f64,
}

/// Next-month forecast of a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub state: State,
    pub crime_type: CrimeType,
    pub target_year: i32,
    pub target_month: u8,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
    pub model_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_cells_round_trip() {
        let cell = join_list(&["2020-01", "2021-07"]);
        assert_eq!(cell, "2020-01;2021-07");
        assert_eq!(split_list(&cell), vec!["2020-01", "2021-07"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn enums_use_snake_case() {
        assert_eq!(FlagReason::LowCoverage.to_string(), "low_coverage");
        assert_eq!("zero_run".parse::<FlagReason>().unwrap(), FlagReason::ZeroRun);
        assert_eq!(ModelKind::GradientBoosting.as_ref(), "gradient_boosting");
    }
}
