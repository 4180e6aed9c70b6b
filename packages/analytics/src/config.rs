//! Analysis configuration (`crime_stats.toml`).
//!
//! Every field has a default, so an empty or partial file is valid:
//!
//! ```toml
//! flag_policy = "flag_only"
//!
//! [spatial]
//! clusters = 5
//! hotspot_count = 10
//! ```

use std::path::Path;

use crime_stats_crime_models::CrimeType;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "crime_stats.toml";

/// What downstream stages do with months flagged by the quality stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagPolicy {
    /// Drop flagged months (or analyse the longest unflagged run).
    #[default]
    Exclude,
    /// Report flags but analyse every month.
    FlagOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub flag_policy: FlagPolicy,
    pub quality: QualityConfig,
    pub compare: CompareConfig,
    pub spatial: SpatialConfig,
    pub seasonality: SeasonalityConfig,
    pub forecast: ForecastConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            flag_policy: FlagPolicy::Exclude,
            quality: QualityConfig::default(),
            compare: CompareConfig::default(),
            spatial: SpatialConfig::default(),
            seasonality: SeasonalityConfig::default(),
            forecast: ForecastConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Consecutive all-zero months that form a `zero_run`.
    pub min_zero_run: usize,
    /// Minimum share of municipalities reporting in a month.
    pub min_coverage_ratio: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_zero_run: 2,
            min_coverage_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Significance level of the pairwise tests.
    pub alpha: f64,
    /// Shortest analysable series (two seasonal cycles).
    pub min_months: usize,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            min_months: 24,
        }
    }
}

/// Weights of the composite criminality index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexWeights {
    pub homicide: f64,
    pub violent: f64,
    pub volatility: f64,
}

impl Default for IndexWeights {
    fn default() -> Self {
        Self {
            homicide: 0.4,
            violent: 0.3,
            volatility: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Trailing months of the canonical table used for the indicators.
    pub window_months: usize,
    /// Cumulative explained variance at which PCA stops adding components.
    pub variance_threshold: f64,
    pub min_components: usize,
    pub clusters: usize,
    /// Index quantile above which a municipality is a hotspot.
    pub hotspot_percentile: f64,
    /// Fixed number of hotspots; overrides `hotspot_percentile`.
    pub hotspot_count: Option<usize>,
    pub weights: IndexWeights,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            window_months: 36,
            variance_threshold: 0.8,
            min_components: 2,
            clusters: 4,
            hotspot_percentile: 0.9,
            hotspot_count: None,
            weights: IndexWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalityConfig {
    /// Trailing months held out to score the Holt-Winters fit.
    pub holdout_months: usize,
    /// Months ahead forecast from the full series.
    pub horizon: usize,
    /// Largest robbery/theft cross-correlation lag.
    pub max_lag: usize,
}

impl Default for SeasonalityConfig {
    fn default() -> Self {
        Self {
            holdout_months: 12,
            horizon: 3,
            max_lag: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub target: CrimeType,
    pub min_history: usize,
    pub folds: usize,
    /// Test window per fold, in months. Shrunk when the history is short.
    pub test_months: usize,
    /// Smallest training set of the first fold, in feature rows.
    pub min_train_rows: usize,
    /// Ensemble weight of the random forest; boosting gets the rest.
    pub forest_weight: f64,
    pub seed: u64,
    pub n_trees: usize,
    pub n_stages: usize,
    pub learning_rate: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            target: CrimeType::Homicide,
            min_history: 24,
            folds: 3,
            test_months: 6,
            min_train_rows: 6,
            forest_weight: 0.6,
            seed: 42,
            n_trees: 200,
            n_stages: 200,
            learning_rate: 0.05,
        }
    }
}

impl AnalysisConfig {
    /// Parses a config document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or a field has
    /// the wrong type.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads `path`, or the defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            log::info!("No analysis config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::from_toml(&std::fs::read_to_string(path)?)?;
        log::info!("Loaded analysis config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(AnalysisConfig::from_toml("").unwrap(), AnalysisConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AnalysisConfig::from_toml(
            "flag_policy = \"flag_only\"\n[spatial]\nclusters = 5\n[forecast]\ntarget = \"vehicle_theft\"\n",
        )
        .unwrap();
        assert_eq!(config.flag_policy, FlagPolicy::FlagOnly);
        assert_eq!(config.spatial.clusters, 5);
        assert!((config.spatial.variance_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.forecast.target, CrimeType::VehicleTheft);
        assert_eq!(config.forecast.seed, 42);
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(AnalysisConfig::from_toml("[spatial]\nclusters = \"many\"\n").is_err());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::load(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }
}
