#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Consolidated human-readable report.
//!
//! [`compose`] turns every upstream table into a format-neutral
//! [`document::Document`], which [`render_markdown`] and [`render_html`]
//! serialize. The composer only reads tables; it never recomputes
//! statistics.

pub mod document;
pub mod format;
pub mod html;
pub mod markdown;

mod sections;

use crime_stats_analytics_models::{
    AnnualTotal, ComparisonByState, ComparisonPairwise, CrossCorrelation, DistributionSummary,
    FeatureImportance, ForecastMetric, ForecastPrediction, ForecastRecord, MonthlyPattern,
    MonthlyTotal, QualityCoverage, QualityFlag, SeasonalForecastMetric, SeasonalStrength,
    SpatialCluster, SpatialExcluded, SpatialHotspot, SpatialMunicipality, SpatialPca,
};
use crime_stats_crime_models::Observation;
use crime_stats_source::loader::RejectedRow;

use crate::document::Document;

/// Report title.
pub const TITLE: &str = "Crime statistics: São Paulo and Rio de Janeiro";

/// Every table the report is built from.
#[derive(Debug, Clone, Default)]
pub struct ReportInputs {
    /// Shown under the title, typically the generation timestamp.
    pub generated_at: String,
    /// Whether flagged months were dropped by the analysis stages.
    pub flagged_months_excluded: bool,
    pub observations: Vec<Observation>,
    pub rejected: Vec<RejectedRow>,
    pub monthly: Vec<MonthlyTotal>,
    pub annual: Vec<AnnualTotal>,
    pub distribution: Vec<DistributionSummary>,
    pub flags: Vec<QualityFlag>,
    pub coverage: Vec<QualityCoverage>,
    pub comparison_by_state: Vec<ComparisonByState>,
    pub comparison_pairwise: Vec<ComparisonPairwise>,
    pub spatial_municipalities: Vec<SpatialMunicipality>,
    pub spatial_excluded: Vec<SpatialExcluded>,
    pub spatial_hotspots: Vec<SpatialHotspot>,
    pub spatial_clusters: Vec<SpatialCluster>,
    pub spatial_pca: Vec<SpatialPca>,
    pub seasonal_strength: Vec<SeasonalStrength>,
    pub monthly_patterns: Vec<MonthlyPattern>,
    pub seasonal_forecasts: Vec<SeasonalForecastMetric>,
    pub cross_correlation: Vec<CrossCorrelation>,
    pub forecast_predictions: Vec<ForecastPrediction>,
    pub forecast_metrics: Vec<ForecastMetric>,
    pub forecast_importance: Vec<FeatureImportance>,
    pub forecast_records: Vec<ForecastRecord>,
}

/// Builds the report document.
#[must_use]
pub fn compose(inputs: &ReportInputs) -> Document {
    let sections = vec![
        sections::coverage(inputs),
        sections::quality(inputs),
        sections::comparison(inputs),
        sections::spatial(inputs),
        sections::seasonality(inputs),
        sections::forecast(inputs),
    ];
    log::debug!("Composed report with {} section(s)", sections.len());
    Document {
        title: TITLE.to_string(),
        subtitle: if inputs.generated_at.is_empty() {
            String::new()
        } else {
            format!("Generated {}", inputs.generated_at)
        },
        sections,
    }
}

#[must_use]
pub fn render_markdown(inputs: &ReportInputs) -> String {
    markdown::render(&compose(inputs))
}

#[must_use]
pub fn render_html(inputs: &ReportInputs) -> String {
    html::render(&compose(inputs))
}

#[cfg(test)]
mod tests {
    use crime_stats_analytics_models::{FlagReason, ModelKind};
    use crime_stats_crime_models::{CrimeType, State};

    use super::*;

    fn pairwise(mean_a: f64, mean_b: f64, p_value: f64) -> ComparisonPairwise {
        ComparisonPairwise {
            crime_type: CrimeType::Homicide,
            state_a: State::Sp,
            state_b: State::Rj,
            mean_a,
            mean_b,
            mean_b_above_a: mean_b > mean_a,
            u_statistic: 100.0,
            z: -3.0,
            p_value,
            effect_size_r: 0.4,
            welch_t: 3.1,
            welch_df: 60.0,
            welch_p_value: 0.003,
            cohens_d: 0.8,
            annual_change_a: Some(-12.0),
            annual_change_b: Some(-15.5),
            trend_gap_pct: Some(-3.5),
            significant: p_value < 0.05,
        }
    }

    fn municipality(id: u32, name: &str, capital: bool, index: f64) -> SpatialMunicipality {
        SpatialMunicipality {
            state: State::Rj,
            municipality_id: id,
            name: name.to_string(),
            region: "Metropolitana".to_string(),
            capital,
            homicide_mean: 1.0,
            homicide_cv: 0.5,
            vehicle_robbery_mean: 2.0,
            vehicle_theft_mean: 3.0,
            violent_mean: 4.0,
            robbery_theft_ratio: 0.5,
            homicide_trend: 0.0,
            volatility: 0.2,
            pc1: 0.0,
            pc2: 0.0,
            cluster: 1,
            criminality_index: index,
            hotspot: capital,
        }
    }

    fn inputs() -> ReportInputs {
        ReportInputs {
            generated_at: "2024-01-01T00:00:00+00:00".to_string(),
            flagged_months_excluded: true,
            flags: vec![QualityFlag {
                state: State::Sp,
                year: 2021,
                month: 9,
                reason: FlagReason::ZeroTotal,
                detail: "no homicides recorded".to_string(),
            }],
            comparison_pairwise: vec![pairwise(400.0, 340.0, 0.0001)],
            spatial_municipalities: vec![
                municipality(3_304_557, "Rio de Janeiro", true, 0.9),
                municipality(3_300_100, "Angra <dos> Reis", false, 0.3),
                municipality(3_300_200, "Niterói", false, 0.1),
            ],
            forecast_metrics: vec![
                ForecastMetric {
                    state: State::Sp,
                    model: ModelKind::RandomForest,
                    mean_r_squared: 0.4,
                    mean_mae: 10.0,
                    folds: 3,
                },
                ForecastMetric {
                    state: State::Sp,
                    model: ModelKind::Ensemble,
                    mean_r_squared: 0.6,
                    mean_mae: 8.0,
                    folds: 3,
                },
            ],
            ..ReportInputs::default()
        }
    }

    #[test]
    fn markdown_has_every_section() {
        let md = render_markdown(&inputs());
        for title in [
            "Data coverage",
            "Data quality",
            "SP vs RJ comparison",
            "Spatial profiles",
            "Seasonality",
            "Forecast ensemble",
        ] {
            assert!(md.contains(&format!("## {title}\n")), "missing {title}");
        }
        assert!(md.contains("_Generated 2024-01-01T00:00:00+00:00_"));
    }

    #[test]
    fn narrative_names_the_higher_state() {
        let md = render_markdown(&inputs());
        assert!(md.contains(
            "Homicide: SP averages 400.0 per month against 340.0 in RJ (17.6% higher); the difference is statistically significant (Mann-Whitney p = <0.001, r = 0.40)."
        ));
        assert!(md.contains("Trend: SP -12.0%/year, RJ -15.5%/year."));
        assert!(md.contains("excluded from the comparison"));
        assert!(md.contains("SP: 1 month(s) flagged as zero_total"));
    }

    #[test]
    fn capital_is_compared_with_the_interior() {
        let md = render_markdown(&inputs());
        assert!(md.contains(
            "RJ: Rio de Janeiro has criminality index 0.900 (4.5x the interior) against an interior mean of 0.200 over 2 municipalities."
        ));
    }

    #[test]
    fn best_model_is_reported() {
        let md = render_markdown(&inputs());
        assert!(md.contains("SP: best cross-validated model is ensemble"));
    }

    #[test]
    fn seasonal_peaks_show_month_names_and_interval() {
        let mut inputs = inputs();
        inputs.seasonal_strength.push(SeasonalStrength {
            state: State::Rj,
            crime_type: CrimeType::VehicleTheft,
            months: 48,
            seasonal_strength: 0.7,
            trend_strength: 0.2,
            amplitude_pct: Some(20.0),
            peak_months: "12;1;3".to_string(),
            trough_months: "6;7;5".to_string(),
            swing_pct: Some(34.5),
        });
        inputs.monthly_patterns.push(MonthlyPattern {
            state: State::Rj,
            crime_type: CrimeType::VehicleTheft,
            month: 12,
            n: 4,
            mean: 138.5,
            std: 5.0,
            ci_lower: 130.21,
            ci_upper: 146.79,
        });
        let md = render_markdown(&inputs);
        assert!(md.contains("| RJ | Vehicle theft | 48 | 0.70 | 0.20 | Dec, Jan, Mar | 138.5 (130.2 to 146.8) | Jun, Jul, May | 34.5 |"));
        assert!(md.contains("The most seasonal series is vehicle theft in RJ (strength 0.70), peaking in Dec, Jan, Mar."));
    }

    #[test]
    fn empty_inputs_render_placeholders() {
        let md = render_markdown(&ReportInputs::default());
        assert!(md.contains("No observations were loaded."));
        assert!(md.contains("No anomalous months were found."));
        assert!(md.contains("No forecasts were produced."));
        assert!(!md.contains("_Generated"));
    }

    #[test]
    fn html_escapes_data_strings() {
        let mut inputs = inputs();
        inputs.spatial_hotspots.push(SpatialHotspot {
            rank: 1,
            state: State::Rj,
            municipality_id: 3_300_100,
            name: "Angra <dos> Reis".to_string(),
            region: "Costa Verde".to_string(),
            capital: false,
            criminality_index: 0.3,
            cluster: 2,
        });
        let html = render_html(&inputs);
        assert!(html.contains("<td>Angra &lt;dos&gt; Reis</td>"));
        assert!(!html.contains("<dos>"));
        assert!(html.contains("<section id=\"data-coverage\">"));
    }
}
