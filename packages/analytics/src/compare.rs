//! Statistical comparator: per-state series statistics and SP vs RJ tests.

use std::collections::BTreeMap;

use crime_stats_analytics_models::{ComparisonByState, ComparisonPairwise, join_list};
use crime_stats_crime_models::{CrimeType, Observation, State};
use crime_stats_stats::descriptive::{excess_kurtosis, mean, median, skewness, std_dev};
use crime_stats_stats::pelt::{PeltConfig, pelt_detect};
use crime_stats_stats::rank::mann_whitney_u;
use crime_stats_stats::regression::{annual_change_pct, trend};
use crime_stats_stats::stl::Stl;
use crime_stats_stats::ttest::{cohens_d, welch_t_test};
use rayon::prelude::*;

use crate::config::CompareConfig;
use crate::series::{Exclusions, StateSeries, build_state_series};
use crate::{AnalysisError, Result};

/// Seasonal period of monthly data.
pub const PERIOD: usize = 12;

/// Tables produced by the comparator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompareOutput {
    pub by_state: Vec<ComparisonByState>,
    pub pairwise: Vec<ComparisonPairwise>,
}

/// Statistics of one state series over its longest unflagged run.
///
/// # Errors
///
/// * [`AnalysisError::InsufficientData`] if the run is shorter than
///   `min_months`.
/// * Decomposition failures for constant or non-finite series.
pub fn describe_series(
    series: &StateSeries,
    exclusions: &Exclusions,
    config: &CompareConfig,
) -> Result<ComparisonByState> {
    let run = series.longest_clean_run(exclusions.for_state(series.state));
    let needed = config.min_months.max(2 * PERIOD);
    if run.len() < needed {
        return Err(AnalysisError::InsufficientData {
            context: run.label(),
            needed,
            got: run.len(),
        });
    }
    let values = &run.values;

    let fit = trend(values).map_err(|e| AnalysisError::stats(run.label(), e))?;
    let series_mean = mean(values);

    let changepoints = pelt_detect(values, &PeltConfig::scaled_to(values)).changepoints;
    let changepoint_months: Vec<String> = changepoints
        .iter()
        .map(|&i| run.period(i).to_string())
        .collect();

    let stl = Stl::new(PERIOD)
        .robust()
        .decompose(values)
        .map_err(|e| AnalysisError::stats(run.label(), e))?;

    log::debug!(
        "{}: {} months, {} change-point(s), seasonal strength {:.3}",
        run.label(),
        run.len(),
        changepoints.len(),
        stl.seasonal_strength()
    );

    Ok(ComparisonByState {
        state: run.state,
        crime_type: run.crime_type,
        window_start: run.start.to_string(),
        window_end: run.end().map(|p| p.to_string()).unwrap_or_default(),
        months: run.len(),
        mean: series_mean,
        median: median(values),
        std: std_dev(values),
        skewness: skewness(values),
        kurtosis: excess_kurtosis(values),
        trend_slope: fit.slope,
        trend_r_squared: fit.r_squared,
        trend_p_value: fit.p_value,
        annual_change_pct: annual_change_pct(&fit, series_mean),
        changepoint_count: changepoints.len(),
        changepoints: join_list(&changepoint_months),
        seasonal_strength: stl.seasonal_strength(),
        trend_strength: stl.trend_strength(),
    })
}

/// Rank and parametric tests of `b` against `a` for one crime type.
///
/// Both samples are the unflagged months of each state.
///
/// # Errors
///
/// Fails if either sample is empty or both are constant.
pub fn compare_pair(
    a: &StateSeries,
    b: &StateSeries,
    stats_a: &ComparisonByState,
    stats_b: &ComparisonByState,
    exclusions: &Exclusions,
    config: &CompareConfig,
) -> Result<ComparisonPairwise> {
    let context = format!("{} {} vs {}", a.crime_type, a.state, b.state);
    let sample_a = a.clean_values(exclusions.for_state(a.state));
    let sample_b = b.clean_values(exclusions.for_state(b.state));

    let rank = mann_whitney_u(&sample_a, &sample_b)
        .map_err(|e| AnalysisError::stats(context.clone(), e))?;
    let welch = welch_t_test(&sample_a, &sample_b)
        .map_err(|e| AnalysisError::stats(context.clone(), e))?;
    let d = cohens_d(&sample_a, &sample_b).map_err(|e| AnalysisError::stats(context, e))?;

    let mean_a = mean(&sample_a);
    let mean_b = mean(&sample_b);
    let trend_gap_pct = stats_a
        .annual_change_pct
        .zip(stats_b.annual_change_pct)
        .map(|(ca, cb)| cb - ca);

    Ok(ComparisonPairwise {
        crime_type: a.crime_type,
        state_a: a.state,
        state_b: b.state,
        mean_a,
        mean_b,
        mean_b_above_a: mean_b > mean_a,
        u_statistic: rank.u,
        z: rank.z,
        p_value: rank.p_value,
        effect_size_r: rank.effect_size,
        welch_t: welch.t,
        welch_df: welch.df,
        welch_p_value: welch.p_value,
        cohens_d: d,
        annual_change_a: stats_a.annual_change_pct,
        annual_change_b: stats_b.annual_change_pct,
        trend_gap_pct,
        significant: rank.p_value < config.alpha,
    })
}

/// Runs the comparator over every (state, crime type) series.
///
/// # Errors
///
/// Fails with [`AnalysisError::InsufficientData`] when a state is absent
/// or any of its series is too short, and propagates test failures.
pub fn compare(
    observations: &[Observation],
    exclusions: &Exclusions,
    config: &CompareConfig,
) -> Result<CompareOutput> {
    let series = build_state_series(observations);
    for &state in State::all() {
        if !series.keys().any(|(s, _)| *s == state) {
            return Err(AnalysisError::InsufficientData {
                context: format!("{state} series"),
                needed: config.min_months.max(2 * PERIOD),
                got: 0,
            });
        }
    }

    let by_state: Vec<ComparisonByState> = series
        .values()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|s| describe_series(s, exclusions, config))
        .collect::<Result<_>>()?;
    let by_key: BTreeMap<(State, CrimeType), &ComparisonByState> = by_state
        .iter()
        .map(|row| ((row.state, row.crime_type), row))
        .collect();

    let (a, b) = (State::Sp, State::Rj);
    let mut pairwise = Vec::with_capacity(CrimeType::all().len());
    for &crime in CrimeType::all() {
        let (Some(sa), Some(sb), Some(ra), Some(rb)) = (
            series.get(&(a, crime)),
            series.get(&(b, crime)),
            by_key.get(&(a, crime)),
            by_key.get(&(b, crime)),
        ) else {
            continue;
        };
        let row = compare_pair(sa, sb, ra, rb, exclusions, config)?;
        log::info!(
            "{crime}: {b} mean {:.1} vs {a} mean {:.1}, U p-value {:.4}{}",
            row.mean_b,
            row.mean_a,
            row.p_value,
            if row.significant { " (significant)" } else { "" }
        );
        pairwise.push(row);
    }

    Ok(CompareOutput { by_state, pairwise })
}
