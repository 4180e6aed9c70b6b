//! Seasonality modeler: decomposition, month-of-year effects, Holt-Winters
//! accuracy and the robbery/theft cross-correlation.

use std::collections::BTreeMap;

use crime_stats_analytics_models::{
    CrossCorrelation, MonthlyPattern, SeasonalForecastMetric, SeasonalStrength, join_list,
};
use crime_stats_crime_models::{CrimeType, Observation, State};
use crime_stats_stats::correlation::cross_correlation;
use crime_stats_stats::decompose::classical_additive;
use crime_stats_stats::descriptive::{mean, std_dev};
use crime_stats_stats::distribution::student_t_quantile;
use crime_stats_stats::holt_winters::HoltWinters;
use crime_stats_stats::metrics::{mae, mape, rmse};
use rayon::prelude::*;

use crate::compare::PERIOD;
use crate::config::SeasonalityConfig;
use crate::series::{Exclusions, StateSeries, build_state_series};
use crate::{AnalysisError, Result};

/// Months reported as peaks and as troughs.
const EXTREME_MONTHS: usize = 3;

/// Tables produced by the seasonality modeler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeasonalityOutput {
    pub strength: Vec<SeasonalStrength>,
    pub patterns: Vec<MonthlyPattern>,
    pub forecasts: Vec<SeasonalForecastMetric>,
    pub cross_correlation: Vec<CrossCorrelation>,
}

/// Month-of-year means, std and 95% confidence bounds over the unflagged
/// months of `series`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn monthly_patterns(series: &StateSeries, exclusions: &Exclusions) -> Vec<MonthlyPattern> {
    let mut by_month: BTreeMap<u8, Vec<f64>> = BTreeMap::new();
    for (period, value) in series.clean_points(exclusions.for_state(series.state)) {
        by_month.entry(period.month).or_default().push(value);
    }
    by_month
        .into_iter()
        .map(|(month, values)| {
            let n = values.len();
            let m = mean(&values);
            let (std, half_width) = if n > 1 {
                let s = std_dev(&values);
                let t = student_t_quantile(0.975, (n - 1) as f64);
                (s, t * s / (n as f64).sqrt())
            } else {
                (0.0, 0.0)
            };
            MonthlyPattern {
                state: series.state,
                crime_type: series.crime_type,
                month,
                n,
                mean: m,
                std,
                ci_lower: m - half_width,
                ci_upper: m + half_width,
            }
        })
        .collect()
}

/// Peak months (highest mean first), trough months (lowest first) and
/// the percentage swing between the extreme means.
#[must_use]
pub fn peaks_and_troughs(patterns: &[MonthlyPattern]) -> (Vec<u8>, Vec<u8>, Option<f64>) {
    let mut order: Vec<&MonthlyPattern> = patterns.iter().collect();
    order.sort_by(|a, b| b.mean.total_cmp(&a.mean).then(a.month.cmp(&b.month)));
    let peaks = order.iter().take(EXTREME_MONTHS).map(|p| p.month).collect();

    order.sort_by(|a, b| a.mean.total_cmp(&b.mean).then(a.month.cmp(&b.month)));
    let troughs = order.iter().take(EXTREME_MONTHS).map(|p| p.month).collect();

    let max = patterns.iter().map(|p| p.mean).fold(f64::NEG_INFINITY, f64::max);
    let min = patterns.iter().map(|p| p.mean).fold(f64::INFINITY, f64::min);
    let swing = (min.is_finite() && min > 0.0).then(|| (max / min - 1.0) * 100.0);
    (peaks, troughs, swing)
}

/// Holt-Winters accuracy on the trailing `holdout_months` of `run`, plus
/// the forecast from a refit on the whole run.
///
/// # Errors
///
/// Returns [`AnalysisError::InsufficientData`] if the training window is
/// shorter than two seasonal cycles.
pub fn holdout_forecast(
    run: &StateSeries,
    config: &SeasonalityConfig,
) -> Result<SeasonalForecastMetric> {
    let holdout = config.holdout_months.max(1);
    let needed = 2 * PERIOD + holdout;
    if run.len() < needed {
        return Err(AnalysisError::InsufficientData {
            context: format!("{} holt-winters training window", run.label()),
            needed,
            got: run.len(),
        });
    }
    let split = run.len() - holdout;
    let (train, test) = run.values.split_at(split);

    let model = HoltWinters::fit(train, PERIOD).map_err(|e| AnalysisError::stats(run.label(), e))?;
    let predicted = model.forecast(test.len());
    let params = model.params();

    let full = HoltWinters::fit(&run.values, PERIOD).map_err(|e| AnalysisError::stats(run.label(), e))?;
    let next: Vec<String> = full
        .forecast(config.horizon)
        .iter()
        .map(|v| format!("{v:.1}"))
        .collect();

    Ok(SeasonalForecastMetric {
        state: run.state,
        crime_type: run.crime_type,
        train_months: train.len(),
        test_months: test.len(),
        alpha: params.alpha,
        beta: params.beta,
        gamma: params.gamma,
        mae: mae(test, &predicted),
        rmse: rmse(test, &predicted),
        mape: mape(test, &predicted),
        next_forecast: join_list(&next),
    })
}

/// Decomposition summary of one property-crime series.
///
/// # Errors
///
/// Fails when the longest unflagged run spans fewer than two cycles.
pub fn strength(
    series: &StateSeries,
    exclusions: &Exclusions,
    patterns: &[MonthlyPattern],
) -> Result<SeasonalStrength> {
    let run = series.longest_clean_run(exclusions.for_state(series.state));
    let decomposition =
        classical_additive(&run.values, PERIOD).map_err(|e| AnalysisError::stats(run.label(), e))?;
    let (peaks, troughs, swing) = peaks_and_troughs(patterns);
    Ok(SeasonalStrength {
        state: run.state,
        crime_type: run.crime_type,
        months: run.len(),
        seasonal_strength: decomposition.seasonal_strength(),
        trend_strength: decomposition.trend_strength(),
        amplitude_pct: decomposition.seasonal_amplitude_pct(&run.values),
        peak_months: join_list(&peaks),
        trough_months: join_list(&troughs),
        swing_pct: swing,
    })
}

/// Robbery vs theft correlation at every lag, marking the strongest one.
#[must_use]
pub fn robbery_theft_correlation(
    robbery: &StateSeries,
    theft: &StateSeries,
    exclusions: &Exclusions,
    max_lag: usize,
) -> Vec<CrossCorrelation> {
    let excluded = exclusions.for_state(robbery.state);
    let x = robbery.longest_clean_run(excluded);
    let y = theft.longest_clean_run(excluded);
    let pairs = cross_correlation(&x.values, &y.values, max_lag);
    let best = pairs
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &(_, r))| match best {
            Some((_, b)) if b.abs() >= r.abs() => best,
            _ => Some((i, r)),
        })
        .map(|(i, _)| i);
    pairs
        .into_iter()
        .enumerate()
        .map(|(i, (lag, correlation))| CrossCorrelation {
            state: robbery.state,
            lag: i32::try_from(lag).unwrap_or(0),
            correlation,
            best: Some(i) == best,
        })
        .collect()
}

struct SeriesResult {
    strength: SeasonalStrength,
    patterns: Vec<MonthlyPattern>,
    forecast: SeasonalForecastMetric,
}

fn model_series(
    series: &StateSeries,
    exclusions: &Exclusions,
    config: &SeasonalityConfig,
) -> Result<SeriesResult> {
    let patterns = monthly_patterns(series, exclusions);
    let strength = strength(series, exclusions, &patterns)?;
    let run = series.longest_clean_run(exclusions.for_state(series.state));
    let forecast = holdout_forecast(&run, config)?;
    log::debug!(
        "{}: seasonal strength {:.3}, peaks {}, troughs {}, MAPE {}",
        series.label(),
        strength.seasonal_strength,
        strength.peak_months,
        strength.trough_months,
        forecast
            .mape
            .map_or_else(|| "n/a".to_string(), |m| format!("{m:.1}%"))
    );
    Ok(SeriesResult {
        strength,
        patterns,
        forecast,
    })
}

/// Models every (state, property crime) series.
///
/// # Errors
///
/// Fails if any series is too short for decomposition or for the
/// held-out Holt-Winters evaluation.
pub fn model(
    observations: &[Observation],
    exclusions: &Exclusions,
    config: &SeasonalityConfig,
) -> Result<SeasonalityOutput> {
    let series = build_state_series(observations);
    let targets: Vec<&StateSeries> = series
        .values()
        .filter(|s| CrimeType::property().contains(&s.crime_type))
        .collect();

    let results: Vec<SeriesResult> = targets
        .into_par_iter()
        .map(|s| model_series(s, exclusions, config))
        .collect::<Result<_>>()?;

    let mut out = SeasonalityOutput::default();
    for r in results {
        out.strength.push(r.strength);
        out.patterns.extend(r.patterns);
        out.forecasts.push(r.forecast);
    }

    for &state in State::all() {
        if let (Some(robbery), Some(theft)) = (
            series.get(&(state, CrimeType::RobberyTotal)),
            series.get(&(state, CrimeType::TheftTotal)),
        ) {
            let rows = robbery_theft_correlation(robbery, theft, exclusions, config.max_lag);
            if let Some(best) = rows.iter().find(|r| r.best) {
                log::info!(
                    "{state}: robbery/theft correlation peaks at lag {} (r = {:.3})",
                    best.lag,
                    best.correlation
                );
            }
            out.cross_correlation.extend(rows);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::ErrorKind;
    use crate::fixtures::{observations, ym};

    /// Seasonal homicides peaking in December with a mild upward trend.
    fn seasonal(months: usize) -> Vec<f64> {
        (0..months)
            .map(|i| {
                let month = (i % 12) as f64;
                100.0 + 0.5 * i as f64 + 30.0 * (month / 11.0)
            })
            .collect()
    }

    fn sp_series(values: &[f64]) -> StateSeries {
        StateSeries {
            state: State::Sp,
            crime_type: CrimeType::VehicleTheft,
            start: ym(2020, 1),
            values: values.to_vec(),
        }
    }

    #[test]
    fn patterns_have_confidence_bounds() {
        let s = sp_series(&seasonal(36));
        let patterns = monthly_patterns(&s, &Exclusions::default());
        assert_eq!(patterns.len(), 12);
        let jan = &patterns[0];
        assert_eq!(jan.n, 3);
        // January values 100, 106, 112.
        assert_relative_eq!(jan.mean, 106.0);
        assert_relative_eq!(jan.std, 6.0);
        let half = student_t_quantile(0.975, 2.0) * 6.0 / 3.0_f64.sqrt();
        assert_relative_eq!(jan.ci_upper - jan.mean, half, epsilon = 1e-9);
        assert!(jan.ci_lower < jan.mean);
    }

    #[test]
    fn peaks_troughs_and_swing() {
        let s = sp_series(&seasonal(24));
        let patterns = monthly_patterns(&s, &Exclusions::default());
        let (peaks, troughs, swing) = peaks_and_troughs(&patterns);
        assert_eq!(peaks, vec![12, 11, 10]);
        assert_eq!(troughs, vec![1, 2, 3]);
        // Dec mean 100 + 0.5 * 17 + 30 = 138.5, Jan mean 103.
        assert_relative_eq!(swing.unwrap(), (138.5 / 103.0 - 1.0) * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_trough_has_no_swing() {
        let mut values = seasonal(24);
        values[0] = 0.0;
        values[12] = 0.0;
        let patterns = monthly_patterns(&sp_series(&values), &Exclusions::default());
        assert_eq!(peaks_and_troughs(&patterns).2, None);
    }

    #[test]
    fn holdout_reports_accuracy() {
        let run = sp_series(&seasonal(48));
        let metric = holdout_forecast(&run, &SeasonalityConfig::default()).unwrap();
        assert_eq!(metric.train_months, 36);
        assert_eq!(metric.test_months, 12);
        assert!(metric.mape.unwrap() < 10.0);
        assert!(metric.rmse >= metric.mae);
        assert_eq!(metric.next_forecast.split(';').count(), 3);
    }

    #[test]
    fn zero_actual_leaves_mape_empty() {
        let mut values = seasonal(36);
        values[30] = 0.0;
        let metric = holdout_forecast(&sp_series(&values), &SeasonalityConfig::default()).unwrap();
        assert!(metric.mape.is_none());
        assert!(metric.mae > 0.0);
    }

    #[test]
    fn short_training_window_is_insufficient() {
        let err = holdout_forecast(&sp_series(&seasonal(30)), &SeasonalityConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn models_every_property_crime() {
        let homicides = seasonal(36);
        let mut obs = observations(State::Sp, ym(2019, 1), &homicides, 2);
        obs.extend(observations(State::Rj, ym(2019, 1), &homicides, 3));
        let out = model(&obs, &Exclusions::default(), &SeasonalityConfig::default()).unwrap();
        assert_eq!(out.strength.len(), 8);
        assert_eq!(out.forecasts.len(), 8);
        assert_eq!(out.patterns.len(), 8 * 12);
        assert!(out.strength.iter().all(|s| s.crime_type != CrimeType::Homicide));
        assert!(
            out.strength
                .iter()
                .all(|s| (0.0..=1.0).contains(&s.seasonal_strength))
        );
        for state in State::all() {
            let rows: Vec<_> = out.cross_correlation.iter().filter(|c| c.state == *state).collect();
            assert_eq!(rows.len(), 25);
            assert_eq!(rows.iter().filter(|c| c.best).count(), 1);
        }
    }
}
