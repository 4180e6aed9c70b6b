//! Forecast ensemble: lag/calendar features, a random forest and gradient
//! boosting blended into one predictor, validated with forward-chaining
//! folds.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use crime_stats_analytics_models::{
    FeatureImportance, ForecastMetric, ForecastPrediction, ForecastRecord, ModelKind,
};
use crime_stats_crime_models::{CrimeType, Observation, State, YearMonth};
use crime_stats_ml::boosting::{BoostingParams, GradientBoosting};
use crime_stats_ml::forest::{ForestParams, RandomForest};
use crime_stats_ml::split::{Fold, forward_chaining};
use crime_stats_ml::tree::normalize;
use crime_stats_stats::descriptive::{mean, std_dev};
use crime_stats_stats::distribution::normal_quantile;
use crime_stats_stats::metrics::{mae, r_squared};
use rayon::prelude::*;
use sha2::{Digest as _, Sha256};

use crate::config::ForecastConfig;
use crate::series::{Exclusions, StateSeries, build_state_series};
use crate::{AnalysisError, Result};

/// Target lags used as features. The largest one sets how many leading
/// months only serve as history.
pub const TARGET_LAGS: [usize; 4] = [1, 3, 6, 12];
const MAX_LAG: usize = 12;
const ROLLING_MEANS: [usize; 3] = [3, 6, 12];
const ROLLING_STD: usize = 6;

/// Prefix of every model version string.
pub const MODEL_FAMILY: &str = "ensemble-v1";

/// Feature names, in column order.
#[must_use]
pub fn feature_names(target: CrimeType) -> Vec<String> {
    let mut names: Vec<String> = ["month", "quarter", "year", "month_sin", "month_cos", "trend"]
        .iter()
        .map(ToString::to_string)
        .collect();
    names.extend(TARGET_LAGS.iter().map(|l| format!("lag_{l}")));
    names.extend(ROLLING_MEANS.iter().map(|w| format!("rolling_mean_{w}")));
    names.push(format!("rolling_std_{ROLLING_STD}"));
    names.extend(
        CrimeType::all()
            .iter()
            .filter(|&&c| c != target)
            .map(|c| format!("{c}_lag_1")),
    );
    names
}

/// Feature matrix of one state.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    /// Month of each row.
    pub periods: Vec<YearMonth>,
    /// Features of the month after the last observation.
    pub next_row: Vec<f64>,
    pub next_period: YearMonth,
}

/// Features for month `t` of `target`, using only months before `t`.
#[allow(clippy::cast_precision_loss)]
fn feature_row(target: &[f64], others: &[&[f64]], period: YearMonth, t: usize) -> Vec<f64> {
    let month = f64::from(period.month);
    let angle = 2.0 * PI * month / 12.0;
    let mut row = vec![
        month,
        f64::from(period.quarter()),
        f64::from(period.year),
        angle.sin(),
        angle.cos(),
        t as f64,
    ];
    row.extend(TARGET_LAGS.iter().map(|&l| target[t - l]));
    row.extend(ROLLING_MEANS.iter().map(|&w| mean(&target[t - w..t])));
    row.push(std_dev(&target[t - ROLLING_STD..t]));
    row.extend(others.iter().map(|o| o[t - 1]));
    row
}

/// Forward-chaining folds over the rows of `data`. The per-fold test
/// window shrinks when the history cannot hold `folds` full windows.
fn validation_folds(
    state: State,
    target: &StateSeries,
    data: &Dataset,
    config: &ForecastConfig,
) -> Result<Vec<Fold>> {
    let n_rows = data.rows.len();
    let n_folds = config.folds.max(1);
    let test_months = config
        .test_months
        .min(n_rows.saturating_sub(config.min_train_rows) / n_folds);
    if test_months == 0 {
        return Err(AnalysisError::InsufficientHistory {
            state,
            needed: MAX_LAG + config.min_train_rows + n_folds,
            got: target.len(),
        });
    }
    if test_months < config.test_months {
        log::warn!(
            "{}: shortening the validation window to {test_months} month(s) per fold",
            target.label()
        );
    }
    forward_chaining(n_rows, n_folds, test_months, config.min_train_rows)
        .map_err(|e| AnalysisError::ml(target.label(), e))
}

/// Builds the feature matrix from aligned series of every crime type.
/// Rows start at the first month with a full year of history.
#[must_use]
pub fn build_dataset(target: &StateSeries, others: &[&StateSeries]) -> Dataset {
    let other_values: Vec<&[f64]> = others.iter().map(|s| s.values.as_slice()).collect();
    let n = target.len();
    let mut rows = Vec::new();
    let mut targets = Vec::new();
    let mut periods = Vec::new();
    for t in MAX_LAG..n {
        let period = target.period(t);
        rows.push(feature_row(&target.values, &other_values, period, t));
        targets.push(target.values[t]);
        periods.push(period);
    }
    let next_period = target.period(n);
    let next_row = if n >= MAX_LAG {
        feature_row(&target.values, &other_values, next_period, n)
    } else {
        Vec::new()
    };
    Dataset {
        names: feature_names(target.crime_type),
        rows,
        targets,
        periods,
        next_row,
        next_period,
    }
}

/// `ensemble-v1-<first 12 hex chars of SHA-256(training input)>`.
#[must_use]
pub fn model_version(target: &StateSeries, others: &[&StateSeries]) -> String {
    let mut hasher = Sha256::new();
    for s in std::iter::once(target).chain(others.iter().copied()) {
        hasher.update(format!("{}|{}|{}|", s.state, s.crime_type, s.start));
        for v in &s.values {
            hasher.update(format!("{v},"));
        }
        hasher.update(b"\n");
    }
    let digest = hex::encode(hasher.finalize());
    format!("{MODEL_FAMILY}-{}", &digest[..12])
}

/// Results of one state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateForecast {
    pub predictions: Vec<ForecastPrediction>,
    pub metrics: Vec<ForecastMetric>,
    pub importance: Vec<FeatureImportance>,
    pub record: ForecastRecord,
}

/// Tables produced by the forecast ensemble.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastOutput {
    pub predictions: Vec<ForecastPrediction>,
    pub metrics: Vec<ForecastMetric>,
    pub importance: Vec<FeatureImportance>,
    pub records: Vec<ForecastRecord>,
}

struct Models {
    forest: RandomForest,
    boosting: GradientBoosting,
}

impl Models {
    fn fit(x: &[Vec<f64>], y: &[f64], config: &ForecastConfig, context: &str) -> Result<Self> {
        let forest = RandomForest::fit(
            x,
            y,
            &ForestParams {
                n_trees: config.n_trees,
                seed: config.seed,
                ..ForestParams::default()
            },
        )
        .map_err(|e| AnalysisError::ml(context, e))?;
        let boosting = GradientBoosting::fit(
            x,
            y,
            &BoostingParams {
                n_stages: config.n_stages,
                learning_rate: config.learning_rate,
                ..BoostingParams::default()
            },
        )
        .map_err(|e| AnalysisError::ml(context, e))?;
        Ok(Self { forest, boosting })
    }

    fn blend(&self, row: &[f64], forest_weight: f64) -> (f64, f64, f64) {
        let rf = self.forest.predict_row(row);
        let gb = self.boosting.predict_row(row);
        (rf, gb, forest_weight * rf + (1.0 - forest_weight) * gb)
    }
}

fn finite_mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    mean(&finite)
}

/// Trains, validates and forecasts one state.
///
/// # Errors
///
/// * [`AnalysisError::InsufficientHistory`] if the unflagged run of the
///   target is shorter than `min_history` months or leaves no room for
///   the validation folds.
/// * [`AnalysisError::DegenerateInput`] if the fitted models carry no
///   feature importance at all.
#[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
pub fn forecast_state(
    state: State,
    series: &BTreeMap<(State, CrimeType), StateSeries>,
    exclusions: &Exclusions,
    config: &ForecastConfig,
) -> Result<StateForecast> {
    let needed = config.min_history.max(MAX_LAG + 1);
    let Some(full) = series.get(&(state, config.target)) else {
        return Err(AnalysisError::InsufficientHistory {
            state,
            needed,
            got: 0,
        });
    };
    let excluded = exclusions.for_state(state);
    let target = full.longest_clean_run(excluded);
    if target.len() < needed {
        return Err(AnalysisError::InsufficientHistory {
            state,
            needed,
            got: target.len(),
        });
    }

    let others: Vec<StateSeries> = CrimeType::all()
        .iter()
        .filter(|&&c| c != config.target)
        .filter_map(|&c| series.get(&(state, c)))
        .map(|s| s.longest_clean_run(excluded))
        .collect();
    let other_refs: Vec<&StateSeries> = others.iter().collect();
    let data = build_dataset(&target, &other_refs);
    let context = target.label();

    let folds = validation_folds(state, &target, &data, config)?;

    let mut predictions = Vec::new();
    let mut residuals = Vec::new();
    let mut scores: BTreeMap<ModelKind, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for (i, fold) in folds.iter().enumerate() {
        let models = Models::fit(
            &data.rows[fold.train.clone()],
            &data.targets[fold.train.clone()],
            config,
            &context,
        )?;
        let actual = &data.targets[fold.test.clone()];
        let mut by_model: BTreeMap<ModelKind, Vec<f64>> = BTreeMap::new();
        for t in fold.test.clone() {
            let (rf, gb, ens) = models.blend(&data.rows[t], config.forest_weight);
            by_model.entry(ModelKind::RandomForest).or_default().push(rf);
            by_model.entry(ModelKind::GradientBoosting).or_default().push(gb);
            by_model.entry(ModelKind::Ensemble).or_default().push(ens);
            residuals.push(data.targets[t] - ens);
            predictions.push(ForecastPrediction {
                state,
                fold: i + 1,
                year: data.periods[t].year,
                month: data.periods[t].month,
                actual: data.targets[t],
                random_forest: rf,
                gradient_boosting: gb,
                ensemble: ens,
            });
        }
        for (kind, predicted) in by_model {
            let entry = scores.entry(kind).or_default();
            entry.0.push(r_squared(actual, &predicted));
            entry.1.push(mae(actual, &predicted));
        }
    }

    let metrics: Vec<ForecastMetric> = ModelKind::all()
        .iter()
        .map(|&model| {
            let (r2, errors) = scores.get(&model).cloned().unwrap_or_default();
            ForecastMetric {
                state,
                model,
                mean_r_squared: finite_mean(&r2),
                mean_mae: mean(&errors),
                folds: folds.len(),
            }
        })
        .collect();

    let models = Models::fit(&data.rows, &data.targets, config, &context)?;
    let w = config.forest_weight;
    let combined: Vec<f64> = models
        .forest
        .feature_importances()
        .iter()
        .zip(models.boosting.feature_importances())
        .map(|(rf, gb)| w * rf + (1.0 - w) * gb)
        .collect();
    if combined.iter().sum::<f64>() <= 0.0 {
        return Err(AnalysisError::DegenerateInput {
            context,
            message: "no feature carries any importance".to_string(),
        });
    }
    let weights = normalize(&combined);
    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| weights[b].total_cmp(&weights[a]).then(a.cmp(&b)));
    let importance = order
        .iter()
        .enumerate()
        .map(|(rank, &j)| FeatureImportance {
            state,
            rank: rank + 1,
            feature: data.names[j].clone(),
            weight: weights[j],
        })
        .collect();

    let (_, _, predicted) = models.blend(&data.next_row, w);
    let spread = if residuals.len() > 1 { std_dev(&residuals) } else { 0.0 };
    let margin = normal_quantile(0.975) * spread;
    let record = ForecastRecord {
        state,
        crime_type: config.target,
        target_year: data.next_period.year,
        target_month: data.next_period.month,
        predicted,
        lower: predicted - margin,
        upper: predicted + margin,
        model_version: model_version(&target, &other_refs),
    };

    if let Some(ens) = metrics.iter().find(|m| m.model == ModelKind::Ensemble) {
        log::info!(
            "{context}: ensemble R² {:.3}, MAE {:.2} over {} fold(s); {} forecast {:.1} [{:.1}, {:.1}]",
            ens.mean_r_squared,
            ens.mean_mae,
            ens.folds,
            data.next_period,
            record.predicted,
            record.lower,
            record.upper
        );
    }

    Ok(StateForecast {
        predictions,
        metrics,
        importance,
        record,
    })
}

/// Runs the ensemble for every state, in parallel.
///
/// # Errors
///
/// Fails if any state fails; see [`forecast_state`].
pub fn forecast(
    observations: &[Observation],
    exclusions: &Exclusions,
    config: &ForecastConfig,
) -> Result<ForecastOutput> {
    let series = build_state_series(observations);
    let states: Vec<State> = State::all()
        .iter()
        .copied()
        .filter(|s| series.contains_key(&(*s, config.target)))
        .collect();

    let results: Vec<StateForecast> = states
        .par_iter()
        .map(|&state| forecast_state(state, &series, exclusions, config))
        .collect::<Result<_>>()?;

    let mut out = ForecastOutput::default();
    for r in results {
        out.predictions.extend(r.predictions);
        out.metrics.extend(r.metrics);
        out.importance.extend(r.importance);
        out.records.push(r.record);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::ErrorKind;
    use crate::fixtures::{observations, ym};

    fn quick() -> ForecastConfig {
        ForecastConfig {
            n_trees: 40,
            n_stages: 60,
            ..ForecastConfig::default()
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn homicides(months: usize) -> Vec<f64> {
        (0..months)
            .map(|i| {
                let season = 2.0 * PI * (i % 12) as f64 / 12.0;
                let wobble = ((i * 7919) % 13) as f64;
                200.0 + 40.0 * season.sin() + wobble - 0.8 * i as f64
            })
            .collect()
    }

    fn table(months: usize) -> Vec<Observation> {
        let mut obs = observations(State::Sp, ym(2018, 1), &homicides(months), 3);
        let rj: Vec<f64> = homicides(months).iter().map(|h| h * 0.6 + 10.0).collect();
        obs.extend(observations(State::Rj, ym(2018, 1), &rj, 2));
        obs
    }

    #[test]
    fn feature_layout() {
        let names = feature_names(CrimeType::Homicide);
        assert_eq!(names.len(), 18);
        assert_eq!(names[6], "lag_1");
        assert_eq!(names[13], "rolling_std_6");
        assert_eq!(names[14], "vehicle_robbery_lag_1");
        assert!(!names.contains(&"homicide_lag_1".to_string()));
    }

    #[test]
    fn features_only_look_back() {
        let target = StateSeries {
            state: State::Sp,
            crime_type: CrimeType::Homicide,
            start: ym(2020, 1),
            values: (0..15).map(f64::from).collect(),
        };
        let data = build_dataset(&target, &[]);
        assert_eq!(data.rows.len(), 3);
        assert_eq!(data.periods[0], ym(2021, 1));
        let first = &data.rows[0];
        assert_relative_eq!(first[0], 1.0);
        assert_relative_eq!(first[5], 12.0);
        // lags 1, 3, 6, 12 of t = 12
        assert_eq!(&first[6..10], &[11.0, 9.0, 6.0, 0.0]);
        // rolling mean over t-3..t
        assert_relative_eq!(first[10], 10.0);
        assert_eq!(data.next_period, ym(2021, 4));
        assert_relative_eq!(data.next_row[6], 14.0);
    }

    #[test]
    fn eighteen_months_is_insufficient_history() {
        let err = forecast(&table(18), &Exclusions::default(), &quick()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientHistory);
        assert!(err.to_string().contains("got 18"));
    }

    #[test]
    fn ensemble_validates_and_forecasts() {
        let out = forecast(&table(36), &Exclusions::default(), &quick()).unwrap();

        assert_eq!(out.records.len(), 2);
        let sp = &out.records[0];
        assert_eq!(sp.state, State::Sp);
        assert_eq!((sp.target_year, sp.target_month), (2021, 1));
        assert!(sp.lower <= sp.predicted && sp.predicted <= sp.upper);
        assert!(sp.model_version.starts_with("ensemble-v1-"));
        assert_eq!(sp.model_version.len(), "ensemble-v1-".len() + 12);

        for state in State::all() {
            let weights: f64 = out
                .importance
                .iter()
                .filter(|f| f.state == *state)
                .map(|f| f.weight)
                .sum();
            assert_relative_eq!(weights, 1.0, epsilon = 1e-6);
            assert_eq!(
                out.metrics.iter().filter(|m| m.state == *state).count(),
                ModelKind::all().len()
            );
        }

        // 36 months leave 24 feature rows: three folds of six test months.
        let sp_predictions: Vec<_> = out.predictions.iter().filter(|p| p.state == State::Sp).collect();
        assert_eq!(sp_predictions.len(), 18);
        assert_eq!((sp_predictions[0].year, sp_predictions[0].month), (2019, 7));
        for p in &sp_predictions {
            assert_relative_eq!(
                p.ensemble,
                0.6 * p.random_forest + 0.4 * p.gradient_boosting,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_months_always_follow_training_months() {
        let out = forecast(&table(40), &Exclusions::default(), &quick()).unwrap();
        let sp: Vec<_> = out.predictions.iter().filter(|p| p.state == State::Sp).collect();
        // Rows start at month 13 of the series; the first fold trains on
        // every row before its first test month.
        for fold in 1..=3 {
            let months: Vec<(i32, u8)> = sp
                .iter()
                .filter(|p| p.fold == fold)
                .map(|p| (p.year, p.month))
                .collect();
            let later: Vec<(i32, u8)> = sp
                .iter()
                .filter(|p| p.fold > fold)
                .map(|p| (p.year, p.month))
                .collect();
            assert!(months.iter().all(|m| later.iter().all(|l| l > m)));
        }
    }

    #[test]
    fn every_fold_trains_strictly_before_its_test_months() {
        let all = build_state_series(&table(40));
        let target = &all[&(State::Sp, CrimeType::Homicide)];
        let others: Vec<&StateSeries> = CrimeType::all()
            .iter()
            .filter(|&&c| c != CrimeType::Homicide)
            .map(|&c| &all[&(State::Sp, c)])
            .collect();
        let data = build_dataset(target, &others);

        let folds = validation_folds(State::Sp, target, &data, &quick()).unwrap();
        assert_eq!(folds.len(), 3);
        for fold in &folds {
            assert!(!fold.train.is_empty());
            assert!(!fold.test.is_empty());
            let last_train = data.periods[fold.train.end - 1];
            let first_test = data.periods[fold.test.start];
            assert!(last_train < first_test);
            assert!(
                fold.train
                    .clone()
                    .all(|i| fold.test.clone().all(|t| data.periods[i] < data.periods[t]))
            );
        }
    }

    #[test]
    fn short_history_shrinks_the_folds() {
        let out = forecast(&table(24), &Exclusions::default(), &quick()).unwrap();
        let sp: Vec<_> = out.predictions.iter().filter(|p| p.state == State::Sp).collect();
        assert_eq!(sp.len(), 6);
    }

    #[test]
    fn runs_are_reproducible() {
        let a = forecast(&table(30), &Exclusions::default(), &quick()).unwrap();
        let b = forecast(&table(30), &Exclusions::default(), &quick()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn constant_target_has_no_importance() {
        let flat = [
            observations(State::Sp, ym(2018, 1), &[50.0; 30], 1),
            observations(State::Rj, ym(2018, 1), &[50.0; 30], 1),
        ]
        .concat();
        let err = forecast(&flat, &Exclusions::default(), &quick()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateInput);
    }
}
