//! Additive Holt-Winters exponential smoothing.
//!
//! Smoothing parameters are chosen by an exhaustive grid search on the
//! in-sample one-step-ahead squared error, so fits are reproducible.

use crate::distribution::normal_quantile;
use crate::{Result, StatsError};

const ALPHA_GRID: [f64; 10] = [0.05, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.95];
const BETA_GRID: [f64; 6] = [0.0, 0.01, 0.05, 0.1, 0.2, 0.3];
const GAMMA_GRID: [f64; 8] = [0.05, 0.1, 0.2, 0.3, 0.4, 0.5, 0.7, 0.9];

/// Smoothing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// A fitted additive Holt-Winters model.
#[derive(Debug, Clone)]
pub struct HoltWinters {
    period: usize,
    params: Smoothing,
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
    n: usize,
    fitted: Vec<f64>,
    residual_variance: f64,
}

struct Pass {
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
    sse: f64,
    fitted: Vec<f64>,
}

#[allow(clippy::cast_precision_loss)]
fn initial_state(values: &[f64], period: usize) -> (f64, f64, Vec<f64>) {
    let p = period as f64;
    let level = values[..period].iter().sum::<f64>() / p;
    let trend = (0..period)
        .map(|i| (values[period + i] - values[i]) / p)
        .sum::<f64>()
        / p;
    let mut seasonals: Vec<f64> = values[..period].iter().map(|y| y - level).collect();
    let shift = seasonals.iter().sum::<f64>() / p;
    for s in &mut seasonals {
        *s -= shift;
    }
    (level, trend, seasonals)
}

fn run(values: &[f64], period: usize, params: Smoothing) -> Pass {
    let Smoothing { alpha, beta, gamma } = params;
    let (mut level, mut trend, mut seasonals) = initial_state(values, period);
    let mut sse = 0.0;
    let mut fitted = Vec::with_capacity(values.len() - period);

    for (t, &y) in values.iter().enumerate().skip(period) {
        let idx = t % period;
        let s = seasonals[idx];
        let forecast = level + trend + s;
        fitted.push(forecast);
        sse += (y - forecast).powi(2);

        let prev_level = level;
        level = alpha * (y - s) + (1.0 - alpha) * (prev_level + trend);
        trend = beta * (level - prev_level) + (1.0 - beta) * trend;
        seasonals[idx] = gamma * (y - level) + (1.0 - gamma) * s;
    }

    Pass {
        level,
        trend,
        seasonals,
        sse,
        fitted,
    }
}

impl HoltWinters {
    /// Fits the model with grid-searched smoothing parameters.
    ///
    /// # Errors
    ///
    /// * [`StatsError::InsufficientData`] if `values` spans fewer than two
    ///   full periods.
    /// * [`StatsError::DegenerateInput`] if `period < 2` or a value is not
    ///   finite.
    pub fn fit(values: &[f64], period: usize) -> Result<Self> {
        if period < 2 {
            return Err(StatsError::DegenerateInput(format!(
                "seasonal period must be at least 2, got {period}"
            )));
        }
        if values.len() < 2 * period {
            return Err(StatsError::InsufficientData {
                needed: 2 * period,
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(StatsError::DegenerateInput(
                "series contains non-finite values".to_string(),
            ));
        }

        let mut best: Option<(f64, Smoothing)> = None;
        for &alpha in &ALPHA_GRID {
            for &beta in &BETA_GRID {
                for &gamma in &GAMMA_GRID {
                    let params = Smoothing { alpha, beta, gamma };
                    let sse = run(values, period, params).sse;
                    if best.is_none_or(|(b, _)| sse < b) {
                        best = Some((sse, params));
                    }
                }
            }
        }
        let params = best.map_or(
            Smoothing {
                alpha: 0.3,
                beta: 0.1,
                gamma: 0.1,
            },
            |(_, p)| p,
        );
        log::debug!(
            "holt-winters grid search picked alpha={} beta={} gamma={}",
            params.alpha,
            params.beta,
            params.gamma
        );

        Ok(Self::with_params(values, period, params))
    }

    /// Fits the model with fixed smoothing parameters. `values` must span at
    /// least two periods.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    fn with_params(values: &[f64], period: usize, params: Smoothing) -> Self {
        let pass = run(values, period, params);
        let residual_variance = if pass.fitted.is_empty() {
            0.0
        } else {
            pass.sse / pass.fitted.len() as f64
        };
        Self {
            period,
            params,
            level: pass.level,
            trend: pass.trend,
            seasonals: pass.seasonals,
            n: values.len(),
            fitted: pass.fitted,
            residual_variance,
        }
    }

    /// Selected smoothing parameters.
    #[must_use]
    pub const fn params(&self) -> Smoothing {
        self.params
    }

    /// One-step-ahead in-sample forecasts from the second period onward.
    #[must_use]
    pub fn fitted(&self) -> &[f64] {
        &self.fitted
    }

    /// Point forecasts for the next `horizon` periods.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        (1..=horizon)
            .map(|h| {
                let s = self.seasonals[(self.n + h - 1) % self.period];
                self.level + h as f64 * self.trend + s
            })
            .collect()
    }

    /// Point forecasts with symmetric `level` prediction intervals, as
    /// `(forecast, lower, upper)` triples.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn forecast_with_intervals(&self, horizon: usize, level: f64) -> Vec<(f64, f64, f64)> {
        let z = normal_quantile((1.0 + level) / 2.0);
        self.forecast(horizon)
            .into_iter()
            .enumerate()
            .map(|(i, f)| {
                let k = (i / self.period + 1) as f64;
                let se = (self.residual_variance * k).sqrt();
                (f, f - z * se, f + z * se)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn seasonal(months: usize) -> Vec<f64> {
        (0..months)
            .map(|i| {
                let phase = (i % 12) as f64 / 12.0 * std::f64::consts::TAU;
                200.0 + 0.5 * i as f64 + 30.0 * phase.sin()
            })
            .collect()
    }

    #[test]
    fn forecasts_clean_seasonal_series() {
        let series = seasonal(60);
        let (train, test) = series.split_at(48);
        let model = HoltWinters::fit(train, 12).unwrap();
        let forecast = model.forecast(12);
        for (f, a) in forecast.iter().zip(test) {
            assert_relative_eq!(*f, *a, max_relative = 0.05);
        }
    }

    #[test]
    fn intervals_bracket_point_forecast() {
        let model = HoltWinters::fit(&seasonal(36), 12).unwrap();
        for (f, lo, hi) in model.forecast_with_intervals(6, 0.95) {
            assert!(lo <= f && f <= hi);
        }
        assert_eq!(model.fitted().len(), 24);
    }

    #[test]
    fn short_training_window_is_rejected() {
        assert!(matches!(
            HoltWinters::fit(&seasonal(20), 12),
            Err(StatsError::InsufficientData { needed: 24, got: 20 })
        ));
    }
}
