//! Additive seasonal decomposition and the strength measures shared with
//! [`crate::stl`].

use crate::descriptive::{mean, population_std, population_variance};
use crate::{Result, StatsError};

/// Additive decomposition `series = trend + seasonal + remainder`.
///
/// Classical decomposition leaves the trend undefined at the edges; those
/// positions hold `NaN` in `trend` and `remainder` and are skipped by the
/// strength measures.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub remainder: Vec<f64>,
}

impl Decomposition {
    /// `max(0, 1 - Var(R) / Var(S + R))`, in `[0, 1]`.
    ///
    /// Zero when the de-trended series has no variance.
    #[must_use]
    pub fn seasonal_strength(&self) -> f64 {
        strength(&self.seasonal, &self.remainder)
    }

    /// `max(0, 1 - Var(R) / Var(T + R))`, in `[0, 1]`.
    #[must_use]
    pub fn trend_strength(&self) -> f64 {
        strength(&self.trend, &self.remainder)
    }

    /// Standard deviation of the seasonal component as a percentage of the
    /// standard deviation of `series` (population deviations). `None` for a
    /// constant series.
    #[must_use]
    pub fn seasonal_amplitude_pct(&self, series: &[f64]) -> Option<f64> {
        let total = population_std(series);
        if !total.is_finite() || total <= 0.0 {
            return None;
        }
        Some(population_std(&self.seasonal) / total * 100.0)
    }
}

fn strength(component: &[f64], remainder: &[f64]) -> f64 {
    let (combined, rest): (Vec<f64>, Vec<f64>) = component
        .iter()
        .zip(remainder)
        .filter(|(c, r)| c.is_finite() && r.is_finite())
        .map(|(c, r)| (c + r, *r))
        .unzip();
    let var_combined = population_variance(&combined);
    if !var_combined.is_finite() || var_combined < 1e-10 {
        return 0.0;
    }
    (1.0 - population_variance(&rest) / var_combined).clamp(0.0, 1.0)
}

/// Centered moving average of even `period` (the `2 x period` filter).
/// Positions without a full window are `NaN`.
#[allow(clippy::cast_precision_loss)]
fn centered_moving_average(series: &[f64], period: usize) -> Vec<f64> {
    let n = series.len();
    let half = period / 2;
    let mut out = vec![f64::NAN; n];
    if n < period + 1 {
        return out;
    }
    for (i, slot) in out.iter_mut().enumerate().take(n - half).skip(half) {
        let window = &series[i - half..=i + half];
        let value = if period % 2 == 0 {
            let inner: f64 = window[1..window.len() - 1].iter().sum();
            (inner + 0.5 * (window[0] + window[window.len() - 1])) / period as f64
        } else {
            window.iter().sum::<f64>() / period as f64
        };
        *slot = value;
    }
    out
}

/// Classical additive decomposition with a centered moving-average trend.
///
/// # Errors
///
/// * [`StatsError::InsufficientData`] if the series spans fewer than two
///   full periods.
/// * [`StatsError::DegenerateInput`] if `period < 2`.
pub fn classical_additive(series: &[f64], period: usize) -> Result<Decomposition> {
    if period < 2 {
        return Err(StatsError::DegenerateInput(format!(
            "seasonal period must be at least 2, got {period}"
        )));
    }
    if series.len() < 2 * period {
        return Err(StatsError::InsufficientData {
            needed: 2 * period,
            got: series.len(),
        });
    }

    let trend = centered_moving_average(series, period);
    let detrended: Vec<f64> = series.iter().zip(&trend).map(|(y, t)| y - t).collect();

    let mut averages: Vec<f64> = (0..period)
        .map(|pos| {
            let values: Vec<f64> = detrended
                .iter()
                .skip(pos)
                .step_by(period)
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            mean(&values)
        })
        .collect();
    let centre = mean(&averages);
    for a in &mut averages {
        *a -= centre;
    }

    let seasonal: Vec<f64> = (0..series.len()).map(|i| averages[i % period]).collect();
    let remainder: Vec<f64> = series
        .iter()
        .zip(&trend)
        .zip(&seasonal)
        .map(|((y, t), s)| y - t - s)
        .collect();

    Ok(Decomposition {
        trend,
        seasonal,
        remainder,
    })
}
