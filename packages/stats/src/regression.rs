//! Ordinary least squares on a single regressor.

use crate::descriptive::mean;
use crate::distribution::student_t_two_sided_p;
use crate::{Result, StatsError};

/// Simple linear fit `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Two-sided p-value of `slope == 0`.
    pub p_value: f64,
    pub slope_std_err: f64,
}

/// Fits `y` against `x` by least squares.
///
/// # Errors
///
/// * [`StatsError::DimensionMismatch`] if the slices differ in length.
/// * [`StatsError::InsufficientData`] with fewer than three points.
/// * [`StatsError::DegenerateInput`] if `x` is constant.
#[allow(clippy::cast_precision_loss)]
pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    if x.len() != y.len() {
        return Err(StatsError::DimensionMismatch {
            expected: x.len(),
            got: y.len(),
        });
    }
    if x.len() < 3 {
        return Err(StatsError::InsufficientData {
            needed: 3,
            got: x.len(),
        });
    }

    let mx = mean(x);
    let my = mean(y);
    let sxx: f64 = x.iter().map(|v| (v - mx).powi(2)).sum();
    let syy: f64 = y.iter().map(|v| (v - my).powi(2)).sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();

    if sxx <= 0.0 {
        return Err(StatsError::DegenerateInput(
            "regressor has zero variance".to_string(),
        ));
    }

    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let df = (x.len() - 2) as f64;

    // Constant response: a perfect flat fit.
    if syy <= 0.0 {
        return Ok(LinearFit {
            slope,
            intercept,
            r_squared: 0.0,
            p_value: 1.0,
            slope_std_err: 0.0,
        });
    }

    let r_squared = (sxy * sxy / (sxx * syy)).clamp(0.0, 1.0);
    let sse = (syy - slope * sxy).max(0.0);
    let slope_std_err = (sse / df / sxx).sqrt();
    let p_value = if slope_std_err > 0.0 {
        student_t_two_sided_p(slope / slope_std_err, df)
    } else {
        0.0
    };

    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
        p_value,
        slope_std_err,
    })
}

/// Fits a series against its index `0..n`.
///
/// # Errors
///
/// See [`linear_regression`].
#[allow(clippy::cast_precision_loss)]
pub fn trend(values: &[f64]) -> Result<LinearFit> {
    let x: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    linear_regression(&x, values)
}

/// Annualized percentage change implied by a monthly trend:
/// `slope / mean * 12 * 100`. `None` when the mean is zero.
#[must_use]
pub fn annual_change_pct(fit: &LinearFit, series_mean: f64) -> Option<f64> {
    if series_mean.abs() < f64::EPSILON {
        return None;
    }
    Some(fit.slope / series_mean * 12.0 * 100.0)
}
