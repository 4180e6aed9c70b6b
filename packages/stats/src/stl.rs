//! STL: seasonal-trend decomposition by LOESS (Cleveland et al., 1990).
//!
//! Cycle-subseries are smoothed with local-linear LOESS, the seasonal
//! estimate is high-passed through the `MA(p) -> MA(p) -> MA(3) -> LOESS`
//! low-pass filter, and the trend is a LOESS fit of the de-seasonalized
//! series. The robust variant reweights observations with bisquare weights
//! of the remainder so that outlying months do not bend the components.

use crate::decompose::Decomposition;
use crate::descriptive::median;
use crate::{Result, StatsError};

/// STL configuration.
#[derive(Debug, Clone)]
pub struct Stl {
    period: usize,
    seasonal_span: usize,
    trend_span: usize,
    low_pass_span: usize,
    inner_iterations: usize,
    outer_iterations: usize,
}

const fn next_odd(n: usize) -> usize {
    if n % 2 == 0 { n + 1 } else { n }
}

impl Stl {
    /// Creates a non-robust decomposer for the given period with the
    /// default spans: seasonal `period + 1` (odd), trend the smallest odd
    /// integer `>= 1.5 p / (1 - 1.5 / ns)` and low-pass the smallest odd
    /// integer `>= p`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn new(period: usize) -> Self {
        let seasonal_span = next_odd(period.max(3));
        let trend = (1.5 * period as f64 / (1.0 - 1.5 / seasonal_span as f64)).ceil() as usize;
        Self {
            period,
            seasonal_span,
            trend_span: next_odd(trend.max(3)),
            low_pass_span: next_odd(period.max(3)),
            inner_iterations: 2,
            outer_iterations: 0,
        }
    }

    /// Sets the seasonal LOESS span (forced odd, at least 3).
    #[must_use]
    pub const fn with_seasonal_span(mut self, span: usize) -> Self {
        self.seasonal_span = next_odd(if span < 3 { 3 } else { span });
        self
    }

    /// Sets the trend LOESS span (forced odd, at least 3).
    #[must_use]
    pub const fn with_trend_span(mut self, span: usize) -> Self {
        self.trend_span = next_odd(if span < 3 { 3 } else { span });
        self
    }

    /// Sets the number of inner-loop passes.
    #[must_use]
    pub const fn with_inner_iterations(mut self, n: usize) -> Self {
        self.inner_iterations = n;
        self
    }

    /// Enables robustness weighting with `n` outer iterations.
    #[must_use]
    pub const fn with_outer_iterations(mut self, n: usize) -> Self {
        self.outer_iterations = n;
        self
    }

    /// Robust fitting with 15 outer iterations.
    #[must_use]
    pub const fn robust(self) -> Self {
        self.with_outer_iterations(15)
    }

    /// Decomposes `series`.
    ///
    /// # Errors
    ///
    /// * [`StatsError::InsufficientData`] if the series spans fewer than two
    ///   full periods.
    /// * [`StatsError::DegenerateInput`] if the period is below 2 or the
    ///   series contains non-finite values.
    pub fn decompose(&self, series: &[f64]) -> Result<Decomposition> {
        let n = series.len();
        if self.period < 2 {
            return Err(StatsError::DegenerateInput(format!(
                "seasonal period must be at least 2, got {}",
                self.period
            )));
        }
        if n < 2 * self.period {
            return Err(StatsError::InsufficientData {
                needed: 2 * self.period,
                got: n,
            });
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(StatsError::DegenerateInput(
                "series contains non-finite values".to_string(),
            ));
        }

        let mut seasonal = vec![0.0; n];
        let mut trend = vec![0.0; n];
        let mut weights = vec![1.0; n];

        for outer in 0..=self.outer_iterations {
            for _ in 0..self.inner_iterations.max(1) {
                let detrended: Vec<f64> =
                    series.iter().zip(&trend).map(|(y, t)| y - t).collect();

                let cycle = self.smooth_cycle_subseries(&detrended, &weights);
                let low_pass = self.low_pass(&cycle);
                for i in 0..n {
                    seasonal[i] = cycle[i] - low_pass[i];
                }

                let deseasonalized: Vec<f64> =
                    series.iter().zip(&seasonal).map(|(y, s)| y - s).collect();
                trend = loess(&deseasonalized, self.trend_span, &weights);
            }

            if outer < self.outer_iterations {
                let remainder: Vec<f64> = (0..n).map(|i| series[i] - seasonal[i] - trend[i]).collect();
                weights = robustness_weights(&remainder);
            }
        }

        let remainder = (0..n).map(|i| series[i] - seasonal[i] - trend[i]).collect();

        Ok(Decomposition {
            trend,
            seasonal,
            remainder,
        })
    }

    fn smooth_cycle_subseries(&self, detrended: &[f64], weights: &[f64]) -> Vec<f64> {
        let mut result = vec![0.0; detrended.len()];
        for pos in 0..self.period {
            let indices: Vec<usize> = (pos..detrended.len()).step_by(self.period).collect();
            let values: Vec<f64> = indices.iter().map(|&i| detrended[i]).collect();
            let w: Vec<f64> = indices.iter().map(|&i| weights[i]).collect();
            let smoothed = loess(&values, self.seasonal_span, &w);
            for (&i, v) in indices.iter().zip(smoothed) {
                result[i] = v;
            }
        }
        result
    }

    fn low_pass(&self, series: &[f64]) -> Vec<f64> {
        let ma = moving_average(series, self.period);
        let ma = moving_average(&ma, self.period);
        let ma = moving_average(&ma, 3);
        loess(&ma, self.low_pass_span, &vec![1.0; series.len()])
    }
}

impl Default for Stl {
    fn default() -> Self {
        Self::new(12)
    }
}

/// Length-preserving centered moving average; windows shrink at the edges.
#[allow(clippy::cast_precision_loss)]
fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
    let n = series.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(n);
            series[start..end].iter().sum::<f64>() / (end - start) as f64
        })
        .collect()
}

/// Local-linear LOESS evaluated at every index of `values`.
///
/// Each fit uses the `span` nearest points with tricube distance weights
/// multiplied by the caller's robustness `weights`.
#[allow(clippy::cast_precision_loss)]
fn loess(values: &[f64], span: usize, weights: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let q = span.min(n);

    (0..n)
        .map(|i| {
            let start = i.saturating_sub((q - 1) / 2).min(n - q);
            let end = start + q;
            let mut h = (i - start).max(end - 1 - i) as f64;
            if span > n {
                h += ((span - n) / 2) as f64;
            }
            let h = h.max(1.0);

            let mut sw = 0.0;
            let mut sx = 0.0;
            let mut sy = 0.0;
            let local: Vec<(f64, f64, f64)> = (start..end)
                .filter_map(|j| {
                    let d = (j as f64 - i as f64).abs() / h;
                    let tricube = if d < 0.999 { (1.0 - d.powi(3)).powi(3) } else { 0.0 };
                    let w = tricube * weights[j];
                    (w > 0.0).then_some((j as f64, values[j], w))
                })
                .collect();
            for &(x, y, w) in &local {
                sw += w;
                sx += w * x;
                sy += w * y;
            }
            if sw <= 0.0 {
                return values[i];
            }
            let mx = sx / sw;
            let my = sy / sw;
            let (sxx, sxy) = local.iter().fold((0.0, 0.0), |(sxx, sxy), &(x, y, w)| {
                (sxx + w * (x - mx).powi(2), sxy + w * (x - mx) * (y - my))
            });
            if sxx > 1e-12 {
                my + sxy / sxx * (i as f64 - mx)
            } else {
                my
            }
        })
        .collect()
}

fn robustness_weights(remainder: &[f64]) -> Vec<f64> {
    let abs: Vec<f64> = remainder.iter().map(|r| r.abs()).collect();
    let h = 6.0 * median(&abs);
    remainder
        .iter()
        .map(|r| {
            if h < 1e-10 {
                return 1.0;
            }
            let u = r.abs() / h;
            if u < 1.0 { (1.0 - u * u).powi(2) } else { 0.0 }
        })
        .collect()
}
