//! PELT (Pruned Exact Linear Time) change-point detection with an L2
//! (mean-shift) segment cost.

use crate::descriptive::{median_absolute_deviation, population_variance};

/// Consistency constant turning a MAD into a normal standard deviation.
const MAD_TO_SIGMA: f64 = 1.482_6;

/// PELT configuration.
#[derive(Debug, Clone)]
pub struct PeltConfig {
    /// Penalty added per segment.
    pub penalty: f64,
    /// Minimum number of observations per segment.
    pub min_segment_length: usize,
}

impl Default for PeltConfig {
    fn default() -> Self {
        Self {
            penalty: 1.0,
            min_segment_length: 3,
        }
    }
}

impl PeltConfig {
    /// BIC-style penalty scaled by a robust noise estimate of `series`:
    /// `2 * sigma^2 * ln(n)`.
    ///
    /// `sigma^2` is the larger of the MAD-estimated variance of first
    /// differences (halved, since differencing doubles noise variance),
    /// `1e-3` of the series variance, and 1.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn scaled_to(series: &[f64]) -> Self {
        let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
        let noise = if diffs.is_empty() {
            0.0
        } else {
            (MAD_TO_SIGMA * median_absolute_deviation(&diffs)).powi(2) / 2.0
        };
        let total = population_variance(series);
        let sigma2 = noise
            .max(if total.is_finite() { 1e-3 * total } else { 0.0 })
            .max(1.0);
        let n = series.len().max(2) as f64;
        Self {
            penalty: 2.0 * sigma2 * n.ln(),
            ..Self::default()
        }
    }

    /// Sets the penalty.
    #[must_use]
    pub const fn penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    /// Sets the minimum segment length (at least 1).
    #[must_use]
    pub fn min_segment_length(mut self, min_len: usize) -> Self {
        self.min_segment_length = min_len.max(1);
        self
    }
}

/// Result of a PELT search.
#[derive(Debug, Clone, PartialEq)]
pub struct PeltResult {
    /// Indices where a new segment starts, ascending.
    pub changepoints: Vec<usize>,
    /// Half-open `(start, end)` segments covering the series.
    pub segments: Vec<(usize, usize)>,
    /// Total segment cost excluding penalties.
    pub cost: f64,
}

impl PeltResult {
    /// Mean of each segment.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn segment_means(&self, series: &[f64]) -> Vec<f64> {
        self.segments
            .iter()
            .map(|&(start, end)| series[start..end].iter().sum::<f64>() / (end - start) as f64)
            .collect()
    }
}

struct CumulativeSums {
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl CumulativeSums {
    fn new(series: &[f64]) -> Self {
        let mut sum = Vec::with_capacity(series.len() + 1);
        let mut sum_sq = Vec::with_capacity(series.len() + 1);
        sum.push(0.0);
        sum_sq.push(0.0);
        for &x in series {
            sum.push(sum[sum.len() - 1] + x);
            sum_sq.push(sum_sq[sum_sq.len() - 1] + x * x);
        }
        Self { sum, sum_sq }
    }

    /// Sum of squared deviations from the segment mean of `series[s..t]`.
    #[allow(clippy::cast_precision_loss)]
    fn l2(&self, s: usize, t: usize) -> f64 {
        let len = (t - s) as f64;
        let sum = self.sum[t] - self.sum[s];
        let sum_sq = self.sum_sq[t] - self.sum_sq[s];
        (sum_sq - sum * sum / len).max(0.0)
    }
}

/// Detects change-points in `series`.
#[must_use]
pub fn pelt_detect(series: &[f64], config: &PeltConfig) -> PeltResult {
    let n = series.len();
    let min_len = config.min_segment_length.max(1);
    let sums = CumulativeSums::new(series);

    if n < 2 * min_len {
        return PeltResult {
            changepoints: Vec::new(),
            segments: if n == 0 { Vec::new() } else { vec![(0, n)] },
            cost: if n == 0 { 0.0 } else { sums.l2(0, n) },
        };
    }

    // f[t]: optimal penalized cost of series[0..t]
    let mut f = vec![f64::INFINITY; n + 1];
    f[0] = -config.penalty;
    let mut last = vec![0usize; n + 1];
    let mut candidates = vec![0usize];

    for t in min_len..=n {
        let mut best = f64::INFINITY;
        let mut best_s = 0;
        for &s in &candidates {
            if t - s >= min_len && f[s].is_finite() {
                let total = f[s] + sums.l2(s, t) + config.penalty;
                if total < best {
                    best = total;
                    best_s = s;
                }
            }
        }
        f[t] = best;
        last[t] = best_s;

        let ft = f[t];
        candidates.retain(|&s| t - s < min_len || f[s] + sums.l2(s, t) <= ft);
        candidates.push(t);
    }

    let mut changepoints = Vec::new();
    let mut t = n;
    while t > 0 {
        let s = last[t];
        if s > 0 {
            changepoints.push(s);
        }
        t = s;
    }
    changepoints.reverse();

    let mut bounds = vec![0];
    bounds.extend(&changepoints);
    bounds.push(n);
    let segments: Vec<(usize, usize)> = bounds.windows(2).map(|w| (w[0], w[1])).collect();
    let cost = segments.iter().map(|&(s, e)| sums.l2(s, e)).sum();

    PeltResult {
        changepoints,
        segments,
        cost,
    }
}
