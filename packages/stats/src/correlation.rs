//! Pearson and lagged cross-correlation.

use crate::descriptive::mean;

/// Pearson correlation of paired samples. `None` when fewer than two pairs
/// remain or either side is constant.
#[must_use]
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Correlation of `x[t]` with `y[t - lag]` over the overlapping range.
///
/// A positive lag compares `x` with earlier values of `y`.
#[must_use]
pub fn lagged_correlation(x: &[f64], y: &[f64], lag: isize) -> Option<f64> {
    let n = x.len().min(y.len());
    let shift = lag.unsigned_abs();
    if shift >= n {
        return None;
    }
    if lag >= 0 {
        pearson(&x[shift..n], &y[..n - shift])
    } else {
        pearson(&x[..n - shift], &y[shift..n])
    }
}

/// Cross-correlation for every lag in `-max_lag..=max_lag`, as
/// `(lag, correlation)` pairs. Lags with an undefined correlation are
/// omitted.
#[must_use]
pub fn cross_correlation(x: &[f64], y: &[f64], max_lag: usize) -> Vec<(isize, f64)> {
    let max_lag = isize::try_from(max_lag).unwrap_or(isize::MAX);
    (-max_lag..=max_lag)
        .filter_map(|lag| lagged_correlation(x, y, lag).map(|r| (lag, r)))
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn perfectly_correlated() {
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap(), 1.0);
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap(), -1.0);
        assert!(pearson(&[1.0, 1.0], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn lag_recovers_shift() {
        let y: Vec<f64> = (0..40).map(|i| (f64::from(i) * 0.7).sin()).collect();
        // x[t] = y[t - 2]
        let x: Vec<f64> = (0..40).map(|i| (f64::from(i - 2) * 0.7).sin()).collect();
        let ccf = cross_correlation(&x, &y, 6);
        let best = ccf
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap();
        assert_eq!(best.0, 2);
        assert_relative_eq!(best.1, 1.0, epsilon = 1e-12);
        assert_eq!(ccf.len(), 13);
    }
}
