//! Rank-based two-sample comparison (Mann-Whitney U).

use crate::distribution::normal_two_sided_p;
use crate::{Result, StatsError};

/// Outcome of a two-sided Mann-Whitney U test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MannWhitney {
    /// U statistic of the first sample.
    pub u: f64,
    /// Tie- and continuity-corrected normal statistic. Positive when the
    /// first sample tends to be larger.
    pub z: f64,
    pub p_value: f64,
    /// Rank-biserial style effect size `|z| / sqrt(N)`.
    pub effect_size: f64,
}

/// Mid-ranks (1-based) of `values`. Tied values share the average of the
/// ranks they span.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mid_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Positions i..=j share rank ((i+1) + (j+1)) / 2
        let rank = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Sum over tie groups of `t^3 - t`.
#[allow(clippy::cast_precision_loss)]
fn tie_term(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut total = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j + 1 < sorted.len() && sorted[j + 1] == sorted[i] {
            j += 1;
        }
        let t = (j - i + 1) as f64;
        total += t.powi(3) - t;
        i = j + 1;
    }
    total
}

/// Two-sided Mann-Whitney U test using the normal approximation.
///
/// # Errors
///
/// Returns [`StatsError::InsufficientData`] if either sample is empty.
#[allow(clippy::cast_precision_loss)]
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> Result<MannWhitney> {
    if a.is_empty() || b.is_empty() {
        return Err(StatsError::InsufficientData {
            needed: 1,
            got: a.len().min(b.len()),
        });
    }

    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    let n = n1 + n2;

    let pooled: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
    let ranks = mid_ranks(&pooled);
    let rank_sum_a: f64 = ranks[..a.len()].iter().sum();

    let u = rank_sum_a - n1 * (n1 + 1.0) / 2.0;
    let mu = n1 * n2 / 2.0;
    let variance = n1 * n2 / 12.0 * ((n + 1.0) - tie_term(&pooled) / (n * (n - 1.0)));

    if variance <= 0.0 {
        // Every value tied: the samples are indistinguishable.
        return Ok(MannWhitney {
            u,
            z: 0.0,
            p_value: 1.0,
            effect_size: 0.0,
        });
    }

    let diff = u - mu;
    let z = diff.signum() * (diff.abs() - 0.5).max(0.0) / variance.sqrt();

    Ok(MannWhitney {
        u,
        z,
        p_value: normal_two_sided_p(z),
        effect_size: z.abs() / n.sqrt(),
    })
}
