//! CART regression trees (variance reduction splits).

use rand::Rng;

use crate::{MlError, Result, matrix_width};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    pub max_depth: usize,
    /// A node with fewer samples than this becomes a leaf.
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` examines all of them.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

#[allow(clippy::cast_precision_loss)]
fn mean_of(y: &[f64], samples: &[usize]) -> f64 {
    samples.iter().map(|&i| y[i]).sum::<f64>() / samples.len() as f64
}

#[allow(clippy::cast_precision_loss)]
fn sse_of(y: &[f64], samples: &[usize]) -> f64 {
    let m = mean_of(y, samples);
    samples.iter().map(|&i| (y[i] - m).powi(2)).sum()
}

impl RegressionTree {
    /// Grows a tree on the rows of `x` listed in `samples` (duplicates
    /// allowed, as produced by bootstrap resampling).
    ///
    /// `rng` is only consulted when `params.max_features` limits the
    /// features examined per split.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` is ragged, `y` does not match `x`, or
    /// `samples` is empty.
    pub fn fit<R: Rng + ?Sized>(
        x: &[Vec<f64>],
        y: &[f64],
        samples: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Result<Self> {
        let width = matrix_width(x)?;
        if y.len() != x.len() {
            return Err(MlError::DimensionMismatch {
                expected: x.len(),
                got: y.len(),
            });
        }
        if samples.is_empty() {
            return Err(MlError::InsufficientData { needed: 1, got: 0 });
        }

        let mut tree = Self {
            nodes: Vec::new(),
            importances: vec![0.0; width],
        };
        tree.grow(x, y, samples.to_vec(), 0, params, rng);
        Ok(tree)
    }

    fn grow<R: Rng + ?Sized>(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        samples: Vec<usize>,
        depth: usize,
        params: &TreeParams,
        rng: &mut R,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: mean_of(y, &samples),
        });

        if depth >= params.max_depth || samples.len() < params.min_samples_split.max(2) {
            return id;
        }

        let Some(best) = Self::best_split(x, y, &samples, params, rng) else {
            return id;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| x[i][best.feature] <= best.threshold);
        self.importances[best.feature] += best.gain;

        let left_id = self.grow(x, y, left, depth + 1, params, rng);
        let right_id = self.grow(x, y, right, depth + 1, params, rng);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: left_id,
            right: right_id,
        };
        id
    }

    #[allow(clippy::cast_precision_loss)]
    fn best_split<R: Rng + ?Sized>(
        x: &[Vec<f64>],
        y: &[f64],
        samples: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Option<Candidate> {
        let width = x[0].len();
        let features: Vec<usize> = match params.max_features {
            Some(m) if m < width => {
                let mut picked = rand::seq::index::sample(rng, width, m.max(1)).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..width).collect(),
        };

        let parent_sse = sse_of(y, samples);
        if parent_sse <= 1e-12 {
            return None;
        }
        let total: f64 = samples.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = samples.iter().map(|&i| y[i] * y[i]).sum();
        let n = samples.len();
        let min_leaf = params.min_samples_leaf.max(1);

        let mut best: Option<Candidate> = None;
        let mut order = samples.to_vec();
        for feature in features {
            order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..n - 1 {
                let i = order[pos];
                left_sum += y[i];
                left_sq += y[i] * y[i];

                let left_n = pos + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }
                let here = x[i][feature];
                let next = x[order[pos + 1]][feature];
                if next <= here {
                    continue;
                }

                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let left_sse = left_sq - left_sum * left_sum / left_n as f64;
                let right_sse = right_sq - right_sum * right_sum / right_n as f64;
                let gain = parent_sse - left_sse - right_sse;

                if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(Candidate {
                        feature,
                        threshold: 0.5 * (here + next),
                        gain,
                    });
                }
            }
        }
        best
    }

    /// Predicts a single row.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Predicts every row.
    #[must_use]
    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    /// Total squared-error reduction attributed to each feature.
    #[must_use]
    pub fn raw_importances(&self) -> &[f64] {
        &self.importances
    }

    /// Importances normalized to sum to 1, or all zeros for a stump.
    #[must_use]
    pub fn normalized_importances(&self) -> Vec<f64> {
        normalize(&self.importances)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Scales `weights` to sum to 1. All zeros stay zero.
#[must_use]
pub fn normalize(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return vec![0.0; weights.len()];
    }
    weights.iter().map(|w| w / total).collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::SeedableRng as _;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn learns_step_function() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![f64::from(i), 0.0]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        let samples: Vec<usize> = (0..20).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let tree = RegressionTree::fit(&x, &y, &samples, &TreeParams::default(), &mut rng).unwrap();

        assert_relative_eq!(tree.predict_row(&[3.0, 0.0]), 1.0);
        assert_relative_eq!(tree.predict_row(&[15.0, 0.0]), 5.0);
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.normalized_importances(), vec![1.0, 0.0]);
    }

    #[test]
    fn constant_target_is_a_single_leaf() {
        let x: Vec<Vec<f64>> = (0..5).map(|i| vec![f64::from(i)]).collect();
        let y = vec![2.0; 5];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tree =
            RegressionTree::fit(&x, &y, &[0, 1, 2, 3, 4], &TreeParams::default(), &mut rng).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.normalized_importances(), vec![0.0]);
    }

    #[test]
    fn depth_limit_is_respected() {
        let x: Vec<Vec<f64>> = (0..32).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<f64> = (0..32).map(f64::from).collect();
        let samples: Vec<usize> = (0..32).collect();
        let params = TreeParams {
            max_depth: 2,
            ..TreeParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tree = RegressionTree::fit(&x, &y, &samples, &params, &mut rng).unwrap();
        assert!(tree.node_count() <= 7);
    }
}
