//! Ward agglomerative clustering with Lance-Williams distance updates.
//!
//! Ties between equally close cluster pairs are broken by the lowest
//! `(i, j)` slot pair, so the merge order depends only on the input order.

use crate::{MlError, Result, matrix_width};

/// One agglomeration step. `a` and `b` are slot indices of the merged
/// clusters; the merged cluster takes slot `a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    pub a: usize,
    pub b: usize,
    /// Ward linkage height (same scale as `scipy.cluster.hierarchy.ward`).
    pub height: f64,
    /// Size of the merged cluster.
    pub size: usize,
}

/// Full Ward dendrogram over `n` points.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    n: usize,
    merges: Vec<Merge>,
}

impl Dendrogram {
    /// Builds the dendrogram of `points` under Euclidean distance.
    ///
    /// # Errors
    ///
    /// Returns an error if `points` is empty or ragged.
    #[allow(clippy::cast_precision_loss)]
    pub fn build(points: &[Vec<f64>]) -> Result<Self> {
        matrix_width(points)?;
        let n = points.len();

        // Squared Euclidean distances, full symmetric matrix.
        let mut dist = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d: f64 = points[i]
                    .iter()
                    .zip(&points[j])
                    .map(|(a, b)| (a - b).powi(2))
                    .sum();
                dist[i * n + j] = d;
                dist[j * n + i] = d;
            }
        }

        let mut size = vec![1usize; n];
        let mut active = vec![true; n];
        let mut merges = Vec::with_capacity(n.saturating_sub(1));

        for _ in 1..n {
            let mut best: Option<(usize, usize, f64)> = None;
            for i in (0..n).filter(|&i| active[i]) {
                for j in ((i + 1)..n).filter(|&j| active[j]) {
                    let d = dist[i * n + j];
                    if best.is_none_or(|(_, _, b)| d < b) {
                        best = Some((i, j, d));
                    }
                }
            }
            let Some((a, b, d_ab)) = best else {
                break;
            };

            let (na, nb) = (size[a] as f64, size[b] as f64);
            for k in (0..n).filter(|&k| active[k] && k != a && k != b) {
                let nk = size[k] as f64;
                let total = na + nb + nk;
                let updated = ((na + nk) * dist[a * n + k] + (nb + nk) * dist[b * n + k]
                    - nk * d_ab)
                    / total;
                dist[a * n + k] = updated;
                dist[k * n + a] = updated;
            }

            size[a] += size[b];
            active[b] = false;
            merges.push(Merge {
                a,
                b,
                height: d_ab.max(0.0).sqrt(),
                size: size[a],
            });
        }

        Ok(Self { n, merges })
    }

    /// Merge steps in order.
    #[must_use]
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Cuts the tree into `k` clusters.
    ///
    /// Labels run `1..=k`, numbered in order of each cluster's smallest
    /// member index.
    ///
    /// # Errors
    ///
    /// Returns [`MlError::InvalidParameter`] if `k` is zero or exceeds the
    /// number of points.
    pub fn cut(&self, k: usize) -> Result<Vec<usize>> {
        if k == 0 || k > self.n {
            return Err(MlError::InvalidParameter(format!(
                "cannot cut {} points into {k} clusters",
                self.n
            )));
        }

        // Union members along the first n - k merges.
        let mut owner: Vec<usize> = (0..self.n).collect();
        for m in self.merges.iter().take(self.n - k) {
            for o in &mut owner {
                if *o == m.b {
                    *o = m.a;
                }
            }
        }

        let mut labels = vec![0; self.n];
        let mut next = 0;
        let mut assigned: Vec<Option<usize>> = vec![None; self.n];
        for (i, &slot) in owner.iter().enumerate() {
            let label = *assigned[slot].get_or_insert_with(|| {
                next += 1;
                next
            });
            labels[i] = label;
        }
        Ok(labels)
    }
}

/// Ward clustering of `points` into `k` clusters.
///
/// # Errors
///
/// See [`Dendrogram::build`] and [`Dendrogram::cut`].
pub fn ward_clusters(points: &[Vec<f64>], k: usize) -> Result<Vec<usize>> {
    Dendrogram::build(points)?.cut(k)
}
