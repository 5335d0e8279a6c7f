//! Principal component preprocessing applied in front of every model

use anyhow::Result;
use faer::Mat;
use rayon::prelude::*;
use serde::Serialize;

use super::matrix::FeatureMatrix;

/// Standard deviations at or below this leave the column unscaled
const SCALE_EPS: f64 = 1e-12;

/// Fitted centring, scaling and projection
#[derive(Debug, Clone, Serialize)]
pub struct Pca {
    means: Vec<f64>,
    scales: Vec<f64>,
    /// `n_components` loading vectors, each of length `n_features`
    components: Vec<Vec<f64>>,
    /// Variance share of every eigen-direction, descending
    explained_variance_ratio: Vec<f64>,
    n_components: usize,
}

impl Pca {
    /// Fit on `x`, keeping the fewest components whose cumulative explained variance
    /// reaches `variance_threshold` (at least one).
    pub fn fit(x: &FeatureMatrix, variance_threshold: f64) -> Result<Self> {
        let n = x.nrows();
        let p = x.ncols();
        if n < 2 {
            anyhow::bail!("PCA needs at least 2 rows, got {}", n);
        }
        if p == 0 {
            anyhow::bail!("PCA needs at least one predictor");
        }
        if !(variance_threshold > 0.0 && variance_threshold <= 1.0) {
            anyhow::bail!(
                "PCA variance threshold must be in (0, 1], got {}",
                variance_threshold
            );
        }
        if let Some((row, col)) = x.first_non_finite() {
            anyhow::bail!("PCA input has a non-finite value at row {}, column {}", row, col);
        }

        let (means, scales): (Vec<f64>, Vec<f64>) = (0..p)
            .into_par_iter()
            .map(|j| {
                let col = x.column(j);
                let mean = col.iter().sum::<f64>() / n as f64;
                let var = col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
                    / (n - 1) as f64;
                let std = var.sqrt();
                (mean, if std > SCALE_EPS { std } else { 1.0 })
            })
            .unzip();

        let mut z = Mat::<f64>::zeros(n, p);
        for i in 0..n {
            let row = x.row(i);
            for j in 0..p {
                z[(i, j)] = (row[j] - means[j]) / scales[j];
            }
        }
        let mut cov = z.transpose() * &z;
        let denom = (n - 1) as f64;
        for i in 0..p {
            for j in 0..p {
                cov[(i, j)] /= denom;
            }
        }

        let eigen = cov.selfadjoint_eigendecomposition(faer::Side::Lower);
        let u = eigen.u();
        let s = eigen.s().column_vector();

        let mut directions: Vec<(f64, Vec<f64>)> = (0..p)
            .map(|k| {
                let mut v: Vec<f64> = (0..p).map(|i| u.read(i, k)).collect();
                orient(&mut v);
                (s.read(k).max(0.0), v)
            })
            .collect();
        directions.sort_by(|a, b| b.0.total_cmp(&a.0));

        let total: f64 = directions.iter().map(|(l, _)| l).sum();
        let explained_variance_ratio: Vec<f64> = if total > 0.0 {
            directions.iter().map(|(l, _)| l / total).collect()
        } else {
            vec![0.0; p]
        };

        let mut n_components = p;
        let mut cumulative = 0.0;
        for (k, ratio) in explained_variance_ratio.iter().enumerate() {
            cumulative += ratio;
            if cumulative >= variance_threshold - 1e-12 {
                n_components = k + 1;
                break;
            }
        }
        let n_components = n_components.max(1);

        let components = directions
            .into_iter()
            .take(n_components)
            .map(|(_, v)| v)
            .collect();

        Ok(Self {
            means,
            scales,
            components,
            explained_variance_ratio,
            n_components,
        })
    }

    /// Project `x` onto the retained components
    pub fn transform(&self, x: &FeatureMatrix) -> Result<FeatureMatrix> {
        if x.ncols() != self.means.len() {
            anyhow::bail!(
                "PCA was fitted on {} predictors but got {}",
                self.means.len(),
                x.ncols()
            );
        }

        let k = self.n_components;
        let mut out = FeatureMatrix::zeros(x.nrows(), k);
        let mut centred = vec![0.0; self.means.len()];
        for i in 0..x.nrows() {
            for (j, value) in x.row(i).iter().enumerate() {
                centred[j] = (value - self.means[j]) / self.scales[j];
            }
            let projected = out.row_mut(i);
            for (c, component) in self.components.iter().enumerate() {
                projected[c] = component.iter().zip(&centred).map(|(a, b)| a * b).sum();
            }
        }
        Ok(out)
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn explained_variance_ratio(&self) -> &[f64] {
        &self.explained_variance_ratio
    }

    /// Variance share retained by the kept components
    pub fn cumulative_variance(&self) -> f64 {
        self.explained_variance_ratio[..self.n_components].iter().sum()
    }
}

/// Fix the eigenvector sign so its largest-magnitude entry is positive
fn orient(v: &mut [f64]) {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
    if pivot < 0.0 {
        v.iter_mut().for_each(|x| *x = -*x);
    }
}
