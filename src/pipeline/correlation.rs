//! Pearson correlation exploration of the cleaned predictors
//!
//! Descriptive only: nothing here feeds back into modelling.

use anyhow::Result;
use faer::Mat;
use rayon::prelude::*;
use serde::Serialize;

use super::matrix::FeatureMatrix;

/// Standard deviations at or below this are treated as constant columns
const CONSTANT_EPS: f64 = 1e-12;

/// Symmetric Pearson correlation matrix over the non-constant predictors
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    /// Row-major `names.len() x names.len()` values
    pub values: Vec<Vec<f64>>,
    /// Constant columns that could not be standardized
    pub skipped_constant: Vec<String>,
}

impl CorrelationMatrix {
    pub fn size(&self) -> usize {
        self.names.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    /// Correlation between two named columns
    pub fn between(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[i][j])
    }
}

/// A pair of predictors whose correlation magnitude exceeds a threshold
#[derive(Debug, Clone, Serialize)]
pub struct CorrelatedPair {
    pub feature1: String,
    pub feature2: String,
    pub correlation: f64,
}

/// Correlation of one predictor with the numeric label encoding
#[derive(Debug, Clone, Serialize)]
pub struct LabelCorrelation {
    pub feature: String,
    pub correlation: f64,
}

/// Centre and scale a column by its population standard deviation.
///
/// Returns `None` for a constant column.
fn standardize(values: &[f64]) -> Option<Vec<f64>> {
    let n = values.len() as f64;
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    let std = var.sqrt();
    if !std.is_finite() || std <= CONSTANT_EPS {
        return None;
    }
    Some(values.iter().map(|v| (v - mean) / std).collect())
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let zx = standardize(x)?;
    let zy = standardize(y)?;
    let n = x.len() as f64;
    let r = zx.iter().zip(&zy).map(|(a, b)| a * b).sum::<f64>() / n;
    Some(r.clamp(-1.0, 1.0))
}

/// Compute the full Pearson correlation matrix of the predictors.
///
/// Algorithm:
/// 1. Standardize every column in parallel, setting constant columns aside
/// 2. Build Z (n_rows x n_valid) scaled by 1/sqrt(n)
/// 3. R = Z^T * Z, then force a unit diagonal and exact symmetry
pub fn correlation_matrix(matrix: &FeatureMatrix, names: &[String]) -> Result<CorrelationMatrix> {
    if names.len() != matrix.ncols() {
        anyhow::bail!(
            "Got {} column names for a matrix with {} columns",
            names.len(),
            matrix.ncols()
        );
    }
    let n_rows = matrix.nrows();
    if n_rows == 0 {
        anyhow::bail!("Cannot compute correlations on an empty table");
    }

    let standardized: Vec<Option<Vec<f64>>> = (0..matrix.ncols())
        .into_par_iter()
        .map(|j| standardize(&matrix.column(j)))
        .collect();

    let mut valid_names = Vec::new();
    let mut valid_cols = Vec::new();
    let mut skipped_constant = Vec::new();
    for (name, col) in names.iter().zip(standardized) {
        match col {
            Some(values) => {
                valid_names.push(name.clone());
                valid_cols.push(values);
            }
            None => skipped_constant.push(name.clone()),
        }
    }

    let k = valid_cols.len();
    let scale = 1.0 / (n_rows as f64).sqrt();
    let mut z = Mat::<f64>::zeros(n_rows, k);
    for (col_idx, col_data) in valid_cols.iter().enumerate() {
        for (row_idx, &val) in col_data.iter().enumerate() {
            z[(row_idx, col_idx)] = val * scale;
        }
    }

    let corr = z.transpose() * &z;

    let mut values = vec![vec![0.0; k]; k];
    for i in 0..k {
        values[i][i] = 1.0;
        for j in (i + 1)..k {
            let r = (0.5 * (corr[(i, j)] + corr[(j, i)])).clamp(-1.0, 1.0);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    Ok(CorrelationMatrix {
        names: valid_names,
        values,
        skipped_constant,
    })
}

/// Correlate each predictor with the label (level index + 1), strongest first.
///
/// Constant predictors have no defined correlation and are left out.
pub fn label_correlations(
    features: &FeatureMatrix,
    names: &[String],
    labels: &[usize],
) -> Result<Vec<LabelCorrelation>> {
    if labels.len() != features.nrows() {
        anyhow::bail!(
            "Label vector has {} entries but the predictor matrix has {} rows",
            labels.len(),
            features.nrows()
        );
    }
    let encoded: Vec<f64> = labels.iter().map(|&l| (l + 1) as f64).collect();

    let mut ranking: Vec<LabelCorrelation> = (0..features.ncols())
        .into_par_iter()
        .filter_map(|j| {
            pearson(&features.column(j), &encoded).map(|correlation| LabelCorrelation {
                feature: names[j].clone(),
                correlation,
            })
        })
        .collect();

    ranking.sort_by(|a, b| {
        b.correlation
            .abs()
            .partial_cmp(&a.correlation.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(ranking)
}

/// Extract correlated pairs from the upper triangle, strongest first
pub fn find_correlated_pairs(matrix: &CorrelationMatrix, threshold: f64) -> Vec<CorrelatedPair> {
    let n = matrix.size();
    let mut pairs = Vec::new();

    for i in 0..n {
        for j in (i + 1)..n {
            let corr = matrix.get(i, j);
            if corr.abs() > threshold && !corr.is_nan() {
                pairs.push(CorrelatedPair {
                    feature1: matrix.names[i].clone(),
                    feature2: matrix.names[j].clone(),
                    correlation: corr,
                });
            }
        }
    }

    pairs.sort_by(|a, b| {
        b.correlation
            .abs()
            .partial_cmp(&a.correlation.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    pairs
}
