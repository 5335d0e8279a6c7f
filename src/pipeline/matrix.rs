//! Dense row-major feature matrix shared by the modelling stages
//!
//! Polars is used for loading and column-level cleaning; once the predictor set is
//! fixed the data moves into this plain row-major layout, which the tree learners,
//! the linear SVM and the PCA transform index row by row.

use anyhow::{Context, Result};
use polars::prelude::*;

/// Row-major matrix of `f64` values
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl FeatureMatrix {
    /// Wrap a row-major buffer. The buffer length must equal `rows * cols`.
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            anyhow::bail!(
                "Matrix buffer has {} values, expected {} ({} rows x {} cols)",
                data.len(),
                rows * cols,
                rows,
                cols
            );
        }
        Ok(Self { data, rows, cols })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Build from a slice of equally sized rows
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                anyhow::bail!("Row {} has {} values, expected {}", i, row.len(), cols);
            }
            data.extend_from_slice(row);
        }
        Self::new(data, rows.len(), cols)
    }

    /// Extract the named columns of a DataFrame as a float matrix.
    ///
    /// Every column is cast to Float64. A null cell (either missing in the source or
    /// produced by a failed cast of a non-numeric value) is an error: predictors that
    /// reach the models must be complete.
    pub fn from_dataframe(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let rows = df.height();
        let cols = columns.len();
        let mut data = vec![0.0; rows * cols];

        for (j, name) in columns.iter().enumerate() {
            let column = df
                .column(name)
                .with_context(|| format!("Column '{}' not found", name))?
                .cast(&DataType::Float64)
                .with_context(|| format!("Column '{}' cannot be cast to a number", name))?;
            let values = column.f64()?;

            let nulls = values.null_count();
            if nulls > 0 {
                anyhow::bail!(
                    "Predictor '{}' has {} missing or non-numeric value(s) after cleaning; \
                     lower --missing-threshold or drop the column",
                    name,
                    nulls
                );
            }

            for (i, value) in values.into_no_null_iter().enumerate() {
                data[i * cols + j] = value;
            }
        }

        Self::new(data, rows, cols)
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let cols = self.cols;
        &mut self.data[row * cols..(row + 1) * cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Copy of a single column
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|i| self.get(i, col)).collect()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// New matrix holding the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Self {
            data,
            rows: indices.len(),
            cols: self.cols,
        }
    }

    /// Index of the first non-finite cell, if any
    pub fn first_non_finite(&self) -> Option<(usize, usize)> {
        self.data
            .iter()
            .position(|v| !v.is_finite())
            .map(|pos| (pos / self.cols.max(1), pos % self.cols.max(1)))
    }
}

/// Select the given entries of a label vector
pub fn select_labels(labels: &[usize], indices: &[usize]) -> Vec<usize> {
    indices.iter().map(|&i| labels[i]).collect()
}
