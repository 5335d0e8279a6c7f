//! Stratified fit/validation partitioning

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

/// Disjoint row index sets covering the whole training table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitPartition {
    /// Rows used for model fitting, ascending
    pub fit: Vec<usize>,
    /// Held-out rows used for validation, ascending
    pub validation: Vec<usize>,
}

impl SplitPartition {
    pub fn total(&self) -> usize {
        self.fit.len() + self.validation.len()
    }

    /// Class shares of the fit and validation subsets
    pub fn class_proportions(&self, labels: &[usize], n_classes: usize) -> (Vec<f64>, Vec<f64>) {
        (
            class_proportions(labels, &self.fit, n_classes),
            class_proportions(labels, &self.validation, n_classes),
        )
    }
}

/// Share of each class among the given rows
pub fn class_proportions(labels: &[usize], rows: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &row in rows {
        counts[labels[row]] += 1;
    }
    let total = rows.len().max(1) as f64;
    counts.iter().map(|&c| c as f64 / total).collect()
}

/// Split rows so each class keeps its share in both subsets.
///
/// Within each class the rows are shuffled with a generator seeded by `seed` and the
/// first `ceil(fraction * class_size)` go to the fit subset. Both index lists come
/// back sorted, so subsets keep the original row order.
pub fn stratified_split(
    labels: &[usize],
    n_classes: usize,
    fraction: f64,
    seed: u64,
) -> SplitPartition {
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (row, &label) in labels.iter().enumerate() {
        by_class[label].push(row);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut fit = Vec::with_capacity((labels.len() as f64 * fraction).ceil() as usize);
    let mut validation = Vec::with_capacity(labels.len() - fit.capacity().min(labels.len()));

    for rows in by_class.iter_mut() {
        if rows.is_empty() {
            continue;
        }
        rows.shuffle(&mut rng);
        let take = ((rows.len() as f64 * fraction).ceil() as usize).min(rows.len());
        fit.extend_from_slice(&rows[..take]);
        validation.extend_from_slice(&rows[take..]);
    }

    fit.sort_unstable();
    validation.sort_unstable();

    SplitPartition { fit, validation }
}
