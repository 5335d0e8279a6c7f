//! K-fold cross-validation and grid tuning

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use linfa::metrics::ToConfusionMatrix;
use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::Serialize;
use smartcore::model_selection::{BaseKFold, KFold};

use super::matrix::{select_labels, FeatureMatrix};
use super::pca::Pca;
use crate::models::{to_dense_matrix, Hyperparameter, ModelKind, Trainer};

/// Resampling settings shared by every model
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CvSettings {
    pub folds: usize,
    pub repeats: usize,
    pub seed: u64,
    pub pca_variance: f64,
}

impl Default for CvSettings {
    fn default() -> Self {
        Self {
            folds: 3,
            repeats: 1,
            seed: 50,
            pca_variance: 0.99,
        }
    }
}

impl CvSettings {
    /// Model fits performed by one tuning run over a grid of `grid_len` values
    pub fn total_fits(&self, grid_len: usize) -> usize {
        self.folds * self.repeats * grid_len
    }
}

/// Train/held-out row indices of every fold for one repeat.
///
/// smartcore's `KFold` shuffles the rows with `seed` and cuts the shuffled order into
/// `k` contiguous folds whose sizes differ by at most one. Shuffling first keeps
/// label-sorted input from holding out whole classes.
pub fn kfold_partitions(
    x: &FeatureMatrix,
    k: usize,
    seed: u64,
) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        anyhow::bail!("Cross-validation needs at least 2 folds, got {}", k);
    }
    if x.nrows() < k {
        anyhow::bail!("Cannot split {} rows into {} folds", x.nrows(), k);
    }
    let dense = to_dense_matrix(x)?;
    let kfold = KFold::default()
        .with_n_splits(k)
        .with_shuffle(true)
        .with_seed(Some(seed));
    Ok(kfold.split(&dense).collect())
}

/// Mean cross-validated accuracy of one grid value
#[derive(Debug, Clone, Serialize)]
pub struct TuningPoint {
    pub hyperparameter: Hyperparameter,
    pub mean_accuracy: f64,
    pub fold_accuracies: Vec<f64>,
}

impl TuningPoint {
    pub fn cv_error(&self) -> f64 {
        1.0 - self.mean_accuracy
    }
}

/// Tuning curve of one model family with the selected grid value
#[derive(Debug, Clone, Serialize)]
pub struct TuningResult {
    pub kind: ModelKind,
    pub points: Vec<TuningPoint>,
    pub best: Hyperparameter,
    pub best_accuracy: f64,
}

/// Share of positions where prediction equals truth, read off linfa's confusion matrix
pub fn accuracy(actual: &[usize], predicted: &[usize]) -> Result<f64> {
    if actual.is_empty() {
        return Ok(0.0);
    }
    let matrix = ArrayView1::from(predicted)
        .confusion_matrix(ArrayView1::from(actual))
        .context("Failed to build confusion matrix")?;
    Ok(f64::from(matrix.accuracy()))
}

/// Tune `trainer` over `grid` by repeated k-fold cross-validation.
///
/// PCA is refitted on the training folds of every split so the held-out fold never
/// leaks into the projection. The grid value with the highest mean accuracy (lowest
/// CV error) wins; ties go to the earliest grid value.
pub fn cross_validate(
    trainer: &dyn Trainer,
    x: &FeatureMatrix,
    y: &[usize],
    n_classes: usize,
    grid: &[Hyperparameter],
    settings: &CvSettings,
    progress: Option<&ProgressBar>,
) -> Result<TuningResult> {
    if grid.is_empty() {
        anyhow::bail!("{} has an empty hyperparameter grid", trainer.kind().label());
    }
    if y.len() != x.nrows() {
        anyhow::bail!(
            "Label vector has {} entries but the predictor matrix has {} rows",
            y.len(),
            x.nrows()
        );
    }

    let mut fold_scores: Vec<Vec<f64>> =
        vec![Vec::with_capacity(settings.folds * settings.repeats); grid.len()];

    for repeat in 0..settings.repeats {
        let partitions =
            kfold_partitions(x, settings.folds, settings.seed.wrapping_add(repeat as u64))?;

        for (fold, (train_rows, test_rows)) in partitions.into_iter().enumerate() {
            let x_train = x.select_rows(&train_rows);
            let x_test = x.select_rows(&test_rows);
            let y_train = select_labels(y, &train_rows);
            let y_test = select_labels(y, &test_rows);

            let pca = Pca::fit(&x_train, settings.pca_variance).with_context(|| {
                format!("PCA failed on fold {} of repeat {}", fold + 1, repeat + 1)
            })?;
            let z_train = pca.transform(&x_train)?;
            let z_test = pca.transform(&x_test)?;

            let scores: Vec<f64> = grid
                .par_iter()
                .map(|hp| -> Result<f64> {
                    let model = trainer
                        .fit(&z_train, &y_train, n_classes, *hp)
                        .with_context(|| {
                            format!(
                                "{} ({}) failed on fold {}",
                                trainer.kind().label(),
                                hp,
                                fold + 1
                            )
                        })?;
                    let predicted = model.predict(&z_test)?;
                    if let Some(pb) = progress {
                        pb.inc(1);
                    }
                    accuracy(&y_test, &predicted)
                })
                .collect::<Result<Vec<_>>>()?;

            for (g, score) in scores.into_iter().enumerate() {
                fold_scores[g].push(score);
            }
        }
    }

    let points: Vec<TuningPoint> = grid
        .iter()
        .zip(fold_scores)
        .map(|(hp, fold_accuracies)| TuningPoint {
            hyperparameter: *hp,
            mean_accuracy: fold_accuracies.iter().sum::<f64>() / fold_accuracies.len() as f64,
            fold_accuracies,
        })
        .collect();

    let mut best = 0;
    for (i, point) in points.iter().enumerate().skip(1) {
        if point.mean_accuracy > points[best].mean_accuracy + 1e-12 {
            best = i;
        }
    }

    Ok(TuningResult {
        kind: trainer.kind(),
        best: points[best].hyperparameter,
        best_accuracy: points[best].mean_accuracy,
        points,
    })
}
