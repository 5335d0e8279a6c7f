//! Model comparison on the held-out validation subset
//!
//! Every selected model family is tuned by cross-validation on the fit subset, refitted
//! with its best grid value and then scored once on the validation subset. The model
//! with the highest validation accuracy becomes the final predictor.

use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use linfa::metrics::ToConfusionMatrix;
use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::Serialize;

use super::config::AnalysisConfig;
use super::matrix::FeatureMatrix;
use super::pca::Pca;
use super::validation::{cross_validate, CvSettings, TuningResult};
use crate::models::{Classifier, Hyperparameter, ModelKind, Trainer};
use crate::utils::{create_progress_bar, finish_with_success};

/// A fitted PCA transform plus the classifier trained on its output.
///
/// Built once by [`fit_artifact`] and only read afterwards.
#[derive(Debug)]
pub struct ModelArtifact {
    pub kind: ModelKind,
    pub hyperparameter: Hyperparameter,
    pub pca: Pca,
    pub classifier: Box<dyn Classifier>,
}

impl ModelArtifact {
    /// Project raw predictors with the fitted PCA and classify every row
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<usize>> {
        let projected = self.pca.transform(x)?;
        Ok(self.classifier.predict(&projected)?)
    }
}

/// Tune `trainer` on the fit subset, then refit on all of it with the chosen value.
///
/// The grid is sized from the PCA fitted on the whole fit subset, which is also the
/// projection the final classifier is trained on.
pub fn fit_artifact(
    trainer: &dyn Trainer,
    x_fit: &FeatureMatrix,
    y_fit: &[usize],
    n_classes: usize,
    settings: &CvSettings,
    progress: Option<&ProgressBar>,
) -> Result<(TuningResult, ModelArtifact)> {
    let pca = Pca::fit(x_fit, settings.pca_variance).context("PCA failed on the fit subset")?;
    let grid = trainer.grid(pca.n_components());
    if let Some(pb) = progress {
        pb.inc_length(settings.total_fits(grid.len()) as u64);
    }

    let tuning = cross_validate(trainer, x_fit, y_fit, n_classes, &grid, settings, progress)?;

    let projected = pca.transform(x_fit)?;
    let classifier = trainer
        .fit(&projected, y_fit, n_classes, tuning.best)
        .with_context(|| format!("Final {} fit failed ({})", trainer.kind().label(), tuning.best))?;

    let artifact = ModelArtifact {
        kind: trainer.kind(),
        hyperparameter: tuning.best,
        pca,
        classifier,
    };
    Ok((tuning, artifact))
}

/// Per-class rates derived from a confusion matrix.
///
/// A rate is `None` when its denominator is zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub sensitivity: Option<f64>,
    pub specificity: Option<f64>,
    pub precision: Option<f64>,
    pub balanced_accuracy: Option<f64>,
}

/// Cross-tabulation of predicted (rows) against actual (columns) classes.
///
/// The summary scores come from linfa's confusion matrix; its macro averages cover
/// the classes present in either vector and are `None` when undefined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionMatrix {
    /// `counts[predicted][actual]`
    pub counts: Vec<Vec<usize>>,
    pub total: usize,
    pub accuracy: f64,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
    pub mcc: Option<f64>,
    pub per_class: Vec<ClassMetrics>,
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

fn finite(value: f32) -> Option<f64> {
    value.is_finite().then(|| f64::from(value))
}

impl ConfusionMatrix {
    pub fn from_predictions(actual: &[usize], predicted: &[usize], n_classes: usize) -> Result<Self> {
        if actual.len() != predicted.len() {
            anyhow::bail!(
                "{} predictions for {} labels",
                predicted.len(),
                actual.len()
            );
        }
        if let Some(&label) = actual.iter().chain(predicted).find(|&&c| c >= n_classes) {
            anyhow::bail!("Class index {} is out of range for {} classes", label, n_classes);
        }

        let total = actual.len();
        let (accuracy, precision, recall, f1, mcc) = if total == 0 {
            (0.0, None, None, None, None)
        } else {
            let matrix = ArrayView1::from(predicted)
                .confusion_matrix(ArrayView1::from(actual))
                .context("Failed to build confusion matrix")?;
            (
                f64::from(matrix.accuracy()),
                finite(matrix.precision()),
                finite(matrix.recall()),
                finite(matrix.f1_score()),
                finite(matrix.mcc()),
            )
        };

        let mut counts = vec![vec![0usize; n_classes]; n_classes];
        for (&a, &p) in actual.iter().zip(predicted) {
            counts[p][a] += 1;
        }

        let per_class = (0..n_classes)
            .map(|c| {
                let tp = counts[c][c];
                let actual_c: usize = (0..n_classes).map(|p| counts[p][c]).sum();
                let predicted_c: usize = counts[c].iter().sum();
                let fp = predicted_c - tp;
                let negatives = total - actual_c;
                let tn = negatives - fp;

                let sensitivity = ratio(tp, actual_c);
                let specificity = ratio(tn, negatives);
                let balanced_accuracy = match (sensitivity, specificity) {
                    (Some(s), Some(t)) => Some((s + t) / 2.0),
                    _ => None,
                };
                ClassMetrics {
                    sensitivity,
                    specificity,
                    precision: ratio(tp, predicted_c),
                    balanced_accuracy,
                }
            })
            .collect();

        Ok(Self {
            counts,
            total,
            accuracy,
            precision,
            recall,
            f1,
            mcc,
            per_class,
        })
    }

    pub fn n_classes(&self) -> usize {
        self.counts.len()
    }
}

/// Everything recorded about one model family
#[derive(Debug, Clone, Serialize)]
pub struct ModelScore {
    pub kind: ModelKind,
    pub hyperparameter: Hyperparameter,
    pub n_components: usize,
    pub tuning: TuningResult,
    pub train_accuracy: f64,
    pub validation_accuracy: f64,
    pub out_of_sample_error: f64,
    pub train_confusion: ConfusionMatrix,
    pub validation_confusion: ConfusionMatrix,
    pub fit_seconds: f64,
}

/// Scores and fitted artifacts of every compared model, in configured order
#[derive(Debug)]
pub struct Comparison {
    pub scores: Vec<ModelScore>,
    pub artifacts: Vec<ModelArtifact>,
    /// Index of the selected model in `scores` and `artifacts`
    pub selected: usize,
}

impl Comparison {
    pub fn selected_score(&self) -> &ModelScore {
        &self.scores[self.selected]
    }

    pub fn selected_artifact(&self) -> &ModelArtifact {
        &self.artifacts[self.selected]
    }
}

/// Index of the highest validation accuracy; ties go to the earliest model
pub fn select_best(scores: &[ModelScore]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, score) in scores.iter().enumerate() {
        match best {
            Some(b) if score.validation_accuracy <= scores[b].validation_accuracy => {}
            _ => best = Some(i),
        }
    }
    best
}

fn score_model(
    trainer: &dyn Trainer,
    fit: (&FeatureMatrix, &[usize]),
    validation: (&FeatureMatrix, &[usize]),
    n_classes: usize,
    settings: &CvSettings,
    progress: Option<&ProgressBar>,
) -> Result<(ModelScore, ModelArtifact)> {
    let started = Instant::now();
    let (x_fit, y_fit) = fit;
    let (x_val, y_val) = validation;

    let (tuning, artifact) = fit_artifact(trainer, x_fit, y_fit, n_classes, settings, progress)?;

    let train_pred = artifact.predict(x_fit)?;
    let val_pred = artifact.predict(x_val)?;
    let train_confusion = ConfusionMatrix::from_predictions(y_fit, &train_pred, n_classes)?;
    let validation_confusion = ConfusionMatrix::from_predictions(y_val, &val_pred, n_classes)?;
    let validation_accuracy = validation_confusion.accuracy;

    let score = ModelScore {
        kind: artifact.kind,
        hyperparameter: artifact.hyperparameter,
        n_components: artifact.pca.n_components(),
        tuning,
        train_accuracy: train_confusion.accuracy,
        validation_accuracy,
        out_of_sample_error: 1.0 - validation_accuracy,
        train_confusion,
        validation_confusion,
        fit_seconds: started.elapsed().as_secs_f64(),
    };
    Ok((score, artifact))
}

/// Tune, fit and score every configured model family in parallel
pub fn compare_models(
    x_fit: &FeatureMatrix,
    y_fit: &[usize],
    x_val: &FeatureMatrix,
    y_val: &[usize],
    config: &AnalysisConfig,
) -> Result<Comparison> {
    let n_classes = config.n_classes();
    let settings = config.cv_settings();
    let trainers: Vec<Box<dyn Trainer>> = config
        .models
        .iter()
        .map(|kind| kind.trainer(config.model_settings()))
        .collect();

    // Grid sizes depend on the PCA output, so each model extends the bar itself
    let pb = create_progress_bar(0, "Tuning models");

    let results: Vec<(ModelScore, ModelArtifact)> = trainers
        .par_iter()
        .map(|trainer| {
            score_model(
                trainer.as_ref(),
                (x_fit, y_fit),
                (x_val, y_val),
                n_classes,
                &settings,
                Some(&pb),
            )
            .with_context(|| format!("{} failed", trainer.kind().label()))
        })
        .collect::<Result<Vec<_>>>()?;

    let (scores, artifacts): (Vec<ModelScore>, Vec<ModelArtifact>) = results.into_iter().unzip();
    let selected = select_best(&scores).context("No model was compared")?;

    finish_with_success(
        &pb,
        &format!(
            "Compared {} model(s), selected {}",
            scores.len(),
            scores[selected].kind.label()
        ),
    );

    Ok(Comparison {
        scores,
        artifacts,
        selected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_metrics() {
        let actual = [0, 0, 1, 1, 2, 2];
        let predicted = [0, 1, 1, 1, 2, 0];
        let cm = ConfusionMatrix::from_predictions(&actual, &predicted, 3).unwrap();

        assert_eq!(cm.counts[0][0], 1);
        assert_eq!(cm.counts[1][0], 1);
        assert_eq!(cm.counts[0][2], 1);
        assert_eq!(cm.total, 6);
        assert!((cm.accuracy - 4.0 / 6.0).abs() < 1e-6);

        let class0 = &cm.per_class[0];
        assert_eq!(class0.sensitivity, Some(0.5));
        assert_eq!(class0.precision, Some(0.5));
        // 4 negatives, one predicted as class 0
        assert_eq!(class0.specificity, Some(0.75));
        assert_eq!(class0.balanced_accuracy, Some(0.625));
    }

    #[test]
    fn test_perfect_predictions_score_one() {
        let labels = [0, 1, 2, 1, 0];
        let cm = ConfusionMatrix::from_predictions(&labels, &labels, 3).unwrap();
        assert!((cm.accuracy - 1.0).abs() < 1e-6);
        assert!((cm.precision.unwrap() - 1.0).abs() < 1e-6);
        assert!((cm.recall.unwrap() - 1.0).abs() < 1e-6);
        assert!((cm.f1.unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_absent_class_has_no_sensitivity() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0], &[0, 0], 2).unwrap();
        assert_eq!(cm.per_class[1].sensitivity, None);
        assert_eq!(cm.per_class[1].precision, None);
        assert_eq!(cm.per_class[1].specificity, Some(1.0));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(ConfusionMatrix::from_predictions(&[0, 1], &[0], 2).is_err());
        assert!(ConfusionMatrix::from_predictions(&[0, 3], &[0, 1], 2).is_err());
        let empty = ConfusionMatrix::from_predictions(&[], &[], 2).unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.accuracy, 0.0);
    }
}
