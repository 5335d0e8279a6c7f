//! Classifier families and the uniform trainable-classifier capability
//!
//! Every family implements [`Trainer`] (hyperparameter grid + fit) and produces a
//! boxed [`Classifier`], so the comparison loop treats the random forest, the
//! boosted trees and the linear SVM identically. The forest is smartcore's and the
//! SVM is linfa's; boosting is grown here on [`tree`].

pub mod boosting;
pub mod error;
pub mod forest;
pub mod svm;
pub mod tree;

use ndarray::Array2;
use serde::Serialize;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::pipeline::FeatureMatrix;

pub use boosting::{GradientBoosting, GradientBoostingTrainer};
pub use error::ModelError;
pub use forest::{RandomForest, RandomForestTrainer};
pub use svm::{LinearSvm, LinearSvmTrainer};

/// A single tunable value, e.g. `mtry = 2` or `cost = 0.1`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hyperparameter {
    pub name: &'static str,
    pub value: f64,
}

impl Hyperparameter {
    pub fn new(name: &'static str, value: f64) -> Self {
        Self { name, value }
    }

    /// Value as a count (tree counts, feature counts), rejecting fractions and negatives
    pub fn as_count(&self) -> Result<usize, ModelError> {
        if self.value < 1.0 || self.value.fract() != 0.0 || !self.value.is_finite() {
            return Err(ModelError::InvalidHyperparameter {
                name: self.name,
                value: self.value,
            });
        }
        Ok(self.value as usize)
    }
}

impl std::fmt::Display for Hyperparameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

/// A fitted model that maps feature rows to class indices
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// Number of features the model was trained on
    fn n_features(&self) -> usize;

    /// Class index for every row of `x`; the width is already checked
    fn predict_rows(&self, x: &FeatureMatrix) -> Result<Vec<usize>, ModelError>;

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<usize>, ModelError> {
        if x.ncols() != self.n_features() {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features(),
                actual: x.ncols(),
            });
        }
        if x.nrows() == 0 {
            return Ok(Vec::new());
        }
        self.predict_rows(x)
    }
}

/// A classifier family: search grid plus fitting
pub trait Trainer: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Candidate hyperparameters for data with `n_features` columns (after PCA)
    fn grid(&self, n_features: usize) -> Vec<Hyperparameter>;

    fn fit(
        &self,
        x: &FeatureMatrix,
        y: &[usize],
        n_classes: usize,
        hyperparameter: Hyperparameter,
    ) -> Result<Box<dyn Classifier>, ModelError>;
}

/// Knobs shared by the trainers that are not searched over
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelSettings {
    pub seed: u64,
    pub forest_trees: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            seed: 50,
            forest_trees: 100,
        }
    }
}

/// The three classifier families compared by the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// smartcore random forest with per-split feature subsampling
    RandomForest,
    /// Multinomial gradient-boosted regression trees
    GradientBoosting,
    /// One-vs-rest linfa SVMs with a linear kernel
    LinearSvm,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::LinearSvm,
    ];

    /// Human-readable name for tables
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "Random Forest",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::LinearSvm => "Linear SVM",
        }
    }

    pub fn trainer(&self, settings: ModelSettings) -> Box<dyn Trainer> {
        match self {
            ModelKind::RandomForest => Box::new(RandomForestTrainer::new(
                settings.forest_trees,
                settings.seed,
            )),
            ModelKind::GradientBoosting => Box::new(GradientBoostingTrainer::new(settings.seed)),
            ModelKind::LinearSvm => Box::new(LinearSvmTrainer::new()),
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::RandomForest => write!(f, "rf"),
            ModelKind::GradientBoosting => write!(f, "gbm"),
            ModelKind::LinearSvm => write!(f, "svm"),
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rf" | "random_forest" | "forest" => Ok(ModelKind::RandomForest),
            "gbm" | "gradient_boosting" | "boosting" => Ok(ModelKind::GradientBoosting),
            "svm" | "linear_svm" | "svmlinear" => Ok(ModelKind::LinearSvm),
            _ => Err(format!(
                "Unknown model: '{}'. Use 'rf', 'gbm' or 'svm'.",
                s
            )),
        }
    }
}

/// Check the invariants every trainer relies on
pub fn validate_training_data(
    x: &FeatureMatrix,
    y: &[usize],
    n_classes: usize,
) -> Result<(), ModelError> {
    if x.nrows() == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.nrows() != y.len() {
        return Err(ModelError::LengthMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }
    if let Some(&label) = y.iter().find(|&&label| label >= n_classes) {
        return Err(ModelError::LabelOutOfRange { label, n_classes });
    }
    let mut seen = vec![false; n_classes];
    for &label in y {
        seen[label] = true;
    }
    let found = seen.iter().filter(|&&s| s).count();
    if found < 2 {
        return Err(ModelError::TooFewClasses { found });
    }
    if let Some((row, col)) = x.first_non_finite() {
        return Err(ModelError::NonFinite { row, col });
    }
    Ok(())
}

/// Copy into smartcore's dense matrix
pub(crate) fn to_dense_matrix(x: &FeatureMatrix) -> Result<DenseMatrix<f64>, ModelError> {
    let rows: Vec<Vec<f64>> = x.rows().map(|row| row.to_vec()).collect();
    DenseMatrix::from_2d_vec(&rows).map_err(|e| ModelError::Backend {
        library: "smartcore",
        message: e.to_string(),
    })
}

/// Copy into a row-major ndarray for linfa
pub(crate) fn to_array2(x: &FeatureMatrix) -> Result<Array2<f64>, ModelError> {
    Array2::from_shape_vec((x.nrows(), x.ncols()), x.as_slice().to_vec()).map_err(|e| {
        ModelError::Backend {
            library: "ndarray",
            message: e.to_string(),
        }
    })
}

/// Index of the largest value; ties go to the lowest index
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
