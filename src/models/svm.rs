//! Linear max-margin classifier
//!
//! One binary linfa SVM with a linear kernel per class (one-vs-rest). Each machine is
//! Platt-calibrated, so its output is a class probability; the most probable class
//! wins.

use linfa::dataset::Pr;
use linfa::prelude::*;
use linfa_svm::Svm;
use ndarray::Array1;

use super::{
    argmax, to_array2, validate_training_data, Classifier, Hyperparameter, ModelError, ModelKind,
    Trainer,
};
use crate::pipeline::FeatureMatrix;

/// Name of the searched hyperparameter (misclassification cost)
pub const COST: &str = "cost";

const COST_GRID: [f64; 5] = [0.01, 0.1, 1.0, 10.0, 100.0];

fn linfa_error(e: impl std::fmt::Display) -> ModelError {
    ModelError::Backend {
        library: "linfa-svm",
        message: e.to_string(),
    }
}

/// A fitted one-vs-rest linear SVM
pub struct LinearSvm {
    /// `(class, machine)` for every class seen in training
    machines: Vec<(usize, Svm<f64, Pr>)>,
    n_features: usize,
    cost: f64,
}

impl LinearSvm {
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Classes with a trained machine, ascending
    pub fn classes(&self) -> Vec<usize> {
        self.machines.iter().map(|(class, _)| *class).collect()
    }

    /// Per-machine probability of its class for every row, in [`LinearSvm::classes`] order
    pub fn class_probabilities(&self, x: &FeatureMatrix) -> Result<Vec<Vec<f64>>, ModelError> {
        let records = to_array2(x)?;
        let per_machine: Vec<Array1<Pr>> = self
            .machines
            .iter()
            .map(|(_, machine)| machine.predict(&records))
            .collect();
        Ok((0..x.nrows())
            .map(|i| per_machine.iter().map(|p| f64::from(*p[i])).collect())
            .collect())
    }
}

impl std::fmt::Debug for LinearSvm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearSvm")
            .field("classes", &self.classes())
            .field("cost", &self.cost)
            .field("n_features", &self.n_features)
            .finish()
    }
}

impl Classifier for LinearSvm {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_rows(&self, x: &FeatureMatrix) -> Result<Vec<usize>, ModelError> {
        Ok(self
            .class_probabilities(x)?
            .iter()
            .map(|probs| self.machines[argmax(probs)].0)
            .collect())
    }
}

/// Fits [`LinearSvm`] models; tunes the cost `C`
#[derive(Debug, Clone)]
pub struct LinearSvmTrainer {
    tolerance: f64,
}

impl LinearSvmTrainer {
    pub fn new() -> Self {
        Self { tolerance: 1e-3 }
    }

    pub fn fit_svm(
        &self,
        x: &FeatureMatrix,
        y: &[usize],
        n_classes: usize,
        cost: f64,
    ) -> Result<LinearSvm, ModelError> {
        validate_training_data(x, y, n_classes)?;
        if !(cost > 0.0 && cost.is_finite()) {
            return Err(ModelError::InvalidHyperparameter {
                name: COST,
                value: cost,
            });
        }

        let records = to_array2(x)?;
        let params = Svm::<f64, Pr>::params()
            .pos_neg_weights(cost, cost)
            .eps(self.tolerance)
            .linear_kernel();

        // Machines are fitted one at a time: each holds an n x n kernel matrix while solving
        let mut machines = Vec::with_capacity(n_classes);
        for class in (0..n_classes).filter(|c| y.contains(c)) {
            let targets: Array1<bool> = y.iter().map(|&label| label == class).collect();
            let dataset = Dataset::new(records.clone(), targets);
            let machine = params.fit(&dataset).map_err(linfa_error)?;
            machines.push((class, machine));
        }

        Ok(LinearSvm {
            machines,
            n_features: x.ncols(),
            cost,
        })
    }
}

impl Default for LinearSvmTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Trainer for LinearSvmTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::LinearSvm
    }

    fn grid(&self, _n_features: usize) -> Vec<Hyperparameter> {
        COST_GRID
            .iter()
            .map(|&c| Hyperparameter::new(COST, c))
            .collect()
    }

    fn fit(
        &self,
        x: &FeatureMatrix,
        y: &[usize],
        n_classes: usize,
        hyperparameter: Hyperparameter,
    ) -> Result<Box<dyn Classifier>, ModelError> {
        Ok(Box::new(self.fit_svm(x, y, n_classes, hyperparameter.value)?))
    }
}
