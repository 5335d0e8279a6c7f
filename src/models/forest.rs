//! Random forest: smartcore's bagged CART ensemble with per-split feature sampling

use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use super::{
    to_dense_matrix, validate_training_data, Classifier, Hyperparameter, ModelError, ModelKind,
    Trainer,
};
use crate::pipeline::FeatureMatrix;

/// Name of the searched hyperparameter (features tried per split)
pub const MTRY: &str = "mtry";

type Forest = RandomForestClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

fn smartcore_error(e: impl std::fmt::Display) -> ModelError {
    ModelError::Backend {
        library: "smartcore",
        message: e.to_string(),
    }
}

/// A fitted forest; predicts by majority vote
pub struct RandomForest {
    forest: Forest,
    n_features: usize,
    n_trees: usize,
    mtry: usize,
}

impl RandomForest {
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    pub fn mtry(&self) -> usize {
        self.mtry
    }
}

impl std::fmt::Debug for RandomForest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomForest")
            .field("n_trees", &self.n_trees)
            .field("mtry", &self.mtry)
            .field("n_features", &self.n_features)
            .finish()
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_rows(&self, x: &FeatureMatrix) -> Result<Vec<usize>, ModelError> {
        let dense = to_dense_matrix(x)?;
        let predicted = self.forest.predict(&dense).map_err(smartcore_error)?;
        Ok(predicted.into_iter().map(|class| class as usize).collect())
    }
}

/// Fits [`RandomForest`] models; tunes `mtry`
#[derive(Debug, Clone)]
pub struct RandomForestTrainer {
    n_trees: usize,
    seed: u64,
}

impl RandomForestTrainer {
    pub fn new(n_trees: usize, seed: u64) -> Self {
        Self { n_trees, seed }
    }

    pub fn fit_forest(
        &self,
        x: &FeatureMatrix,
        y: &[usize],
        n_classes: usize,
        mtry: usize,
    ) -> Result<RandomForest, ModelError> {
        validate_training_data(x, y, n_classes)?;
        let n_trees = u16::try_from(self.n_trees)
            .ok()
            .filter(|&n| n > 0)
            .ok_or(ModelError::InvalidHyperparameter {
                name: "n_trees",
                value: self.n_trees as f64,
            })?;

        let mtry = mtry.clamp(1, x.ncols().max(1));
        let params = RandomForestClassifierParameters::default()
            .with_n_trees(n_trees)
            .with_m(mtry)
            .with_seed(self.seed);

        let dense = to_dense_matrix(x)?;
        let labels: Vec<i32> = y.iter().map(|&class| class as i32).collect();
        let forest = RandomForestClassifier::fit(&dense, &labels, params).map_err(smartcore_error)?;

        Ok(RandomForest {
            forest,
            n_features: x.ncols(),
            n_trees: self.n_trees,
            mtry,
        })
    }
}

impl Trainer for RandomForestTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    /// `{2, (2 + p) / 2, p}`, clamped to `[1, p]` and deduplicated
    fn grid(&self, n_features: usize) -> Vec<Hyperparameter> {
        let p = n_features.max(1);
        let mut values: Vec<usize> = [2, (2 + p) / 2, p]
            .iter()
            .map(|&m| m.clamp(1, p))
            .collect();
        values.sort_unstable();
        values.dedup();
        values
            .into_iter()
            .map(|m| Hyperparameter::new(MTRY, m as f64))
            .collect()
    }

    fn fit(
        &self,
        x: &FeatureMatrix,
        y: &[usize],
        n_classes: usize,
        hyperparameter: Hyperparameter,
    ) -> Result<Box<dyn Classifier>, ModelError> {
        let mtry = hyperparameter.as_count()?;
        Ok(Box::new(self.fit_forest(x, y, n_classes, mtry)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (FeatureMatrix, Vec<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for class in 0..3usize {
            for i in 0..20 {
                let jitter = (i as f64) * 0.01;
                rows.push(vec![class as f64 * 5.0 + jitter, 1.0 - jitter, (i % 3) as f64]);
                labels.push(class);
            }
        }
        (FeatureMatrix::from_rows(&rows).unwrap(), labels)
    }

    #[test]
    fn test_grid_for_many_features() {
        let trainer = RandomForestTrainer::new(10, 1);
        let values: Vec<f64> = trainer.grid(36).iter().map(|h| h.value).collect();
        assert_eq!(values, vec![2.0, 19.0, 36.0]);
    }

    #[test]
    fn test_grid_deduplicates_for_few_features() {
        let trainer = RandomForestTrainer::new(10, 1);
        let values: Vec<f64> = trainer.grid(2).iter().map(|h| h.value).collect();
        assert_eq!(values, vec![2.0]);
        let values: Vec<f64> = trainer.grid(1).iter().map(|h| h.value).collect();
        assert_eq!(values, vec![1.0]);
    }

    #[test]
    fn test_forest_fits_separable_data() {
        let (x, y) = blobs();
        let forest = RandomForestTrainer::new(15, 3).fit_forest(&x, &y, 3, 3).unwrap();
        assert_eq!(forest.n_trees(), 15);
        assert_eq!(forest.mtry(), 3);
        let predictions = forest.predict(&x).unwrap();
        let correct = predictions.iter().zip(&y).filter(|(p, a)| p == a).count();
        assert_eq!(correct, y.len());
    }

    #[test]
    fn test_mtry_is_clamped_to_width() {
        let (x, y) = blobs();
        let forest = RandomForestTrainer::new(3, 1).fit_forest(&x, &y, 3, 50).unwrap();
        assert_eq!(forest.mtry(), 3);
    }

    #[test]
    fn test_forest_is_deterministic_for_seed() {
        let (x, y) = blobs();
        let trainer = RandomForestTrainer::new(8, 42);
        let a = trainer.fit_forest(&x, &y, 3, 1).unwrap();
        let b = trainer.fit_forest(&x, &y, 3, 1).unwrap();
        let queries = FeatureMatrix::from_rows(&[vec![2.5, 0.5, 1.0], vec![7.5, 0.9, 2.0]]).unwrap();
        assert_eq!(a.predict(&queries).unwrap(), b.predict(&queries).unwrap());
    }

    #[test]
    fn test_zero_trees_is_error() {
        let (x, y) = blobs();
        let err = RandomForestTrainer::new(0, 1).fit_forest(&x, &y, 3, 1);
        assert!(matches!(err, Err(ModelError::InvalidHyperparameter { .. })));
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let (x, y) = blobs();
        let forest = RandomForestTrainer::new(3, 1).fit_forest(&x, &y, 3, 1).unwrap();
        let narrow = FeatureMatrix::from_rows(&[vec![1.0]]).unwrap();
        assert!(matches!(
            forest.predict(&narrow),
            Err(ModelError::DimensionMismatch { expected: 3, actual: 1 })
        ));
    }
}
