//! Multinomial gradient-boosted trees
//!
//! Each boosting round fits one small regression tree per class to the softmax
//! residuals `1{y = k} - p_k`, with a one-step Newton estimate as the leaf value:
//! `(K - 1) / K * sum(r) / sum(|r| (1 - |r|))`. Rows are subsampled without
//! replacement each round (stochastic boosting).

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::tree::{grow_tree, DecisionTree, SplitTarget, TreeParams};
use super::{argmax, validate_training_data, Classifier, Hyperparameter, ModelError, ModelKind, Trainer};
use crate::pipeline::FeatureMatrix;

/// Name of the searched hyperparameter (boosting rounds)
pub const N_ROUNDS: &str = "n_trees";

const DEFAULT_SHRINKAGE: f64 = 0.1;
const DEFAULT_MAX_DEPTH: usize = 3;
const DEFAULT_MIN_SAMPLES_LEAF: usize = 10;
const DEFAULT_SUBSAMPLE: f64 = 0.5;
const ROUND_GRID: [usize; 3] = [50, 100, 150];

/// Running residual sums for a node
#[derive(Debug, Clone, Copy, Default)]
pub struct ResidualSums {
    sum: f64,
    count: usize,
}

/// Regression target over softmax residuals with Newton leaf values
struct NewtonTarget<'a> {
    residuals: &'a [f64],
    scale: f64,
}

impl SplitTarget for NewtonTarget<'_> {
    type Leaf = f64;
    type Stats = ResidualSums;

    fn empty_stats(&self) -> ResidualSums {
        ResidualSums::default()
    }

    fn add(&self, stats: &mut ResidualSums, row: usize) {
        stats.sum += self.residuals[row];
        stats.count += 1;
    }

    fn remove(&self, stats: &mut ResidualSums, row: usize) {
        stats.sum -= self.residuals[row];
        stats.count -= 1;
    }

    fn purity(&self, stats: &ResidualSums) -> f64 {
        if stats.count == 0 {
            return 0.0;
        }
        stats.sum * stats.sum / stats.count as f64
    }

    fn is_pure(&self, stats: &ResidualSums) -> bool {
        stats.count <= 1
    }

    fn leaf(&self, rows: &[usize], stats: &ResidualSums) -> f64 {
        let denominator: f64 = rows
            .iter()
            .map(|&row| {
                let r = self.residuals[row].abs();
                r * (1.0 - r)
            })
            .sum();
        if denominator < 1e-12 {
            return 0.0;
        }
        self.scale * stats.sum / denominator
    }
}

/// A fitted boosted ensemble: per-class additive scores, predicted by argmax
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    init: Vec<f64>,
    rounds: Vec<Vec<DecisionTree<f64>>>,
    shrinkage: f64,
    n_features: usize,
}

impl GradientBoosting {
    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Raw per-class scores (log-odds scale)
    pub fn decision_scores(&self, row: &[f64]) -> Vec<f64> {
        let mut scores = self.init.clone();
        for trees in &self.rounds {
            for (score, tree) in scores.iter_mut().zip(trees) {
                *score += self.shrinkage * tree.predict_row(row);
            }
        }
        scores
    }

    /// Class probabilities via softmax of the decision scores
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut scores = self.decision_scores(row);
        softmax_in_place(&mut scores);
        scores
    }
}

impl Classifier for GradientBoosting {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_rows(&self, x: &FeatureMatrix) -> Result<Vec<usize>, ModelError> {
        Ok((0..x.nrows())
            .into_par_iter()
            .map(|i| argmax(&self.decision_scores(x.row(i))))
            .collect())
    }
}

fn softmax_in_place(scores: &mut [f64]) {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut total = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        total += *s;
    }
    for s in scores.iter_mut() {
        *s /= total;
    }
}

/// Fits [`GradientBoosting`] models; tunes the number of rounds
#[derive(Debug, Clone)]
pub struct GradientBoostingTrainer {
    seed: u64,
    shrinkage: f64,
    max_depth: usize,
    min_samples_leaf: usize,
    subsample: f64,
}

impl GradientBoostingTrainer {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            shrinkage: DEFAULT_SHRINKAGE,
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_leaf: DEFAULT_MIN_SAMPLES_LEAF,
            subsample: DEFAULT_SUBSAMPLE,
        }
    }

    pub fn fit_boosting(
        &self,
        x: &FeatureMatrix,
        y: &[usize],
        n_classes: usize,
        n_rounds: usize,
    ) -> Result<GradientBoosting, ModelError> {
        validate_training_data(x, y, n_classes)?;
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ModelError::InvalidHyperparameter {
                name: "subsample",
                value: self.subsample,
            });
        }

        let n = x.nrows();
        let k = n_classes;
        let scale = (k as f64 - 1.0) / k as f64;
        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: 2 * self.min_samples_leaf,
            min_samples_leaf: self.min_samples_leaf,
            max_features: None,
        };

        // Start from smoothed log class priors
        let mut counts = vec![0usize; k];
        for &label in y {
            counts[label] += 1;
        }
        let init: Vec<f64> = counts
            .iter()
            .map(|&c| ((c as f64 + 1.0) / (n as f64 + k as f64)).ln())
            .collect();

        let mut scores: Vec<f64> = (0..n).flat_map(|_| init.iter().copied()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let bag_size = ((n as f64 * self.subsample).round() as usize).clamp(1, n);
        let mut rounds = Vec::with_capacity(n_rounds);

        for _ in 0..n_rounds {
            let mut probs = scores.clone();
            probs.par_chunks_mut(k).for_each(softmax_in_place);

            let bag: Vec<usize> = if bag_size < n {
                sample(&mut rng, n, bag_size).into_vec()
            } else {
                (0..n).collect()
            };
            let tree_seeds: Vec<u64> = (0..k).map(|_| rng.gen()).collect();

            let trees: Vec<DecisionTree<f64>> = (0..k)
                .into_par_iter()
                .map(|class| {
                    let residuals: Vec<f64> = (0..n)
                        .map(|i| {
                            let indicator = if y[i] == class { 1.0 } else { 0.0 };
                            indicator - probs[i * k + class]
                        })
                        .collect();
                    let target = NewtonTarget {
                        residuals: &residuals,
                        scale,
                    };
                    let mut tree_rng = StdRng::seed_from_u64(tree_seeds[class]);
                    grow_tree(x, &target, bag.clone(), &params, &mut tree_rng)
                })
                .collect();

            let shrinkage = self.shrinkage;
            scores
                .par_chunks_mut(k)
                .enumerate()
                .for_each(|(i, row_scores)| {
                    let row = x.row(i);
                    for (score, tree) in row_scores.iter_mut().zip(&trees) {
                        *score += shrinkage * tree.predict_row(row);
                    }
                });

            rounds.push(trees);
        }

        Ok(GradientBoosting {
            init,
            rounds,
            shrinkage: self.shrinkage,
            n_features: x.ncols(),
        })
    }
}

impl Trainer for GradientBoostingTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::GradientBoosting
    }

    fn grid(&self, _n_features: usize) -> Vec<Hyperparameter> {
        ROUND_GRID
            .iter()
            .map(|&r| Hyperparameter::new(N_ROUNDS, r as f64))
            .collect()
    }

    fn fit(
        &self,
        x: &FeatureMatrix,
        y: &[usize],
        n_classes: usize,
        hyperparameter: Hyperparameter,
    ) -> Result<Box<dyn Classifier>, ModelError> {
        let n_rounds = hyperparameter.as_count()?;
        Ok(Box::new(self.fit_boosting(x, y, n_classes, n_rounds)?))
    }
}
