//! Run configuration shared by every pipeline stage

use anyhow::Result;
use serde::Serialize;

use super::cleaner::{NzvPolicy, DEFAULT_FREQ_CUT, DEFAULT_UNIQUE_CUT};
use super::validation::CvSettings;
use crate::models::{ModelKind, ModelSettings};

/// Default outcome levels of the `classe` label
pub const DEFAULT_LEVELS: [&str; 5] = ["A", "B", "C", "D", "E"];

/// Every tunable constant of an analysis run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisConfig {
    pub label_column: String,
    pub id_column: String,
    pub levels: Vec<String>,
    /// Drop columns whose missing (or empty) ratio exceeds this
    pub missing_threshold: f64,
    /// Leading columns holding identifiers, timestamps and window markers
    pub metadata_columns: usize,
    pub nzv_policy: NzvPolicy,
    pub nzv_freq_cut: f64,
    pub nzv_unique_cut: f64,
    /// Share of training rows that go to the fit subset
    pub split_fraction: f64,
    pub seed: u64,
    pub cv_folds: usize,
    pub cv_repeats: usize,
    /// Cumulative explained variance PCA must retain
    pub pca_variance: f64,
    pub forest_trees: usize,
    /// Pairs of predictors above this |r| are listed in the correlation report
    pub correlation_threshold: f64,
    pub models: Vec<ModelKind>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            label_column: "classe".to_string(),
            id_column: "problem_id".to_string(),
            levels: DEFAULT_LEVELS.iter().map(|s| s.to_string()).collect(),
            missing_threshold: 0.97,
            metadata_columns: 7,
            nzv_policy: NzvPolicy::Report,
            nzv_freq_cut: DEFAULT_FREQ_CUT,
            nzv_unique_cut: DEFAULT_UNIQUE_CUT,
            split_fraction: 0.7,
            seed: 50,
            cv_folds: 3,
            cv_repeats: 1,
            pca_variance: 0.99,
            forest_trees: 100,
            correlation_threshold: 0.8,
            models: ModelKind::ALL.to_vec(),
        }
    }
}

impl AnalysisConfig {
    /// Reject combinations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.levels.len() < 2 {
            anyhow::bail!("At least two label levels are required, got {:?}", self.levels);
        }
        let mut sorted = self.levels.clone();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != self.levels.len() {
            anyhow::bail!("Label levels must be distinct: {:?}", self.levels);
        }
        if !(0.0..=1.0).contains(&self.missing_threshold) {
            anyhow::bail!("Missing threshold must be in [0, 1], got {}", self.missing_threshold);
        }
        if !(self.split_fraction > 0.0 && self.split_fraction < 1.0) {
            anyhow::bail!("Split fraction must be in (0, 1), got {}", self.split_fraction);
        }
        if !(self.pca_variance > 0.0 && self.pca_variance <= 1.0) {
            anyhow::bail!("PCA variance must be in (0, 1], got {}", self.pca_variance);
        }
        if self.cv_folds < 2 {
            anyhow::bail!("Cross-validation needs at least 2 folds, got {}", self.cv_folds);
        }
        if self.cv_repeats == 0 {
            anyhow::bail!("Cross-validation needs at least 1 repeat");
        }
        if self.forest_trees == 0 {
            anyhow::bail!("Random forest needs at least 1 tree");
        }
        if self.models.is_empty() {
            anyhow::bail!("At least one model must be selected");
        }
        if self.label_column == self.id_column {
            anyhow::bail!("Label and identifier columns must differ");
        }
        Ok(())
    }

    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            seed: self.seed,
            forest_trees: self.forest_trees,
        }
    }

    pub fn cv_settings(&self) -> CvSettings {
        CvSettings {
            folds: self.cv_folds,
            repeats: self.cv_repeats,
            seed: self.seed,
            pca_variance: self.pca_variance,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.levels.len()
    }
}
