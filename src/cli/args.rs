//! Command-line argument definitions using clap

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::models::ModelKind;
use crate::pipeline::{AnalysisConfig, NzvPolicy};

/// Harvest - Clean, explore and model wearable-sensor activity data
#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Training table (CSV with a header row and the label column)
    #[arg(short = 'i', long)]
    pub training: PathBuf,

    /// Evaluation table (CSV with the same layout, identifier in place of the label)
    #[arg(short = 'e', long)]
    pub evaluation: PathBuf,

    /// Predictions output path.
    /// Defaults to the training directory with a '_predictions.csv' suffix.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON run report path.
    /// Defaults to the training directory with a '_report.json' suffix.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Do not write the JSON run report
    #[arg(long, default_value = "false", conflicts_with = "report")]
    pub no_report: bool,

    /// Label column of the training table
    #[arg(long, default_value = "classe")]
    pub label: String,

    /// Identifier column of the evaluation table
    #[arg(long, default_value = "problem_id")]
    pub id_column: String,

    /// Label levels in order (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "A,B,C,D,E")]
    pub levels: Vec<String>,

    /// Missing value threshold - drop columns whose missing (or empty) ratio exceeds this
    #[arg(long, default_value = "0.97", value_parser = validate_unit_interval)]
    pub missing_threshold: f64,

    /// Number of leading metadata columns to drop (identifiers, timestamps, windows)
    #[arg(long, default_value = "7")]
    pub metadata_columns: usize,

    /// What to do with near-zero-variance columns: "report" (default) or "drop"
    #[arg(long, default_value = "report")]
    pub nzv_policy: NzvPolicy,

    /// Near-zero-variance frequency-ratio cut (most common / second most common)
    #[arg(long, default_value = "19.0")]
    pub nzv_freq_cut: f64,

    /// Near-zero-variance percent-unique cut (0-100)
    #[arg(long, default_value = "10.0", value_parser = validate_percent)]
    pub nzv_unique_cut: f64,

    /// Share of training rows used for fitting; the rest is held out for validation
    #[arg(long, default_value = "0.7", value_parser = validate_open_unit_interval)]
    pub split: f64,

    /// Seed for the split, fold shuffles and every model
    #[arg(long, default_value = "50")]
    pub seed: u64,

    /// Number of cross-validation folds
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u64).range(2..))]
    pub cv_folds: u64,

    /// Number of cross-validation repeats
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    pub cv_repeats: u64,

    /// Cumulative variance the PCA preprocessing must retain
    #[arg(long, default_value = "0.99", value_parser = validate_open_unit_interval_inclusive)]
    pub pca_variance: f64,

    /// Number of trees in the random forest
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u64).range(1..))]
    pub forest_trees: u64,

    /// Correlation threshold for listing highly correlated predictor pairs
    #[arg(long, default_value = "0.8", value_parser = validate_unit_interval)]
    pub correlation_threshold: f64,

    /// Models to compare (comma-separated): rf, gbm, svm
    #[arg(long, value_delimiter = ',', default_value = "rf,gbm,svm")]
    pub models: Vec<ModelKind>,

    /// Number of predictors shown in the label correlation ranking
    #[arg(long, default_value = "15")]
    pub top: usize,

    /// Number of rows to use for schema inference.
    /// Use 0 for full table scan.
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,
}

impl Cli {
    /// Predictions path, derived from the training file when not given
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| derived_path(&self.training, "predictions.csv"))
    }

    /// JSON report path, or `None` with `--no-report`
    pub fn report_path(&self) -> Option<PathBuf> {
        if self.no_report {
            return None;
        }
        Some(
            self.report
                .clone()
                .unwrap_or_else(|| derived_path(&self.training, "report.json")),
        )
    }

    /// Run configuration from the parsed flags
    pub fn to_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            label_column: self.label.clone(),
            id_column: self.id_column.clone(),
            levels: self.levels.clone(),
            missing_threshold: self.missing_threshold,
            metadata_columns: self.metadata_columns,
            nzv_policy: self.nzv_policy,
            nzv_freq_cut: self.nzv_freq_cut,
            nzv_unique_cut: self.nzv_unique_cut,
            split_fraction: self.split,
            seed: self.seed,
            cv_folds: self.cv_folds as usize,
            cv_repeats: self.cv_repeats as usize,
            pca_variance: self.pca_variance,
            forest_trees: self.forest_trees as usize,
            correlation_threshold: self.correlation_threshold,
            models: dedup_models(&self.models),
        }
    }
}

/// `<dir>/<stem>_<suffix>` next to `input`
fn derived_path(input: &Path, suffix: &str) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("harvest");
    parent.join(format!("{}_{}", stem, suffix))
}

/// Keep the first occurrence of each model, preserving order
fn dedup_models(models: &[ModelKind]) -> Vec<ModelKind> {
    let mut unique = Vec::with_capacity(models.len());
    for kind in models {
        if !unique.contains(kind) {
            unique.push(*kind);
        }
    }
    unique
}

fn parse_number(s: &str) -> Result<f64, String> {
    s.parse()
        .map_err(|_| format!("'{}' is not a valid number", s))
}

/// Validator for ratios in [0, 1]
fn validate_unit_interval(s: &str) -> Result<f64, String> {
    let value = parse_number(s)?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!("value must be between 0.0 and 1.0, got {}", value))
    } else {
        Ok(value)
    }
}

/// Validator for fractions in (0, 1)
fn validate_open_unit_interval(s: &str) -> Result<f64, String> {
    let value = parse_number(s)?;
    if value <= 0.0 || value >= 1.0 {
        Err(format!("value must be strictly between 0.0 and 1.0, got {}", value))
    } else {
        Ok(value)
    }
}

/// Validator for fractions in (0, 1]
fn validate_open_unit_interval_inclusive(s: &str) -> Result<f64, String> {
    let value = parse_number(s)?;
    if value <= 0.0 || value > 1.0 {
        Err(format!("value must be in (0.0, 1.0], got {}", value))
    } else {
        Ok(value)
    }
}

/// Validator for percentages
fn validate_percent(s: &str) -> Result<f64, String> {
    let value = parse_number(s)?;
    if !(0.0..=100.0).contains(&value) {
        Err(format!("value must be between 0.0 and 100.0, got {}", value))
    } else {
        Ok(value)
    }
}
