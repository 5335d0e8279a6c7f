//! Column cleaning: degenerate and metadata column removal, label encoding
//!
//! Every drop decision is derived from the training table alone and then applied to
//! both tables by column name, so the two tables keep the same predictor layout.

use std::collections::HashMap;

use anyhow::{Context, Result};
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;

use super::config::AnalysisConfig;
use super::loader::validate_schemas;
use super::matrix::FeatureMatrix;
use super::missing::{analyze_empty_values, analyze_missing_values, get_features_above_threshold};

/// Default frequency-ratio cut for near-zero variance (95/5)
pub const DEFAULT_FREQ_CUT: f64 = 95.0 / 5.0;

/// Default percent-unique cut for near-zero variance
pub const DEFAULT_UNIQUE_CUT: f64 = 10.0;

/// What to do with columns flagged as near-zero variance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NzvPolicy {
    /// Report flagged columns but keep them
    #[default]
    Report,
    /// Drop flagged columns from both tables
    Drop,
}

impl std::fmt::Display for NzvPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NzvPolicy::Report => write!(f, "report"),
            NzvPolicy::Drop => write!(f, "drop"),
        }
    }
}

impl std::str::FromStr for NzvPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "report" => Ok(NzvPolicy::Report),
            "drop" => Ok(NzvPolicy::Drop),
            _ => Err(format!("Unknown NZV policy: '{}'. Use 'report' or 'drop'.", s)),
        }
    }
}

/// Near-zero-variance diagnostics for one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearZeroVariance {
    pub column: String,
    /// Count of the most common value over the count of the second most common.
    /// 0 when the column has fewer than two distinct values.
    pub freq_ratio: f64,
    /// Distinct non-null values as a percentage of rows
    pub percent_unique: f64,
    pub zero_var: bool,
    pub nzv: bool,
}

/// Per-stage record of what cleaning removed
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningSummary {
    pub initial_columns: usize,
    pub final_columns: usize,
    pub dropped_missing: Vec<String>,
    pub dropped_empty: Vec<String>,
    pub dropped_metadata: Vec<String>,
    pub dropped_nzv: Vec<String>,
    pub near_zero_variance: Vec<NearZeroVariance>,
}

impl CleaningSummary {
    pub fn new(initial_columns: usize) -> Self {
        Self {
            initial_columns,
            final_columns: initial_columns,
            ..Default::default()
        }
    }

    /// Columns flagged by the near-zero-variance check
    pub fn flagged_nzv(&self) -> Vec<&NearZeroVariance> {
        self.near_zero_variance.iter().filter(|d| d.nzv).collect()
    }

    pub fn total_dropped(&self) -> usize {
        self.dropped_missing.len()
            + self.dropped_empty.len()
            + self.dropped_metadata.len()
            + self.dropped_nzv.len()
    }
}

/// Both tables after cleaning, with the encoded label and evaluation identifiers
#[derive(Debug, Clone)]
pub struct CleanedTables {
    /// Predictors followed by the label column
    pub training: DataFrame,
    /// Predictors followed by the identifier column
    pub evaluation: DataFrame,
    pub feature_names: Vec<String>,
    /// Label as level indices into the configured level set
    pub labels: Vec<usize>,
    pub ids: Vec<String>,
    pub summary: CleaningSummary,
}

impl CleanedTables {
    pub fn training_features(&self) -> Result<FeatureMatrix> {
        FeatureMatrix::from_dataframe(&self.training, &self.feature_names)
            .context("Failed to build training predictor matrix")
    }

    pub fn evaluation_features(&self) -> Result<FeatureMatrix> {
        FeatureMatrix::from_dataframe(&self.evaluation, &self.feature_names)
            .context("Failed to build evaluation predictor matrix")
    }
}

fn drop_columns(df: &DataFrame, names: &[String]) -> DataFrame {
    if names.is_empty() {
        return df.clone();
    }
    df.drop_many(names.iter().map(|s| s.as_str()))
}

/// The first `n` columns, skipping any protected column
pub fn metadata_prefix(df: &DataFrame, n: usize, protected: &[&str]) -> Vec<String> {
    df.get_column_names()
        .iter()
        .take(n)
        .map(|s| s.to_string())
        .filter(|name| !protected.contains(&name.as_str()))
        .collect()
}

/// Counts of each distinct non-null value of a column
fn value_frequencies(col: &Column) -> Result<Vec<usize>> {
    if col.dtype().is_primitive_numeric() {
        let cast = col.cast(&DataType::Float64)?;
        let mut counts: HashMap<u64, usize> = HashMap::new();
        for value in cast.f64()?.into_iter().flatten() {
            // -0.0 and 0.0 are the same value
            let value = if value == 0.0 { 0.0 } else { value };
            *counts.entry(value.to_bits()).or_insert(0) += 1;
        }
        Ok(counts.into_values().collect())
    } else {
        let cast = col.cast(&DataType::String)?;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for value in cast.str()?.into_iter().flatten() {
            *counts.entry(value.to_string()).or_insert(0) += 1;
        }
        Ok(counts.into_values().collect())
    }
}

/// Near-zero-variance diagnostics for every column not in `exclude`.
///
/// A column is flagged when it has a single distinct value, or when its
/// most-common/second-most-common frequency ratio exceeds `freq_cut` while its
/// distinct values make up at most `unique_cut` percent of the rows.
pub fn near_zero_variance(
    df: &DataFrame,
    freq_cut: f64,
    unique_cut: f64,
    exclude: &[&str],
) -> Result<Vec<NearZeroVariance>> {
    let rows = df.height().max(1) as f64;

    df.get_columns()
        .par_iter()
        .filter(|col| !exclude.contains(&col.name().as_str()))
        .map(|col| -> Result<NearZeroVariance> {
            let mut freqs = value_frequencies(col)?;
            freqs.sort_unstable_by(|a, b| b.cmp(a));

            let distinct = freqs.len();
            let zero_var = distinct <= 1;
            let freq_ratio = if distinct >= 2 {
                freqs[0] as f64 / freqs[1] as f64
            } else {
                0.0
            };
            let percent_unique = distinct as f64 / rows * 100.0;
            let nzv = zero_var || (freq_ratio > freq_cut && percent_unique <= unique_cut);

            Ok(NearZeroVariance {
                column: col.name().to_string(),
                freq_ratio,
                percent_unique,
                zero_var,
                nzv,
            })
        })
        .collect()
}

/// Encode the label column as indices into the ordered level set.
///
/// Missing labels and values outside the level set are errors.
pub fn encode_labels(df: &DataFrame, label_column: &str, levels: &[String]) -> Result<Vec<usize>> {
    let column = df
        .column(label_column)
        .with_context(|| format!("Label column '{}' not found", label_column))?
        .cast(&DataType::String)?;

    let lookup: HashMap<&str, usize> = levels
        .iter()
        .enumerate()
        .map(|(i, level)| (level.as_str(), i))
        .collect();

    let mut codes = Vec::with_capacity(column.len());
    let mut unknown: Vec<String> = Vec::new();
    let mut missing = 0usize;

    for value in column.str()?.into_iter() {
        match value {
            Some(v) => match lookup.get(v.trim()) {
                Some(&code) => codes.push(code),
                None => {
                    if !unknown.iter().any(|u| u == v) {
                        unknown.push(v.to_string());
                    }
                }
            },
            None => missing += 1,
        }
    }

    if missing > 0 {
        anyhow::bail!(
            "Label column '{}' has {} missing value(s)",
            label_column,
            missing
        );
    }
    if !unknown.is_empty() {
        anyhow::bail!(
            "Label column '{}' contains values outside the level set {:?}: {:?}",
            label_column,
            levels,
            unknown
        );
    }

    Ok(codes)
}

/// Column values rendered as strings; nulls are an error
pub fn column_as_strings(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?
        .cast(&DataType::String)?;

    column
        .str()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.map(|s| s.to_string())
                .with_context(|| format!("Column '{}' has a missing value at row {}", name, i))
        })
        .collect()
}

/// Run every cleaning stage on both tables
pub fn clean_tables(
    training: &DataFrame,
    evaluation: &DataFrame,
    config: &AnalysisConfig,
) -> Result<CleanedTables> {
    let label = config.label_column.as_str();
    let id = config.id_column.as_str();

    validate_schemas(training, evaluation, label, id)?;

    let mut summary = CleaningSummary::new(training.width());

    // Stage 1: mostly-missing columns
    let missing_ratios = analyze_missing_values(training)?;
    let drops = get_features_above_threshold(&missing_ratios, config.missing_threshold, label);
    let mut training = drop_columns(training, &drops);
    let mut evaluation = drop_columns(evaluation, &drops);
    summary.dropped_missing = drops;

    // Stage 2: mostly-empty string columns
    let empty_ratios = analyze_empty_values(&training)?;
    let drops = get_features_above_threshold(&empty_ratios, config.missing_threshold, label);
    training = drop_columns(&training, &drops);
    evaluation = drop_columns(&evaluation, &drops);
    summary.dropped_empty = drops;

    // Stage 3: positional metadata prefix
    let drops = metadata_prefix(&training, config.metadata_columns, &[label]);
    training = drop_columns(&training, &drops);
    evaluation = drop_columns(&evaluation, &drops);
    summary.dropped_metadata = drops;

    // Stage 4: near-zero variance
    let diagnostics = near_zero_variance(
        &training,
        config.nzv_freq_cut,
        config.nzv_unique_cut,
        &[label],
    )?;
    if config.nzv_policy == NzvPolicy::Drop {
        let drops: Vec<String> = diagnostics
            .iter()
            .filter(|d| d.nzv)
            .map(|d| d.column.clone())
            .collect();
        training = drop_columns(&training, &drops);
        evaluation = drop_columns(&evaluation, &drops);
        summary.dropped_nzv = drops;
    }
    summary.near_zero_variance = diagnostics;

    // Stage 5: label as an ordered categorical
    let labels = encode_labels(&training, label, &config.levels)?;
    let ids = column_as_strings(&evaluation, id)?;

    let feature_names: Vec<String> = training
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|name| name != label)
        .collect();
    let eval_features: Vec<String> = evaluation
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|name| name != id)
        .collect();
    if feature_names != eval_features {
        anyhow::bail!(
            "Cleaned predictor sets differ between training ({}) and evaluation ({})",
            feature_names.len(),
            eval_features.len()
        );
    }

    summary.final_columns = training.width();

    Ok(CleanedTables {
        training,
        evaluation,
        feature_names,
        labels,
        ids,
        summary,
    })
}
