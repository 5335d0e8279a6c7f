//! Dataset loader for the training and evaluation CSV tables

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

use crate::utils::{create_spinner, finish_with_success};

/// Cell values read as missing in addition to empty fields
pub const NULL_TOKENS: [&str; 2] = ["NA", "#DIV/0!"];

/// The two input tables of a run
#[derive(Debug, Clone)]
pub struct LoadedTables {
    pub training: DataFrame,
    pub evaluation: DataFrame,
}

fn csv_reader(path: &Path, infer_schema_length: usize) -> Result<LazyCsvReader> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if extension != "csv" {
        anyhow::bail!(
            "Unsupported file format: '{}'. Supported formats: csv",
            extension
        );
    }

    // 0 means a full table scan for schema inference
    let infer = if infer_schema_length == 0 {
        None
    } else {
        Some(infer_schema_length)
    };

    let null_values = NullValues::AllColumns(NULL_TOKENS.iter().map(|s| (*s).into()).collect());

    Ok(LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(infer)
        .with_null_values(Some(null_values)))
}

/// Reject files where any record has a different field count than the header.
///
/// polars pads short rows with nulls, so the width check runs on a strict reader first.
pub fn check_record_widths(path: &Path) -> Result<()> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    let mut record = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .with_context(|| format!("Failed to parse CSV file: {}", path.display()))?
    {}
    Ok(())
}

/// Load a delimited table with a header row into memory
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    let reader = csv_reader(path, infer_schema_length)?;
    check_record_widths(path)?;
    reader
        .finish()
        .with_context(|| format!("Failed to load CSV file: {}", path.display()))?
        .collect()
        .with_context(|| format!("Failed to parse CSV file: {}", path.display()))
}

/// Load a dataset behind a spinner and report its shape.
///
/// Returns `(frame, rows, cols, estimated_memory_mb)`.
pub fn load_dataset_with_progress(
    path: &Path,
    infer_schema_length: usize,
) -> Result<(DataFrame, usize, usize, f64)> {
    let spinner = create_spinner(&format!("Loading {}...", path.display()));
    let df = load_dataset(path, infer_schema_length)?;
    let (rows, cols) = df.shape();
    let memory_mb = df.estimated_size() as f64 / (1024.0 * 1024.0);
    finish_with_success(
        &spinner,
        &format!("Loaded {} ({} rows x {} columns)", path.display(), rows, cols),
    );
    Ok((df, rows, cols, memory_mb))
}

/// Read only the header of a dataset
pub fn get_column_names(path: &Path) -> Result<Vec<String>> {
    let schema = csv_reader(path, 100)?
        .finish()
        .with_context(|| format!("Failed to load CSV file: {}", path.display()))?
        .collect_schema()
        .with_context(|| format!("Failed to read header of {}", path.display()))?;

    Ok(schema.iter_names().map(|s| s.to_string()).collect())
}

/// Load the training and evaluation tables
pub fn load_tables(
    training: &Path,
    evaluation: &Path,
    infer_schema_length: usize,
) -> Result<LoadedTables> {
    Ok(LoadedTables {
        training: load_dataset(training, infer_schema_length)?,
        evaluation: load_dataset(evaluation, infer_schema_length)?,
    })
}

/// Check that both tables share one column layout.
///
/// Column names must match position by position, except that the training table
/// carries the label column where the evaluation table carries the identifier.
pub fn validate_schemas(
    training: &DataFrame,
    evaluation: &DataFrame,
    label_column: &str,
    id_column: &str,
) -> Result<()> {
    let train_cols: Vec<String> = training
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let eval_cols: Vec<String> = evaluation
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let label_pos = train_cols
        .iter()
        .position(|c| c == label_column)
        .with_context(|| {
            format!(
                "Label column '{}' not found in training table. Available columns: {:?}",
                label_column, train_cols
            )
        })?;
    let id_pos = eval_cols
        .iter()
        .position(|c| c == id_column)
        .with_context(|| {
            format!(
                "Identifier column '{}' not found in evaluation table",
                id_column
            )
        })?;

    if train_cols.len() != eval_cols.len() {
        anyhow::bail!(
            "Training table has {} columns but evaluation table has {}",
            train_cols.len(),
            eval_cols.len()
        );
    }
    if label_pos != id_pos {
        anyhow::bail!(
            "Label column '{}' is at position {} but identifier column '{}' is at position {}",
            label_column,
            label_pos,
            id_column,
            id_pos
        );
    }

    let mismatched: Vec<String> = train_cols
        .iter()
        .zip(eval_cols.iter())
        .enumerate()
        .filter(|(i, (a, b))| *i != label_pos && a != b)
        .map(|(i, (a, b))| format!("#{}: '{}' vs '{}'", i, a, b))
        .collect();

    if !mismatched.is_empty() {
        anyhow::bail!(
            "Training and evaluation columns differ: {}",
            mismatched.join(", ")
        );
    }

    Ok(())
}
