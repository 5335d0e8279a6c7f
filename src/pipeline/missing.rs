//! Missing and empty value analysis

use anyhow::Result;
use polars::prelude::*;
use rayon::prelude::*;

/// Fraction of null cells per column, sorted by ratio descending
pub fn analyze_missing_values(df: &DataFrame) -> Result<Vec<(String, f64)>> {
    // Handle empty DataFrame
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let rows = df.height() as f64;
    let mut missing_ratios: Vec<(String, f64)> = df
        .get_columns()
        .iter()
        .map(|col| (col.name().to_string(), col.null_count() as f64 / rows))
        .collect();

    sort_descending(&mut missing_ratios);
    Ok(missing_ratios)
}

/// Fraction of empty or whitespace-only strings per column, sorted descending.
///
/// Only string columns can hold empty strings; every other column reports 0.
/// Nulls are not counted here (see [`analyze_missing_values`]).
pub fn analyze_empty_values(df: &DataFrame) -> Result<Vec<(String, f64)>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let rows = df.height() as f64;
    let mut empty_ratios: Vec<(String, f64)> = df
        .get_columns()
        .par_iter()
        .map(|col| -> Result<(String, f64)> {
            let empty = match col.dtype() {
                DataType::String => col
                    .str()?
                    .into_iter()
                    .filter(|v| matches!(v, Some(s) if s.trim().is_empty()))
                    .count(),
                _ => 0,
            };
            Ok((col.name().to_string(), empty as f64 / rows))
        })
        .collect::<Result<Vec<_>>>()?;

    sort_descending(&mut empty_ratios);
    Ok(empty_ratios)
}

fn sort_descending(ratios: &mut [(String, f64)]) {
    ratios.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
}

/// Columns whose ratio strictly exceeds `threshold`, never the protected column
pub fn get_features_above_threshold(
    ratios: &[(String, f64)],
    threshold: f64,
    protected_column: &str,
) -> Vec<String> {
    ratios
        .iter()
        .filter(|(name, ratio)| *ratio > threshold && name != protected_column)
        .map(|(name, _)| name.clone())
        .collect()
}
