//! Shared test utilities and fixture generators

#![allow(dead_code)]

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::TempDir;

use harvest::pipeline::AnalysisConfig;

/// Sensor predictors that survive cleaning, in table order
pub const SENSOR_COLUMNS: [&str; 8] = [
    "roll_belt",
    "pitch_belt",
    "yaw_belt",
    "total_accel_belt",
    "gyros_arm_x",
    "accel_arm_y",
    "magnet_dumbbell_z",
    "roll_forearm",
];

/// Leading identifier, timestamp and window columns
pub const METADATA_COLUMNS: [&str; 7] = [
    "X",
    "user_name",
    "raw_timestamp_part_1",
    "raw_timestamp_part_2",
    "cvtd_timestamp",
    "new_window",
    "num_window",
];

/// Summary-statistic columns only filled on window boundaries
pub const SPARSE_COLUMNS: [&str; 2] = ["kurtosis_roll_belt", "max_roll_belt"];

/// Summary-statistic column stored as text, almost always empty
pub const EMPTY_COLUMN: &str = "skewness_yaw_belt";

pub const LEVELS: [&str; 5] = ["A", "B", "C", "D", "E"];

const USERS: [&str; 6] = ["adelmo", "carlitos", "charles", "eurico", "jeremy", "pedro"];

/// Class centre order per sensor, so no single sensor ranks the classes the same way
const CENTRE_ORDER: [[usize; 5]; 8] = [
    [0, 1, 2, 3, 4],
    [4, 3, 2, 1, 0],
    [2, 0, 4, 1, 3],
    [1, 3, 0, 4, 2],
    [3, 4, 1, 0, 2],
    [0, 2, 4, 1, 3],
    [4, 1, 3, 0, 2],
    [2, 4, 1, 3, 0],
];

pub fn levels() -> Vec<String> {
    LEVELS.iter().map(|s| s.to_string()).collect()
}

/// Build a table laid out like the wearable-sensor data.
///
/// Columns: 7 metadata columns, 8 sensor predictors whose class centres are well
/// separated, 2 numeric columns that are 98% missing, 1 text column that is 99%
/// empty, then `last_column` (the label for training, a 1-based identifier for
/// evaluation).
pub fn create_har_dataframe(rows: usize, seed: u64, training: bool) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let classes: Vec<usize> = (0..rows).map(|i| (i + rng.gen_range(0..5)) % 5).collect();

    let mut columns: Vec<Column> = Vec::new();

    // Metadata
    columns.push(Column::new("X".into(), (1..=rows as i64).collect::<Vec<i64>>()));
    columns.push(Column::new(
        "user_name".into(),
        (0..rows).map(|i| USERS[i % USERS.len()]).collect::<Vec<&str>>(),
    ));
    columns.push(Column::new(
        "raw_timestamp_part_1".into(),
        (0..rows).map(|i| 1_322_489_729 + (i as i64 / 20)).collect::<Vec<i64>>(),
    ));
    columns.push(Column::new(
        "raw_timestamp_part_2".into(),
        (0..rows).map(|_| rng.gen_range(0..1_000_000i64)).collect::<Vec<i64>>(),
    ));
    columns.push(Column::new(
        "cvtd_timestamp".into(),
        (0..rows)
            .map(|i| format!("28/11/2011 14:{:02}", i % 60))
            .collect::<Vec<String>>(),
    ));
    columns.push(Column::new(
        "new_window".into(),
        (0..rows)
            .map(|i| if i % 50 == 0 { "yes" } else { "no" })
            .collect::<Vec<&str>>(),
    ));
    columns.push(Column::new(
        "num_window".into(),
        (0..rows).map(|i| (i / 25) as i64 + 1).collect::<Vec<i64>>(),
    ));

    // Sensors
    for (j, name) in SENSOR_COLUMNS.iter().enumerate() {
        let spacing = 10.0 * (j + 1) as f64;
        let values: Vec<f64> = classes
            .iter()
            .map(|&c| {
                let centre = CENTRE_ORDER[j][c] as f64 * spacing - 2.0 * spacing;
                centre + rng.gen_range(-0.3..0.3) * spacing
            })
            .collect();
        columns.push(Column::new((*name).into(), values));
    }

    // Sparse window statistics, filled on window boundaries of the training table only
    for name in SPARSE_COLUMNS {
        let values: Vec<Option<f64>> = (0..rows)
            .map(|i| (training && i % 50 == 0).then(|| rng.gen_range(-3.0..3.0)))
            .collect();
        columns.push(Column::new(name.into(), values));
    }

    let empties: Vec<Option<&str>> = (0..rows)
        .map(|i| {
            if training && i % 100 == 0 {
                Some("#DIV/0!")
            } else {
                Some("")
            }
        })
        .collect();
    columns.push(Column::new(EMPTY_COLUMN.into(), empties));

    if training {
        columns.push(Column::new(
            "classe".into(),
            classes.iter().map(|&c| LEVELS[c]).collect::<Vec<&str>>(),
        ));
    } else {
        columns.push(Column::new(
            "problem_id".into(),
            (1..=rows as i64).collect::<Vec<i64>>(),
        ));
    }

    DataFrame::new(columns).unwrap()
}

/// Training and evaluation tables sharing one layout
pub fn create_har_tables(train_rows: usize, eval_rows: usize, seed: u64) -> (DataFrame, DataFrame) {
    (
        create_har_dataframe(train_rows, seed, true),
        create_har_dataframe(eval_rows, seed.wrapping_add(1), false),
    )
}

/// Write both tables as CSV into a fresh temporary directory
pub fn create_temp_har_csvs(
    training: &mut DataFrame,
    evaluation: &mut DataFrame,
) -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let train_path = temp_dir.path().join("pml-training.csv");
    let eval_path = temp_dir.path().join("pml-testing.csv");

    for (df, path) in [(training, &train_path), (evaluation, &eval_path)] {
        let mut file = std::fs::File::create(path).unwrap();
        CsvWriter::new(&mut file).finish(df).unwrap();
    }

    (temp_dir, train_path, eval_path)
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Write raw CSV text to a temporary file
pub fn create_temp_csv_text(text: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("raw.csv");
    std::fs::write(&csv_path, text).unwrap();
    (temp_dir, csv_path)
}

/// Configuration small enough for fast end-to-end tests
pub fn fast_config() -> AnalysisConfig {
    AnalysisConfig {
        forest_trees: 15,
        ..AnalysisConfig::default()
    }
}

/// Assert that a DataFrame has expected shape
pub fn assert_shape(df: &DataFrame, expected_rows: usize, expected_cols: usize) {
    let (rows, cols) = df.shape();
    assert_eq!(rows, expected_rows, "Row count mismatch: expected {}, got {}", expected_rows, rows);
    assert_eq!(cols, expected_cols, "Column count mismatch: expected {}, got {}", expected_cols, cols);
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}

/// Assert that a DataFrame does NOT contain specific columns
pub fn assert_missing_columns(df: &DataFrame, unexpected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in unexpected_cols {
        assert!(
            !actual_cols.contains(&col.to_string()),
            "Unexpected column still present: '{}'",
            col
        );
    }
}
