//! Tests for the CSV loader and schema validation

use harvest::pipeline::*;
use std::path::Path;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_load_har_tables_from_csv() {
    let (mut train, mut eval) = create_har_tables(120, 20, 3);
    let (_dir, train_path, eval_path) = create_temp_har_csvs(&mut train, &mut eval);

    let tables = load_tables(&train_path, &eval_path, 10000).unwrap();
    assert_shape(&tables.training, 120, train.width());
    assert_shape(&tables.evaluation, 20, eval.width());
    assert_has_columns(&tables.training, &["classe", "roll_belt", "num_window"]);
    assert_has_columns(&tables.evaluation, &["problem_id", "roll_belt"]);
}

#[test]
fn test_null_tokens_are_missing() {
    let (_dir, path) = create_temp_csv_text("a,b,c\n1,NA,x\n2,#DIV/0!,y\n3,4.5,\n");

    let df = load_dataset(&path, 100).unwrap();
    assert_eq!(df.column("b").unwrap().null_count(), 2);
    assert_eq!(df.column("a").unwrap().null_count(), 0);

    let ratios: std::collections::HashMap<_, _> =
        analyze_missing_values(&df).unwrap().into_iter().collect();
    assert!((ratios["b"] - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_short_row_is_parse_error() {
    let (_dir, path) = create_temp_csv_text("a,b,c\n1,2,3\n4,5\n6,7,8\n");
    let err = load_dataset(&path, 100).unwrap_err();
    assert!(err.to_string().contains("Failed to parse CSV file"), "{}", err);
    assert!(check_record_widths(&path).is_err());
}

#[test]
fn test_long_row_is_parse_error() {
    let (_dir, path) = create_temp_csv_text("a,b,c\n1,2,3\n4,5,6,7\n");
    assert!(load_dataset(&path, 100).is_err());
}

#[test]
fn test_quoted_commas_keep_record_width() {
    let (_dir, path) = create_temp_csv_text("a,b,c\n1,\"x,y\",3\n4,5,6\n");
    assert!(check_record_widths(&path).is_ok());
    let df = load_dataset(&path, 100).unwrap();
    assert_eq!(df.shape(), (2, 3));
}

#[test]
fn test_load_dataset_with_progress_reports_shape() {
    let mut df = create_har_dataframe(40, 1, true);
    let (_dir, path) = create_temp_csv(&mut df);

    let (loaded, rows, cols, memory_mb) = load_dataset_with_progress(&path, 100).unwrap();
    assert_eq!(rows, 40);
    assert_eq!(cols, df.width());
    assert_eq!(loaded.height(), 40);
    assert!(memory_mb > 0.0);
}

#[test]
fn test_get_column_names_reads_header() {
    let (_dir, path) = create_temp_csv_text("X,user_name,classe\n1,pedro,A\n");
    let names = get_column_names(&path).unwrap();
    assert_eq!(names, vec!["X", "user_name", "classe"]);
}

#[test]
fn test_missing_file_is_error() {
    let result = load_dataset(Path::new("/nonexistent/pml-training.csv"), 100);
    assert!(result.is_err());
}

#[test]
fn test_non_csv_extension_rejected() {
    let err = load_dataset(Path::new("data.parquet"), 100).unwrap_err();
    assert!(err.to_string().contains("Unsupported file format"));
}

#[test]
fn test_generated_tables_share_layout() {
    let (train, eval) = create_har_tables(50, 10, 7);
    assert!(validate_schemas(&train, &eval, "classe", "problem_id").is_ok());
}

#[test]
fn test_extra_evaluation_column_rejected() {
    let (train, mut eval) = create_har_tables(50, 10, 7);
    eval.with_column(polars::prelude::Column::new("extra".into(), vec![0i64; 10]))
        .unwrap();
    let err = validate_schemas(&train, &eval, "classe", "problem_id").unwrap_err();
    assert!(err.to_string().contains("columns"));
}
