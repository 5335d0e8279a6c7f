//! Tests for CLI argument parsing and the binary

use assert_cmd::Command;
use clap::Parser;
use harvest::cli::Cli;
use harvest::models::ModelKind;
use harvest::pipeline::NzvPolicy;
use predicates::prelude::*;
use std::path::PathBuf;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_cli_default_values() {
    let cli = Cli::parse_from(["harvest", "-i", "train.csv", "-e", "test.csv"]);

    assert_eq!(cli.label, "classe");
    assert_eq!(cli.id_column, "problem_id");
    assert_eq!(cli.levels, levels());
    assert_eq!(cli.missing_threshold, 0.97, "Default missing threshold should be 0.97");
    assert_eq!(cli.metadata_columns, 7);
    assert_eq!(cli.nzv_policy, NzvPolicy::Report);
    assert_eq!(cli.split, 0.7);
    assert_eq!(cli.seed, 50);
    assert_eq!(cli.cv_folds, 3);
    assert_eq!(cli.cv_repeats, 1);
    assert_eq!(cli.pca_variance, 0.99);
    assert_eq!(cli.forest_trees, 100);
    assert_eq!(cli.models, ModelKind::ALL.to_vec());
    assert!(!cli.no_report);
    assert_eq!(
        cli.infer_schema_length, 10000,
        "Default schema inference should be 10000"
    );
}

#[test]
fn test_default_config_matches_library_defaults() {
    let cli = Cli::parse_from(["harvest", "-i", "train.csv", "-e", "test.csv"]);
    let config = cli.to_config();
    assert_eq!(config, harvest::pipeline::AnalysisConfig::default());
    assert!(config.validate().is_ok());
}

#[test]
fn test_cli_custom_values() {
    let cli = Cli::parse_from([
        "harvest",
        "-i",
        "train.csv",
        "-e",
        "test.csv",
        "--missing-threshold",
        "0.9",
        "--nzv-policy",
        "drop",
        "--split",
        "0.6",
        "--seed",
        "7",
        "--cv-folds",
        "5",
        "--levels",
        "sit,stand,walk",
        "--models",
        "svm,rf",
    ]);
    let config = cli.to_config();

    assert_eq!(config.missing_threshold, 0.9);
    assert_eq!(config.nzv_policy, NzvPolicy::Drop);
    assert_eq!(config.split_fraction, 0.6);
    assert_eq!(config.seed, 7);
    assert_eq!(config.cv_folds, 5);
    assert_eq!(config.n_classes(), 3);
    assert_eq!(config.models, vec![ModelKind::LinearSvm, ModelKind::RandomForest]);
}

#[test]
fn test_duplicate_models_are_merged() {
    let cli = Cli::parse_from([
        "harvest", "-i", "train.csv", "-e", "test.csv", "--models", "rf,gbm,rf",
    ]);
    assert_eq!(
        cli.to_config().models,
        vec![ModelKind::RandomForest, ModelKind::GradientBoosting]
    );
}

#[test]
fn test_cli_output_path_derivation() {
    let cli = Cli::parse_from(["harvest", "-i", "/data/pml-training.csv", "-e", "/data/pml-testing.csv"]);

    assert_eq!(
        cli.output_path(),
        PathBuf::from("/data/pml-training_predictions.csv")
    );
    assert_eq!(
        cli.report_path(),
        Some(PathBuf::from("/data/pml-training_report.json"))
    );
}

#[test]
fn test_cli_explicit_paths() {
    let cli = Cli::parse_from([
        "harvest", "-i", "train.csv", "-e", "test.csv", "-o", "out.csv", "--report", "run.json",
    ]);
    assert_eq!(cli.output_path(), PathBuf::from("out.csv"));
    assert_eq!(cli.report_path(), Some(PathBuf::from("run.json")));
}

#[test]
fn test_no_report_disables_report() {
    let cli = Cli::parse_from(["harvest", "-i", "train.csv", "-e", "test.csv", "--no-report"]);
    assert_eq!(cli.report_path(), None);

    let result = Cli::try_parse_from([
        "harvest", "-i", "train.csv", "-e", "test.csv", "--no-report", "--report", "run.json",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_cli_rejects_invalid_values() {
    let invalid: [&[&str]; 7] = [
        &["--missing-threshold", "1.5"],
        &["--split", "1.0"],
        &["--split", "0"],
        &["--cv-folds", "1"],
        &["--pca-variance", "0"],
        &["--models", "knn"],
        &["--nzv-policy", "ignore"],
    ];
    for extra in invalid {
        let mut args = vec!["harvest", "-i", "train.csv", "-e", "test.csv"];
        args.extend_from_slice(extra);
        assert!(Cli::try_parse_from(&args).is_err(), "accepted {:?}", extra);
    }
}

#[test]
fn test_cli_requires_both_tables() {
    assert!(Cli::try_parse_from(["harvest", "-i", "train.csv"]).is_err());
    assert!(Cli::try_parse_from(["harvest", "-e", "test.csv"]).is_err());
}

#[test]
fn test_binary_help() {
    Command::cargo_bin("harvest")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--evaluation"))
        .stdout(predicate::str::contains("--pca-variance"));
}

#[test]
fn test_binary_missing_file_fails() {
    Command::cargo_bin("harvest")
        .unwrap()
        .args(["-i", "/nonexistent/train.csv", "-e", "/nonexistent/test.csv", "--no-report"])
        .assert()
        .failure();
}

#[test]
fn test_binary_end_to_end() {
    let (mut train, mut eval) = create_har_tables(200, 10, 31);
    let (dir, train_path, eval_path) = create_temp_har_csvs(&mut train, &mut eval);

    Command::cargo_bin("harvest")
        .unwrap()
        .arg("-i")
        .arg(&train_path)
        .arg("-e")
        .arg(&eval_path)
        .args(["--forest-trees", "10", "--models", "rf,svm"])
        .assert()
        .success();

    let predictions = dir.path().join("pml-training_predictions.csv");
    let report = dir.path().join("pml-training_report.json");
    assert!(predictions.exists());
    assert!(report.exists());

    let saved = std::fs::read_to_string(predictions).unwrap();
    assert_eq!(saved.lines().count(), 11);
    assert!(saved.starts_with("problem_id,predicted"));
}
