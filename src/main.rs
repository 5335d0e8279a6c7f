//! Harvest: Activity Recognition CLI Tool
//!
//! Loads a training and an evaluation table, cleans them, explores correlations,
//! compares classifiers on a stratified hold-out and writes predictions.

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use console::style;

use harvest::cli::Cli;
use harvest::pipeline::{
    clean_tables, compare_models, correlation_matrix, find_correlated_pairs, label_correlations,
    load_dataset_with_progress, predict_evaluation, save_predictions, select_labels,
    stratified_split,
};
use harvest::report::{
    display_cleaning_summary, display_confusion_matrix, display_correlated_pairs,
    display_label_correlations, display_model_comparison, display_predictions,
    display_tuning_curve, export_run_report, ReportBuilderParams, RunReportBuilder, RunSummary,
    TimingInfo,
};
use harvest::utils::{
    create_spinner, finish_with_success, print_banner, print_completion, print_config,
    print_count, print_info, print_step_header, print_step_time, print_success, print_warning,
};

/// Rows shown in the predictions preview
const PREVIEW_ROWS: usize = 20;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.to_config();
    config.validate()?;

    let output_path = cli.output_path();
    let report_path = cli.report_path();
    let run_start = Instant::now();
    let mut timing = TimingInfo::default();

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&cli.training, &cli.evaluation, &output_path, &config);

    let mut report = RunReportBuilder::new(ReportBuilderParams {
        training_file: cli.training.display().to_string(),
        evaluation_file: cli.evaluation.display().to_string(),
        predictions_file: output_path.display().to_string(),
        config: config.clone(),
    });

    // Step 1: Load both tables
    print_step_header(1, "Load Data");
    let step_start = Instant::now();
    let (training, train_rows, train_cols, train_mb) =
        load_dataset_with_progress(&cli.training, cli.infer_schema_length)?;
    let (evaluation, eval_rows, eval_cols, eval_mb) =
        load_dataset_with_progress(&cli.evaluation, cli.infer_schema_length)?;
    print_success("Datasets loaded");

    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!(
        "      Training:   {} rows x {} columns ({:.2} MB)",
        train_rows, train_cols, train_mb
    );
    println!(
        "      Evaluation: {} rows x {} columns ({:.2} MB)",
        eval_rows, eval_cols, eval_mb
    );
    let elapsed = step_start.elapsed();
    timing.load_ms = elapsed.as_millis() as u64;
    print_step_time(elapsed);

    // Step 2: Cleaning
    print_step_header(2, "Clean Columns");
    let step_start = Instant::now();
    let spinner = create_spinner("Removing degenerate and metadata columns...");
    let cleaned = clean_tables(&training, &evaluation, &config)?;
    finish_with_success(&spinner, "Cleaning complete");

    print_count(
        "column(s) with missing or empty values",
        cleaned.summary.dropped_missing.len() + cleaned.summary.dropped_empty.len(),
        Some(&format!("(>{:.1}%)", config.missing_threshold * 100.0)),
    );
    print_count(
        "near-zero-variance column(s)",
        cleaned.summary.flagged_nzv().len(),
        Some(&format!("(policy: {})", config.nzv_policy)),
    );
    display_cleaning_summary(&cleaned.summary);
    report.set_cleaning(&cleaned.summary);

    let features = cleaned.training_features()?;
    let eval_features = cleaned.evaluation_features()?;
    print_info(&format!(
        "{} predictors kept for modelling",
        cleaned.feature_names.len()
    ));
    let elapsed = step_start.elapsed();
    timing.clean_ms = elapsed.as_millis() as u64;
    print_step_time(elapsed);

    // Step 3: Stratified split
    print_step_header(3, "Split Training Data");
    let step_start = Instant::now();
    let split = stratified_split(
        &cleaned.labels,
        config.n_classes(),
        config.split_fraction,
        config.seed,
    );
    let (fit_shares, validation_shares) =
        split.class_proportions(&cleaned.labels, config.n_classes());
    print_success(&format!(
        "Fit subset: {} rows, validation subset: {} rows",
        split.fit.len(),
        split.validation.len()
    ));
    for (level, (fit, val)) in config
        .levels
        .iter()
        .zip(fit_shares.iter().zip(&validation_shares))
    {
        println!(
            "      {}  fit {:>6.2}%  validation {:>6.2}%",
            style(level).cyan().bold(),
            fit * 100.0,
            val * 100.0
        );
    }
    report.set_split(&split, &cleaned.labels);

    let x_fit = features.select_rows(&split.fit);
    let y_fit = select_labels(&cleaned.labels, &split.fit);
    let x_val = features.select_rows(&split.validation);
    let y_val = select_labels(&cleaned.labels, &split.validation);
    print_step_time(step_start.elapsed());

    // Step 4: Correlation exploration on the fit subset
    print_step_header(4, "Explore Correlations");
    let step_start = Instant::now();
    let spinner = create_spinner("Computing correlation matrix...");
    let matrix = correlation_matrix(&x_fit, &cleaned.feature_names)?;
    let ranking = label_correlations(&x_fit, &cleaned.feature_names, &y_fit)?;
    let pairs = find_correlated_pairs(&matrix, config.correlation_threshold);
    finish_with_success(
        &spinner,
        &format!("Analyzed {} predictors", matrix.size()),
    );
    if !matrix.skipped_constant.is_empty() {
        print_warning(&format!(
            "Skipped {} constant predictor(s): {}",
            matrix.skipped_constant.len(),
            matrix.skipped_constant.join(", ")
        ));
    }
    display_label_correlations(&ranking, cli.top);
    display_correlated_pairs(&pairs, config.correlation_threshold, cli.top);
    report.set_correlation(&matrix, &ranking, &pairs);
    let elapsed = step_start.elapsed();
    timing.explore_ms = elapsed.as_millis() as u64;
    print_step_time(elapsed);

    // Step 5: Model comparison
    print_step_header(5, "Compare Models");
    let step_start = Instant::now();
    let comparison = compare_models(&x_fit, &y_fit, &x_val, &y_val, &config)?;
    for score in &comparison.scores {
        display_tuning_curve(&score.tuning);
    }
    for score in &comparison.scores {
        display_confusion_matrix(
            &format!("VALIDATION CONFUSION MATRIX: {}", score.kind.label()),
            &score.validation_confusion,
            &config.levels,
        );
    }
    display_model_comparison(&comparison.scores, comparison.selected);
    report.set_models(&comparison.scores, comparison.selected);
    let elapsed = step_start.elapsed();
    timing.compare_ms = elapsed.as_millis() as u64;
    print_step_time(elapsed);

    // Step 6: Final predictions
    print_step_header(6, "Predict Evaluation Table");
    let step_start = Instant::now();
    let selected = comparison.selected_score();
    print_info(&format!(
        "Using {} ({}), validation accuracy {:.2}%",
        selected.kind.label(),
        selected.hyperparameter,
        selected.validation_accuracy * 100.0
    ));
    let predictions = predict_evaluation(
        comparison.selected_artifact(),
        &eval_features,
        &cleaned.ids,
        &config.levels,
    )?;
    let spinner = create_spinner("Writing predictions...");
    save_predictions(&predictions, &config.id_column, &output_path)?;
    finish_with_success(&spinner, &format!("Saved to {}", output_path.display()));
    display_predictions(&predictions, &config.levels, PREVIEW_ROWS);
    report.set_predictions(&predictions);
    let elapsed = step_start.elapsed();
    timing.predict_ms = elapsed.as_millis() as u64;
    print_step_time(elapsed);

    timing.total_ms = run_start.elapsed().as_millis() as u64;
    report.set_timing(timing);

    if let Some(path) = &report_path {
        export_run_report(&report.build(), path)?;
        print_success(&format!("Run report written to {}", path.display()));
    }

    RunSummary {
        training_rows: train_rows,
        evaluation_rows: eval_rows,
        predictors: cleaned.feature_names.len(),
        fit_rows: split.fit.len(),
        validation_rows: split.validation.len(),
        selected_model: selected.kind.label().to_string(),
        validation_accuracy: selected.validation_accuracy,
        out_of_sample_error: selected.out_of_sample_error,
        elapsed_seconds: run_start.elapsed().as_secs_f64(),
    }
    .display();

    print_completion();

    Ok(())
}
