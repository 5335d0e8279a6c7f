//! Terminal tables for every stage of a run

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;

use crate::pipeline::{
    prediction_counts, CleaningSummary, ConfusionMatrix, CorrelatedPair, LabelCorrelation,
    ModelScore, Prediction, TuningResult,
};

/// Width of the tuning-curve bar column
const BAR_WIDTH: usize = 30;

fn print_section(icon: &str, title: &str) {
    println!();
    println!("    {} {}", style(icon).cyan(), style(title).white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn count_cell(count: usize) -> Cell {
    Cell::new(count).fg(if count == 0 { Color::White } else { Color::Red })
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn optional_percent(value: Option<f64>) -> String {
    value.map(percent).unwrap_or_else(|| "-".to_string())
}

fn print_name_list(title: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    println!();
    println!(
        "      {} {}:",
        style(title).yellow(),
        style(format!("({})", names.len())).dim()
    );
    for name in names {
        println!("        {} {}", style("•").dim(), name);
    }
}

/// Column counts per cleaning stage, followed by the dropped names
pub fn display_cleaning_summary(summary: &CleaningSummary) {
    print_section("🧹", "CLEANING SUMMARY");

    let mut table = new_table(&["Metric", "Value"]);
    table.add_row(vec![Cell::new("📁 Initial Columns"), Cell::new(summary.initial_columns)]);
    table.add_row(vec![
        Cell::new("🗑️  Dropped (Missing)"),
        count_cell(summary.dropped_missing.len()),
    ]);
    table.add_row(vec![
        Cell::new("🗑️  Dropped (Empty)"),
        count_cell(summary.dropped_empty.len()),
    ]);
    table.add_row(vec![
        Cell::new("🏷️  Dropped (Metadata)"),
        count_cell(summary.dropped_metadata.len()),
    ]);
    table.add_row(vec![
        Cell::new("📉 Dropped (Near-zero variance)"),
        count_cell(summary.dropped_nzv.len()),
    ]);
    table.add_row(vec![
        Cell::new("🔎 Flagged (Near-zero variance)"),
        Cell::new(summary.flagged_nzv().len()).fg(Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("✅ Final Columns"),
        Cell::new(summary.final_columns)
            .fg(Color::Green)
            .add_attribute(Attribute::Bold),
    ]);
    print_indented(&table);

    print_name_list("Metadata", &summary.dropped_metadata);
    print_name_list("Near-zero variance (dropped)", &summary.dropped_nzv);
    let flagged: Vec<String> = summary
        .flagged_nzv()
        .iter()
        .filter(|d| !summary.dropped_nzv.contains(&d.column))
        .map(|d| {
            format!(
                "{} (freq ratio {:.2}, {:.2}% unique)",
                d.column, d.freq_ratio, d.percent_unique
            )
        })
        .collect();
    print_name_list("Near-zero variance (kept)", &flagged);
}

/// The `top_n` predictors most correlated with the label
pub fn display_label_correlations(ranking: &[LabelCorrelation], top_n: usize) {
    print_section("🔗", "LABEL CORRELATION RANKING");

    let mut table = new_table(&["#", "Predictor", "r", "|r|"]);
    for (i, entry) in ranking.iter().take(top_n).enumerate() {
        let color = if entry.correlation >= 0.0 {
            Color::Green
        } else {
            Color::Red
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&entry.feature),
            Cell::new(format!("{:+.4}", entry.correlation)).fg(color),
            Cell::new(format!("{:.4}", entry.correlation.abs())),
        ]);
    }
    print_indented(&table);
}

/// Highly correlated predictor pairs
pub fn display_correlated_pairs(pairs: &[CorrelatedPair], threshold: f64, top_n: usize) {
    print_section(
        "🧮",
        &format!("CORRELATED PREDICTOR PAIRS (|r| > {:.2})", threshold),
    );
    if pairs.is_empty() {
        println!("      {}", style("No pairs above the threshold").dim());
        return;
    }

    let mut table = new_table(&["Predictor", "Predictor", "r"]);
    for pair in pairs.iter().take(top_n) {
        table.add_row(vec![
            Cell::new(&pair.feature1),
            Cell::new(&pair.feature2),
            Cell::new(format!("{:+.4}", pair.correlation)),
        ]);
    }
    print_indented(&table);
    if pairs.len() > top_n {
        println!(
            "      {}",
            style(format!("... and {} more", pairs.len() - top_n)).dim()
        );
    }
}

/// Side-by-side accuracy and out-of-sample error of every model
pub fn display_model_comparison(scores: &[ModelScore], selected: usize) {
    print_section("🏁", "MODEL COMPARISON");

    let mut table = new_table(&[
        "Model",
        "Tuned",
        "PCA comps",
        "CV accuracy",
        "Train accuracy",
        "Validation accuracy",
        "Out-of-sample error",
        "Time",
    ]);
    for (i, score) in scores.iter().enumerate() {
        let name = if i == selected {
            Cell::new(format!("★ {}", score.kind.label()))
                .fg(Color::Green)
                .add_attribute(Attribute::Bold)
        } else {
            Cell::new(score.kind.label())
        };
        table.add_row(vec![
            name,
            Cell::new(score.hyperparameter),
            Cell::new(score.n_components).set_alignment(CellAlignment::Right),
            Cell::new(percent(score.tuning.best_accuracy)),
            Cell::new(percent(score.train_accuracy)),
            Cell::new(percent(score.validation_accuracy)).add_attribute(Attribute::Bold),
            Cell::new(percent(score.out_of_sample_error)),
            Cell::new(format!("{:.1}s", score.fit_seconds)),
        ]);
    }
    print_indented(&table);
}

/// Counts table (predicted rows, actual columns) plus per-class rates
pub fn display_confusion_matrix(title: &str, matrix: &ConfusionMatrix, levels: &[String]) {
    print_section("🧾", title);

    let mut headers: Vec<String> = vec!["Predicted \\ Actual".to_string()];
    headers.extend(levels.iter().cloned());
    let header_refs: Vec<&str> = headers.iter().map(|s| s.as_str()).collect();
    let mut table = new_table(&header_refs);
    for (p, row) in matrix.counts.iter().enumerate() {
        let mut cells = vec![Cell::new(&levels[p]).add_attribute(Attribute::Bold)];
        for (a, &count) in row.iter().enumerate() {
            let cell = Cell::new(count).set_alignment(CellAlignment::Right);
            cells.push(if a == p { cell.fg(Color::Green) } else { cell });
        }
        table.add_row(cells);
    }
    print_indented(&table);

    println!();
    let mut rates = new_table(&[
        "Class",
        "Sensitivity",
        "Specificity",
        "Precision",
        "Balanced accuracy",
    ]);
    for (level, metrics) in levels.iter().zip(&matrix.per_class) {
        rates.add_row(vec![
            Cell::new(level),
            Cell::new(optional_percent(metrics.sensitivity)),
            Cell::new(optional_percent(metrics.specificity)),
            Cell::new(optional_percent(metrics.precision)),
            Cell::new(optional_percent(metrics.balanced_accuracy)),
        ]);
    }
    print_indented(&rates);
    println!(
        "      Accuracy: {} over {} rows",
        style(percent(matrix.accuracy)).green().bold(),
        matrix.total
    );
    println!(
        "      Macro precision: {}  recall: {}  F1: {}",
        optional_percent(matrix.precision),
        optional_percent(matrix.recall),
        optional_percent(matrix.f1)
    );
}

fn accuracy_bar(value: f64, min: f64, max: f64) -> String {
    let span = max - min;
    let filled = if span > 0.0 {
        (((value - min) / span) * (BAR_WIDTH - 1) as f64).round() as usize + 1
    } else {
        BAR_WIDTH
    };
    let filled = filled.min(BAR_WIDTH);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

/// Cross-validated accuracy per grid value, with a bar scaled to the curve's range
pub fn display_tuning_curve(tuning: &TuningResult) {
    print_section("📈", &format!("TUNING CURVE: {}", tuning.kind.label()));

    let min = tuning
        .points
        .iter()
        .map(|p| p.mean_accuracy)
        .fold(f64::INFINITY, f64::min);
    let max = tuning
        .points
        .iter()
        .map(|p| p.mean_accuracy)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut table = new_table(&["Hyperparameter", "CV accuracy", "CV error", ""]);
    for point in &tuning.points {
        let chosen = point.hyperparameter == tuning.best;
        let label = Cell::new(point.hyperparameter);
        table.add_row(vec![
            if chosen {
                label.fg(Color::Green).add_attribute(Attribute::Bold)
            } else {
                label
            },
            Cell::new(percent(point.mean_accuracy)),
            Cell::new(percent(point.cv_error())),
            Cell::new(accuracy_bar(point.mean_accuracy, min, max)).fg(Color::Cyan),
        ]);
    }
    print_indented(&table);
}

/// Level counts of the final predictions and the first `preview` rows
pub fn display_predictions(predictions: &[Prediction], levels: &[String], preview: usize) {
    print_section("🔮", "PREDICTIONS");

    let mut counts = new_table(&["Class", "Count"]);
    for (level, count) in prediction_counts(predictions, levels) {
        counts.add_row(vec![Cell::new(level), Cell::new(count)]);
    }
    print_indented(&counts);

    if preview > 0 && !predictions.is_empty() {
        println!();
        let mut table = new_table(&["Id", "Predicted"]);
        for p in predictions.iter().take(preview) {
            table.add_row(vec![
                Cell::new(&p.id),
                Cell::new(&p.label).fg(Color::Cyan),
            ]);
        }
        print_indented(&table);
    }
}

/// Closing overview of a run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub training_rows: usize,
    pub evaluation_rows: usize,
    pub predictors: usize,
    pub fit_rows: usize,
    pub validation_rows: usize,
    pub selected_model: String,
    pub validation_accuracy: f64,
    pub out_of_sample_error: f64,
    pub elapsed_seconds: f64,
}

impl RunSummary {
    pub fn display(&self) {
        print_section("📋", "RUN SUMMARY");

        let mut table = new_table(&["Metric", "Value"]);
        table.add_row(vec![Cell::new("📁 Training rows"), Cell::new(self.training_rows)]);
        table.add_row(vec![Cell::new("📁 Evaluation rows"), Cell::new(self.evaluation_rows)]);
        table.add_row(vec![Cell::new("🧩 Predictors"), Cell::new(self.predictors)]);
        table.add_row(vec![
            Cell::new("✂️  Fit / validation rows"),
            Cell::new(format!("{} / {}", self.fit_rows, self.validation_rows)),
        ]);
        table.add_row(vec![
            Cell::new("🏆 Selected model"),
            Cell::new(&self.selected_model)
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new("🎯 Validation accuracy"),
            Cell::new(percent(self.validation_accuracy))
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new("📉 Out-of-sample error"),
            Cell::new(percent(self.out_of_sample_error)),
        ]);
        table.add_row(vec![
            Cell::new("⏱️  Total time"),
            Cell::new(format!("{:.2}s", self.elapsed_seconds)),
        ]);
        print_indented(&table);
    }
}
