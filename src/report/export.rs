//! JSON run report
//!
//! Records the configuration, every cleaning drop, the exploration results, each
//! model's scores and tuning curve, the selected model and the final predictions.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::pipeline::{
    AnalysisConfig, CleaningSummary, CorrelatedPair, CorrelationMatrix, LabelCorrelation,
    ModelScore, Prediction, SplitPartition,
};

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub harvest_version: String,
    pub training_file: String,
    pub evaluation_file: String,
    pub predictions_file: String,
    pub config: AnalysisConfig,
}

/// Sizes and class shares of the fit/validation partition
#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub fit_rows: usize,
    pub validation_rows: usize,
    pub fit_proportions: Vec<f64>,
    pub validation_proportions: Vec<f64>,
}

/// Descriptive correlation results
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationReport {
    pub threshold: f64,
    pub label_correlations: Vec<LabelCorrelation>,
    pub correlated_pairs: Vec<CorrelatedPair>,
    pub skipped_constant: Vec<String>,
}

/// The model chosen for the final predictions
#[derive(Debug, Clone, Serialize)]
pub struct SelectedModel {
    pub kind: String,
    pub hyperparameter: String,
    pub validation_accuracy: f64,
    pub out_of_sample_error: f64,
}

/// Timing information in milliseconds
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimingInfo {
    pub load_ms: u64,
    pub clean_ms: u64,
    pub explore_ms: u64,
    pub compare_ms: u64,
    pub predict_ms: u64,
    pub total_ms: u64,
}

/// Complete run report
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub metadata: ReportMetadata,
    pub cleaning: CleaningSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<SplitReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationReport>,
    pub models: Vec<ModelScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<SelectedModel>,
    pub predictions: Vec<Prediction>,
    pub timing: TimingInfo,
}

/// Parameters for creating a RunReportBuilder
pub struct ReportBuilderParams {
    pub training_file: String,
    pub evaluation_file: String,
    pub predictions_file: String,
    pub config: AnalysisConfig,
}

/// Collects results while the pipeline runs
pub struct RunReportBuilder {
    params: ReportBuilderParams,
    cleaning: CleaningSummary,
    split: Option<SplitReport>,
    correlation: Option<CorrelationReport>,
    models: Vec<ModelScore>,
    selected: Option<SelectedModel>,
    predictions: Vec<Prediction>,
    timing: TimingInfo,
}

impl RunReportBuilder {
    pub fn new(params: ReportBuilderParams) -> Self {
        Self {
            params,
            cleaning: CleaningSummary::default(),
            split: None,
            correlation: None,
            models: Vec::new(),
            selected: None,
            predictions: Vec::new(),
            timing: TimingInfo::default(),
        }
    }

    pub fn set_cleaning(&mut self, summary: &CleaningSummary) {
        self.cleaning = summary.clone();
    }

    pub fn set_split(&mut self, split: &SplitPartition, labels: &[usize]) {
        let n_classes = self.params.config.n_classes();
        let (fit_proportions, validation_proportions) = split.class_proportions(labels, n_classes);
        self.split = Some(SplitReport {
            fit_rows: split.fit.len(),
            validation_rows: split.validation.len(),
            fit_proportions,
            validation_proportions,
        });
    }

    pub fn set_correlation(
        &mut self,
        matrix: &CorrelationMatrix,
        ranking: &[LabelCorrelation],
        pairs: &[CorrelatedPair],
    ) {
        self.correlation = Some(CorrelationReport {
            threshold: self.params.config.correlation_threshold,
            label_correlations: ranking.to_vec(),
            correlated_pairs: pairs.to_vec(),
            skipped_constant: matrix.skipped_constant.clone(),
        });
    }

    /// Record every model score and which one was selected
    pub fn set_models(&mut self, scores: &[ModelScore], selected: usize) {
        self.models = scores.to_vec();
        self.selected = scores.get(selected).map(|s| SelectedModel {
            kind: s.kind.label().to_string(),
            hyperparameter: s.hyperparameter.to_string(),
            validation_accuracy: s.validation_accuracy,
            out_of_sample_error: s.out_of_sample_error,
        });
    }

    pub fn set_predictions(&mut self, predictions: &[Prediction]) {
        self.predictions = predictions.to_vec();
    }

    pub fn set_timing(&mut self, timing: TimingInfo) {
        self.timing = timing;
    }

    pub fn build(self) -> RunReport {
        RunReport {
            metadata: ReportMetadata {
                timestamp: Utc::now().to_rfc3339(),
                harvest_version: env!("CARGO_PKG_VERSION").to_string(),
                training_file: self.params.training_file,
                evaluation_file: self.params.evaluation_file,
                predictions_file: self.params.predictions_file,
                config: self.params.config,
            },
            cleaning: self.cleaning,
            split: self.split,
            correlation: self.correlation,
            models: self.models,
            selected: self.selected,
            predictions: self.predictions,
            timing: self.timing,
        }
    }
}

/// Export the run report to a JSON file
pub fn export_run_report(report: &RunReport, output_path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(report).context("Failed to serialize run report to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write run report to {}", output_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> RunReportBuilder {
        RunReportBuilder::new(ReportBuilderParams {
            training_file: "train.csv".to_string(),
            evaluation_file: "eval.csv".to_string(),
            predictions_file: "train_predictions.csv".to_string(),
            config: AnalysisConfig::default(),
        })
    }

    #[test]
    fn test_build_minimal_report() {
        let report = builder().build();
        assert!(report.split.is_none());
        assert!(report.models.is_empty());
        assert_eq!(report.metadata.training_file, "train.csv");
    }

    #[test]
    fn test_split_section() {
        let mut b = builder();
        let labels = vec![0, 1, 0, 1];
        let split = SplitPartition {
            fit: vec![0, 1],
            validation: vec![2, 3],
        };
        b.set_split(&split, &labels);
        let report = b.build();
        let s = report.split.unwrap();
        assert_eq!(s.fit_rows, 2);
        assert_eq!(s.fit_proportions.len(), 5);
        assert!((s.fit_proportions[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_export_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut b = builder();
        b.set_predictions(&[Prediction {
            id: "1".to_string(),
            label: "A".to_string(),
        }]);
        export_run_report(&b.build(), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["predictions"][0]["label"], "A");
        assert_eq!(value["metadata"]["config"]["seed"], 50);
        assert_eq!(value["metadata"]["config"]["nzv_policy"], "report");
    }
}
