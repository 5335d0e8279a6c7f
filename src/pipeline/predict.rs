//! Final predictions on the evaluation table

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;

use super::comparator::ModelArtifact;
use super::matrix::FeatureMatrix;

/// Predicted label of one evaluation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub id: String,
    pub label: String,
}

/// Predict every evaluation row with the selected artifact, in row order
pub fn predict_evaluation(
    artifact: &ModelArtifact,
    features: &FeatureMatrix,
    ids: &[String],
    levels: &[String],
) -> Result<Vec<Prediction>> {
    if ids.len() != features.nrows() {
        anyhow::bail!(
            "Got {} identifiers for {} evaluation rows",
            ids.len(),
            features.nrows()
        );
    }

    let codes = artifact
        .predict(features)
        .context("Failed to predict the evaluation table")?;

    codes
        .into_iter()
        .zip(ids)
        .map(|(code, id)| {
            let label = levels.get(code).with_context(|| {
                format!("Predicted class index {} is outside the label levels", code)
            })?;
            Ok(Prediction {
                id: id.clone(),
                label: label.clone(),
            })
        })
        .collect()
}

/// Count of predictions per level, in level order
pub fn prediction_counts(predictions: &[Prediction], levels: &[String]) -> Vec<(String, usize)> {
    levels
        .iter()
        .map(|level| {
            let count = predictions.iter().filter(|p| &p.label == level).count();
            (level.clone(), count)
        })
        .collect()
}

/// Write `<id_column>,predicted` rows as CSV
pub fn save_predictions(predictions: &[Prediction], id_column: &str, path: &Path) -> Result<()> {
    let ids: Vec<&str> = predictions.iter().map(|p| p.id.as_str()).collect();
    let labels: Vec<&str> = predictions.iter().map(|p| p.label.as_str()).collect();

    let mut df = DataFrame::new(vec![
        Column::new(id_column.into(), ids),
        Column::new("predicted".into(), labels),
    ])
    .context("Failed to build predictions table")?;

    let mut file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .with_context(|| format!("Failed to write predictions: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_counts() {
        let levels: Vec<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
        let preds = vec![
            Prediction { id: "1".into(), label: "B".into() },
            Prediction { id: "2".into(), label: "B".into() },
        ];
        assert_eq!(
            prediction_counts(&preds, &levels),
            vec![("A".to_string(), 0), ("B".to_string(), 2)]
        );
    }

    #[test]
    fn test_save_predictions_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preds.csv");
        let preds = vec![
            Prediction { id: "1".into(), label: "A".into() },
            Prediction { id: "2".into(), label: "E".into() },
        ];
        save_predictions(&preds, "problem_id", &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("problem_id,predicted"));
        assert_eq!(lines.next(), Some("1,A"));
        assert_eq!(lines.next(), Some("2,E"));
    }
}
